// Copyright (C) 2023 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Terminal front-end: reads one line at a time from stdin and hands it to
//! the Command Dispatcher. All the actual behaviour lives in
//! `dess_asset_pipeline` - this binary only wires up the data/output roots
//! and runs the loop.

use std::io::{self, BufRead, Write};

use clap::Arg;
use dess_asset_pipeline::{BuilderContext, DispatchError, Dispatcher};
use log::{error, info};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = clap::Command::new("builder")
        .version("0.1.0")
        .author("gigablaster <gigakek@protonmail.com>")
        .about("Asset builder for dess engine")
        .arg(Arg::new("data-root").long("data-root").default_value("assets"))
        .arg(Arg::new("output-root").long("output-root").default_value("build"))
        .arg(Arg::new("package-dir").long("package-dir").default_value("packages"))
        .get_matches();

    let ctx = BuilderContext::new(
        args.get_one::<String>("data-root").unwrap(),
        args.get_one::<String>("output-root").unwrap(),
        args.get_one::<String>("package-dir").unwrap(),
    );
    let mut dispatcher = Dispatcher::new(ctx);

    info!("dess-builder ready; type --help for a command list");
    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line);
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                error!("could not read command: {err}");
                continue;
            }
        }

        match dispatcher.run(&line) {
            Ok(()) => {}
            Err(DispatchError::ExitCommand) => break,
            Err(DispatchError::NoError) => {}
            Err(err) => error!("{err}"),
        }
    }
}
