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

/// Errors local to converting a single asset. Per the batch-processing
/// policy, none of these ever abort a whole `convert` run - the caller logs
/// and moves to the next source file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not read source file {0}: {1}")]
    InputIo(String, std::io::Error),
    #[error("could not decode {0}: {1}")]
    Decode(String, String),
    #[error("required shader {0} is not packaged and no default exists")]
    ReferentialMissing(String),
    #[error("shader stages disagree on resource layout at binding {0}")]
    ShaderLinkMismatch(String),
    #[error("could not register asset {0} - exhausted 255 collision suffixes")]
    Collision(String),
    #[error("failed to persist {0}: {1}")]
    Persistence(String, std::io::Error),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("missing required flag -{0}")]
    MissingFlag(String),
    #[error("could not load scene {0}: {1}")]
    Scene(String, String),
    #[error("external tool failed for {0}: {1}")]
    External(String, String),
}

pub type Result<T> = std::result::Result<T, Error>;
