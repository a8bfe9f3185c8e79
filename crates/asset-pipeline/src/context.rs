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

use std::path::{Path, PathBuf};

use dess_common::Filesystem;

/// Explicit state every pipeline and the command dispatcher shares, in place
/// of the source tool's mutable global singletons for output directory and
/// allocator (see `SPEC_FULL.md` design notes). One `BuilderContext` is owned
/// by the dispatcher and threaded through every pipeline call; nothing reads
/// global state.
#[derive(Debug, Clone)]
pub struct BuilderContext {
    filesystem: Filesystem,
    package_subdir: PathBuf,
    compress_packages: bool,
}

impl BuilderContext {
    pub fn new(
        data_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        package_subdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filesystem: Filesystem::new(data_root, output_root),
            package_subdir: package_subdir.into(),
            compress_packages: false,
        }
    }

    pub fn filesystem(&self) -> &Filesystem {
        &self.filesystem
    }

    pub fn output_root(&self) -> &Path {
        self.filesystem.output_root()
    }

    pub fn package_subdir(&self) -> &Path {
        &self.package_subdir
    }

    pub fn compress_packages(&self) -> bool {
        self.compress_packages
    }

    pub fn set_compress_packages(&mut self, compress: bool) {
        self.compress_packages = compress;
    }

    pub fn set_output_root(&mut self, path: impl Into<PathBuf>) {
        self.filesystem.set_output_root(path);
    }

    pub fn set_package_subdir(&mut self, path: impl Into<PathBuf>) {
        self.package_subdir = path.into();
    }
}
