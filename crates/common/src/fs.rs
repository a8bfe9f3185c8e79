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

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use normalize_path::NormalizePath;

/// Thin facade over the filesystem that all pipelines go through instead of
/// touching `std::fs` directly. Lets a builder be pointed at arbitrary
/// source and output directories without every pipeline hard-coding them.
#[derive(Debug, Clone)]
pub struct Filesystem {
    data_root: PathBuf,
    output_root: PathBuf,
}

impl Filesystem {
    pub fn new(data_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn set_data_root(&mut self, path: impl Into<PathBuf>) {
        self.data_root = path.into();
    }

    pub fn set_output_root(&mut self, path: impl Into<PathBuf>) {
        self.output_root = path.into();
    }

    /// Resolves a path given relative to the source data tree into an
    /// absolute, normalized path, rejecting attempts to escape the root.
    pub fn absolute_source_path(&self, relative: &Path) -> io::Result<PathBuf> {
        let joined = self.data_root.join(relative).normalize();
        if !joined.starts_with(self.data_root.normalize()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path {relative:?} escapes the data root"),
            ));
        }
        Ok(joined)
    }

    /// Strips the data root off an absolute path, producing the relative
    /// form that gets stored inside a package entry.
    pub fn relative_source_path(&self, absolute: &Path) -> io::Result<PathBuf> {
        absolute
            .normalize()
            .strip_prefix(self.data_root.normalize())
            .map(Path::to_path_buf)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
    }

    pub fn read_to_end(&self, relative: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.absolute_source_path(relative)?)
    }

    pub fn read_to_string(&self, relative: &Path) -> io::Result<String> {
        fs::read_to_string(self.absolute_source_path(relative)?)
    }

    pub fn source_modified_time(&self, relative: &Path) -> io::Result<std::time::SystemTime> {
        fs::metadata(self.absolute_source_path(relative)?)?.modified()
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_root.join(file_name)
    }

    pub fn ensure_output_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.output_root)
    }

    /// Enumerates files below `relative` whose extension matches one in
    /// `extensions` (case-insensitive), relative to the data root. Mirrors
    /// subdirectories only when `recursive` is set - the `-r` CLI flag.
    pub fn walk_files(
        &self,
        relative: &Path,
        extensions: &[&str],
        recursive: bool,
    ) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        self.walk_files_into(
            &self.absolute_source_path(relative)?,
            extensions,
            recursive,
            &mut out,
        )?;
        let relative_out = out
            .into_iter()
            .map(|path| self.relative_source_path(&path))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(relative_out)
    }

    fn walk_files_into(
        &self,
        dir: &Path,
        extensions: &[&str],
        recursive: bool,
        out: &mut Vec<PathBuf>,
    ) -> io::Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                if recursive {
                    self.walk_files_into(&path, extensions, recursive, out)?;
                }
            } else if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
                if extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)) {
                    out.push(path);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_escaping_paths() {
        let fs = Filesystem::new("/data/root", "/data/out");
        assert!(fs.absolute_source_path(Path::new("../../etc/passwd")).is_err());
    }

    #[test]
    fn resolves_relative_paths() {
        let fs = Filesystem::new("/data/root", "/data/out");
        let absolute = fs.absolute_source_path(Path::new("textures/foo.png")).unwrap();
        assert_eq!(absolute, Path::new("/data/root/textures/foo.png"));
    }
}
