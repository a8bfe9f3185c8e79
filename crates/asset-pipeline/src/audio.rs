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

//! Audio Pipeline (§2, §4): pass-through packaging. The pipeline never
//! decodes a bank - it copies the source file's bytes into a package
//! verbatim, exactly as the Script Pipeline does for compiled bytecode.

use std::path::Path;

use dess_assets::{AssetId, AudioAsset};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    package_store::{PackageDefaults, PackageStore},
};

impl PackageDefaults for AudioAsset {}

pub struct AudioPipeline {
    store: PackageStore<AudioAsset>,
}

impl AudioPipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("audio"));
        store.initialize().ok();
        Self { store }
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: AssetId) -> Option<AudioAsset> {
        self.store.load_asset(id)
    }

    pub fn refresh_cache(&mut self) {
        self.store.refresh_cache();
    }

    pub fn set_output_location(&mut self, output_root: impl Into<std::path::PathBuf>) -> std::io::Result<()> {
        self.store.set_output_location(output_root)
    }

    pub fn clear_output(&mut self) -> std::io::Result<()> {
        self.store.clear()?;
        self.store.initialize()
    }

    /// Copies `relative`'s bytes verbatim into a new audio package.
    pub fn convert(&mut self, ctx: &BuilderContext, relative: &Path, name: &str) -> Result<AssetId> {
        let bytes = ctx
            .filesystem()
            .read_to_end(relative)
            .map_err(|err| Error::InputIo(relative.display().to_string(), err))?;
        let origin = relative.display().to_string();
        self.package(&origin, name, bytes)
    }

    pub fn package(&mut self, asset_origin: &str, name: &str, data: Vec<u8>) -> Result<AssetId> {
        self.store
            .save_asset(asset_origin, name, true, |resolved_name, id| AudioAsset {
                name: resolved_name,
                id,
                data,
            })
            .ok_or_else(|| Error::Collision(name.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("dess-audio-pipeline-test-{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn convert_copies_bytes_verbatim() {
        let data_root = temp_dir("audio-data");
        let output_root = temp_dir("audio-out");
        fs::write(data_root.join("hit.wav"), [1u8, 2, 3, 4]).unwrap();

        let ctx = BuilderContext::new(&data_root, &output_root, "packages");
        let mut pipeline = AudioPipeline::new(&ctx);
        let id = pipeline.convert(&ctx, Path::new("hit.wav"), "hit").unwrap();

        let asset = pipeline.load_asset(id).unwrap();
        assert_eq!(asset.data, vec![1, 2, 3, 4]);
    }
}
