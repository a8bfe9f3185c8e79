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

//! Script Pipeline (§6): shells out to `luajit -b src dst` and packages the
//! resulting bytecode verbatim. A non-zero exit aborts packaging - there is
//! no partial result to salvage from a failed compile.

use std::{path::Path, process::Command};

use dess_assets::{AssetId, ScriptAsset};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    package_store::{PackageDefaults, PackageStore},
};

impl PackageDefaults for ScriptAsset {}

pub struct ScriptPipeline {
    store: PackageStore<ScriptAsset>,
    compiler: String,
}

impl ScriptPipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("scripts"));
        store.initialize().ok();
        Self {
            store,
            compiler: "luajit".to_owned(),
        }
    }

    /// Overrides the bytecode compiler binary, for tests that stub it out
    /// rather than depending on a real `luajit` being on `PATH`.
    pub fn set_compiler(&mut self, compiler: impl Into<String>) {
        self.compiler = compiler.into();
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: AssetId) -> Option<ScriptAsset> {
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

    /// Compiles `relative` to Lua bytecode via `luajit -b src dst` and
    /// packages the resulting blob.
    pub fn convert(&mut self, ctx: &BuilderContext, relative: &Path, name: &str) -> Result<AssetId> {
        let src = ctx
            .filesystem()
            .absolute_source_path(relative)
            .map_err(|err| Error::InputIo(relative.display().to_string(), err))?;

        let dst = std::env::temp_dir().join(format!("{name}.luac"));
        let status = Command::new(&self.compiler)
            .arg("-b")
            .arg(&src)
            .arg(&dst)
            .status()
            .map_err(|err| Error::External(relative.display().to_string(), err.to_string()))?;
        if !status.success() {
            return Err(Error::External(
                relative.display().to_string(),
                format!("{} exited with {status}", self.compiler),
            ));
        }

        let bytecode = std::fs::read(&dst).map_err(|err| Error::External(relative.display().to_string(), err.to_string()))?;
        let _ = std::fs::remove_file(&dst);

        let origin = relative.display().to_string();
        self.package(&origin, name, bytecode)
    }

    pub fn package(&mut self, asset_origin: &str, name: &str, bytecode: Vec<u8>) -> Result<AssetId> {
        self.store
            .save_asset(asset_origin, name, true, |resolved_name, id| ScriptAsset {
                name: resolved_name,
                id,
                bytecode,
            })
            .ok_or_else(|| Error::Collision(name.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("dess-script-pipeline-test-{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn failed_compile_does_not_package() {
        let data_root = temp_dir("script-data");
        let output_root = temp_dir("script-out");
        fs::write(data_root.join("broken.lua"), "do not care").unwrap();

        let ctx = BuilderContext::new(&data_root, &output_root, "packages");
        let mut pipeline = ScriptPipeline::new(&ctx);
        pipeline.set_compiler("definitely-not-a-real-binary-xyz");

        let result = pipeline.convert(&ctx, Path::new("broken.lua"), "broken");
        assert!(matches!(result, Err(Error::External(_, _))));
        assert!(!pipeline.asset_exists(dess_assets::hash_name("broken")));
    }
}
