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

//! Generic persistent key -> blob map, parameterised on an asset kind
//! through `PackageableAsset`. One instance per asset kind replaces the
//! source tool's pipeline base class (design note 9a).

use std::{
    collections::HashMap,
    fs, io,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use dess_assets::{hash_name, AssetId, AssetName, PackageableAsset, ASSET_NAME_MAX_LEN};
use dess_common::{codec, BinaryDeserialization, BinarySerialization};
use log::warn;

/// Sentinel `asset_origin` for assets synthesised by the builder itself
/// (default textures/shaders) rather than imported from a source file.
pub const ORIGIN_USER: &str = "OriginUser";

const MAX_COLLISION_SUFFIX: u8 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PackagePtr {
    asset_origin: String,
    filepath: PathBuf,
}

impl BinarySerialization for PackagePtr {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.asset_origin.serialize(w)?;
        self.filepath.to_string_lossy().into_owned().serialize(w)
    }
}

impl BinaryDeserialization for PackagePtr {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(PackagePtr {
            asset_origin: String::deserialize(r)?,
            filepath: PathBuf::from(String::deserialize(r)?),
        })
    }
}

/// Hook a pipeline implements to seed its store with built-in fallback
/// assets (a magenta default texture, a default vertex/pixel shader pair...).
/// Invoked on every `initialize` and after every successful registration, and
/// must be idempotent - inserting an asset that's already present is a no-op.
pub trait PackageDefaults: PackageableAsset + Sized {
    fn default_assets() -> Vec<Self> {
        Vec::new()
    }
}

/// Generic persistent `AssetId -> PackagePtr` map for one asset kind `T`.
pub struct PackageStore<T: PackageableAsset + PackageDefaults> {
    assets: HashMap<AssetId, PackagePtr>,
    output_root: PathBuf,
    package_subdir: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T: PackageableAsset + PackageDefaults> PackageStore<T> {
    pub fn new(output_root: impl Into<PathBuf>, package_subdir: impl Into<PathBuf>) -> Self {
        Self {
            assets: HashMap::new(),
            output_root: output_root.into(),
            package_subdir: package_subdir.into(),
            _marker: std::marker::PhantomData,
        }
    }

    fn cache_path(&self) -> PathBuf {
        self.output_root.join(format!("{}.cache", T::cache_name()))
    }

    fn package_dir(&self) -> PathBuf {
        self.output_root.join(&self.package_subdir)
    }

    /// Reads the cache file, drops entries whose blob no longer exists, then
    /// re-inserts the kind's built-in default assets.
    pub fn initialize(&mut self) -> io::Result<()> {
        self.assets.clear();
        let cache_path = self.cache_path();
        if cache_path.exists() {
            match codec::read_from_file::<HashMap<AssetId, PackagePtr>>(&cache_path) {
                Ok(assets) => self.assets = assets,
                Err(err) => warn!("failed to read cache {cache_path:?}: {err}"),
            }
        }
        self.evict_missing();
        self.package_default_assets();
        Ok(())
    }

    fn evict_missing(&mut self) {
        let output_root = self.output_root.clone();
        self.assets
            .retain(|_, ptr| output_root.join(&ptr.filepath).exists());
    }

    fn package_default_assets(&mut self) {
        for asset in T::default_assets() {
            if !self.asset_exists(asset.id()) {
                let name = asset.name().as_str().to_owned();
                self.save_asset(ORIGIN_USER, &name, false, |_, _| asset);
            }
        }
    }

    /// Computes a free id/path pair for `name`, resolving collisions by
    /// decimal suffixing when `allow_suffix` is set. Returns `None` on a
    /// `Collision` (no free suffix) or an invalid synthesised name.
    fn reserve(
        &mut self,
        asset_origin: &str,
        name: &str,
        allow_suffix: bool,
    ) -> Option<(AssetName, AssetId, PathBuf)> {
        let id = hash_name(name);
        if let Some(existing) = self.assets.get(&id) {
            if existing.asset_origin == asset_origin && asset_origin != ORIGIN_USER {
                // Re-importing the same source file under the same name - reuse it.
                let existing_name = AssetName::new(name).ok()?;
                return Some((existing_name, id, existing.filepath.clone()));
            }
            if !allow_suffix {
                return None;
            }
            for suffix in 1..=MAX_COLLISION_SUFFIX {
                let candidate = format!("{name}{suffix}");
                if candidate.len() > ASSET_NAME_MAX_LEN {
                    continue;
                }
                let candidate_id = hash_name(&candidate);
                if !self.assets.contains_key(&candidate_id) {
                    let path = self.path_for(&candidate);
                    let asset_name = AssetName::new(candidate).ok()?;
                    return Some((asset_name, candidate_id, path));
                }
            }
            return None;
        }
        let asset_name = AssetName::new(name).ok()?;
        let path = self.path_for(name);
        Some((asset_name, id, path))
    }

    fn path_for(&self, final_name: &str) -> PathBuf {
        self.package_subdir
            .join(format!("{final_name}.{}", T::extension()))
    }

    /// Registers a name against this store and builds the asset via
    /// `build`, which receives the resolved display name and id (it may
    /// differ from the requested name after collision suffixing). Returns
    /// the final id, or `None` on a `Collision`.
    pub fn save_asset(
        &mut self,
        asset_origin: &str,
        name: &str,
        allow_suffix: bool,
        build: impl FnOnce(AssetName, AssetId) -> T,
    ) -> Option<AssetId> {
        let (final_name, id, rel_path) = self.reserve(asset_origin, name, allow_suffix)?;
        let asset = build(final_name, id);
        let full_path = self.output_root.join(&rel_path);
        if let Some(parent) = full_path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("failed to create package dir {parent:?}: {err}");
                return None;
            }
        }
        if let Err(err) = codec::write_to_file(&full_path, &asset, false) {
            warn!("failed to write package {full_path:?}: {err}");
            return None;
        }
        self.assets.insert(
            id,
            PackagePtr {
                asset_origin: asset_origin.to_owned(),
                filepath: rel_path,
            },
        );
        self.export_cache();
        self.package_default_assets();
        Some(id)
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.assets.contains_key(&id)
    }

    pub fn asset_exists_by_name(&self, name: &str) -> bool {
        self.asset_exists(hash_name(name))
    }

    pub fn load_asset(&self, id: AssetId) -> Option<T> {
        let ptr = self.assets.get(&id)?;
        let path = self.output_root.join(&ptr.filepath);
        match codec::read_from_file(&path) {
            Ok(asset) => Some(asset),
            Err(err) => {
                warn!("failed to load package {path:?}: {err}");
                None
            }
        }
    }

    pub fn load_asset_by_name(&self, name: &str) -> Option<T> {
        self.load_asset(hash_name(name))
    }

    pub fn delete_asset(&mut self, id: AssetId) -> bool {
        let Some(ptr) = self.assets.get(&id) else {
            return false;
        };
        let path = self.output_root.join(&ptr.filepath);
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!("failed to delete package {path:?}: {err}");
                return false;
            }
        }
        self.assets.remove(&id);
        self.export_cache();
        true
    }

    pub fn refresh_cache(&mut self) {
        self.evict_missing();
        self.export_cache();
    }

    pub fn export_cache(&self) {
        let cache_path = self.cache_path();
        if let Some(parent) = cache_path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("failed to create output dir {parent:?}: {err}");
                return;
            }
        }
        if let Err(err) = codec::write_to_file(&cache_path, &self.assets, false) {
            warn!("failed to persist cache {cache_path:?}: {err}");
        }
    }

    pub fn set_output_location(&mut self, output_root: impl Into<PathBuf>) -> io::Result<()> {
        self.output_root = output_root.into();
        self.initialize()
    }

    pub fn set_package_output_location(&mut self, package_subdir: impl Into<PathBuf>) {
        self.package_subdir = package_subdir.into();
    }

    pub fn package_dir_display(&self) -> &Path {
        &self.package_subdir
    }

    /// Removes every package blob and the cache file. Does not reinitialize -
    /// callers (`--clear_output`) call `initialize` afterwards to restore
    /// default assets.
    pub fn clear(&mut self) -> io::Result<()> {
        let dir = self.package_dir();
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.path().is_file() {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        let cache_path = self.cache_path();
        if cache_path.exists() {
            fs::remove_file(cache_path)?;
        }
        self.assets.clear();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use dess_assets::{CompressionType, TexelFormat, TextureAsset, TextureData, TextureType};

    impl PackageDefaults for TextureAsset {}

    fn sample_texture(name: AssetName, id: AssetId) -> TextureAsset {
        TextureAsset {
            name,
            id,
            data: TextureData {
                width: 1,
                height: 1,
                depth: 1,
                texture_type: TextureType::Tex2D,
                format: TexelFormat::Rgba8,
                compression: CompressionType::None,
                mips: vec![vec![255, 0, 255, 255]],
            },
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dess-package-store-test-{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn register_then_load_round_trips() {
        let root = temp_dir("roundtrip");
        let mut store: PackageStore<TextureAsset> = PackageStore::new(&root, "textures");
        store.initialize().unwrap();
        let id = store
            .save_asset("wood.png", "wood", true, sample_texture)
            .unwrap();
        assert!(store.asset_exists(id));
        let loaded = store.load_asset(id).unwrap();
        assert_eq!(loaded.data.width, 1);
    }

    #[test]
    fn collision_gets_numeric_suffix() {
        let root = temp_dir("collision");
        let mut store: PackageStore<TextureAsset> = PackageStore::new(&root, "textures");
        store.initialize().unwrap();
        let first = store
            .save_asset("file_A.fbx", "mat_A", true, sample_texture)
            .unwrap();
        let second = store
            .save_asset("file_B.fbx", "mat_A", true, sample_texture)
            .unwrap();
        assert_ne!(first, second);
        assert!(store.asset_exists(first));
        assert!(store.asset_exists(second));
    }

    #[test]
    fn reimport_same_origin_reuses_entry() {
        let root = temp_dir("reimport");
        let mut store: PackageStore<TextureAsset> = PackageStore::new(&root, "textures");
        store.initialize().unwrap();
        let first = store
            .save_asset("wood.png", "wood", true, sample_texture)
            .unwrap();
        let second = store
            .save_asset("wood.png", "wood", true, sample_texture)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.assets.len(), 1);
    }

    #[test]
    fn cache_round_trips_across_restart() {
        let root = temp_dir("cache-restart");
        let id = {
            let mut store: PackageStore<TextureAsset> = PackageStore::new(&root, "textures");
            store.initialize().unwrap();
            store
                .save_asset("wood.png", "wood", true, sample_texture)
                .unwrap()
        };
        let mut restarted: PackageStore<TextureAsset> = PackageStore::new(&root, "textures");
        restarted.initialize().unwrap();
        assert!(restarted.asset_exists(id));
    }

    #[test]
    fn orphaned_entry_is_evicted_on_initialize() {
        let root = temp_dir("orphan");
        let id = {
            let mut store: PackageStore<TextureAsset> = PackageStore::new(&root, "textures");
            store.initialize().unwrap();
            store
                .save_asset("wood.png", "wood", true, sample_texture)
                .unwrap()
        };
        let blob = root.join("textures").join("wood.ste");
        fs::remove_file(blob).unwrap();
        let mut restarted: PackageStore<TextureAsset> = PackageStore::new(&root, "textures");
        restarted.initialize().unwrap();
        assert!(!restarted.asset_exists(id));
    }
}
