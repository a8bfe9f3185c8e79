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

//! Record types for every asset kind the builder emits, plus the
//! content-addressed identity (`AssetName` / `AssetId`) they all share.
//!
//! Nothing in here touches a filesystem or a source format - that is the
//! pipelines' job, in `dess-asset-pipeline`. This crate only knows how to
//! hold a fully-built asset and read/write it through the wire format
//! `dess-common` provides.

pub mod animation;
pub mod audio;
pub mod id;
pub mod material;
pub mod mesh;
pub mod model;
pub mod script;
pub mod shader;
pub mod skeleton;
pub mod texture;

pub use animation::{AnimationAsset, AnimationChannel, AnimationData};
pub use audio::AudioAsset;
pub use id::{hash_name, AssetId, AssetName, AssetNameError, ASSET_NAME_MAX_LEN};
pub use material::{
    AddressMode, BlendFunction, BlendMode, FilterMode, MaterialAsset, MaterialData, SamplerData,
    UniformBufferData,
};
pub use mesh::{MeshAsset, MeshData, PrimitiveType, SubMesh, VertexConfig};
pub use model::{ModelAsset, ModelData};
pub use script::ScriptAsset;
pub use shader::{
    ConcreteType, ImageDimension, ResourceKind, ShaderAsset, ShaderBackend, ShaderData,
    ShaderResource, ShaderStage,
};
pub use skeleton::{Bone, SkeletonAsset, SkeletonData};
pub use texture::{CompressionType, TexelFormat, TextureAsset, TextureData, TextureType};

/// Capability a package store needs from an asset kind to persist it: how to
/// name its cache and package files, and how to read/write its payload.
/// Every per-kind asset (`TextureAsset`, `ShaderAsset`, ...) implements it,
/// which is what lets `PackageStore<T>` stay a single generic type instead of
/// a pipeline base class per kind.
pub trait PackageableAsset: dess_common::BinarySerialization + dess_common::BinaryDeserialization {
    /// File extension (without the dot) package files of this kind use on disk.
    fn extension() -> &'static str;
    /// Base name of the cache index file for this kind, e.g. `"textures"` for
    /// `textures.cache`.
    fn cache_name() -> &'static str;
    fn name(&self) -> &AssetName;
    fn id(&self) -> AssetId;
}

macro_rules! impl_packageable {
    ($ty:ty, $ext:literal, $cache:literal) => {
        impl PackageableAsset for $ty {
            fn extension() -> &'static str {
                $ext
            }
            fn cache_name() -> &'static str {
                $cache
            }
            fn name(&self) -> &AssetName {
                &self.name
            }
            fn id(&self) -> AssetId {
                self.id
            }
        }
    };
}

impl_packageable!(TextureAsset, "ste", "textures");
impl_packageable!(ShaderAsset, "ssp", "shaders");
impl_packageable!(MaterialAsset, "sma", "materials");
impl_packageable!(MeshAsset, "sme", "meshes");
impl_packageable!(ModelAsset, "smo", "models");
impl_packageable!(SkeletonAsset, "ssk", "skeletons");
impl_packageable!(AnimationAsset, "san", "animations");
impl_packageable!(ScriptAsset, "ssc", "scripts");
impl_packageable!(AudioAsset, "sau", "audio");
