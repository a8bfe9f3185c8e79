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

//! The Package Store, the Scene Loader, the nine per-asset-kind pipelines,
//! and the Command Dispatcher that drives them from one typed `--verb`
//! line at a time. Everything here is threaded through one `BuilderContext`
//! owned by the dispatcher - no pipeline reaches for global state.

pub mod animation;
pub mod audio;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod limits;
pub mod material;
pub mod mesh;
pub mod model;
pub mod package_store;
pub mod reflect;
pub mod scene;
pub mod script;
pub mod shader;
pub mod skeleton;
pub mod texture;

pub use animation::AnimationPipeline;
pub use audio::AudioPipeline;
pub use context::BuilderContext;
pub use dispatcher::{DispatchError, Dispatcher};
pub use error::{Error, Result};
pub use material::MaterialPipeline;
pub use mesh::MeshPipeline;
pub use model::ModelPipeline;
pub use package_store::{PackageDefaults, PackageStore};
pub use scene::SceneLoader;
pub use script::ScriptPipeline;
pub use shader::ShaderPipeline;
pub use skeleton::SkeletonPipeline;
pub use texture::TexturePipeline;
