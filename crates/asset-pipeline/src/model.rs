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

//! Model Pipeline (§4.7): the top-level orchestrator. Walks a scene,
//! delegates to the Mesh/Skeleton/Material/Texture pipelines, and stitches
//! their independently-assigned `AssetId`s into one `ModelAsset` per
//! sub-model.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use dess_assets::{AssetId, CompressionType, ModelAsset, ModelData, ShaderAsset, TexelFormat, TextureData, TextureType};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    material::{self, PendingMaterial},
    mesh::{self, MeshBuild, SubModel},
    package_store::{PackageDefaults, PackageStore},
    scene::{Scene, SceneLoader},
    shader::ShaderPipeline,
    skeleton,
    texture::TexturePipeline,
};

impl PackageDefaults for ModelAsset {}

/// One sub-model the Scene Loader's scene splits into, and whether the
/// caller wants it packaged. `GetModelInfo` returns these with `load` preset
/// to `true`; a caller (the CLI today, a tool UI in the source engine) may
/// flip individual entries off before calling `Create`.
#[derive(Debug, Clone)]
pub struct SubModelInfo {
    pub name: String,
    pub load: bool,
}

/// Result of enumerating a scene file without building anything yet.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub file: PathBuf,
    pub submodels: Vec<SubModelInfo>,
}

/// Resolves and enumerates a scene file's sub-models (§4.7 `GetModelInfo`):
/// the whole scene under `single_model`, otherwise one entry per top-level
/// node that recursively carries mesh data.
pub fn get_model_info(
    ctx: &BuilderContext,
    loader: &mut SceneLoader,
    relative: &Path,
    single_model: bool,
) -> Result<ModelInfo> {
    let scene = loader.load(ctx, relative)?;
    let scene_name = scene_stem(relative);
    let submodels = mesh::discover_submodels(scene, &scene_name, single_model)
        .into_iter()
        .map(|s| SubModelInfo { name: s.name, load: true })
        .collect();
    Ok(ModelInfo {
        file: relative.to_owned(),
        submodels,
    })
}

fn scene_stem(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("model").to_owned()
}

/// Intra-scene texture dedup cache (invariant 5): identical source images
/// resolve to one queued entry, keyed by the glTF image index they decode
/// from. Real `AssetId`s aren't assigned until [`package_texture_cache`]
/// runs the Texture Pipeline over every queued entry.
#[derive(Default)]
pub struct ModelTextureCache {
    entries: Vec<QueuedTexture>,
    by_image_index: HashMap<usize, usize>,
}

struct QueuedTexture {
    name: String,
    data: TextureData,
}

impl ModelTextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queues `texture`'s backing image for packaging, returning its
    /// cache-local index. Returns `None` if the image failed to decode or
    /// wasn't loaded by the Scene Loader (e.g. external texture the glTF
    /// importer couldn't resolve).
    pub fn resolve(&mut self, scene: &Scene, texture: &gltf::Texture, slot_hint: &str) -> Option<usize> {
        let image_index = texture.source().index();
        if let Some(&existing) = self.by_image_index.get(&image_index) {
            return Some(existing);
        }
        let image = scene.images.get(image_index)?;
        let data = texture_data_from_gltf_image(image)?;
        let name = texture
            .name()
            .map(mesh::sanitize_node_name)
            .unwrap_or_else(|| format!("{slot_hint}_{image_index}"));
        let index = self.entries.len();
        self.entries.push(QueuedTexture { name, data });
        self.by_image_index.insert(image_index, index);
        Some(index)
    }
}

/// Converts one glTF-decoded image into the pipeline's RGBA8 texture
/// representation, flipping to bottom-origin for parity with the Texture
/// Pipeline's raster decode path (§4.3).
fn texture_data_from_gltf_image(image: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;

    let (width, height) = (image.width, image.height);
    let rgba: Vec<u8> = match image.format {
        Format::R8 => image.pixels.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        Format::R8G8 => image.pixels.chunks_exact(2).flat_map(|p| [p[0], p[1], 0, 255]).collect(),
        Format::R8G8B8 => image.pixels.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::B8G8R8 => image.pixels.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0], 255]).collect(),
        Format::B8G8R8A8 => image
            .pixels
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect(),
        _ => return None,
    };

    let mut flipped = vec![0u8; rgba.len()];
    let stride = width as usize * 4;
    for row in 0..height as usize {
        let src = row * stride;
        let dst = (height as usize - 1 - row) * stride;
        flipped[dst..dst + stride].copy_from_slice(&rgba[src..src + stride]);
    }

    Some(TextureData {
        width,
        height,
        depth: 1,
        texture_type: TextureType::Tex2D,
        format: TexelFormat::Rgba8,
        compression: CompressionType::None,
        mips: vec![flipped],
    })
}

/// One sub-model built in memory but not yet packaged: a mesh, its optional
/// skeleton, and the materials its submeshes reference (keyed by the
/// scene-local glTF material index the Mesh Pipeline recorded).
pub struct ModelBuild {
    pub name: String,
    pub mesh: dess_assets::MeshData,
    pub skeleton: Option<dess_assets::SkeletonData>,
    pub materials: Vec<(usize, PendingMaterial)>,
}

/// Builds every enabled sub-model in `info` (§4.7 `Create`). `relative`
/// must be the same file `info` was produced from - a mismatch is a caller
/// bug, not a recoverable per-asset error, since `ModelInfo` is only ever
/// meant to be round-tripped back into the pipeline that produced it.
pub fn create(
    scene: &Scene,
    relative: &Path,
    single_model: bool,
    info: &ModelInfo,
    vertex_shader: &ShaderAsset,
    pixel_shader: &ShaderAsset,
    texture_cache: &mut ModelTextureCache,
) -> Result<Vec<ModelBuild>> {
    if info.file != relative {
        return Err(Error::InvalidCommand(format!(
            "ModelInfo for {:?} does not match requested path {relative:?}",
            info.file
        )));
    }
    let scene_name = scene_stem(relative);
    let submodels = mesh::discover_submodels(scene, &scene_name, single_model);
    let mut out = Vec::with_capacity(submodels.len());
    for submodel in submodels {
        let enabled = info
            .submodels
            .iter()
            .find(|s| s.name == submodel.name)
            .map(|s| s.load)
            .unwrap_or(true);
        if !enabled {
            continue;
        }
        out.push(build_one(scene, &submodel, vertex_shader, pixel_shader, texture_cache)?);
    }
    Ok(out)
}

fn build_one(
    scene: &Scene,
    submodel: &SubModel,
    vertex_shader: &ShaderAsset,
    pixel_shader: &ShaderAsset,
    texture_cache: &mut ModelTextureCache,
) -> Result<ModelBuild> {
    let MeshBuild {
        name,
        data: mesh_data,
        material_indices,
        skin_index,
    } = mesh::build_submodel(scene, submodel)?;

    let skeleton = match skin_index {
        Some(skin) => skeleton::build_skeleton(scene, skin)?,
        None => None,
    };

    let mut materials = Vec::with_capacity(material_indices.len());
    for mat_index in material_indices {
        let gltf_material = scene
            .document
            .materials()
            .find(|m| m.index() == Some(mat_index))
            .ok_or_else(|| Error::Decode(name.clone(), format!("material index {mat_index} not found in scene")))?;
        let pending = material::build_material(scene, &gltf_material, vertex_shader, pixel_shader, texture_cache)?;
        materials.push((mat_index, pending));
    }

    Ok(ModelBuild {
        name,
        mesh: mesh_data,
        skeleton,
        materials,
    })
}

/// Resolves a `PendingMaterial`'s named texture slots against the merged
/// `separate_images` resource list, producing the `separate_images` array
/// the persisted `MaterialData` stores. Slots with no queued texture, or
/// whose name doesn't appear in the shaders' reflected resource list, get
/// the `0` (absent) sentinel - same convention as `geometry_shader == 0`.
fn resolve_separate_images(pending: &PendingMaterial, texture_ids: &HashMap<usize, AssetId>) -> Vec<AssetId> {
    pending
        .separate_image_names
        .iter()
        .map(|resource_name| {
            pending
                .texture_slots
                .iter()
                .find(|slot| &slot.name == resource_name)
                .and_then(|slot| slot.cache_index)
                .and_then(|cache_index| texture_ids.get(&cache_index))
                .copied()
                .unwrap_or(0)
        })
        .collect()
}

/// Packages one built model, in the order §4.7 requires: mesh, then its
/// skeleton, then the scene's texture cache (so materials can cite real
/// ids), then materials, then finally the model record that stitches every
/// id together. Referential integrity (invariant 3) falls out of this
/// ordering - nothing is written before the ids it cites exist.
#[allow(clippy::too_many_arguments)]
pub fn package_model(
    asset_origin: &str,
    build: ModelBuild,
    texture_cache: &ModelTextureCache,
    mesh_pipe: &mut crate::mesh::MeshPipeline,
    skeleton_pipe: &mut crate::skeleton::SkeletonPipeline,
    material_pipe: &mut crate::material::MaterialPipeline,
    texture_pipe: &mut TexturePipeline,
    model_store: &mut PackageStore<ModelAsset>,
) -> Result<AssetId> {
    let mesh_id = mesh_pipe.package(asset_origin, &build.name, build.mesh)?;

    let mut skeletons = Vec::new();
    if let Some(skeleton_data) = build.skeleton {
        let skeleton_name = format!("{}_skeleton", build.name);
        skeletons.push(skeleton_pipe.package(asset_origin, &skeleton_name, skeleton_data)?);
    }

    let mut texture_ids = HashMap::with_capacity(texture_cache.len());
    for (index, entry) in texture_cache.entries.iter().enumerate() {
        let id = texture_pipe.package(asset_origin, &entry.name, entry.data.clone())?;
        texture_ids.insert(index, id);
    }

    let mut materials = Vec::with_capacity(build.materials.len());
    for (_, pending) in build.materials {
        let separate_images = resolve_separate_images(&pending, &texture_ids);
        let data = dess_assets::MaterialData {
            vertex_shader: pending.vertex_shader,
            geometry_shader: 0,
            pixel_shader: pending.pixel_shader,
            uniform_buffers: pending.uniform_buffers,
            separate_images,
            separate_samplers: pending.separate_samplers,
            wireframe: pending.wireframe,
            backface_culling: pending.backface_culling,
            blend_function: pending.blend_function,
        };
        materials.push(material_pipe.package(asset_origin, &pending.name, data)?);
    }

    model_store
        .save_asset(asset_origin, &build.name, true, |resolved_name, id| ModelAsset {
            name: resolved_name,
            id,
            data: ModelData {
                mesh: mesh_id,
                skeletons,
                materials,
            },
        })
        .ok_or_else(|| Error::Collision(build.name.clone()))
}

/// Top-level pipeline object the dispatcher drives for `--convert_models`:
/// owns the model cache/store and the texture-cache prepass's bookkeeping,
/// and composes the Mesh/Skeleton/Material/Texture pipelines it's handed.
pub struct ModelPipeline {
    store: PackageStore<ModelAsset>,
}

impl ModelPipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("models"));
        store.initialize().ok();
        Self { store }
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: AssetId) -> Option<ModelAsset> {
        self.store.load_asset(id)
    }

    pub fn refresh_cache(&mut self) {
        self.store.refresh_cache();
    }

    pub fn set_output_location(&mut self, output_root: impl Into<PathBuf>) -> std::io::Result<()> {
        self.store.set_output_location(output_root)
    }

    pub fn clear_output(&mut self) -> std::io::Result<()> {
        self.store.clear()?;
        self.store.initialize()
    }

    /// One-shot end-to-end conversion of a single scene file: resolves the
    /// named shader pair (falling back to the built-in defaults, per §4.6
    /// step 1), enumerates and builds every sub-model, then packages each in
    /// turn. Errors packaging one sub-model do not stop the others (§7's
    /// batch policy) - the first build-time error (a missing scene, a bad
    /// shader pair) does abort the whole file, since nothing downstream can
    /// proceed without it.
    #[allow(clippy::too_many_arguments)]
    pub fn convert(
        &mut self,
        ctx: &BuilderContext,
        loader: &mut SceneLoader,
        relative: &Path,
        single_model: bool,
        vertex_shader_name: &str,
        pixel_shader_name: &str,
        shader_pipe: &ShaderPipeline,
        mesh_pipe: &mut crate::mesh::MeshPipeline,
        skeleton_pipe: &mut crate::skeleton::SkeletonPipeline,
        material_pipe: &mut crate::material::MaterialPipeline,
        texture_pipe: &mut TexturePipeline,
    ) -> Result<Vec<AssetId>> {
        let vertex_shader = load_shader_or_default(
            shader_pipe,
            vertex_shader_name,
            crate::shader::DEFAULT_VERTEX_SHADER_NAME,
        )?;
        let pixel_shader = load_shader_or_default(
            shader_pipe,
            pixel_shader_name,
            crate::shader::DEFAULT_PIXEL_SHADER_NAME,
        )?;

        let info = get_model_info(ctx, loader, relative, single_model)?;
        let scene = loader.load(ctx, relative)?;
        let mut texture_cache = ModelTextureCache::new();
        let builds = create(scene, relative, single_model, &info, &vertex_shader, &pixel_shader, &mut texture_cache)?;

        let origin = relative.display().to_string();
        let mut model_ids = Vec::with_capacity(builds.len());
        for build in builds {
            let id = package_model(
                &origin,
                build,
                &texture_cache,
                mesh_pipe,
                skeleton_pipe,
                material_pipe,
                texture_pipe,
                &mut self.store,
            )?;
            model_ids.push(id);
        }
        Ok(model_ids)
    }
}

fn load_shader_or_default(shader_pipe: &ShaderPipeline, name: &str, default_name: &str) -> Result<ShaderAsset> {
    if let Some(shader) = shader_pipe.load_asset_by_name(name) {
        return Ok(shader);
    }
    shader_pipe
        .load_asset_by_name(default_name)
        .ok_or_else(|| Error::ReferentialMissing(name.to_owned()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_pending(name: &str, cache_index: Option<usize>) -> PendingMaterial {
        PendingMaterial {
            name: name.to_owned(),
            vertex_shader: 1,
            pixel_shader: 2,
            uniform_buffers: Vec::new(),
            texture_slots: vec![material::TextureSlot {
                name: "ps_texture_albedo".to_owned(),
                cache_index,
            }],
            separate_image_names: vec!["ps_texture_albedo".to_owned()],
            separate_samplers: Vec::new(),
            wireframe: false,
            backface_culling: true,
            blend_function: dess_assets::BlendFunction::None,
        }
    }

    #[test]
    fn resolved_texture_id_fills_matching_slot() {
        let pending = sample_pending("mat", Some(0));
        let mut ids = HashMap::new();
        ids.insert(0, 77u64);
        let resolved = resolve_separate_images(&pending, &ids);
        assert_eq!(resolved, vec![77]);
    }

    #[test]
    fn unresolved_slot_defaults_to_zero() {
        let pending = sample_pending("mat", None);
        let resolved = resolve_separate_images(&pending, &HashMap::new());
        assert_eq!(resolved, vec![0]);
    }

    #[test]
    fn submodel_info_defaults_to_enabled() {
        let info = ModelInfo {
            file: PathBuf::from("hero.gltf"),
            submodels: vec![SubModelInfo {
                name: "hero".to_owned(),
                load: true,
            }],
        };
        assert!(info.submodels[0].load);
    }
}
