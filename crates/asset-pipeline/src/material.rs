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

//! Material Pipeline (§4.6): reconciles a glTF material's parameters with
//! the vertex/pixel shaders' combined reflection, and queues its textures
//! through the scene-wide [`crate::model::ModelTextureCache`].

use dess_assets::{
    AssetId, BlendFunction, ConcreteType, MaterialAsset, MaterialData, ResourceKind, SamplerData,
    ShaderAsset, ShaderResource, ShaderStage, UniformBufferData,
};

use crate::{
    error::{Error, Result},
    model::ModelTextureCache,
    package_store::{PackageDefaults, PackageStore},
    scene::Scene,
    shader,
};

impl PackageDefaults for MaterialAsset {}

/// A texture slot a material's merged resource list exposes (`ps_texture_*`),
/// bound to a cache-local index rather than a real `AssetId` - the Model
/// Pipeline only has those once the texture-cache prepass has run.
pub struct TextureSlot {
    pub name: String,
    pub cache_index: Option<usize>,
}

/// A material with its shader-independent parameters resolved, but its
/// texture references still pointing into the shared [`ModelTextureCache`]
/// rather than real `AssetId`s - the Model Pipeline finishes the job once
/// the cache has been packaged.
pub struct PendingMaterial {
    pub name: String,
    pub vertex_shader: AssetId,
    pub pixel_shader: AssetId,
    pub uniform_buffers: Vec<UniformBufferData>,
    pub texture_slots: Vec<TextureSlot>,
    /// Names of the merged `separate_images` resources, in the order the
    /// Model Pipeline must size and fill `MaterialData::separate_images`.
    /// A slot in `texture_slots` binds by matching this name.
    pub separate_image_names: Vec<String>,
    pub separate_samplers: Vec<SamplerData>,
    pub wireframe: bool,
    pub backface_culling: bool,
    pub blend_function: BlendFunction,
}

fn find_member<'a>(buffers: &'a [ShaderResource], name: &str) -> Option<(usize, &'a ShaderResource)> {
    for (index, buffer) in buffers.iter().enumerate() {
        if let Some(member) = buffer.members.iter().find(|m| m.name == name) {
            return Some((index, member));
        }
    }
    None
}

/// Writes `value` into the named member's byte range if it exists and its
/// reflected type agrees - a mismatch or missing name is silently skipped
/// per §4.6's "named uniform writes are safe" rule.
fn write_named_f32(buffers: &[ShaderResource], bytes: &mut [Vec<u8>], name: &str, value: f32) {
    if let Some((index, member)) = find_member(buffers, name) {
        if member.concrete_type == ConcreteType::Float && member.size as usize == 4 {
            let offset = member.offset as usize;
            if let Some(slot) = bytes.get_mut(index) {
                if offset + 4 <= slot.len() {
                    slot[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
}

fn write_named_color(buffers: &[ShaderResource], bytes: &mut [Vec<u8>], name: &str, value: [f32; 4]) {
    if let Some((index, member)) = find_member(buffers, name) {
        let expected_len = match member.concrete_type {
            ConcreteType::Vec4 => 16,
            ConcreteType::Vec3 => 12,
            _ => return,
        };
        if member.size as usize != expected_len {
            return;
        }
        let offset = member.offset as usize;
        let Some(slot) = bytes.get_mut(index) else {
            return;
        };
        if offset + expected_len > slot.len() {
            return;
        }
        for (channel, component) in value.iter().take(expected_len / 4).enumerate() {
            let at = offset + channel * 4;
            slot[at..at + 4].copy_from_slice(&component.to_le_bytes());
        }
    }
}

fn alloc_uniform_buffers(buffers: &[ShaderResource]) -> Vec<Vec<u8>> {
    buffers.iter().map(|b| vec![0u8; b.size as usize]).collect()
}

fn blend_function_for(alpha_mode: gltf::material::AlphaMode, opacity: f32) -> BlendFunction {
    match alpha_mode {
        gltf::material::AlphaMode::Blend => BlendFunction::Default,
        _ if opacity < 1.0 => BlendFunction::Default,
        _ => BlendFunction::None,
    }
}

fn queue_texture(
    scene: &Scene,
    cache: &mut ModelTextureCache,
    slot_name: &str,
    texture: Option<gltf::Texture>,
) -> TextureSlot {
    let cache_index = texture.and_then(|texture| cache.resolve(scene, &texture, slot_name));
    TextureSlot {
        name: slot_name.to_owned(),
        cache_index,
    }
}

/// Builds one [`PendingMaterial`] from a glTF material, per §4.6 steps 3-5.
/// `vertex_shader`/`pixel_shader` must already have been confirmed to carry
/// the matching stage and to be link-compatible by the caller (the Model
/// Pipeline, via [`shader::merge_unique_resources`]).
pub fn build_material(
    scene: &Scene,
    gltf_material: &gltf::Material,
    vertex_shader: &ShaderAsset,
    pixel_shader: &ShaderAsset,
    texture_cache: &mut ModelTextureCache,
) -> Result<PendingMaterial> {
    if vertex_shader.data.stage != ShaderStage::Vertex {
        return Err(Error::ReferentialMissing(vertex_shader.name.as_str().to_owned()));
    }
    if pixel_shader.data.stage != ShaderStage::Pixel {
        return Err(Error::ReferentialMissing(pixel_shader.name.as_str().to_owned()));
    }

    let (uniform_buffers, separate_images, separate_samplers) =
        shader::merge_unique_resources(&[vertex_shader, pixel_shader])
            .map_err(|err| Error::ShaderLinkMismatch(err))?;

    let mut bytes = alloc_uniform_buffers(&uniform_buffers);

    let pbr = gltf_material.pbr_metallic_roughness();
    let base_color = pbr.base_color_factor();
    let opacity = base_color[3];
    let emissive = gltf_material.emissive_factor();

    write_named_f32(&uniform_buffers, &mut bytes, "ps_float_metallic", pbr.metallic_factor());
    write_named_f32(&uniform_buffers, &mut bytes, "ps_float_roughness", pbr.roughness_factor());
    write_named_f32(&uniform_buffers, &mut bytes, "ps_float_opacity", opacity);
    write_named_color(&uniform_buffers, &mut bytes, "ps_color_ambient", [0.0, 0.0, 0.0, 1.0]);
    write_named_color(&uniform_buffers, &mut bytes, "ps_color_diffuse", base_color);
    write_named_color(&uniform_buffers, &mut bytes, "ps_color_specular", [1.0, 1.0, 1.0, 1.0]);
    write_named_color(
        &uniform_buffers,
        &mut bytes,
        "ps_color_emissive",
        [emissive[0], emissive[1], emissive[2], 1.0],
    );

    let name = gltf_material
        .name()
        .map(crate::mesh::sanitize_node_name)
        .unwrap_or_else(|| format!("material_{}", gltf_material.index().unwrap_or(0)));

    let albedo = queue_texture(
        scene,
        texture_cache,
        "ps_texture_albedo",
        pbr.base_color_texture().map(|info| info.texture()),
    );
    let normals = queue_texture(
        scene,
        texture_cache,
        "ps_texture_normals",
        gltf_material.normal_texture().map(|t| t.texture()),
    );
    let metallic = queue_texture(
        scene,
        texture_cache,
        "ps_texture_metallic",
        pbr.metallic_roughness_texture().map(|info| info.texture()),
    );
    // glTF packs metallic (B) and roughness (G) into one texture; bind it to
    // both named slots rather than inventing a split that doesn't exist.
    let roughness = queue_texture(
        scene,
        texture_cache,
        "ps_texture_roughness",
        pbr.metallic_roughness_texture().map(|info| info.texture()),
    );

    let separate_samplers = separate_samplers
        .iter()
        .map(|_| SamplerData {
            filter: dess_assets::FilterMode::Linear,
            max_anisotropy: 1,
            address: dess_assets::AddressMode::Wrap,
        })
        .collect();

    let separate_image_names = separate_images.iter().map(|resource| resource.name.clone()).collect();

    Ok(PendingMaterial {
        name,
        vertex_shader: vertex_shader.id,
        pixel_shader: pixel_shader.id,
        uniform_buffers: bytes.into_iter().map(UniformBufferData).collect(),
        texture_slots: vec![albedo, normals, metallic, roughness],
        separate_image_names,
        separate_samplers,
        wireframe: false,
        backface_culling: !gltf_material.double_sided(),
        blend_function: blend_function_for(gltf_material.alpha_mode(), opacity),
    })
}

pub struct MaterialPipeline {
    store: PackageStore<MaterialAsset>,
}

impl MaterialPipeline {
    pub fn new(ctx: &crate::context::BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("materials"));
        store.initialize().ok();
        Self { store }
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: AssetId) -> Option<MaterialAsset> {
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

    pub fn package(&mut self, asset_origin: &str, name: &str, data: MaterialData) -> Result<AssetId> {
        self.store
            .save_asset(asset_origin, name, true, |resolved_name, id| MaterialAsset {
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
    use dess_assets::{ConcreteType as CT, ResourceKind as RK};

    fn buffer_with_member(name: &str, offset: u32, size: u32, concrete_type: CT) -> ShaderResource {
        ShaderResource {
            name: "PerMaterial".to_owned(),
            kind: RK::UniformBuffer,
            concrete_type: CT::Struct,
            is_array: false,
            array_size: Vec::new(),
            binding: 0,
            desc_set: 0,
            image_dimension: None,
            image_arrayed: false,
            cols: 0,
            vec_size: 0,
            offset: 0,
            size: offset + size,
            members: vec![ShaderResource {
                name: name.to_owned(),
                kind: RK::UniformBuffer,
                concrete_type,
                is_array: false,
                array_size: Vec::new(),
                binding: 0,
                desc_set: 0,
                image_dimension: None,
                image_arrayed: false,
                cols: 0,
                vec_size: 0,
                offset,
                size,
                members: Vec::new(),
            }],
        }
    }

    #[test]
    fn named_float_write_respects_type_match() {
        let buffers = vec![buffer_with_member("ps_float_metallic", 0, 4, CT::Float)];
        let mut bytes = alloc_uniform_buffers(&buffers);
        write_named_f32(&buffers, &mut bytes, "ps_float_metallic", 0.5);
        assert_eq!(f32::from_le_bytes(bytes[0][0..4].try_into().unwrap()), 0.5);
    }

    #[test]
    fn named_float_write_skips_type_mismatch() {
        let buffers = vec![buffer_with_member("ps_float_metallic", 0, 4, CT::Int)];
        let mut bytes = alloc_uniform_buffers(&buffers);
        write_named_f32(&buffers, &mut bytes, "ps_float_metallic", 0.5);
        assert_eq!(bytes[0], vec![0u8; 4]);
    }

    #[test]
    fn missing_name_is_ignored() {
        let buffers = vec![buffer_with_member("ps_float_metallic", 0, 4, CT::Float)];
        let mut bytes = alloc_uniform_buffers(&buffers);
        write_named_f32(&buffers, &mut bytes, "ps_float_unused", 1.0);
        assert_eq!(bytes[0], vec![0u8; 4]);
    }
}
