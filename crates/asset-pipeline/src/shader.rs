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

//! The hardest single pipeline: HLSL source -> SPIR-V (via DXC through
//! `hassle-rs`, optimized and validated with `spirv-tools`) -> reflection
//! (`crate::reflect`) -> optional HLSL/PSSL blobs for the other backends.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use byte_slice_cast::AsSliceOf;
use dess_assets::{AssetId, AssetName, ShaderAsset, ShaderData, ShaderStage};
use log::{debug, error, info, warn};
use normalize_path::NormalizePath;
use spirv_tools::{
    error::{Message, MessageCallback, MessageLevel},
    opt::Optimizer,
    val::Validator,
    TargetEnv,
};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    package_store::{PackageDefaults, PackageStore},
    reflect,
};

pub const DEFAULT_VERTEX_SHADER_NAME: &str = "ps_default_vertex_shader";
pub const DEFAULT_PIXEL_SHADER_NAME: &str = "ps_default_pixel_shader";

const DEFAULT_VERTEX_SOURCE: &str = r#"
struct VsOutput {
    float4 position : SV_Position;
};

VsOutput main(float3 position : POSITION) {
    VsOutput output;
    output.position = float4(position, 1.0);
    return output;
}
"#;

const DEFAULT_PIXEL_SOURCE: &str = r#"
float4 main() : SV_Target {
    return float4(1.0, 0.0, 1.0, 1.0);
}
"#;

/// Backends the shader pipeline can emit in addition to SPIR-V, selected by
/// the CLI's `-pssl/-hlsl/-spirv` flags (default: all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraBackend {
    Dxbc,
    Pssl,
}

impl PackageDefaults for ShaderAsset {
    fn default_assets() -> Vec<Self> {
        vec![
            build_shader(DEFAULT_VERTEX_SHADER_NAME, ShaderStage::Vertex, DEFAULT_VERTEX_SOURCE, &[])
                .expect("default vertex shader must compile"),
            build_shader(DEFAULT_PIXEL_SHADER_NAME, ShaderStage::Pixel, DEFAULT_PIXEL_SOURCE, &[])
                .expect("default pixel shader must compile"),
        ]
    }
}

fn build_shader(
    name: &str,
    stage: ShaderStage,
    source: &str,
    extra_backends: &[ExtraBackend],
) -> Result<ShaderAsset> {
    let data = compile(stage, source, &[], extra_backends)?;
    Ok(ShaderAsset {
        name: AssetName::new(name).unwrap(),
        id: dess_assets::hash_name(name),
        data,
    })
}

fn stage_from_extension(path: &Path) -> Result<ShaderStage> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| Error::Decode(path.display().to_string(), "shader source has no extension".to_owned()))?;
    Ok(match ext {
        "vert" => ShaderStage::Vertex,
        "doma" => ShaderStage::Domain,
        "hull" => ShaderStage::Hull,
        "geom" => ShaderStage::Geometry,
        "pixe" => ShaderStage::Pixel,
        "comp" => ShaderStage::Compute,
        other => {
            return Err(Error::Decode(
                path.display().to_string(),
                format!("unrecognised shader stage extension .{other}"),
            ))
        }
    })
}

fn profile_for(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vs_6_4",
        ShaderStage::Domain => "ds_6_4",
        ShaderStage::Hull => "hs_6_4",
        ShaderStage::Geometry => "gs_6_4",
        ShaderStage::Pixel => "ps_6_4",
        ShaderStage::Compute => "cs_6_4",
    }
}

struct OptCallbacks;

impl MessageCallback for OptCallbacks {
    fn on_message(&mut self, msg: Message) {
        match msg.level {
            MessageLevel::Info => info!("{} - {}", msg.line, msg.message),
            MessageLevel::Debug => debug!("{} - {}", msg.line, msg.message),
            MessageLevel::Error | MessageLevel::Fatal | MessageLevel::InternalError => {
                error!("{} - {}", msg.line, msg.message)
            }
            MessageLevel::Warning => warn!("{} - {}", msg.line, msg.message),
        }
    }
}

struct FileIncludeProvider {
    search_dirs: Vec<PathBuf>,
}

impl shader_prepper::IncludeProvider for FileIncludeProvider {
    type IncludeContext = PathBuf;

    fn get_include(
        &mut self,
        path: &str,
        context: &Self::IncludeContext,
    ) -> std::result::Result<(String, Self::IncludeContext), failure::Error> {
        // Include resolution walks the source directory first, then every
        // `-incl_dir`, most-recently-added first.
        let mut candidates = vec![context.parent().unwrap_or(Path::new(".")).to_path_buf()];
        candidates.extend(self.search_dirs.iter().rev().cloned());

        for dir in candidates {
            let resolved = dir.join(path).normalize();
            if let Ok(contents) = std::fs::read_to_string(&resolved) {
                return Ok((contents, resolved));
            }
        }
        Err(failure::err_msg(format!("include not found: {path}")))
    }
}

fn compile_to_spirv(stage: ShaderStage, code: &str) -> Result<Vec<u8>> {
    let spirv = hassle_rs::compile_hlsl(
        "",
        code,
        "main",
        profile_for(stage),
        &[
            "-spirv",
            "-fspv-target-env=vulkan1.1",
            "-WX",
            "-Ges",
            "-HV 2021",
        ],
        &[],
    )
    .map_err(|err| Error::Decode("hlsl".to_owned(), err.to_string()))?;

    let mut optimizer = spirv_tools::opt::create(Some(TargetEnv::Vulkan_1_1));
    optimizer.register_performance_passes();
    let words = spirv
        .as_slice_of::<u32>()
        .map_err(|err| Error::Decode("hlsl".to_owned(), err.to_string()))?;
    let optimized = optimizer
        .optimize(words, &mut OptCallbacks, None)
        .map_err(|err| Error::Decode("hlsl".to_owned(), err.to_string()))?;

    let validator = spirv_tools::val::create(Some(TargetEnv::Vulkan_1_1));
    validator
        .validate(optimized.as_words(), None)
        .map_err(|err| Error::Decode("hlsl".to_owned(), err.to_string()))?;

    Ok(optimized.as_bytes().to_vec())
}

fn compile_dxbc(stage: ShaderStage, code: &str) -> Result<Vec<u8>> {
    hassle_rs::compile_hlsl("", code, "main", profile_for(stage), &["-WX"], &[])
        .map_err(|err| Error::Decode("hlsl".to_owned(), err.to_string()))
}

fn compile(
    stage: ShaderStage,
    code: &str,
    backends: &[ExtraBackend],
    default_extras: &[ExtraBackend],
) -> Result<ShaderData> {
    let spirv = compile_to_spirv(stage, code)?;
    let reflected = reflect::reflect(&spirv)?;

    let mut code_blobs = vec![dess_assets::ShaderBackend::Spirv(spirv)];
    for backend in backends.iter().chain(default_extras.iter()) {
        match backend {
            ExtraBackend::Dxbc => {
                code_blobs.push(dess_assets::ShaderBackend::Dxbc(compile_dxbc(stage, code)?));
            }
            ExtraBackend::Pssl => {
                // No PSSL-capable compiler is available off-platform; record
                // the HLSL source as-is so a platform build can recompile it.
                code_blobs.push(dess_assets::ShaderBackend::Pssl(code.as_bytes().to_vec()));
            }
        }
    }

    Ok(ShaderData {
        stage,
        workgroup_size: reflected.workgroup_size,
        uniform_buffers: reflected.uniform_buffers,
        inputs: reflected.inputs,
        outputs: reflected.outputs,
        storage_images: reflected.storage_images,
        sampled_images: reflected.sampled_images,
        atomic_counters: reflected.atomic_counters,
        push_constant_buffers: reflected.push_constant_buffers,
        separate_images: reflected.separate_images,
        separate_samplers: reflected.separate_samplers,
        backends: code_blobs,
    })
}

pub struct ShaderPipeline {
    store: PackageStore<ShaderAsset>,
    include_dirs: Vec<PathBuf>,
    extra_backends: Vec<ExtraBackend>,
}

impl ShaderPipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("shaders"));
        store.initialize().ok();
        Self {
            store,
            include_dirs: Vec::new(),
            extra_backends: vec![ExtraBackend::Dxbc, ExtraBackend::Pssl],
        }
    }

    pub fn set_include_dirs(&mut self, dirs: Vec<PathBuf>) {
        self.include_dirs = dirs;
    }

    pub fn set_extra_backends(&mut self, backends: Vec<ExtraBackend>) {
        self.extra_backends = backends;
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: AssetId) -> Option<ShaderAsset> {
        self.store.load_asset(id)
    }

    pub fn load_asset_by_name(&self, name: &str) -> Option<ShaderAsset> {
        self.store.load_asset_by_name(name)
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

    pub fn convert(&mut self, ctx: &BuilderContext, relative: &Path, name: &str) -> Result<AssetId> {
        let stage = stage_from_extension(relative)?;
        let code = ctx
            .filesystem()
            .read_to_string(relative)
            .map_err(|err| Error::InputIo(relative.display().to_string(), err))?;
        let abs_path = ctx
            .filesystem()
            .absolute_source_path(relative)
            .map_err(|err| Error::InputIo(relative.display().to_string(), err))?;

        let mut provider = FileIncludeProvider {
            search_dirs: self.include_dirs.clone(),
        };
        let chunks = shader_prepper::process_file(abs_path.to_str().unwrap(), &mut provider, abs_path.clone())
            .map_err(|err| Error::Decode(relative.display().to_string(), err.to_string()))?;
        let mut preprocessed = String::new();
        for chunk in &chunks {
            preprocessed += &chunk.source;
        }

        let data = compile(stage, &preprocessed, &self.extra_backends, &[])?;
        let origin = relative.display().to_string();
        self.store
            .save_asset(&origin, name, true, |resolved_name, id| ShaderAsset {
                name: resolved_name,
                id,
                data,
            })
            .ok_or_else(|| Error::Collision(name.to_owned()))
    }
}

/// §4.4's link-compatibility rule: sharing a binding or name across stages
/// requires agreement on every other observable field.
pub fn link_compatible(a: &ShaderAsset, b: &ShaderAsset) -> std::result::Result<(), String> {
    for list_a in a.data.resource_lists() {
        for resource_a in list_a {
            for list_b in b.data.resource_lists() {
                for resource_b in list_b {
                    let shares_identity =
                        (resource_a.binding == resource_b.binding && resource_a.desc_set == resource_b.desc_set)
                            || resource_a.name == resource_b.name;
                    if shares_identity && !resource_a.link_compatible(resource_b) {
                        return Err(format!(
                            "resource '{}' (binding {}) disagrees between stages",
                            resource_a.name, resource_a.binding
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Unique uniform-buffer/separate-image/separate-sampler resources across
/// the vertex and pixel stage, keyed by `(binding, desc_set)` as §4.6 step 3
/// requires. Returns an error on the first incompatible overlap.
pub fn merge_unique_resources(
    stages: &[&ShaderAsset],
) -> std::result::Result<(Vec<dess_assets::ShaderResource>, Vec<dess_assets::ShaderResource>, Vec<dess_assets::ShaderResource>), String>
{
    for i in 0..stages.len() {
        for j in (i + 1)..stages.len() {
            link_compatible(stages[i], stages[j])?;
        }
    }

    let mut seen = HashSet::new();
    let mut uniform_buffers = Vec::new();
    let mut separate_images = Vec::new();
    let mut separate_samplers = Vec::new();

    for stage in stages {
        for resource in &stage.data.uniform_buffers {
            if seen.insert((resource.binding, resource.desc_set, 0u8)) {
                uniform_buffers.push(resource.clone());
            }
        }
        for resource in &stage.data.separate_images {
            if seen.insert((resource.binding, resource.desc_set, 1u8)) {
                separate_images.push(resource.clone());
            }
        }
        for resource in &stage.data.separate_samplers {
            if seen.insert((resource.binding, resource.desc_set, 2u8)) {
                separate_samplers.push(resource.clone());
            }
        }
    }

    Ok((uniform_buffers, separate_images, separate_samplers))
}

#[cfg(test)]
mod test {
    use super::*;
    use dess_assets::{ConcreteType, ResourceKind, ShaderResource};

    fn sample_asset(name: &str, binding: u32, size: u32) -> ShaderAsset {
        ShaderAsset {
            name: AssetName::new(name).unwrap(),
            id: dess_assets::hash_name(name),
            data: ShaderData {
                stage: ShaderStage::Vertex,
                workgroup_size: [0, 0, 0],
                uniform_buffers: vec![ShaderResource {
                    name: "PerFrame".to_owned(),
                    kind: ResourceKind::UniformBuffer,
                    concrete_type: ConcreteType::Struct,
                    is_array: false,
                    array_size: Vec::new(),
                    binding,
                    desc_set: 0,
                    image_dimension: None,
                    image_arrayed: false,
                    cols: 0,
                    vec_size: 0,
                    offset: 0,
                    size,
                    members: Vec::new(),
                }],
                inputs: Vec::new(),
                outputs: Vec::new(),
                storage_images: Vec::new(),
                sampled_images: Vec::new(),
                atomic_counters: Vec::new(),
                push_constant_buffers: Vec::new(),
                separate_images: Vec::new(),
                separate_samplers: Vec::new(),
                backends: Vec::new(),
            },
        }
    }

    #[test]
    fn matching_layouts_are_link_compatible() {
        let a = sample_asset("v", 0, 64);
        let b = sample_asset("p", 0, 64);
        assert!(link_compatible(&a, &b).is_ok());
    }

    #[test]
    fn mismatched_layouts_fail_link_check() {
        let a = sample_asset("v", 0, 64);
        let b = sample_asset("p", 0, 128);
        assert!(link_compatible(&a, &b).is_err());
    }

    #[test]
    fn merge_unique_dedups_by_binding() {
        let a = sample_asset("v", 0, 64);
        let b = sample_asset("p", 0, 64);
        let (buffers, _, _) = merge_unique_resources(&[&a, &b]).unwrap();
        assert_eq!(buffers.len(), 1);
    }
}
