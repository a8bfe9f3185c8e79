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

//! Mesh Pipeline (§4.5): splits one scene into named sub-models, each
//! producing one `MeshData` with shared vertex streams and a shared index
//! buffer sliced into per-material sub-meshes.

use dess_assets::{MeshAsset, MeshData, PrimitiveType, SubMesh, VertexConfig};
use dess_common::{Aabb, Sphere};
use glam::{Vec2, Vec3};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    package_store::{PackageDefaults, PackageStore},
    scene::{buffer_reader, Scene},
};

impl PackageDefaults for MeshAsset {}

/// Sentinel stored in [`SubMesh::material`] for a primitive using glTF's
/// implicit default material (no explicit `material_index`).
pub const NO_MATERIAL: u64 = u64::MAX;

pub struct SubModel {
    pub name: String,
    pub mesh_node_indices: Vec<usize>,
}

/// A mesh built from one sub-model, plus the bookkeeping the Model Pipeline
/// needs to stitch in real material/skeleton ids once those pipelines run.
pub struct MeshBuild {
    pub name: String,
    pub data: MeshData,
    /// Unique glTF material indices referenced by this sub-model's
    /// sub-meshes, in first-seen order.
    pub material_indices: Vec<usize>,
    /// The glTF skin (if any) feeding this sub-model's skeleton.
    pub skin_index: Option<usize>,
}

/// Strips an `_$Assimp`-style suffix and a trailing file-extension dot from
/// a scene node name, for parity with scenes re-exported through an
/// Assimp-based toolchain upstream of this pipeline.
pub fn sanitize_node_name(name: &str) -> String {
    let stripped = name.split("_$Assimp").next().unwrap_or(name);
    match stripped.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base.to_owned(),
        _ => stripped.to_owned(),
    }
}

fn collect_mesh_nodes(node: &gltf::Node, out: &mut Vec<usize>) {
    if node.mesh().is_some() {
        out.push(node.index());
    }
    for child in node.children() {
        collect_mesh_nodes(&child, out);
    }
}

/// Splits the scene into sub-models per §4.5/§4.7: the whole scene under
/// `single_mesh`, otherwise one sub-model per top-level node that
/// recursively carries mesh data.
pub fn discover_submodels(scene: &Scene, scene_name: &str, single_mesh: bool) -> Vec<SubModel> {
    let Some(graph) = scene.graph() else {
        return Vec::new();
    };
    let top_nodes: Vec<gltf::Node> = graph.nodes().collect();

    if single_mesh {
        let mut indices = Vec::new();
        for node in &top_nodes {
            collect_mesh_nodes(node, &mut indices);
        }
        if indices.is_empty() {
            return Vec::new();
        }
        return vec![SubModel {
            name: scene_name.to_owned(),
            mesh_node_indices: indices,
        }];
    }

    let mut result = Vec::new();
    for node in &top_nodes {
        let mut indices = Vec::new();
        collect_mesh_nodes(node, &mut indices);
        if indices.is_empty() {
            continue;
        }
        let name = node
            .name()
            .map(sanitize_node_name)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        result.push(SubModel {
            name,
            mesh_node_indices: indices,
        });
    }

    if result.is_empty() {
        let mut indices = Vec::new();
        for node in &top_nodes {
            collect_mesh_nodes(node, &mut indices);
        }
        if !indices.is_empty() {
            result.push(SubModel {
                name: scene_name.to_owned(),
                mesh_node_indices: indices,
            });
        }
    }
    result
}

fn node_by_index(scene: &Scene, index: usize) -> gltf::Node {
    scene
        .document
        .nodes()
        .find(|n| n.index() == index)
        .expect("submodel references a node index from its own scene")
}

fn primitive_type(mode: gltf::mesh::Mode) -> Result<PrimitiveType> {
    match mode {
        gltf::mesh::Mode::Points => Ok(PrimitiveType::Points),
        gltf::mesh::Mode::Lines | gltf::mesh::Mode::LineStrip => Ok(PrimitiveType::Lines),
        gltf::mesh::Mode::Triangles => Ok(PrimitiveType::Triangles),
        other => Err(Error::Decode(
            "mesh".to_owned(),
            format!("unsupported primitive mode {other:?} (expected point/line/triangle)"),
        )),
    }
}

/// Builds one `MeshData` for a sub-model, concatenating every mesh node's
/// primitives into shared vertex streams and a shared index buffer.
pub fn build_submodel(scene: &Scene, submodel: &SubModel) -> Result<MeshBuild> {
    let reader_fn = buffer_reader(&scene.buffers);

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut tangents = Vec::new();
    let mut colors = Vec::new();
    let mut uv0 = Vec::new();
    let mut uv1 = Vec::new();
    let mut bone_indices = Vec::new();
    let mut bone_weights = Vec::new();
    let mut indices = Vec::new();
    let mut submeshes = Vec::new();
    let mut material_indices = Vec::new();
    let mut skin_index = None;

    let mut config = VertexConfig::POSITION;

    for &node_index in &submodel.mesh_node_indices {
        let node = node_by_index(scene, node_index);
        if skin_index.is_none() {
            skin_index = node.skin().map(|skin| skin.index());
        }
        let mesh = node.mesh().expect("collect_mesh_nodes only selects mesh-bearing nodes");

        for primitive in mesh.primitives() {
            let prim_type = primitive_type(primitive.mode())?;
            let prim_reader = primitive.reader(reader_fn.clone());

            let prim_positions: Vec<Vec3> = prim_reader
                .read_positions()
                .ok_or_else(|| Error::Decode("mesh".to_owned(), "primitive has no POSITION attribute".to_owned()))?
                .map(Vec3::from)
                .collect();
            let vertex_base = positions.len() as u32;
            let vertex_count = prim_positions.len();
            positions.extend(prim_positions.iter().copied());

            if let Some(it) = prim_reader.read_normals() {
                config |= VertexConfig::NORMAL;
                normals.extend(it.map(Vec3::from));
            }
            normals.resize(positions.len(), Vec3::ZERO);

            if let Some(it) = prim_reader.read_tangents() {
                config |= VertexConfig::TANGENT;
                tangents.extend(it.map(|t| Vec3::new(t[0], t[1], t[2])));
            }
            tangents.resize(positions.len(), Vec3::ZERO);

            if let Some(it) = prim_reader.read_colors(0) {
                config |= VertexConfig::COLOR;
                colors.extend(it.into_rgba_u8());
            }
            colors.resize(positions.len(), [255, 255, 255, 255]);

            if let Some(it) = prim_reader.read_tex_coords(0) {
                config |= VertexConfig::UV0;
                uv0.extend(it.into_f32().map(Vec2::from));
            }
            uv0.resize(positions.len(), Vec2::ZERO);

            if let Some(it) = prim_reader.read_tex_coords(1) {
                config |= VertexConfig::UV1;
                uv1.extend(it.into_f32().map(Vec2::from));
            }
            uv1.resize(positions.len(), Vec2::ZERO);

            if primitive.get(&gltf::Semantic::Joints(1)).is_some() {
                return Err(Error::Decode(
                    "mesh".to_owned(),
                    "vertex carries a second JOINTS_1/WEIGHTS_1 set - more than 4 bone weights per vertex".to_owned(),
                ));
            }
            if let (Some(joints), Some(weights)) = (prim_reader.read_joints(0), prim_reader.read_weights(0)) {
                config |= VertexConfig::BONES;
                bone_indices.extend(joints.into_u16().map(|j| [j[0] as u8, j[1] as u8, j[2] as u8, j[3] as u8]));
                bone_weights.extend(weights.into_f32());
            }
            bone_indices.resize(positions.len(), [0, 0, 0, 0]);
            bone_weights.resize(positions.len(), [0.0, 0.0, 0.0, 0.0]);

            let prim_indices: Vec<u32> = match prim_reader.read_indices() {
                Some(it) => it.into_u32().map(|i| i + vertex_base).collect(),
                None => (vertex_base..vertex_base + vertex_count as u32).collect(),
            };

            let optimized = optimize_index_order(&prim_indices, positions.len());

            let material_index = primitive.material().index();
            let submesh_material = match material_index {
                Some(idx) => {
                    if !material_indices.contains(&idx) {
                        material_indices.push(idx);
                    }
                    idx as u64
                }
                None => NO_MATERIAL,
            };

            let (bounds_aabb, bounds_sphere) = submesh_bounds(&positions, &optimized);

            submeshes.push(SubMesh {
                primitive_type: prim_type,
                first_index: indices.len() as u32,
                index_count: optimized.len() as u32,
                material: submesh_material,
                bounds_aabb,
                bounds_sphere,
            });
            indices.extend(optimized);
        }
    }

    if !config.contains(VertexConfig::TANGENT) && config.contains(VertexConfig::NORMAL) && config.contains(VertexConfig::UV0)
    {
        tangents = generate_tangents(&indices, &positions, &normals, &uv0);
        config |= VertexConfig::TANGENT;
    }

    let mut data = MeshData {
        vertex_config: config,
        positions,
        normals,
        tangents,
        colors,
        uv0,
        uv1,
        bone_indices,
        bone_weights,
        indices,
        submeshes,
        bounds_aabb: None,
        bounds_sphere: None,
    };
    data.recompute_aggregate_bounds();

    Ok(MeshBuild {
        name: submodel.name.clone(),
        data,
        material_indices,
        skin_index,
    })
}

fn submesh_bounds(positions: &[Vec3], submesh_indices: &[u32]) -> (Aabb, Sphere) {
    let points: Vec<Vec3> = submesh_indices.iter().map(|&i| positions[i as usize]).collect();
    let mut min = points[0];
    let mut max = points[0];
    for &p in &points {
        min = min.min(p);
        max = max.max(p);
    }
    (Aabb::from_min_max(min, max), Sphere::ritter_bound(&points))
}

/// Reorders a triangle list for better post-transform vertex-cache hit
/// rate, the "cache-locality optimisation" step the Scene Loader's
/// importer is configured for (§4.5).
fn optimize_index_order(indices: &[u32], vertex_count: usize) -> Vec<u32> {
    meshopt::optimize_vertex_cache(indices, vertex_count)
}

struct MikktAdapter<'a> {
    indices: &'a [u32],
    positions: &'a [Vec3],
    normals: &'a [Vec3],
    uv0: &'a [Vec2],
    accum: Vec<(Vec3, u32)>,
}

impl<'a> mikktspace::Geometry for MikktAdapter<'a> {
    fn num_faces(&self) -> usize {
        self.indices.len() / 3
    }

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> [f32; 3] {
        self.positions[self.indices[face * 3 + vert] as usize].to_array()
    }

    fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
        self.normals[self.indices[face * 3 + vert] as usize].to_array()
    }

    fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
        self.uv0[self.indices[face * 3 + vert] as usize].to_array()
    }

    fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
        let idx = self.indices[face * 3 + vert] as usize;
        let entry = &mut self.accum[idx];
        entry.0 += Vec3::new(tangent[0], tangent[1], tangent[2]);
        entry.1 += 1;
    }
}

/// Generates per-vertex tangents via mikktspace when a primitive supplies
/// normals and a first UV set but no `TANGENT` attribute. Face-corner
/// tangents sharing a vertex index are averaged rather than splitting the
/// vertex, keeping this mesh's shared-vertex-stream layout intact.
fn generate_tangents(indices: &[u32], positions: &[Vec3], normals: &[Vec3], uv0: &[Vec2]) -> Vec<Vec3> {
    let mut adapter = MikktAdapter {
        indices,
        positions,
        normals,
        uv0,
        accum: vec![(Vec3::ZERO, 0); positions.len()],
    };
    mikktspace::generate_tangents(&mut adapter);
    adapter
        .accum
        .into_iter()
        .map(|(sum, count)| if count > 0 { (sum / count as f32).normalize_or_zero() } else { Vec3::X })
        .collect()
}

pub struct MeshPipeline {
    store: PackageStore<MeshAsset>,
}

impl MeshPipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("meshes"));
        store.initialize().ok();
        Self { store }
    }

    pub fn asset_exists(&self, id: dess_assets::AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: dess_assets::AssetId) -> Option<MeshAsset> {
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

    /// Registers an already-built mesh under `asset_origin`/`name`.
    pub fn package(&mut self, asset_origin: &str, name: &str, data: MeshData) -> Result<dess_assets::AssetId> {
        self.store
            .save_asset(asset_origin, name, true, |resolved_name, id| MeshAsset {
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

    #[test]
    fn sanitize_strips_assimp_suffix_and_extension() {
        assert_eq!(sanitize_node_name("Hero_$AssimpFbx$_PreRotation"), "Hero");
        assert_eq!(sanitize_node_name("Hero.001"), "Hero");
        assert_eq!(sanitize_node_name("Hero"), "Hero");
    }

    #[test]
    fn optimize_index_order_preserves_triangle_count() {
        let indices = vec![0u32, 1, 2, 2, 1, 3];
        let optimized = optimize_index_order(&indices, 4);
        assert_eq!(optimized.len(), indices.len());
    }

    #[test]
    fn submesh_bounds_match_point_extents() {
        let positions = vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];
        let (aabb, _sphere) = submesh_bounds(&positions, &[0, 1, 2]);
        assert_eq!(aabb.min(), Vec3::ZERO);
        assert_eq!(aabb.max(), Vec3::new(2.0, 2.0, 0.0));
    }
}
