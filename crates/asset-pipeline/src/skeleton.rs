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

//! Skeleton Pipeline (§4.5): two-pass bone collection per glTF skin.

use std::collections::HashMap;

use dess_assets::{Bone, SkeletonAsset, SkeletonData};
use glam::Mat4;

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    mesh::sanitize_node_name,
    package_store::{PackageDefaults, PackageStore},
    scene::{buffer_reader, Scene},
};

impl PackageDefaults for SkeletonAsset {}

/// Parent node index for every node in the document's default scene graph,
/// built by walking down from the top-level nodes once.
fn build_parent_map(scene: &Scene) -> HashMap<usize, usize> {
    let mut parents = HashMap::new();
    let Some(graph) = scene.graph() else {
        return parents;
    };
    fn visit(node: &gltf::Node, parents: &mut HashMap<usize, usize>) {
        for child in node.children() {
            parents.insert(child.index(), node.index());
            visit(&child, parents);
        }
    }
    for node in graph.nodes() {
        visit(&node, &mut parents);
    }
    parents
}

/// Builds the skeleton for one glTF skin, or `None` if it has no joints.
pub fn build_skeleton(scene: &Scene, skin_index: usize) -> Result<Option<SkeletonData>> {
    let skin = scene
        .document
        .skins()
        .find(|s| s.index() == skin_index)
        .ok_or_else(|| Error::Decode("skeleton".to_owned(), format!("skin index {skin_index} not found")))?;

    let joints: Vec<gltf::Node> = skin.joints().collect();
    if joints.is_empty() {
        return Ok(None);
    }

    let reader = skin.reader(buffer_reader(&scene.buffers));
    let inverse_binds: Vec<Mat4> = match reader.read_inverse_bind_matrices() {
        Some(it) => it.map(Mat4::from_cols_array_2d).collect(),
        None => vec![Mat4::IDENTITY; joints.len()],
    };

    let mut bone_names = HashMap::new();
    let mut bones = Vec::with_capacity(joints.len());
    let mut node_to_bone = HashMap::new();

    for (bone_index, joint) in joints.iter().enumerate() {
        let name = joint
            .name()
            .map(sanitize_node_name)
            .unwrap_or_else(|| format!("joint_{}", joint.index()));
        bone_names.insert(name, bone_index as u32);
        node_to_bone.insert(joint.index(), bone_index as u32);
        bones.push(Bone {
            parent: None,
            local_transform: inverse_binds.get(bone_index).copied().unwrap_or(Mat4::IDENTITY).transpose(),
            children: Vec::new(),
        });
    }

    let parents = build_parent_map(scene);
    for joint in &joints {
        let child_bone = node_to_bone[&joint.index()];
        let mut cursor = joint.index();
        while let Some(&parent_node) = parents.get(&cursor) {
            if let Some(&parent_bone) = node_to_bone.get(&parent_node) {
                bones[parent_bone as usize].children.push(child_bone);
                bones[child_bone as usize].parent = Some(parent_bone);
                break;
            }
            cursor = parent_node;
        }
    }

    Ok(Some(SkeletonData { bone_names, bones }))
}

pub struct SkeletonPipeline {
    store: PackageStore<SkeletonAsset>,
}

impl SkeletonPipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("skeletons"));
        store.initialize().ok();
        Self { store }
    }

    pub fn asset_exists(&self, id: dess_assets::AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: dess_assets::AssetId) -> Option<SkeletonAsset> {
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

    pub fn package(&mut self, asset_origin: &str, name: &str, data: SkeletonData) -> Result<dess_assets::AssetId> {
        self.store
            .save_asset(asset_origin, name, true, |resolved_name, id| SkeletonAsset {
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
    fn empty_parent_map_for_empty_scene() {
        // Exercised indirectly through build_skeleton in integration scenarios;
        // this only guards the helper compiles against an empty map.
        let parents: HashMap<usize, usize> = HashMap::new();
        assert!(parents.get(&0).is_none());
    }
}
