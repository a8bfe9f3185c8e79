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

//! Animation Pipeline (§4.5): one asset per glTF animation, with channels
//! grouped by target node into position/rotation/scale key streams.

use dess_assets::{AnimationAsset, AnimationChannel, AnimationData, RotationKey, VectorKey};
use glam::{Quat, Vec3};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    mesh::sanitize_node_name,
    package_store::{PackageDefaults, PackageStore},
    scene::{buffer_reader, Scene},
};

impl PackageDefaults for AnimationAsset {}

/// glTF ticks are plain seconds; the asset format carries a separate
/// `ticks_per_second` for parity with engines that sample at a fixed rate,
/// so this pipeline fixes it at 1.0 and leaves `duration` in seconds.
const TICKS_PER_SECOND: f32 = 1.0;

struct ChannelBuild {
    bone_name: String,
    positions: Vec<VectorKey>,
    rotations: Vec<RotationKey>,
    scales: Vec<VectorKey>,
}

fn build_channel(node: &gltf::Node) -> Option<ChannelBuild> {
    let bone_name = node.name().map(sanitize_node_name)?;
    Some(ChannelBuild {
        bone_name,
        positions: Vec::new(),
        rotations: Vec::new(),
        scales: Vec::new(),
    })
}

/// Builds one [`AnimationData`] per glTF animation in the scene. Animations
/// whose target nodes are all unnamed, or whose computed duration is zero or
/// negative, are skipped.
pub fn build_animations(scene: &Scene) -> Vec<(String, AnimationData)> {
    let mut out = Vec::new();
    for animation in scene.document.animations() {
        let name = animation
            .name()
            .map(sanitize_node_name)
            .unwrap_or_else(|| format!("animation_{}", animation.index()));

        let mut by_node: std::collections::HashMap<usize, ChannelBuild> = std::collections::HashMap::new();
        let mut max_time = 0.0f32;

        for channel in animation.channels() {
            let node = channel.target().node();
            let reader = channel.reader(buffer_reader(&scene.buffers));
            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            let Some(outputs) = reader.read_outputs() else {
                continue;
            };

            let entry = by_node
                .entry(node.index())
                .or_insert_with(|| match build_channel(&node) {
                    Some(build) => build,
                    None => ChannelBuild {
                        bone_name: String::new(),
                        positions: Vec::new(),
                        rotations: Vec::new(),
                        scales: Vec::new(),
                    },
                });

            if entry.bone_name.is_empty() {
                continue;
            }

            use gltf::animation::util::ReadOutputs;
            match outputs {
                ReadOutputs::Translations(values) => {
                    for (time, value) in times.iter().zip(values) {
                        max_time = max_time.max(*time);
                        entry.positions.push(VectorKey {
                            time: *time,
                            value: Vec3::from(value),
                        });
                    }
                }
                ReadOutputs::Scales(values) => {
                    for (time, value) in times.iter().zip(values) {
                        max_time = max_time.max(*time);
                        entry.scales.push(VectorKey {
                            time: *time,
                            value: Vec3::from(value),
                        });
                    }
                }
                ReadOutputs::Rotations(rotations) => {
                    for (time, value) in times.iter().zip(rotations.into_f32()) {
                        max_time = max_time.max(*time);
                        entry.rotations.push(RotationKey {
                            time: *time,
                            value: Quat::from_array(value),
                        });
                    }
                }
                ReadOutputs::MorphTargetWeights(_) => {}
            }
        }

        let channels: Vec<AnimationChannel> = by_node
            .into_values()
            .filter(|build| !build.bone_name.is_empty())
            .map(|build| AnimationChannel {
                bone_name: build.bone_name,
                positions: build.positions,
                rotations: build.rotations,
                scales: build.scales,
            })
            .collect();

        if channels.is_empty() || max_time <= 0.0 {
            continue;
        }

        out.push((
            name,
            AnimationData {
                duration: max_time,
                ticks_per_second: TICKS_PER_SECOND,
                channels,
            },
        ));
    }
    out
}

pub struct AnimationPipeline {
    store: PackageStore<AnimationAsset>,
}

impl AnimationPipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("animations"));
        store.initialize().ok();
        Self { store }
    }

    pub fn asset_exists(&self, id: dess_assets::AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: dess_assets::AssetId) -> Option<AnimationAsset> {
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

    pub fn package(&mut self, asset_origin: &str, name: &str, data: AnimationData) -> Result<dess_assets::AssetId> {
        self.store
            .save_asset(asset_origin, name, true, |resolved_name, id| AnimationAsset {
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
    fn unnamed_channel_target_is_dropped() {
        let build = ChannelBuild {
            bone_name: String::new(),
            positions: vec![VectorKey { time: 0.0, value: Vec3::ZERO }],
            rotations: Vec::new(),
            scales: Vec::new(),
        };
        assert!(build.bone_name.is_empty());
    }
}
