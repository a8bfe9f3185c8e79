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

//! Shared scene-graph loader for the Mesh/Skeleton/Animation/Material
//! pipelines. Only glTF is implemented - no crate in this dependency stack
//! binds a general-purpose (Assimp-equivalent) importer, so OBJ/FBX are
//! detected but rejected (see `DESIGN.md`).

use std::path::{Path, PathBuf};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFlavor {
    Obj,
    Fbx,
    Gltf,
    Unknown,
}

impl SceneFlavor {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gltf") || ext.eq_ignore_ascii_case("glb") => SceneFlavor::Gltf,
            Some(ext) if ext.eq_ignore_ascii_case("obj") => SceneFlavor::Obj,
            Some(ext) if ext.eq_ignore_ascii_case("fbx") => SceneFlavor::Fbx,
            _ => SceneFlavor::Unknown,
        }
    }
}

pub struct Scene {
    pub flavor: SceneFlavor,
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
    pub images: Vec<gltf::image::Data>,
}

impl Scene {
    /// The scene's default scene-graph, falling back to the first declared
    /// scene if no default is set.
    pub fn graph(&self) -> Option<gltf::Scene> {
        self.document.default_scene().or_else(|| self.document.scenes().next())
    }
}

/// Returns a closure that resolves a glTF buffer view to its backing bytes,
/// for use with `Primitive::reader`/`Skin::reader`/`Channel::reader`.
pub fn buffer_reader(buffers: &[gltf::buffer::Data]) -> impl Fn(gltf::Buffer) -> Option<&[u8]> + Clone + '_ {
    move |buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice())
}

/// Caches the single most-recently-loaded scene, keyed by its resolved
/// absolute path, per §4.5.
#[derive(Default)]
pub struct SceneLoader {
    cached: Option<(PathBuf, Scene)>,
}

impl SceneLoader {
    pub fn new() -> Self {
        Self { cached: None }
    }

    pub fn load(&mut self, ctx: &BuilderContext, relative: &Path) -> Result<&Scene> {
        let abs = ctx
            .filesystem()
            .absolute_source_path(relative)
            .map_err(|err| Error::InputIo(relative.display().to_string(), err))?;

        let needs_reload = match &self.cached {
            Some((cached_path, _)) => cached_path != &abs,
            None => true,
        };

        if needs_reload {
            let scene = Self::import(&abs)?;
            self.cached = Some((abs, scene));
        }

        Ok(&self.cached.as_ref().unwrap().1)
    }

    fn import(abs: &Path) -> Result<Scene> {
        let flavor = SceneFlavor::of(abs);
        if flavor != SceneFlavor::Gltf {
            return Err(Error::Scene(
                abs.display().to_string(),
                "only glTF/GLB scenes are supported by this build (no Assimp-equivalent importer in the dependency stack)"
                    .to_owned(),
            ));
        }
        let (document, buffers, images) =
            gltf::import(abs).map_err(|err| Error::Scene(abs.display().to_string(), err.to_string()))?;
        Ok(Scene {
            flavor,
            document,
            buffers,
            images,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flavor_detected_from_extension() {
        assert_eq!(SceneFlavor::of(Path::new("hero.gltf")), SceneFlavor::Gltf);
        assert_eq!(SceneFlavor::of(Path::new("hero.GLB")), SceneFlavor::Gltf);
        assert_eq!(SceneFlavor::of(Path::new("hero.fbx")), SceneFlavor::Fbx);
        assert_eq!(SceneFlavor::of(Path::new("hero.obj")), SceneFlavor::Obj);
        assert_eq!(SceneFlavor::of(Path::new("hero.xyz")), SceneFlavor::Unknown);
    }

    #[test]
    fn unsupported_flavor_is_rejected_before_any_io() {
        let err = SceneLoader::import(Path::new("/nonexistent/hero.fbx"));
        assert!(matches!(err, Err(Error::Scene(_, _))));
    }
}
