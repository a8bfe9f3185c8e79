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

//! Command Dispatcher (§4.8): parses one `--verb -flag value -flag value`
//! line at a time and routes it to the nine pipelines it owns. The terminal
//! front-end (`dess-builder`) is a thin loop feeding this one line at a time -
//! all the actual behaviour lives here.

use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::{
    animation::{self, AnimationPipeline},
    audio::AudioPipeline,
    context::BuilderContext,
    material::MaterialPipeline,
    mesh::MeshPipeline,
    model::ModelPipeline,
    scene::SceneLoader,
    script::ScriptPipeline,
    shader::{ExtraBackend, ShaderPipeline},
    skeleton::{self, SkeletonPipeline},
    texture::TexturePipeline,
};

/// A single named flag a command accepts, per §4.8.
#[derive(Debug, Clone)]
pub struct Flag {
    pub key: &'static str,
    pub has_argument: bool,
    pub allow_multiple: bool,
    pub optional: bool,
}

impl Flag {
    pub const fn new(key: &'static str, has_argument: bool, allow_multiple: bool, optional: bool) -> Self {
        Self {
            key,
            has_argument,
            allow_multiple,
            optional,
        }
    }
}

/// One parsed command line: the verb plus every flag occurrence in the order
/// it was written. A flag with `has_argument == false` (`-r`, `-single`)
/// carries an empty argument list but still counts as present.
#[derive(Debug, Default)]
pub struct ParsedInput {
    values: Vec<(String, Option<String>)>,
}

impl ParsedInput {
    pub fn is_present(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| k == key)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn all(&self, key: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(k, _)| k == key)
            .filter_map(|(_, v)| v.as_deref())
            .collect()
    }
}

/// Errors the dispatcher's parse/dispatch step can raise. Distinct from
/// [`crate::Error`] - these are about the command line itself, not about
/// converting an asset.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("could not parse command line")]
    InvalidSyntax,
    #[error("flag -{0} does not belong to this command")]
    InvalidFlag(String),
    #[error("missing required flag -{0}")]
    MissingFlag(String),
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("exit requested")]
    ExitCommand,
    /// Not really an error - the sentinel the dispatcher's `run` returns on
    /// a line it completed successfully.
    #[error("ok")]
    NoError,
}

/// Splits `input` into its verb and flag soup, dropping unknown flags
/// silently and validating `has_argument`/`allow_multiple`/`optional` against
/// `valid_flags`. Mirrors the scan-for-`-`, read-key-until-whitespace,
/// read-argument-until-next-`-` state machine of §4.8.
fn parse(input: &str, valid_flags: &[Flag]) -> Result<(String, ParsedInput), DispatchError> {
    let trimmed = input.trim();
    let verb_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let verb = trimmed[..verb_end].trim_start_matches('-').to_owned();
    if verb.is_empty() {
        return Err(DispatchError::InvalidSyntax);
    }
    let rest = trimmed[verb_end..].trim_start();

    let mut parsed = ParsedInput::default();
    let mut cursor = rest;
    while !cursor.is_empty() {
        let Some(stripped) = cursor.strip_prefix('-') else {
            return Err(DispatchError::InvalidSyntax);
        };
        let key_end = stripped.find(char::is_whitespace).unwrap_or(stripped.len());
        let key = &stripped[..key_end];
        cursor = stripped[key_end..].trim_start();

        let Some(flag) = valid_flags.iter().find(|f| f.key == key) else {
            // Unknown flags are silently dropped, along with any argument
            // they appear to carry.
            if let Some(next_dash) = cursor.find('-') {
                cursor = cursor[next_dash..].trim_start();
            } else {
                cursor = "";
            }
            continue;
        };

        if !flag.allow_multiple && parsed.is_present(flag.key) {
            return Err(DispatchError::InvalidFlag(flag.key.to_owned()));
        }

        let value = if flag.has_argument {
            let arg_end = cursor.find('-').unwrap_or(cursor.len());
            let arg = cursor[..arg_end].trim().to_owned();
            cursor = cursor[arg_end..].trim_start();
            Some(arg)
        } else {
            None
        };
        parsed.values.push((flag.key.to_owned(), value));
    }

    for flag in valid_flags {
        if !flag.optional && !parsed.is_present(flag.key) {
            return Err(DispatchError::MissingFlag(flag.key.to_owned()));
        }
    }

    Ok((verb, parsed))
}

const FLAG_DIR: Flag = Flag::new("dir", true, true, false);
const FLAG_FILE: Flag = Flag::new("file", true, false, true);
const FLAG_RECURSIVE: Flag = Flag::new("r", false, false, true);
const FLAG_SINGLE: Flag = Flag::new("single", false, false, true);
const FLAG_VERTEX: Flag = Flag::new("vertex", true, false, true);
const FLAG_PIXEL: Flag = Flag::new("pixel", true, false, true);
const FLAG_OUTPUT: Flag = Flag::new("output", true, false, true);
const FLAG_INCL_DIR: Flag = Flag::new("incl_dir", true, true, true);
const FLAG_PSSL: Flag = Flag::new("pssl", false, false, true);
const FLAG_HLSL: Flag = Flag::new("hlsl", false, false, true);
const FLAG_SPIRV: Flag = Flag::new("spirv", false, false, true);
const FLAG_COMPRESSION: Flag = Flag::new("compression", true, false, true);
const FLAG_MIPMAP: Flag = Flag::new("mipmap", false, false, true);
const FLAG_PATH: Flag = Flag::new("path", true, false, false);

fn scene_flags() -> Vec<Flag> {
    vec![
        FLAG_DIR, FLAG_FILE, FLAG_RECURSIVE, FLAG_SINGLE, FLAG_VERTEX, FLAG_PIXEL, FLAG_OUTPUT,
    ]
}

fn source_flags() -> Vec<Flag> {
    vec![FLAG_DIR, FLAG_FILE, FLAG_RECURSIVE, FLAG_OUTPUT]
}

/// Names one source file per `-dir`/`-file`/`-r` triple, matching against
/// `extensions`. `-file` restricts the search to the named files within that
/// directory; its absence walks the whole (optionally recursive) directory.
fn enumerate_sources(ctx: &BuilderContext, parsed: &ParsedInput, extensions: &[&str]) -> Vec<PathBuf> {
    let recursive = parsed.is_present(FLAG_RECURSIVE.key);
    let mut out = Vec::new();
    for dir in parsed.all(FLAG_DIR.key) {
        let dir = Path::new(dir);
        if let Some(files) = parsed.first(FLAG_FILE.key) {
            for name in files.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                out.push(dir.join(name));
            }
            continue;
        }
        match ctx.filesystem().walk_files(dir, extensions, recursive) {
            Ok(files) => out.extend(files),
            Err(err) => warn!("could not walk {dir:?}: {err}"),
        }
    }
    out
}

fn stem(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("asset").to_owned()
}

/// Owns one `BuilderContext` and every pipeline, and drives them from
/// successive `run` calls - one per REPL line.
pub struct Dispatcher {
    ctx: BuilderContext,
    loader: SceneLoader,
    texture: TexturePipeline,
    shader: ShaderPipeline,
    mesh: MeshPipeline,
    skeleton: SkeletonPipeline,
    animation: AnimationPipeline,
    material: MaterialPipeline,
    model: ModelPipeline,
    audio: AudioPipeline,
    script: ScriptPipeline,
}

impl Dispatcher {
    pub fn new(ctx: BuilderContext) -> Self {
        Self {
            texture: TexturePipeline::new(&ctx),
            shader: ShaderPipeline::new(&ctx),
            mesh: MeshPipeline::new(&ctx),
            skeleton: SkeletonPipeline::new(&ctx),
            animation: AnimationPipeline::new(&ctx),
            material: MaterialPipeline::new(&ctx),
            model: ModelPipeline::new(&ctx),
            audio: AudioPipeline::new(&ctx),
            script: ScriptPipeline::new(&ctx),
            loader: SceneLoader::new(),
            ctx,
        }
    }

    pub fn context(&self) -> &BuilderContext {
        &self.ctx
    }

    /// Parses and executes one command line. Returns `Ok(())` on success
    /// (including `help`), `Err(DispatchError::ExitCommand)` on `--exit`, and
    /// any other `DispatchError` for a malformed or unknown command - none of
    /// which terminate the caller's REPL loop.
    pub fn run(&mut self, input: &str) -> Result<(), DispatchError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        let verb_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let verb = trimmed[..verb_end].trim_start_matches('-');

        match verb {
            "help" => {
                self.help();
                Ok(())
            }
            "exit" => Err(DispatchError::ExitCommand),
            "clear_output" => self.clear_output(),
            "refresh_cache" => {
                self.refresh_cache();
                Ok(())
            }
            "set_output_dir" => self.set_output_dir(trimmed),
            "set_package_dir" => self.set_package_dir(trimmed),
            "convert_textures" => self.convert_textures(trimmed),
            "convert_shaders" => self.convert_shaders(trimmed),
            "convert_models" => self.convert_models(trimmed),
            "convert_skeletons" => self.convert_skeletons(trimmed),
            "convert_animations" => self.convert_animations(trimmed),
            "convert_scripts" => self.convert_scripts(trimmed),
            "convert_audio" => self.convert_audio(trimmed),
            "convert" => self.convert_all(trimmed),
            _ => Err(DispatchError::UnknownCommand(verb.to_owned())),
        }
    }

    fn help(&self) {
        info!(
            "commands: help, exit, convert_models, convert_shaders, convert_textures, \
             convert_skeletons, convert_animations, convert_scripts, convert_audio, convert, \
             clear_output, refresh_cache, set_output_dir, set_package_dir"
        );
    }

    /// Removes every package blob and cache file across all nine kinds, then
    /// reinitializes each store so built-in defaults come back.
    fn clear_output(&mut self) -> Result<(), DispatchError> {
        for result in [
            self.texture.clear_output(),
            self.shader.clear_output(),
            self.mesh.clear_output(),
            self.skeleton.clear_output(),
            self.animation.clear_output(),
            self.material.clear_output(),
            self.model.clear_output(),
            self.audio.clear_output(),
            self.script.clear_output(),
        ] {
            if let Err(err) = result {
                error!("clear_output: {err}");
            }
        }
        Ok(())
    }

    fn refresh_cache(&mut self) {
        self.texture.refresh_cache();
        self.shader.refresh_cache();
        self.mesh.refresh_cache();
        self.skeleton.refresh_cache();
        self.animation.refresh_cache();
        self.material.refresh_cache();
        self.model.refresh_cache();
        self.audio.refresh_cache();
        self.script.refresh_cache();
    }

    fn set_output_dir(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &[FLAG_PATH])?;
        let path = parsed.first(FLAG_PATH.key).unwrap();
        self.ctx.set_output_root(path);
        for result in [
            self.texture.set_output_location(self.ctx.output_root()),
            self.shader.set_output_location(self.ctx.output_root()),
            self.mesh.set_output_location(self.ctx.output_root()),
            self.skeleton.set_output_location(self.ctx.output_root()),
            self.animation.set_output_location(self.ctx.output_root()),
            self.material.set_output_location(self.ctx.output_root()),
            self.model.set_output_location(self.ctx.output_root()),
            self.audio.set_output_location(self.ctx.output_root()),
            self.script.set_output_location(self.ctx.output_root()),
        ] {
            if let Err(err) = result {
                error!("set_output_dir: {err}");
            }
        }
        Ok(())
    }

    fn set_package_dir(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &[FLAG_PATH])?;
        let path = parsed.first(FLAG_PATH.key).unwrap();
        self.ctx.set_package_subdir(path);
        Ok(())
    }

    fn convert_textures(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &source_flags())?;
        for relative in enumerate_sources(&self.ctx, &parsed, &["png", "jpg", "jpeg", "bmp", "tga", "dds", "hdr", "webp", "tiff"]) {
            let name = stem(&relative);
            if let Err(err) = self.texture.convert(&self.ctx, &relative, &name) {
                error!("convert_textures: {relative:?}: {err}");
            }
        }
        Ok(())
    }

    fn convert_shaders(&mut self, input: &str) -> Result<(), DispatchError> {
        let mut flags = source_flags();
        flags.extend([FLAG_INCL_DIR, FLAG_PSSL, FLAG_HLSL, FLAG_SPIRV]);
        let (_, parsed) = parse(input, &flags)?;

        let include_dirs = parsed.all(FLAG_INCL_DIR.key).into_iter().map(PathBuf::from).collect();
        self.shader.set_include_dirs(include_dirs);

        let mut extra = Vec::new();
        if parsed.is_present(FLAG_HLSL.key) {
            extra.push(ExtraBackend::Dxbc);
        }
        if parsed.is_present(FLAG_PSSL.key) {
            extra.push(ExtraBackend::Pssl);
        }
        if !extra.is_empty() {
            self.shader.set_extra_backends(extra);
        }

        for relative in enumerate_sources(&self.ctx, &parsed, &["hlsl"]) {
            let name = stem(&relative);
            if let Err(err) = self.shader.convert(&self.ctx, &relative, &name) {
                error!("convert_shaders: {relative:?}: {err}");
            }
        }
        Ok(())
    }

    fn convert_models(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &scene_flags())?;
        let vertex = parsed.first(FLAG_VERTEX.key).ok_or_else(|| DispatchError::MissingFlag("vertex".to_owned()))?;
        let pixel = parsed.first(FLAG_PIXEL.key).ok_or_else(|| DispatchError::MissingFlag("pixel".to_owned()))?;
        let single_model = parsed.is_present(FLAG_SINGLE.key);

        for relative in enumerate_sources(&self.ctx, &parsed, &["gltf", "glb"]) {
            let result = self.model.convert(
                &self.ctx,
                &mut self.loader,
                &relative,
                single_model,
                vertex,
                pixel,
                &self.shader,
                &mut self.mesh,
                &mut self.skeleton,
                &mut self.material,
                &mut self.texture,
            );
            if let Err(err) = result {
                error!("convert_models: {relative:?}: {err}");
            }
        }
        Ok(())
    }

    /// Extracts skeletons directly from a scene's skins, bypassing the Model
    /// Pipeline - useful for re-packaging a skeleton without rebuilding the
    /// mesh/material it's bound to.
    fn convert_skeletons(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &source_flags())?;
        for relative in enumerate_sources(&self.ctx, &parsed, &["gltf", "glb"]) {
            let scene = match self.loader.load(&self.ctx, &relative) {
                Ok(scene) => scene,
                Err(err) => {
                    error!("convert_skeletons: {relative:?}: {err}");
                    continue;
                }
            };
            let base = stem(&relative);
            let origin = relative.display().to_string();
            for skin in scene.document.skins() {
                match skeleton::build_skeleton(scene, skin.index()) {
                    Ok(Some(data)) => {
                        let name = format!("{base}_skeleton_{}", skin.index());
                        if let Err(err) = self.skeleton.package(&origin, &name, data) {
                            error!("convert_skeletons: {relative:?}: {err}");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => error!("convert_skeletons: {relative:?}: {err}"),
                }
            }
        }
        Ok(())
    }

    fn convert_animations(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &source_flags())?;
        for relative in enumerate_sources(&self.ctx, &parsed, &["gltf", "glb"]) {
            let scene = match self.loader.load(&self.ctx, &relative) {
                Ok(scene) => scene,
                Err(err) => {
                    error!("convert_animations: {relative:?}: {err}");
                    continue;
                }
            };
            let origin = relative.display().to_string();
            for (name, data) in animation::build_animations(scene) {
                if let Err(err) = self.animation.package(&origin, &name, data) {
                    error!("convert_animations: {relative:?}: {err}");
                }
            }
        }
        Ok(())
    }

    fn convert_scripts(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &source_flags())?;
        for relative in enumerate_sources(&self.ctx, &parsed, &["lua"]) {
            let name = stem(&relative);
            if let Err(err) = self.script.convert(&self.ctx, &relative, &name) {
                error!("convert_scripts: {relative:?}: {err}");
            }
        }
        Ok(())
    }

    fn convert_audio(&mut self, input: &str) -> Result<(), DispatchError> {
        let (_, parsed) = parse(input, &source_flags())?;
        for relative in enumerate_sources(&self.ctx, &parsed, &["wav", "ogg", "mp3", "flac"]) {
            let name = stem(&relative);
            if let Err(err) = self.audio.convert(&self.ctx, &relative, &name) {
                error!("convert_audio: {relative:?}: {err}");
            }
        }
        Ok(())
    }

    /// The catch-all `--convert`: walks `-dir` once and routes each file to
    /// the pipeline matching its extension, per S6. `-vertex`/`-pixel`
    /// default to the built-in shader pair for any scene found this way.
    fn convert_all(&mut self, input: &str) -> Result<(), DispatchError> {
        let mut flags = scene_flags();
        flags.extend([FLAG_COMPRESSION, FLAG_MIPMAP]);
        let (_, parsed) = parse(input, &flags)?;

        if parsed.is_present(FLAG_COMPRESSION.key) || parsed.is_present(FLAG_MIPMAP.key) {
            warn!("convert: texture mipmap/compression flags are accepted but not yet implemented");
        }

        let vertex = parsed.first(FLAG_VERTEX.key).unwrap_or(crate::shader::DEFAULT_VERTEX_SHADER_NAME);
        let pixel = parsed.first(FLAG_PIXEL.key).unwrap_or(crate::shader::DEFAULT_PIXEL_SHADER_NAME);
        let single_model = parsed.is_present(FLAG_SINGLE.key);

        for dir in parsed.all(FLAG_DIR.key) {
            let recursive = parsed.is_present(FLAG_RECURSIVE.key);
            let dir = Path::new(dir);

            for relative in self.ctx.filesystem().walk_files(dir, &["hlsl"], recursive).unwrap_or_default() {
                let name = stem(&relative);
                if let Err(err) = self.shader.convert(&self.ctx, &relative, &name) {
                    error!("convert: {relative:?}: {err}");
                }
            }
            for relative in self
                .ctx
                .filesystem()
                .walk_files(dir, &["png", "jpg", "jpeg", "bmp", "tga", "dds", "hdr", "webp", "tiff"], recursive)
                .unwrap_or_default()
            {
                let name = stem(&relative);
                if let Err(err) = self.texture.convert(&self.ctx, &relative, &name) {
                    error!("convert: {relative:?}: {err}");
                }
            }
            for relative in self.ctx.filesystem().walk_files(dir, &["lua"], recursive).unwrap_or_default() {
                let name = stem(&relative);
                if let Err(err) = self.script.convert(&self.ctx, &relative, &name) {
                    error!("convert: {relative:?}: {err}");
                }
            }
            for relative in self.ctx.filesystem().walk_files(dir, &["wav", "ogg", "mp3", "flac"], recursive).unwrap_or_default() {
                let name = stem(&relative);
                if let Err(err) = self.audio.convert(&self.ctx, &relative, &name) {
                    error!("convert: {relative:?}: {err}");
                }
            }
            for relative in self.ctx.filesystem().walk_files(dir, &["gltf", "glb"], recursive).unwrap_or_default() {
                let result = self.model.convert(
                    &self.ctx,
                    &mut self.loader,
                    &relative,
                    single_model,
                    vertex,
                    pixel,
                    &self.shader,
                    &mut self.mesh,
                    &mut self.skeleton,
                    &mut self.material,
                    &mut self.texture,
                );
                if let Err(err) = result {
                    error!("convert: {relative:?}: {err}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_reads_flags_with_and_without_arguments() {
        let flags = vec![FLAG_DIR, FLAG_RECURSIVE];
        let (verb, parsed) = parse("--convert_textures -dir ./art -r", &flags).unwrap();
        assert_eq!(verb, "convert_textures");
        assert_eq!(parsed.first("dir"), Some("./art"));
        assert!(parsed.is_present("r"));
    }

    #[test]
    fn parse_drops_unknown_flags_silently() {
        let flags = vec![FLAG_DIR];
        let (_, parsed) = parse("--convert_textures -dir ./art -bogus xyz", &flags).unwrap();
        assert_eq!(parsed.first("dir"), Some("./art"));
        assert!(!parsed.is_present("bogus"));
    }

    #[test]
    fn parse_reports_missing_mandatory_flag() {
        let flags = vec![Flag::new("dir", true, true, false)];
        let err = parse("--convert_textures", &flags).unwrap_err();
        assert_eq!(err, DispatchError::MissingFlag("dir".to_owned()));
    }

    #[test]
    fn parse_reads_repeated_dir_flags() {
        let flags = vec![FLAG_DIR];
        let (_, parsed) = parse("--convert_textures -dir ./a -dir ./b", &flags).unwrap();
        assert_eq!(parsed.all("dir"), vec!["./a", "./b"]);
    }

    #[test]
    fn unknown_verb_is_reported() {
        let ctx = BuilderContext::new(
            std::env::temp_dir().join("dess-dispatcher-test-data"),
            std::env::temp_dir().join("dess-dispatcher-test-out"),
            "packages",
        );
        let mut dispatcher = Dispatcher::new(ctx);
        let err = dispatcher.run("--not_a_real_command").unwrap_err();
        assert_eq!(err, DispatchError::UnknownCommand("not_a_real_command".to_owned()));
    }

    #[test]
    fn exit_is_reported_as_exit_command() {
        let ctx = BuilderContext::new(
            std::env::temp_dir().join("dess-dispatcher-test-data2"),
            std::env::temp_dir().join("dess-dispatcher-test-out2"),
            "packages",
        );
        let mut dispatcher = Dispatcher::new(ctx);
        assert_eq!(dispatcher.run("--exit").unwrap_err(), DispatchError::ExitCommand);
    }
}
