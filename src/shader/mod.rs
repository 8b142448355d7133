// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Material resolution.
//!
//! Faces name their material by a path-like texture name such as `textures/base_wall/concrete`.
//! A `MaterialResolver` turns that name (plus the face's lightmap atlas, if any) into the key used
//! to bucket triangles and into whatever rendering metadata is known for the material.
//!
//! `ShaderLibrary` is the stock resolver. It looks materials up in shader scripts, loading
//! `<script dir>/<group>.shader` the first time a material from `<group>` is requested.

pub mod parse;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use failure::{Error, ResultExt};

bitflags! {
    pub struct SurfaceParms: u32 {
        const NOLIGHTMAP = 0x0001;
        const SKY = 0x0002;
        const TRANS = 0x0004;
        const NODRAW = 0x0008;
        const NONSOLID = 0x0010;
        const NOMARKS = 0x0020;
        const NOIMPACT = 0x0040;
        const WATER = 0x0080;
        const LAVA = 0x0100;
        const SLIME = 0x0200;
        const FOG = 0x0400;
        const ALPHASHADOW = 0x0800;
    }
}

impl SurfaceParms {
    pub fn from_name<S>(name: S) -> Option<SurfaceParms>
    where
        S: AsRef<str>,
    {
        Some(match name.as_ref().to_lowercase().as_str() {
            "nolightmap" => SurfaceParms::NOLIGHTMAP,
            "sky" => SurfaceParms::SKY,
            "trans" => SurfaceParms::TRANS,
            "nodraw" => SurfaceParms::NODRAW,
            "nonsolid" => SurfaceParms::NONSOLID,
            "nomarks" => SurfaceParms::NOMARKS,
            "noimpact" => SurfaceParms::NOIMPACT,
            "water" => SurfaceParms::WATER,
            "lava" => SurfaceParms::LAVA,
            "slime" => SurfaceParms::SLIME,
            "fog" => SurfaceParms::FOG,
            "alphashadow" => SurfaceParms::ALPHASHADOW,
            _ => return None,
        })
    }
}

impl Default for SurfaceParms {
    fn default() -> SurfaceParms {
        SurfaceParms::empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cull {
    Front,
    Back,
    Disable,
}

impl Cull {
    pub fn from_name<S>(name: S) -> Option<Cull>
    where
        S: AsRef<str>,
    {
        match name.as_ref().to_lowercase().as_str() {
            "front" => Some(Cull::Front),
            "back" => Some(Cull::Back),
            "none" | "disable" | "twosided" => Some(Cull::Disable),
            _ => None,
        }
    }
}

impl Default for Cull {
    fn default() -> Cull {
        Cull::Front
    }
}

/// How a stage's texture combines with the stages beneath it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextureBlendMode {
    Add,
    Replace,
    Modulate,
    BlendTextureAlpha,
}

impl TextureBlendMode {
    /// Derives a blend mode from an explicit `blendfunc <src> <dst>` pair.
    ///
    /// Factor names are compared case-insensitively. Returns `None` for pairs with no
    /// corresponding mode, except that any pair with a `GL_SRC_ALPHA` source blends by alpha.
    pub fn from_factors(src: &str, dst: &str) -> Option<TextureBlendMode> {
        let src = src.to_uppercase();
        let dst = dst.to_uppercase();

        match (src.as_str(), dst.as_str()) {
            ("GL_ONE", "GL_ZERO") => Some(TextureBlendMode::Replace),
            ("GL_ONE", "GL_ONE") => Some(TextureBlendMode::Add),
            ("GL_DST_COLOR", "GL_ZERO") | ("GL_DST_COLOR", "GL_ONE_MINUS_DST_ALPHA") => {
                Some(TextureBlendMode::Modulate)
            }
            ("GL_SRC_ALPHA", _) => Some(TextureBlendMode::BlendTextureAlpha),
            _ => None,
        }
    }

    /// Expands a `blendfunc` shorthand into its blend mode and source/destination factors.
    pub fn from_shorthand(name: &str) -> Option<(TextureBlendMode, &'static str, &'static str)> {
        match name.to_lowercase().as_str() {
            "add" => Some((TextureBlendMode::Add, "GL_ONE", "GL_ONE")),
            "filter" => Some((TextureBlendMode::Modulate, "GL_DST_COLOR", "GL_ZERO")),
            "blend" => Some((
                TextureBlendMode::BlendTextureAlpha,
                "GL_SRC_ALPHA",
                "GL_ONE_MINUS_SRC_ALPHA",
            )),
            _ => None,
        }
    }
}

impl Default for TextureBlendMode {
    fn default() -> TextureBlendMode {
        TextureBlendMode::Add
    }
}

impl fmt::Display for TextureBlendMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            TextureBlendMode::Add => "ADD",
            TextureBlendMode::Replace => "REPLACE",
            TextureBlendMode::Modulate => "MODULATE",
            TextureBlendMode::BlendTextureAlpha => "BLENDTEXTUREALPHA",
        };

        write!(f, "{}", name)
    }
}

/// An animated texture: frames cycled at `frequency` frames per second.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimMap {
    pub frequency: f32,
    pub frames: Vec<String>,
}

/// One rendering pass of a material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderStage {
    /// The texture drawn by this stage, unless it is a light-map or animated stage.
    pub map: Option<String>,
    pub anim_map: Option<AnimMap>,
    /// Set by `map $lightmap`.
    pub is_light_map: bool,
    pub clamp: bool,
    pub blend_mode: TextureBlendMode,
    pub blend_src: Option<String>,
    pub blend_dst: Option<String>,
    pub alpha_func: Option<String>,
    pub depth_func: Option<String>,
    pub rgb_gen: Option<String>,

    /// Texture coordinate modifiers a typical renderer can apply directly (scale, scroll, rotate).
    pub tc_mods: Vec<String>,

    /// Every other texture coordinate modifier, including `tcgen` directives.
    pub tc_mods_unsupported: Vec<String>,
}

impl ShaderStage {
    pub fn has_tc_mods(&self) -> bool {
        !self.tc_mods.is_empty() || !self.tc_mods_unsupported.is_empty()
    }

    /// Returns the first texture this stage draws, if any.
    pub fn texture(&self) -> Option<&str> {
        if let Some(ref m) = self.map {
            return Some(m);
        }

        self.anim_map
            .as_ref()
            .and_then(|a| a.frames.first())
            .map(|s| s.as_str())
    }
}

/// Everything known about how to render one material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialMetadata {
    name: String,
    cull: Cull,
    surface_parms: SurfaceParms,
    sky_box: Option<String>,
    textures: Vec<String>,
    stages: Vec<ShaderStage>,
}

impl MaterialMetadata {
    pub fn new<S>(name: S) -> MaterialMetadata
    where
        S: AsRef<str>,
    {
        MaterialMetadata {
            name: name.as_ref().to_owned(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cull(&self) -> Cull {
        self.cull
    }

    pub fn set_cull(&mut self, cull: Cull) {
        self.cull = cull;
    }

    pub fn surface_parms(&self) -> SurfaceParms {
        self.surface_parms
    }

    pub fn add_surface_parms(&mut self, parms: SurfaceParms) {
        self.surface_parms |= parms;
    }

    pub fn sky_box(&self) -> Option<&str> {
        self.sky_box.as_ref().map(|s| s.as_str())
    }

    pub fn set_sky_box<S>(&mut self, sky_box: S)
    where
        S: AsRef<str>,
    {
        self.sky_box = Some(sky_box.as_ref().to_owned());
    }

    /// Every texture named by a `map` or `clampmap` directive, in script order.
    pub fn textures(&self) -> &[String] {
        &self.textures
    }

    pub fn add_texture<S>(&mut self, texture: S)
    where
        S: AsRef<str>,
    {
        self.textures.push(texture.as_ref().to_owned());
    }

    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn add_stage(&mut self, stage: ShaderStage) {
        self.stages.push(stage);
    }

    /// Returns the index of the stage that draws the lightmap.
    ///
    /// When several stages are flagged as light-map stages the first one wins.
    pub fn light_map_stage(&self) -> Option<usize> {
        if self.no_lightmap() {
            return None;
        }

        self.stages.iter().position(|s| s.is_light_map)
    }

    /// Returns `true` if both sides of the material's faces are drawn.
    pub fn double_sided(&self) -> bool {
        self.cull == Cull::Disable
    }

    pub fn no_lightmap(&self) -> bool {
        self.surface_parms.contains(SurfaceParms::NOLIGHTMAP)
    }

    pub fn is_sky(&self) -> bool {
        self.surface_parms.contains(SurfaceParms::SKY)
    }

    /// Returns the texture that best represents the material in a single-texture renderer.
    ///
    /// This is the first non-light-map stage's texture, falling back on the first texture the
    /// script mentions.
    pub fn base_texture(&self) -> Option<&str> {
        self.stages
            .iter()
            .filter(|s| !s.is_light_map)
            .filter_map(|s| s.texture())
            .next()
            .or_else(|| self.textures.first().map(|s| s.as_str()))
    }
}

/// The outcome of resolving a face's material.
#[derive(Clone, Debug)]
pub struct Resolution {
    /// The key triangles of this material are grouped under.
    pub key: String,

    /// The face's texture name.
    pub texture: String,

    /// The face's lightmap atlas name, if it has one.
    pub lightmap: Option<String>,

    /// Metadata for the material, if the resolver knows it.
    pub metadata: Option<Rc<MaterialMetadata>>,
}

/// Turns a face's texture name and lightmap atlas into a material key and metadata.
pub trait MaterialResolver {
    fn resolve(&mut self, texture: &str, lightmap: Option<&str>) -> Resolution;
}

/// Builds the key that groups triangles of one texture and lightmap atlas.
///
/// The key is the texture name alone for unlit faces and `<texture>+<lightmap>` otherwise.
pub fn material_key(texture: &str, lightmap: Option<&str>) -> String {
    match lightmap {
        Some(lm) => format!("{}+{}", texture, lm),
        None => texture.to_owned(),
    }
}

/// Returns the name of the shader script expected to define `texture`.
///
/// `textures/base_wall/concrete` is defined in `base_wall.shader`. Names with no directory
/// component have no script.
pub fn script_file_name(texture: &str) -> Option<String> {
    let mut segments = texture.split('/');
    segments.next()?;

    match segments.next() {
        Some(group) if !group.is_empty() => Some(format!("{}.shader", group)),
        _ => None,
    }
}

/// A cache of parsed shader scripts.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    script_dir: Option<PathBuf>,
    shaders: HashMap<String, Rc<MaterialMetadata>>,

    // script file name -> whether it loaded
    scripts: HashMap<String, bool>,

    unresolved: HashSet<String>,
}

impl ShaderLibrary {
    /// Creates an empty library that never touches the filesystem.
    pub fn new() -> ShaderLibrary {
        ShaderLibrary::default()
    }

    /// Creates an empty library that loads scripts from `dir` on demand.
    pub fn with_script_dir<P>(dir: P) -> ShaderLibrary
    where
        P: AsRef<Path>,
    {
        ShaderLibrary {
            script_dir: Some(dir.as_ref().to_owned()),
            ..Default::default()
        }
    }

    /// Parses `src` as the contents of the script `file_name` and adds its shaders.
    ///
    /// Shaders that are already defined keep their first definition. Returns the number of
    /// shaders added.
    pub fn add_script<S>(&mut self, file_name: S, src: &str) -> usize
    where
        S: AsRef<str>,
    {
        let file_name = file_name.as_ref();
        let mut added = 0;

        for shader in parse::parse_script(src) {
            if self.shaders.contains_key(shader.name()) {
                warn!(
                    "{}: shader {} is already defined, ignoring",
                    file_name,
                    shader.name()
                );
                continue;
            }

            self.shaders
                .insert(shader.name().to_owned(), Rc::new(shader));
            added += 1;
        }

        debug!("{}: added {} shaders", file_name, added);
        self.scripts.insert(file_name.to_owned(), true);
        added
    }

    /// Loads the script `file_name` from the script directory.
    ///
    /// A script is read at most once. A script that fails to load is remembered and not retried.
    pub fn load_script(&mut self, file_name: &str) -> Result<usize, Error> {
        if let Some(&loaded) = self.scripts.get(file_name) {
            ensure!(loaded, "{} failed to load earlier", file_name);
            return Ok(0);
        }

        match self.read_script(file_name) {
            Ok(src) => Ok(self.add_script(file_name, &src)),
            Err(e) => {
                self.scripts.insert(file_name.to_owned(), false);
                Err(e)
            }
        }
    }

    fn read_script(&self, file_name: &str) -> Result<String, Error> {
        let dir = match self.script_dir {
            Some(ref d) => d,
            None => bail!("No script directory to load {} from", file_name),
        };

        let path = dir.join(file_name);
        let src = fs::read_to_string(&path)
            .with_context(|_| format!("Couldn't read {}", path.display()))?;
        Ok(src)
    }

    /// Returns `true` if `file_name` has been loaded successfully.
    pub fn script_loaded(&self, file_name: &str) -> bool {
        self.scripts.get(file_name).cloned().unwrap_or(false)
    }

    pub fn locate(&self, name: &str) -> Option<Rc<MaterialMetadata>> {
        self.shaders.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

impl MaterialResolver for ShaderLibrary {
    fn resolve(&mut self, texture: &str, lightmap: Option<&str>) -> Resolution {
        let key = material_key(texture, lightmap);

        let mut metadata = self.locate(texture);
        if metadata.is_none() {
            if let Some(file_name) = script_file_name(texture) {
                if !self.scripts.contains_key(&file_name) && self.script_dir.is_some() {
                    match self.load_script(&file_name) {
                        Ok(n) => debug!("Loaded {} shaders from {}", n, file_name),
                        Err(e) => warn!("Couldn't load shader script {}: {}", file_name, e),
                    }

                    metadata = self.locate(texture);
                }
            }
        }

        if metadata.is_none() && self.unresolved.insert(texture.to_owned()) {
            warn!("No shader for {}", texture);
        }

        Resolution {
            key,
            texture: texture.to_owned(),
            lightmap: lightmap.map(|l| l.to_owned()),
            metadata,
        }
    }
}
