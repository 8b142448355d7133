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

//! Shader script parsing.
//!
//! A script is a sequence of shader blocks:
//!
//! ```text
//! textures/base_wall/glass
//! {
//!     cull none
//!     {
//!         map textures/base_wall/glass.tga
//!         blendfunc add
//!     }
//! }
//! ```
//!
//! Directives inside the outer braces describe the whole material; each nested block is one
//! stage. Directives are line-oriented and matched case-insensitively. Unknown directives are
//! skipped.

use crate::parse::line_tokens;
use crate::shader::{
    AnimMap, Cull, MaterialMetadata, ShaderStage, SurfaceParms, TextureBlendMode,
};

/// Parses the text of a shader script into its materials, in definition order.
///
/// Parsing never fails. Malformed input (a stray closing brace, a directive outside any shader)
/// is logged and skipped.
pub fn parse_script(src: &str) -> Vec<MaterialMetadata> {
    let mut parser = ScriptParser::new();

    for line in src.lines() {
        let mut command = Vec::new();
        for token in line_tokens(line) {
            match token {
                "{" => {
                    parser.command(&command);
                    command.clear();
                    parser.open();
                }

                "}" => {
                    parser.command(&command);
                    command.clear();
                    parser.close();
                }

                t => command.push(t),
            }
        }

        parser.command(&command);
    }

    if parser.current.is_some() {
        warn!("Shader script ended inside a shader definition");
    }

    parser.done
}

struct ScriptParser {
    depth: usize,
    current: Option<MaterialMetadata>,
    stage: Option<ShaderStage>,
    done: Vec<MaterialMetadata>,
}

impl ScriptParser {
    fn new() -> ScriptParser {
        ScriptParser {
            depth: 0,
            current: None,
            stage: None,
            done: Vec::new(),
        }
    }

    fn open(&mut self) {
        self.depth += 1;
    }

    fn close(&mut self) {
        if self.depth == 0 {
            warn!("Mismatched closing brace in shader script");
            return;
        }

        self.depth -= 1;
        match self.depth {
            0 => {
                self.stage = None;
                match self.current.take() {
                    Some(shader) => self.done.push(shader),
                    None => warn!("Closing brace without a shader"),
                }
            }

            1 => {
                if let (Some(shader), Some(stage)) = (self.current.as_mut(), self.stage.take()) {
                    shader.add_stage(stage);
                }
            }

            _ => (),
        }
    }

    fn command(&mut self, args: &[&str]) {
        if args.is_empty() {
            return;
        }

        if self.depth == 0 {
            // a name outside any block starts a new shader, dropping an unfinished one
            self.current = Some(MaterialMetadata::new(args[0]));
            self.stage = None;
            return;
        }

        let shader = match self.current.as_mut() {
            Some(s) => s,
            None => return,
        };

        let keyword = args[0].to_lowercase();
        match self.depth {
            1 => shader_command(shader, &keyword, args),
            2 => {
                let stage = self.stage.get_or_insert_with(ShaderStage::default);
                stage_command(shader, stage, &keyword, args);
            }
            _ => (),
        }
    }
}

fn shader_command(shader: &mut MaterialMetadata, keyword: &str, args: &[&str]) {
    match keyword {
        "cull" if args.len() == 2 => match Cull::from_name(args[1]) {
            Some(c) => shader.set_cull(c),
            None => debug!("{}: unknown cull mode {}", shader.name(), args[1]),
        },

        "surfaceparm" if args.len() == 2 => match SurfaceParms::from_name(args[1]) {
            Some(p) => shader.add_surface_parms(p),
            None => debug!("{}: unknown surfaceparm {}", shader.name(), args[1]),
        },

        "skyparms" if args.len() >= 2 => {
            if args[1] != "-" {
                shader.set_sky_box(args[1]);
            }
        }

        _ => (),
    }
}

fn stage_command(
    shader: &mut MaterialMetadata,
    stage: &mut ShaderStage,
    keyword: &str,
    args: &[&str],
) {
    match keyword {
        "map" | "clampmap" if args.len() == 2 => {
            if args[1].eq_ignore_ascii_case("$lightmap") {
                stage.is_light_map = true;
            } else {
                stage.map = Some(args[1].to_owned());
                stage.clamp = keyword == "clampmap";
                shader.add_texture(args[1]);
            }
        }

        "animmap" if args.len() >= 2 => {
            stage.anim_map = Some(AnimMap {
                frequency: args[1].parse().unwrap_or(0.0),
                frames: args[2..].iter().map(|s| s.to_string()).collect(),
            });
        }

        "blendfunc" if args.len() == 3 => {
            let src = args[1].to_uppercase();
            let dst = args[2].to_uppercase();
            if let Some(mode) = TextureBlendMode::from_factors(&src, &dst) {
                stage.blend_mode = mode;
            }
            stage.blend_src = Some(src);
            stage.blend_dst = Some(dst);
        }

        "blendfunc" if args.len() == 2 => match TextureBlendMode::from_shorthand(args[1]) {
            Some((mode, src, dst)) => {
                stage.blend_mode = mode;
                stage.blend_src = Some(src.to_owned());
                stage.blend_dst = Some(dst.to_owned());
            }

            None => stage.blend_src = Some(args[1].to_owned()),
        },

        "alphafunc" if args.len() >= 2 => stage.alpha_func = Some(args[1].to_owned()),
        "depthfunc" if args.len() >= 2 => stage.depth_func = Some(args[1].to_owned()),
        "rgbgen" if args.len() >= 2 => stage.rgb_gen = Some(args[1..].join(" ")),

        "tcmod" if args.len() >= 2 => {
            let tc_mod = args[1..].join(" ");
            match args[1].to_lowercase().as_str() {
                "scale" | "scroll" | "rotate" => stage.tc_mods.push(tc_mod),
                _ => stage.tc_mods_unsupported.push(tc_mod),
            }
        }

        "tcgen" if args.len() >= 2 => stage
            .tc_mods_unsupported
            .push(format!("tcgen {}", args[1..].join(" "))),

        _ => (),
    }
}
