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

//! VRML 2 output.
//!
//! Each mesh section becomes one `Shape`. Appearances and image textures are defined the first
//! time they are used and referenced with `USE` afterwards, so a file stays valid no matter how
//! many sections share a texture.

use std::{
    collections::{HashMap, HashSet},
    f32::consts::PI,
    io::Write,
    path::Path,
};

use crate::{
    bsp::{BspData, BspErrorKind, Entity, NodeRef},
    lightmap::LightmapNaming,
    math,
    mesh::{Mesh, MeshSection, Vertex},
    parse,
    shader::{Cull, MaterialResolver},
};

use cgmath::Vector3;
use failure::Error;

#[derive(Clone, Debug)]
pub struct VrmlOptions {
    /// Swap the Y and Z components of every coordinate, giving the Y-up frame viewpoints and tree
    /// planes are written in.
    pub yz_flip: bool,

    /// Annotate each appearance with its material key and shader name.
    pub verbose: bool,

    /// Texture lit sections with their lightmap atlas instead of their base texture.
    pub use_lightmap_channel: bool,

    /// Appended to base texture names that carry no extension.
    pub texture_extension: String,

    pub lightmap_extension: String,
}

impl Default for VrmlOptions {
    fn default() -> VrmlOptions {
        VrmlOptions {
            yz_flip: true,
            verbose: false,
            use_lightmap_channel: true,
            texture_extension: "jpg".to_owned(),
            lightmap_extension: "bmp".to_owned(),
        }
    }
}

/// The texture a section is drawn with.
struct SectionTexture {
    url: String,
    clamp: bool,
    lightmap: bool,
}

pub struct VrmlWriter<W>
where
    W: Write,
{
    out: W,
    options: VrmlOptions,

    // material key -> DEF name
    appearances: HashMap<String, String>,

    // url -> DEF name
    textures: HashMap<String, String>,

    material_defined: bool,
}

impl<W> VrmlWriter<W>
where
    W: Write,
{
    pub fn new(out: W, options: VrmlOptions) -> VrmlWriter<W> {
        VrmlWriter {
            out,
            options,
            appearances: HashMap::new(),
            textures: HashMap::new(),
            material_defined: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_header(&mut self) -> Result<(), Error> {
        writeln!(self.out, "#VRML V2.0 utf8")?;
        Ok(())
    }

    /// Writes every section of `mesh` inside a `Group`. An empty mesh writes nothing.
    pub fn write_mesh(&mut self, mesh: &Mesh) -> Result<(), Error> {
        if mesh.is_empty() {
            return Ok(());
        }

        writeln!(self.out, "Group {{\nchildren [")?;
        for section in mesh.sections() {
            self.write_section(section)?;
        }
        writeln!(self.out, "]\n}}")?;

        Ok(())
    }

    pub fn write_section(&mut self, section: &MeshSection) -> Result<(), Error> {
        let texture = self.section_texture(section);

        writeln!(self.out, "Shape {{")?;
        write!(self.out, "appearance ")?;
        self.write_appearance(section, &texture)?;

        let cull = section.material().map(|m| m.cull()).unwrap_or_default();
        writeln!(self.out, "geometry IndexedFaceSet {{")?;
        writeln!(
            self.out,
            "\tccw {} creaseAngle 3.14",
            if cull == Cull::Back { "TRUE" } else { "FALSE" }
        )?;
        if cull == Cull::Disable {
            writeln!(self.out, "\tsolid FALSE")?;
        }

        writeln!(self.out, "\tcoordIndex [")?;
        let count = section.triangle_count();
        for (i, tri) in section.triangles().enumerate() {
            let end = if i + 1 == count { "]" } else { "," };
            writeln!(self.out, "\t{},{},{},-1{}", tri[0], tri[1], tri[2], end)?;
        }

        self.write_coords(section.vertices())?;
        self.write_texcoords(section.vertices(), texture.lightmap)?;
        self.write_colors(section.vertices())?;

        writeln!(self.out, "}}\n}}")?;
        Ok(())
    }

    fn section_texture(&self, section: &MeshSection) -> SectionTexture {
        let texture = section.texture();
        let material = section.material();

        let lightmap = match material {
            Some(m) if m.no_lightmap() => None,
            _ => section.lightmap(),
        };

        if let (true, Some(lm)) = (self.options.use_lightmap_channel, lightmap) {
            return SectionTexture {
                url: format!("{}.{}", lm, self.options.lightmap_extension),
                clamp: false,
                lightmap: true,
            };
        }

        let base = material.and_then(|m| m.base_texture()).unwrap_or(texture);
        let clamp = material
            .and_then(|m| {
                m.stages()
                    .iter()
                    .find(|s| !s.is_light_map && s.texture() == Some(base))
            })
            .map(|s| s.clamp)
            .unwrap_or(false);

        let url = if Path::new(base).extension().is_some() {
            base.to_owned()
        } else {
            format!("{}.{}", base, self.options.texture_extension)
        };

        SectionTexture {
            url,
            clamp,
            lightmap: false,
        }
    }

    fn write_appearance(
        &mut self,
        section: &MeshSection,
        texture: &SectionTexture,
    ) -> Result<(), Error> {
        if let Some(name) = self.appearances.get(section.key()) {
            writeln!(self.out, "USE {}", name)?;
            return Ok(());
        }

        if self.options.verbose {
            writeln!(self.out, " # {}", section.key())?;
            if let Some(m) = section.material() {
                writeln!(self.out, " # shader {}", m.name())?;
            }
        }

        let name = format!("A{}", self.appearances.len());
        writeln!(self.out, "DEF {} Appearance {{", name)?;
        self.appearances.insert(section.key().to_owned(), name);

        if self.material_defined {
            writeln!(self.out, "material USE MAT")?;
        } else {
            writeln!(
                self.out,
                "material DEF MAT Material {{\n  diffuseColor 1 1 1\n  emissiveColor 0.2 0.2 0.2\n}}"
            )?;
            self.material_defined = true;
        }

        write!(self.out, "texture ")?;
        self.write_image_texture(texture)?;

        writeln!(self.out, "}}")?;
        Ok(())
    }

    fn write_image_texture(&mut self, texture: &SectionTexture) -> Result<(), Error> {
        if let Some(name) = self.textures.get(&texture.url) {
            writeln!(self.out, "USE {}", name)?;
            return Ok(());
        }

        let name = format!("T{}", self.textures.len());
        writeln!(self.out, "DEF {} ImageTexture {{", name)?;
        if texture.clamp {
            writeln!(self.out, "\trepeatS FALSE repeatT FALSE")?;
        }
        writeln!(self.out, "  url \"{}\"\n}}", texture.url)?;

        self.textures.insert(texture.url.clone(), name);
        Ok(())
    }

    fn write_coords(&mut self, vertices: &[Vertex]) -> Result<(), Error> {
        writeln!(self.out, "coord Coordinate {{\npoint [")?;
        for (i, v) in vertices.iter().enumerate() {
            if i > 0 {
                writeln!(self.out, ",")?;
            }

            let p = v.position;
            if self.options.yz_flip {
                write!(self.out, "\t{} {} {}", p.x, p.z, p.y)?;
            } else {
                write!(self.out, "\t{} {} {}", p.x, p.y, p.z)?;
            }
        }
        writeln!(self.out, "\n]\n}}")?;

        Ok(())
    }

    fn write_texcoords(&mut self, vertices: &[Vertex], lightmap: bool) -> Result<(), Error> {
        writeln!(self.out, "texCoord TextureCoordinate {{\npoint [")?;
        for (i, v) in vertices.iter().enumerate() {
            self.separator(i)?;

            let uv = if lightmap {
                v.lightmap_texcoord
            } else {
                v.texcoord
            };
            // image rows run top to bottom
            write!(self.out, "{} {}", uv.x, 1.0 - uv.y)?;
        }
        writeln!(self.out, "\n]\n}}")?;

        Ok(())
    }

    fn write_colors(&mut self, vertices: &[Vertex]) -> Result<(), Error> {
        writeln!(self.out, "color Color {{\ncolor [")?;
        for (i, v) in vertices.iter().enumerate() {
            self.separator(i)?;

            let [r, g, b] = v.color_rgb();
            write!(self.out, "{} {} {}", r, g, b)?;
        }
        writeln!(self.out, "\n]\n}}")?;

        Ok(())
    }

    // four values per line
    fn separator(&mut self, i: usize) -> Result<(), Error> {
        if i == 0 {
            write!(self.out, "\t")?;
        } else if i % 4 == 0 {
            write!(self.out, ",\n\t")?;
        } else {
            write!(self.out, ",")?;
        }

        Ok(())
    }

    /// Writes a `Viewpoint` for every spawn point and target position among `entities`.
    pub fn write_viewpoints(&mut self, entities: &[Entity]) -> Result<(), Error> {
        let viewpoints: Vec<_> = entities.iter().filter_map(Viewpoint::from_entity).collect();
        if viewpoints.is_empty() {
            return Ok(());
        }

        writeln!(self.out, "DEF Entities Group {{\nchildren [")?;
        for vp in viewpoints.iter() {
            if let Some(ref def) = vp.def_name {
                write!(self.out, "DEF {} ", def)?;
            }

            let p = vp.position;
            writeln!(
                self.out,
                "Viewpoint {{ position {} {} {} fieldOfView 1.0 jump TRUE orientation 0 1 0 {}",
                p.x, p.y, p.z, vp.yaw
            )?;
            writeln!(self.out, "\tdescription \"{}\" }}", vp.description)?;
        }
        writeln!(self.out, "]}}")?;

        Ok(())
    }

    /// Writes the BSP tree as nested `BspTree` nodes, with each leaf's faces as its own mesh.
    ///
    /// Empty leaves are written as `NULL`.
    pub fn write_tree(
        &mut self,
        bsp: &BspData,
        resolver: &mut dyn MaterialResolver,
        naming: &LightmapNaming,
    ) -> Result<(), Error> {
        let root = match bsp.root() {
            Some(r) => r,
            None => return Ok(()),
        };

        let mut visited = HashSet::new();
        self.write_tree_node(bsp, root, resolver, naming, &mut visited)
    }

    fn write_tree_node(
        &mut self,
        bsp: &BspData,
        node_ref: NodeRef,
        resolver: &mut dyn MaterialResolver,
        naming: &LightmapNaming,
        visited: &mut HashSet<usize>,
    ) -> Result<(), Error> {
        match node_ref {
            NodeRef::Leaf(l) => {
                if bsp.leaf_faces(l)?.is_empty() {
                    writeln!(self.out, "NULL")?;
                    return Ok(());
                }

                let mesh = bsp.build_leaf_mesh(l, resolver, naming)?;
                if mesh.is_empty() {
                    writeln!(self.out, "NULL")?;
                } else {
                    self.write_mesh(&mesh)?;
                }
            }

            NodeRef::Node(n) => {
                if !visited.insert(n) {
                    return Err(BspErrorKind::CyclicTree { node: n }.into());
                }

                let node = &bsp.nodes()[n];
                let plane = &bsp.planes()[node.plane_id];
                let normal = math::map_vector(plane.normal);
                writeln!(
                    self.out,
                    "BspTree {{ plane {} {} {} {}",
                    normal.x, normal.y, normal.z, plane.dist
                )?;

                write!(self.out, "front ")?;
                self.write_tree_node(bsp, node.front(), resolver, naming, visited)?;
                write!(self.out, "back ")?;
                self.write_tree_node(bsp, node.back(), resolver, naming, visited)?;
                writeln!(self.out, "}}")?;
            }
        }

        Ok(())
    }
}

/// A camera position taken from an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewpoint {
    pub def_name: Option<String>,
    pub description: String,
    pub position: Vector3<f32>,

    /// Rotation about the Y axis, in radians.
    pub yaw: f32,
}

impl Viewpoint {
    /// Returns the viewpoint of a `target_position` or `info_player_deathmatch` entity.
    pub fn from_entity(entity: &Entity) -> Option<Viewpoint> {
        let mut classname = None;
        let mut targetname = None;
        let mut origin = Vector3::new(0.0, 0.0, 0.0);
        let mut angle = 0.0;

        for (key, value) in entity.pairs() {
            match key {
                "classname" => classname = Some(value),
                "targetname" => targetname = Some(value),
                "origin" => match parse::vector3(value) {
                    Some(o) => origin = o,
                    None => warn!("Invalid entity origin \"{}\"", value),
                },
                "angle" => match value.trim().parse::<f32>() {
                    Ok(a) => angle = a,
                    Err(_) => warn!("Invalid entity angle \"{}\"", value),
                },
                _ => (),
            }
        }

        let position = math::map_vertex(origin);
        let yaw = (angle - 90.0) * PI / 180.0;

        match classname? {
            "target_position" => Some(Viewpoint {
                def_name: targetname.map(|t| t.to_owned()),
                description: targetname.unwrap_or("target_position").to_owned(),
                position,
                yaw,
            }),
            "info_player_deathmatch" => Some(Viewpoint {
                def_name: None,
                description: "info_player_deathmatch".to_owned(),
                position,
                yaw,
            }),
            _ => None,
        }
    }
}
