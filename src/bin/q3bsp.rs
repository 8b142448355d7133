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

extern crate docopt;
extern crate env_logger;
extern crate failure;
#[macro_use]
extern crate log;
extern crate q3mesh;
#[macro_use]
extern crate serde_derive;

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
    process::exit,
};

use q3mesh::{
    bsp::BspData,
    lightmap::LightmapNaming,
    shader::ShaderLibrary,
    vrml::{VrmlOptions, VrmlWriter},
};

use docopt::Docopt;
use failure::{Error, ResultExt};

#[derive(Deserialize)]
struct Args {
    arg_input: String,
    arg_output: Option<String>,
    flag_code: Option<String>,
    flag_prefix: Option<String>,
    flag_scripts: Option<String>,
    flag_leaf: Option<usize>,
    flag_tree: bool,
    flag_tex1: bool,
    flag_no_yzflip: bool,
    flag_h: bool,
    flag_help: bool,
    flag_v: bool,
    flag_verbose: bool,
    flag_version: bool,
}

const USAGE: &'static str = "
Usage: q3bsp [options] <input>
       q3bsp [options] <input> <output>

Converts a Quake III level into a VRML 2 scene. Without <output>, the scene is written to
standard output.

Options:
        --code=<c>     Level code used in lightmap names. Defaults to the input file stem.
        --prefix=<p>   Prefix prepended to lightmap names.
        --scripts=<d>  Directory holding .shader scripts.
        --leaf=<n>     Convert only the faces of leaf <n>.
        --tree         Also write the BSP tree.
        --tex1         Texture with base texture coordinates instead of lightmaps.
        --no-yzflip    Keep the level's Z-up axes instead of swapping Y and Z.
    -v, --verbose      Annotate the output and log progress.

    -h, --help         Show this message and exit.
        --version      Print version information and exit.
";

const VERSION: &'static str = "
q3bsp 0.1
Copyright © 2018 Cormac O'Brien
Released under the terms of the MIT License
";

fn run(args: &Args) -> Result<(), Error> {
    let data = fs::read(&args.arg_input)
        .with_context(|_| format!("Couldn't read {}", args.arg_input))?;
    let bsp = BspData::load(&data)?;

    let code = match args.flag_code {
        Some(ref c) => c.to_owned(),
        None => Path::new(&args.arg_input)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let naming = LightmapNaming::new(args.flag_prefix.as_ref().map_or("", |p| p.as_str()), code);

    let mut library = match args.flag_scripts {
        Some(ref dir) => ShaderLibrary::with_script_dir(dir),
        None => ShaderLibrary::new(),
    };

    let mesh = match args.flag_leaf {
        Some(leaf) => bsp.build_leaf_mesh(leaf, &mut library, &naming)?,
        None => bsp.build_mesh(&mut library, &naming)?,
    };

    info!(
        "{} sections, {} triangles, {} vertices",
        mesh.len(),
        mesh.triangle_count(),
        mesh.vertex_count()
    );
    for section in mesh.full_sections() {
        warn!("Section {} ran out of vertex room, some of its faces were dropped", section);
    }

    let out: Box<dyn Write> = match args.arg_output {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path).with_context(|_| format!("Couldn't create {}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let options = VrmlOptions {
        yz_flip: !args.flag_no_yzflip,
        verbose: args.flag_verbose || args.flag_v,
        use_lightmap_channel: !args.flag_tex1,
        ..Default::default()
    };

    let mut writer = VrmlWriter::new(out, options);
    writer.write_header()?;
    writer.write_mesh(&mesh)?;
    writer.write_viewpoints(bsp.entities())?;
    if args.flag_tree {
        writer.write_tree(&bsp, &mut library, &naming)?;
    }

    writer.into_inner().flush()?;
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    if args.flag_help || args.flag_h {
        println!("{}", USAGE);
        exit(0);
    }

    if args.flag_version {
        println!("{}", VERSION);
        exit(0);
    }

    if let Err(why) = run(&args) {
        eprintln!("q3bsp: {}", why);
        for cause in why.iter_causes() {
            eprintln!("  caused by: {}", cause);
        }
        exit(1);
    }
}
