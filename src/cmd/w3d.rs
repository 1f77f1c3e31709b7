use std::{
    fs::DirBuilder,
    io::{stdout, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use argh::FromArgs;
use w3dlib::{
    format::tree::dump_chunks,
    util::file::{map_file, read_w3d_file, write_file},
    W3dChunk,
};

#[derive(FromArgs, PartialEq, Debug)]
/// process W3D files
#[argh(subcommand, name = "w3d")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Dump(DumpArgs),
    Info(InfoArgs),
    Rewrite(RewriteArgs),
    Split(SplitArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// prints the chunk tree of a W3D file
#[argh(subcommand, name = "dump")]
pub struct DumpArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(switch, short = 'j')]
    /// print the decoded structures as JSON
    json: bool,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// summarizes the structures in a W3D file
#[argh(subcommand, name = "info")]
pub struct InfoArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// decodes and re-encodes a W3D file
#[argh(subcommand, name = "rewrite")]
pub struct RewriteArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// output file
    output: PathBuf,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// writes each hierarchy, mesh, box and animation to its own file
#[argh(subcommand, name = "split")]
pub struct SplitArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// output directory
    out_dir: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Dump(c_args) => dump(c_args),
        SubCommand::Info(c_args) => info(c_args),
        SubCommand::Rewrite(c_args) => rewrite(c_args),
        SubCommand::Split(c_args) => split(c_args),
    }
}

fn dump(args: DumpArgs) -> Result<()> {
    let mut out = BufWriter::new(stdout().lock());
    if args.json {
        let decoded = read_w3d_file(&args.input)?;
        serde_json::to_writer_pretty(&mut out, &decoded.file)?;
        writeln!(out)?;
    } else {
        let data = map_file(&args.input)?;
        dump_chunks(&mut out, &data)?;
    }
    out.flush()?;
    Ok(())
}

fn info(args: InfoArgs) -> Result<()> {
    let decoded = read_w3d_file(&args.input)?;
    for chunk in &decoded.file.chunks {
        let name = chunk.name().unwrap_or("-");
        match chunk {
            W3dChunk::Mesh(mesh) => println!(
                "{:?} '{}': {} vertices, {} triangles, {} passes",
                chunk.kind(),
                mesh.full_name(),
                mesh.verts.len(),
                mesh.triangles.len(),
                mesh.material_passes.len()
            ),
            W3dChunk::Hierarchy(hierarchy) => {
                println!("{:?} '{}': {} pivots", chunk.kind(), name, hierarchy.pivots.len());
                for (i, pivot) in hierarchy.pivots.iter().enumerate() {
                    println!("  [{i}] {} (parent {})", pivot.name, pivot.parent_id);
                }
            }
            W3dChunk::Animation(animation) => println!(
                "{:?} '{}' on '{}': {} frames @ {} fps, {} channels",
                chunk.kind(),
                name,
                animation.header.hierarchy_name,
                animation.header.num_frames,
                animation.header.frame_rate,
                animation.channels.len()
            ),
            W3dChunk::CompressedAnimation(animation) => println!(
                "{:?} '{}' on '{}': {} frames @ {} fps, {:?}, {} channels",
                chunk.kind(),
                name,
                animation.header.hierarchy_name,
                animation.header.num_frames,
                animation.header.frame_rate,
                animation.header.flavor,
                animation.channels.len()
            ),
            W3dChunk::Hlod(hlod) => println!(
                "{:?} '{}' on '{}': {} LODs",
                chunk.kind(),
                name,
                hlod.header.hierarchy_name,
                hlod.lod_arrays.len()
            ),
            W3dChunk::Dazzle(dazzle) => {
                println!("{:?} '{}': {}", chunk.kind(), name, dazzle.type_name)
            }
            W3dChunk::CollisionBox(_) | W3dChunk::Opaque(_) => {
                println!("{:?} '{}'", chunk.kind(), name)
            }
        }
    }
    if !decoded.warnings.is_empty() {
        log::info!("{} warnings", decoded.warnings.len());
    }
    Ok(())
}

fn rewrite(args: RewriteArgs) -> Result<()> {
    let decoded = read_w3d_file(&args.input)?;
    let data = decoded.file.to_bytes()?;
    write_file(&args.output, &data)?;
    log::info!("Wrote {} ({} bytes)", args.output.display(), data.len());
    Ok(())
}

fn split(args: SplitArgs) -> Result<()> {
    let decoded = read_w3d_file(&args.input)?;
    let main_name = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Invalid input name '{}'", args.input.display()))?;
    DirBuilder::new().recursive(true).create(&args.out_dir)?;
    for (name, data) in decoded.file.split_individual(main_name)? {
        let path = args.out_dir.join(&name);
        write_file(&path, &data)?;
        log::info!("Wrote {} ({} bytes)", path.display(), data.len());
    }
    Ok(())
}
