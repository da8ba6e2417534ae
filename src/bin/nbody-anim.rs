use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nbody-anim", version)]
struct Cli {
    /// JSON file overriding rendering tunables (marker sizes, padding, fps, canvas, colours).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log per-frame progress and skipped lines.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the whole log into a GIF (default) or MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Print the per-frame render parameters as JSON lines.
    Params(ParamsArgs),
}

#[derive(Args, Debug, Clone)]
struct InputArg {
    /// Simulation log: `x,y,mass` lines, blank line between steps.
    #[arg(long = "in", default_value = nbody_anim::DEFAULT_INPUT)]
    in_path: PathBuf,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: InputArg,

    /// Output path; the extension selects the format.
    #[arg(long, default_value = nbody_anim::DEFAULT_OUTPUT)]
    out: PathBuf,

    /// Override the presentation rate (frames per second).
    #[arg(long)]
    fps: Option<u32>,

    /// Fail instead of replacing an existing output file.
    #[arg(long)]
    no_overwrite: bool,
}

impl Default for RenderArgs {
    fn default() -> Self {
        Self {
            input: InputArg {
                in_path: PathBuf::from(nbody_anim::DEFAULT_INPUT),
            },
            out: PathBuf::from(nbody_anim::DEFAULT_OUTPUT),
            fps: None,
            no_overwrite: false,
        }
    }
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    input: InputArg,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ParamsArgs {
    #[command(flatten)]
    input: InputArg,

    /// Write to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => nbody_anim::AnimConfig::from_json_file(path)?,
        None => nbody_anim::AnimConfig::default(),
    };

    match cli.cmd.unwrap_or_else(|| Command::Render(RenderArgs::default())) {
        Command::Render(args) => cmd_render(args, cfg),
        Command::Frame(args) => cmd_frame(args, cfg),
        Command::Params(args) => cmd_params(args, cfg),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the run and report it the way every command does. `None` when there is nothing to draw.
fn load_run(path: &Path) -> anyhow::Result<Option<nbody_anim::Run>> {
    let run = nbody_anim::Run::from_path(path)?;
    if run.is_empty() {
        println!("No data found.");
        return Ok(None);
    }
    println!("Loaded {} frames.", run.len());
    println!("Global Max Mass: {}", run.global_max_mass());
    Ok(Some(run))
}

fn cmd_render(args: RenderArgs, mut cfg: nbody_anim::AnimConfig) -> anyhow::Result<()> {
    if let Some(fps) = args.fps {
        cfg.fps = nbody_anim::Fps::integer(fps)?;
    }

    let outcome = nbody_anim::animate(&args.input.in_path, &args.out, &cfg, !args.no_overwrite)
        .with_context(|| format!("render '{}'", args.out.display()))?;
    match outcome {
        nbody_anim::AnimateOutcome::NoData => println!("No data found."),
        nbody_anim::AnimateOutcome::Rendered {
            frames,
            global_max_mass,
        } => {
            println!("Loaded {frames} frames.");
            println!("Global Max Mass: {global_max_mass}");
            eprintln!("wrote {}", args.out.display());
        }
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs, cfg: nbody_anim::AnimConfig) -> anyhow::Result<()> {
    let Some(run) = load_run(&args.input.in_path)? else {
        return Ok(());
    };

    let rasterizer = nbody_anim::Rasterizer::new(cfg)?;
    let frame =
        nbody_anim::render_frame(&run, nbody_anim::FrameIndex(args.frame), &rasterizer)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_params(args: ParamsArgs, cfg: nbody_anim::AnimConfig) -> anyhow::Result<()> {
    let run = nbody_anim::Run::from_path(&args.input.in_path)?;
    let params = nbody_anim::frame_parameters(&run, &cfg);

    let mut out: Box<dyn std::io::Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create '{}'", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    for p in &params {
        serde_json::to_writer(&mut out, p).context("serialize render parameters")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
