use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use webptune::{BatchThreading, Settings, ZoomSpec};

#[derive(Parser, Debug)]
#[command(name = "webptune", version)]
struct Cli {
    /// Settings JSON providing defaults for every subcommand.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every quality probe.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PNG file, or every PNG in a directory, to WebP.
    Convert(ConvertArgs),
    /// Blend two images along a diagonal seam into one size-capped WebP.
    Merge(MergeArgs),
    /// Write a center-zoomed (or center-cropped) WebP of one image.
    Zoom(ZoomArgs),
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input PNG file or directory.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory (default: next to the input file, or `<input>/webp` for a directory).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Lowest quality the search may pick (1-100).
    #[arg(long)]
    min_quality: Option<u8>,

    /// Also write a centered crop covering 1/N of the image.
    #[arg(long, conflicts_with_all = ["zoom", "no_variant"])]
    crop_ratio: Option<u32>,

    /// Also write a fixed center zoom (settings `zoom`, 1.5x to 960x540 by default).
    #[arg(long, conflicts_with = "no_variant")]
    zoom: bool,

    /// Do not write a second artifact.
    #[arg(long)]
    no_variant: bool,

    /// Convert directory entries in parallel.
    #[arg(long)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct MergeArgs {
    /// Image shown on the left of the seam.
    #[arg(long)]
    left: PathBuf,

    /// Image shown on the right of the seam.
    #[arg(long)]
    right: PathBuf,

    /// Output WebP path.
    #[arg(long)]
    out: PathBuf,

    /// Width of the final 16:9 canvas.
    #[arg(long)]
    final_width: Option<u32>,

    /// Size budget in KiB.
    #[arg(long)]
    target_kb: Option<u64>,

    #[arg(long)]
    min_quality: Option<u8>,

    #[arg(long)]
    max_quality: Option<u8>,
}

#[derive(Parser, Debug)]
struct ZoomArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output WebP path.
    #[arg(long)]
    out: PathBuf,

    /// Upscale factor.
    #[arg(long)]
    scale: Option<f64>,

    /// Crop width.
    #[arg(long)]
    width: Option<u32>,

    /// Crop height.
    #[arg(long)]
    height: Option<u32>,

    /// Crop 1/N of the area instead of zooming.
    #[arg(long, conflicts_with_all = ["scale", "width", "height"])]
    crop_ratio: Option<u32>,

    #[arg(long)]
    min_quality: Option<u8>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::from_path(path)
            .with_context(|| format!("load settings '{}'", path.display()))?,
        None => Settings::default(),
    };

    match cli.cmd {
        Command::Convert(args) => cmd_convert(args, &settings),
        Command::Merge(args) => cmd_merge(args, &settings),
        Command::Zoom(args) => cmd_zoom(args, &settings),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "webptune=debug"
    } else {
        "webptune=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_convert(args: ConvertArgs, settings: &Settings) -> anyhow::Result<()> {
    let mut opts = settings.convert.clone();
    if let Some(q) = args.min_quality {
        opts.min_quality = q;
    }
    if args.no_variant {
        opts.variant = None;
    } else if let Some(n) = args.crop_ratio {
        opts.variant = Some(ZoomSpec::CropRatio(n));
    } else if args.zoom {
        opts.variant = Some(settings.zoom);
    }

    let threading = BatchThreading {
        parallel: args.parallel || settings.batch.parallel,
        threads: args.threads.or(settings.batch.threads),
    };
    let codec = webptune::create_codec(&settings.codec);

    if args.in_path.is_file() {
        let output =
            webptune::resolve_output(&args.in_path, args.out.as_deref(), codec.extension())?;
        webptune::convert_file(&args.in_path, &output, &opts, codec.as_ref())
            .with_context(|| format!("convert '{}'", args.in_path.display()))?;
        eprintln!("wrote {}", output.display());
        return Ok(());
    }

    let jobs = webptune::plan_batch(&args.in_path, args.out.as_deref(), codec.extension())
        .with_context(|| format!("plan conversion of '{}'", args.in_path.display()))?;
    if jobs.is_empty() {
        eprintln!("no .png files in {}", args.in_path.display());
        return Ok(());
    }

    let report = webptune::run_batch(&jobs, &opts, codec.as_ref(), &threading)?;
    for failure in &report.failed {
        eprintln!("failed {}: {}", failure.input.display(), failure.error);
    }
    eprintln!(
        "converted {} of {} files",
        report.succeeded.len(),
        report.total()
    );
    if !report.is_clean() {
        anyhow::bail!("{} of {} conversions failed", report.failed.len(), report.total());
    }
    Ok(())
}

fn cmd_merge(args: MergeArgs, settings: &Settings) -> anyhow::Result<()> {
    let mut opts = settings.merge.clone();
    if let Some(w) = args.final_width {
        opts.final_width = w;
    }
    if let Some(kb) = args.target_kb {
        opts.target_kb = kb;
    }
    if let Some(q) = args.min_quality {
        opts.min_quality = q;
    }
    if let Some(q) = args.max_quality {
        opts.max_quality = q;
    }

    let codec = webptune::create_codec(&settings.codec);
    let report = webptune::merge_files(&args.left, &args.right, &args.out, &opts, codec.as_ref())
        .with_context(|| {
            format!(
                "merge '{}' + '{}'",
                args.left.display(),
                args.right.display()
            )
        })?;

    eprintln!(
        "wrote {} ({}x{}, quality {}, {} bytes)",
        report.output.display(),
        report.width,
        report.height,
        report.quality,
        report.size
    );
    Ok(())
}

fn cmd_zoom(args: ZoomArgs, settings: &Settings) -> anyhow::Result<()> {
    let fixed_flags = args.scale.is_some() || args.width.is_some() || args.height.is_some();
    let spec = match args.crop_ratio {
        Some(n) => ZoomSpec::CropRatio(n),
        None if !fixed_flags => settings.zoom,
        None => {
            let (scale, width, height) = match settings.zoom {
                ZoomSpec::Fixed {
                    scale,
                    width,
                    height,
                } => (scale, width, height),
                ZoomSpec::CropRatio(_) => (
                    webptune::zoom::DEFAULT_ZOOM_SCALE,
                    webptune::zoom::DEFAULT_ZOOM_WIDTH,
                    webptune::zoom::DEFAULT_ZOOM_HEIGHT,
                ),
            };
            ZoomSpec::Fixed {
                scale: args.scale.unwrap_or(scale),
                width: args.width.unwrap_or(width),
                height: args.height.unwrap_or(height),
            }
        }
    };

    let mut opts = settings.convert.clone();
    if let Some(q) = args.min_quality {
        opts.min_quality = q;
    }

    let codec = webptune::create_codec(&settings.codec);
    let report = webptune::zoom_file(&args.in_path, &args.out, &spec, &opts, codec.as_ref())
        .with_context(|| format!("zoom '{}'", args.in_path.display()))?;

    eprintln!(
        "wrote {} ({}x{}, quality {})",
        report.output.display(),
        report.width,
        report.height,
        report.quality
    );
    Ok(())
}
