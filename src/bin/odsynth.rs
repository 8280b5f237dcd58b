use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use odsynth::depth::{raw, rvl};
use odsynth::encode::sink::{FrameSink, PngSink, PngSinkOpts, SinkConfig};
use odsynth::rig::loader::decode_depth;
use odsynth::{
    CameraRig, Dimensions, OdsResult, PointSplat, RigManifest, SelectionStrategy, StereoFrame,
    SynthesisOpts, SynthesisThreading, Synthesizer, Vec3, ViewParams,
};
use sha2::Digest as _;

#[derive(Parser, Debug)]
#[command(name = "odsynth", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize ODS stereo frames for one or more query positions.
    Synth(SynthArgs),
    /// Print header and statistics of a depth file.
    InspectDepth(InspectDepthArgs),
    /// Compress a raw f32 depth file to RVL.
    EncodeDepth(EncodeDepthArgs),
    /// Compare a synthesized stereo PNG against a reference.
    Compare(CompareArgs),
}

#[derive(Parser, Debug)]
struct SynthArgs {
    /// Rig manifest JSON.
    #[arg(long)]
    rig: PathBuf,

    /// Query position `x,y,z`. Repeat to render a camera path.
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true, required = true)]
    position: Vec<Vec3>,

    /// Number of reference views to blend (defaults to the manifest's `max_views`).
    #[arg(long)]
    k: Option<usize>,

    /// Inter-pupillary distance in meters.
    #[arg(long)]
    ipd: Option<f32>,

    /// Projection sphere radius in meters.
    #[arg(long)]
    focal_dist: Option<f32>,

    /// View selection strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyChoice>,

    /// Point splatting mode.
    #[arg(long, value_enum, default_value_t = SplatChoice::Single)]
    splat: SplatChoice,

    /// Depth handicap per selection rank in meters.
    #[arg(long, default_value_t = odsynth::render::synth::DEFAULT_VIEW_DEPTH_BIAS)]
    view_depth_bias: f32,

    /// Scatter on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// Worker thread count for `--parallel`.
    #[arg(long)]
    threads: Option<usize>,

    /// Output PNG path (stacked left/right eyes).
    #[arg(long)]
    out: PathBuf,

    /// Optional 16-bit depth PNG output path.
    #[arg(long)]
    depth_out: Option<PathBuf>,

    /// Depth mapped to white in the depth PNG.
    #[arg(long, default_value_t = 50.0)]
    z_max: f32,

    /// Print a SHA-256 of each frame's color buffer.
    #[arg(long)]
    digest: bool,
}

#[derive(Parser, Debug)]
struct InspectDepthArgs {
    /// Depth file (`.rvl`, or `.depth` with `--width/--height/--near/--far`).
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    raw: RawDepthArgs,
}

#[derive(Parser, Debug)]
struct EncodeDepthArgs {
    /// Raw little-endian f32 depth file.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    raw: RawDepthArgs,

    /// Output RVL path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(clap::Args, Debug)]
struct RawDepthArgs {
    /// Width of a raw depth buffer.
    #[arg(long)]
    width: Option<u32>,
    /// Height of a raw depth buffer.
    #[arg(long)]
    height: Option<u32>,
    /// Near clip of a raw depth buffer.
    #[arg(long)]
    near: Option<f32>,
    /// Far clip of a raw depth buffer.
    #[arg(long)]
    far: Option<f32>,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    /// Ground-truth stereo PNG.
    #[arg(long)]
    reference: PathBuf,

    /// Synthesized stereo PNG.
    #[arg(long)]
    candidate: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyChoice {
    DiversityFirst,
    FixedPairFirst,
    Nearest,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SplatChoice {
    Single,
    Adaptive,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Synth(args) => cmd_synth(args),
        Command::InspectDepth(args) => cmd_inspect_depth(args),
        Command::EncodeDepth(args) => cmd_encode_depth(args),
        Command::Compare(args) => cmd_compare(args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("ODSYNTH_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z (got '{s}')"));
    };
    let num = |v: &str| {
        v.parse::<f32>()
            .map_err(|e| format!("invalid coordinate '{v}': {e}"))
    };
    Ok(Vec3::new(num(*x)?, num(*y)?, num(*z)?))
}

fn cmd_synth(args: SynthArgs) -> anyhow::Result<()> {
    let manifest = RigManifest::from_path(&args.rig)?;
    let root = args.rig.parent().unwrap_or_else(|| Path::new("."));
    let rig = CameraRig::load(&manifest, root)
        .with_context(|| format!("load rig '{}'", args.rig.display()))?;

    let defaults = &manifest.synthesis;
    let strategy = match args.strategy {
        Some(StrategyChoice::DiversityFirst) => SelectionStrategy::DiversityFirst,
        Some(StrategyChoice::FixedPairFirst) => SelectionStrategy::FixedPairFirst,
        Some(StrategyChoice::Nearest) => SelectionStrategy::Nearest,
        None => defaults.strategy,
    };
    let opts = SynthesisOpts {
        strategy,
        threading: SynthesisThreading {
            parallel: args.parallel,
            threads: args.threads,
        },
        splat: match args.splat {
            SplatChoice::Single => PointSplat::Single,
            SplatChoice::Adaptive => PointSplat::Adaptive,
        },
        view_depth_bias: args.view_depth_bias,
    };
    let params = ViewParams::new(
        args.k.unwrap_or_else(|| defaults.max_views_for(rig.num_views())),
        args.ipd.unwrap_or(defaults.ipd),
        args.focal_dist.unwrap_or(defaults.focal_dist),
    );

    let synth = Synthesizer::new(&rig, opts)?;
    let mut png = PngSink::new(PngSinkOpts {
        color_path: args.out.clone(),
        depth_path: args.depth_out.clone(),
        z_max: args.z_max,
    })?;
    let frames = if args.digest {
        let mut sink = DigestSink {
            inner: &mut png,
            digests: Vec::new(),
        };
        let frames = synth.synthesize_path(&args.position, &params, &mut sink)?;
        for (i, digest) in sink.digests.iter().enumerate() {
            println!("frame {i} sha256 {digest}");
        }
        frames
    } else {
        synth.synthesize_path(&args.position, &params, &mut png)?
    };
    for path in png.written() {
        eprintln!("wrote {}", path.display());
    }
    eprintln!("synthesized {frames} frame(s) from {} views", rig.num_views());
    Ok(())
}

/// Forwards frames and records a SHA-256 of each color buffer.
struct DigestSink<'a> {
    inner: &'a mut dyn FrameSink,
    digests: Vec<String>,
}

impl FrameSink for DigestSink<'_> {
    fn begin(&mut self, cfg: SinkConfig) -> OdsResult<()> {
        self.digests.clear();
        self.inner.begin(cfg)
    }

    fn push_frame(&mut self, idx: u64, frame: &StereoFrame) -> OdsResult<()> {
        self.digests.push(sha256_hex(frame.color_rgba8()));
        self.inner.push_frame(idx, frame)
    }

    fn end(&mut self) -> OdsResult<()> {
        self.inner.end()
    }
}

fn raw_params(raw: &RawDepthArgs) -> anyhow::Result<(Dimensions, f32, f32)> {
    match (raw.width, raw.height, raw.near, raw.far) {
        (Some(w), Some(h), Some(near), Some(far)) => Ok((Dimensions::new(w, h)?, near, far)),
        _ => anyhow::bail!("raw depth needs --width, --height, --near and --far"),
    }
}

fn cmd_inspect_depth(args: InspectDepthArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read '{}'", args.in_path.display()))?;
    let sample = if args.in_path.extension().is_some_and(|e| e == "rvl") {
        rvl::decode(&bytes)?
    } else {
        let (dims, near, far) = raw_params(&args.raw)?;
        decode_depth(&args.in_path, &bytes, dims, Some((near, far)))?
    };

    let dims = sample.dimensions();
    let (min, max) = sample
        .values()
        .iter()
        .filter(|&&d| d < sample.far())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &d| {
            (lo.min(d), hi.max(d))
        });
    let total = dims.pixel_count();
    println!("dimensions: {}x{}", dims.width, dims.height);
    println!("near/far:   {} / {}", sample.near(), sample.far());
    println!(
        "valid:      {} of {} ({:.2}%)",
        sample.valid_count(),
        total,
        100.0 * sample.valid_count() as f64 / total as f64
    );
    if sample.valid_count() > 0 {
        println!("depth:      {min} .. {max}");
    }
    Ok(())
}

fn cmd_encode_depth(args: EncodeDepthArgs) -> anyhow::Result<()> {
    let (dims, near, far) = raw_params(&args.raw)?;
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read '{}'", args.in_path.display()))?;
    let sample = raw::decode_raw_f32(&bytes, dims, near, far)?;
    let encoded = rvl::encode(&sample);

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &encoded)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} ({} -> {} bytes, {:.1}x)",
        args.out.display(),
        bytes.len(),
        encoded.len(),
        bytes.len() as f64 / encoded.len() as f64
    );
    Ok(())
}

fn load_rgba(path: &Path) -> anyhow::Result<image::RgbaImage> {
    Ok(image::open(path)
        .with_context(|| format!("open image '{}'", path.display()))?
        .to_rgba8())
}

fn cmd_compare(args: CompareArgs) -> anyhow::Result<()> {
    let reference = load_rgba(&args.reference)?;
    let candidate = load_rgba(&args.candidate)?;
    if reference.dimensions() != candidate.dimensions() {
        anyhow::bail!(
            "image dimensions differ: {:?} vs {:?}",
            reference.dimensions(),
            candidate.dimensions()
        );
    }
    let (width, height) = candidate.dimensions();
    if height % 2 != 0 {
        anyhow::bail!("stereo image height must be even (got {height})");
    }

    let psnr = odsynth::psnr(reference.as_raw(), candidate.as_raw())?;
    let psnr_valid = odsynth::psnr_valid(reference.as_raw(), candidate.as_raw())?;
    let holes =
        odsynth::analysis::quality::hole_coverage_rgba8(width, height / 2, candidate.as_raw())?;

    println!("psnr:            {psnr:.2} dB");
    match psnr_valid {
        Some(v) => println!("psnr (covered):  {v:.2} dB"),
        None => println!("psnr (covered):  n/a (no covered pixels)"),
    }
    println!("pixel holes:     {:.3}%", 100.0 * holes.pixel_fraction);
    println!("projected holes: {:.3}%", 100.0 * holes.projected_area_fraction);
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
