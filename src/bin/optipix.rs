//! optipix CLI - batch PNG/JPEG optimizer with WebP siblings.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use optipix::{
    is_supported_input, DownscaleRecompressor, ImageFormat, InputFile, NativeCodec,
    OptimizationResult, Optimizer, PolicyTable, Progress, Recompressor,
};

/// Shrink PNG and JPEG files with a single optimization dial and write a
/// WebP version of each next to it.
#[derive(Parser, Debug)]
#[command(name = "optipix")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input images (PNG or JPEG)
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// WebP quality (0-100)
    #[arg(short, long, default_value = "80", value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,

    /// Optimization level (0-100, higher = smaller PNG palettes)
    #[arg(short, long, default_value = "70", value_parser = clap::value_parser!(u8).range(0..=100))]
    level: u8,

    /// Directory for optimized files
    #[arg(short, long, value_name = "DIR", default_value = "optimized")]
    out_dir: PathBuf,

    /// JSON policy table overriding the tuned defaults
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,

    /// Generic recompressor run after the filter search
    #[arg(long, value_enum, default_value = "none")]
    recompressor: RecompressorArg,

    /// Worker threads for the batch
    #[cfg(feature = "parallel")]
    #[arg(short, long, default_value = "1")]
    jobs: usize,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RecompressorArg {
    /// Skip recompression
    None,
    /// Budgeted re-encode that may downscale (reverted if it does)
    Downscale,
    /// Lossless oxipng pass (requires the `oxipng` feature)
    Oxipng,
}

impl RecompressorArg {
    fn build(self, codec: NativeCodec) -> Result<Option<Box<dyn Recompressor>>, String> {
        match self {
            RecompressorArg::None => Ok(None),
            RecompressorArg::Downscale => Ok(Some(Box::new(DownscaleRecompressor::new(codec)))),
            #[cfg(feature = "oxipng")]
            RecompressorArg::Oxipng => Ok(Some(Box::new(
                optipix::recompress::OxipngRecompressor::default(),
            ))),
            #[cfg(not(feature = "oxipng"))]
            RecompressorArg::Oxipng => {
                Err("optipix was built without the oxipng feature".to_string())
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let policy = match &args.policy {
        Some(path) => PolicyTable::from_path(path)?,
        None => PolicyTable::default(),
    };
    let codec = NativeCodec::new(policy.compression_level);

    let mut files = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        let mime = ImageFormat::sniff(&bytes).map(ImageFormat::mime_type);
        if !is_supported_input(&name, mime) {
            log::warn!("skipping {}: not a PNG or JPEG file", path.display());
            continue;
        }
        let file = InputFile::new(name, bytes);
        files.push(match mime {
            Some(mime) => file.with_mime(mime),
            None => file,
        });
    }
    if files.is_empty() {
        return Err("no readable PNG or JPEG inputs".into());
    }

    let mut optimizer = Optimizer::new(codec).with_policy(policy);
    if let Some(recompressor) = args.recompressor.build(codec)? {
        optimizer = optimizer.with_recompressor(recompressor);
    }

    let start = Instant::now();
    let mut report = |p: Progress| log::info!("[{}/{}] {}", p.index, p.total, p.name);
    #[cfg(feature = "parallel")]
    let results = if args.jobs > 1 {
        optimizer.process_batch_parallel(
            &files,
            args.quality,
            args.level,
            args.jobs,
            Some(&mut report),
        )
    } else {
        optimizer.process_batch(&files, args.quality, args.level, Some(&mut report))
    };
    #[cfg(not(feature = "parallel"))]
    let results = optimizer.process_batch(&files, args.quality, args.level, Some(&mut report));
    let elapsed = start.elapsed();

    fs::create_dir_all(&args.out_dir)?;
    let mut taken = HashSet::new();
    for result in &results {
        let optimized_name = claim_name(&mut taken, &result.optimized_name);
        let webp_name = claim_name(&mut taken, &result.webp_name);
        fs::write(args.out_dir.join(&optimized_name), &result.optimized_bytes)?;
        fs::write(args.out_dir.join(&webp_name), &result.webp_bytes)?;
        print_result(result, &optimized_name, &webp_name);
    }

    let original: usize = results.iter().map(|r| r.original_size).sum();
    let optimized: usize = results.iter().map(|r| r.optimized_size).sum();
    println!(
        "{} of {} files, {} -> {} ({:.1}% saved) in {:.2?}",
        results.len(),
        files.len(),
        format_size(original as u64),
        format_size(optimized as u64),
        percent_saved(original, optimized),
        elapsed
    );

    if results.is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_result(result: &OptimizationResult, optimized_name: &str, webp_name: &str) {
    println!(
        "{} -> {}: {} -> {} ({:.1}% saved), {}: {}",
        result.original_name,
        optimized_name,
        format_size(result.original_size as u64),
        format_size(result.optimized_size as u64),
        percent_saved(result.original_size, result.optimized_size),
        webp_name,
        format_size(result.webp_size as u64)
    );
}

/// Reserve an output file name, suffixing `-1`, `-2`, ... before the
/// extension when `name` was already written in this run.
fn claim_name(taken: &mut HashSet<String>, name: &str) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if taken.insert(candidate.clone()) {
            log::warn!("{name} already written, saving as {candidate}");
            return candidate;
        }
        n += 1;
    }
}

fn percent_saved(original: usize, optimized: usize) -> f64 {
    if original == 0 {
        0.0
    } else {
        (1.0 - optimized as f64 / original as f64) * 100.0
    }
}

/// Format byte size in human-readable form.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
