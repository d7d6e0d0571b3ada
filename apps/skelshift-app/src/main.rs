//! skelshift retargeting CLI.
//!
//! Provides three modes of operation:
//! - `check`: Load both skeletons and a mapping, print the resolved chains
//! - `suggest`: Print bone-pair suggestions between two rigs
//! - `run`: Retarget a TOML keyframe clip and print frame statistics

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use skelshift_core::SkelshiftError;
use skelshift_core::config::RetargetConfigFile;
use skelshift_retarget::{
    FrameDiagnostic, KeyframeClip, RetargetConfig, RetargetSession, RetargetedClip,
    suggest_bone_pairs,
};
use skelshift_skeleton::{Skeleton, load_skeleton, parse_urdf_file};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Skeleton-to-skeleton animation retargeting.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a mapping against two skeletons and print the chains.
    Check {
        /// Source skeleton (.toml description or .urdf).
        #[arg(short, long)]
        source: PathBuf,

        /// Target skeleton (.toml description or .urdf).
        #[arg(short, long)]
        target: PathBuf,

        /// Retarget configuration (TOML).
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Suggest target ← source bone pairs from names and reference directions.
    Suggest {
        #[arg(short, long)]
        source: PathBuf,

        #[arg(short, long)]
        target: PathBuf,
    },

    /// Retarget a keyframe clip.
    Run {
        #[arg(short, long)]
        source: PathBuf,

        #[arg(short, long)]
        target: PathBuf,

        #[arg(short, long)]
        config: PathBuf,

        /// Source keyframe clip (TOML).
        #[arg(long)]
        clip: PathBuf,

        /// Output frame rate; defaults to the configured sample rate.
        #[arg(short, long)]
        rate: Option<f32>,

        /// Worker threads.
        #[arg(short, long, default_value_t = 1)]
        workers: usize,

        /// Print the retargeted clip as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_rig(path: &Path) -> Result<Skeleton, SkelshiftError> {
    let is_urdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("urdf"));
    let skeleton = if is_urdf {
        parse_urdf_file(path)?
    } else {
        load_skeleton(path)?
    };
    tracing::info!(path = %path.display(), bones = skeleton.len(), "loaded skeleton");
    Ok(skeleton)
}

fn load_config(
    source: &Skeleton,
    target: &Skeleton,
    path: &Path,
) -> Result<RetargetConfig, SkelshiftError> {
    let file = RetargetConfigFile::from_file(path)?;
    RetargetConfig::build(source, target, &file)
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_check(source: &Path, target: &Path, config: &Path) -> Result<(), SkelshiftError> {
    let source = load_rig(source)?;
    let target = load_rig(target)?;
    let config = load_config(&source, &target, config)?;

    println!("chains: {}", config.mapping().len());
    for entry in config.mapping().entries() {
        let names = |skeleton: &Skeleton, bones: &[usize]| {
            bones
                .iter()
                .map(|&b| skeleton.name(b))
                .collect::<Vec<_>>()
                .join(" > ")
        };
        let mode = config
            .policy(entry.role)
            .map_or("?", |p| if p.is_ik() { "ik" } else { "fk" });
        println!(
            "  {:<12} {:<3} {}  ->  {}",
            entry.role.to_string(),
            mode,
            names(&source, &entry.source),
            names(&target, &entry.target),
        );
    }
    println!("translation ratio: {:.4}", config.translation_ratio());
    println!("pass-through candidates: {}", config.pass_through_pairs().len());
    Ok(())
}

fn run_suggest(source: &Path, target: &Path) -> Result<(), SkelshiftError> {
    let source = load_rig(source)?;
    let target = load_rig(target)?;
    let pairs = suggest_bone_pairs(&source, &target);
    for pair in &pairs {
        println!(
            "{:<24} <- {:<24} {:.2}",
            target.name(pair.target),
            source.name(pair.source),
            pair.score
        );
    }
    println!("\n{} of {} target bones paired", pairs.len(), target.len());
    Ok(())
}

#[derive(Default)]
struct DiagnosticCounts {
    clamped_time: usize,
    wrapped_time: usize,
    clamped_goals: usize,
}

impl DiagnosticCounts {
    fn add(&mut self, diagnostic: &FrameDiagnostic) {
        match diagnostic {
            FrameDiagnostic::TimeClamped { .. } => self.clamped_time += 1,
            FrameDiagnostic::TimeWrapped { .. } => self.wrapped_time += 1,
            FrameDiagnostic::GoalClamped { .. } => self.clamped_goals += 1,
        }
    }
}

fn run_retarget(
    source: &Path,
    target: &Path,
    config: &Path,
    clip: &Path,
    rate: Option<f32>,
    workers: usize,
    json: bool,
) -> Result<(), SkelshiftError> {
    let source = load_rig(source)?;
    let target = load_rig(target)?;
    let config = load_config(&source, &target, config)?;
    let animation = KeyframeClip::from_file(clip)?;
    let rate = rate.unwrap_or_else(|| config.sample_rate());
    let session = RetargetSession::new(&source, &target, &config);

    let name = config.name_rule().apply(&animation.name);
    let mut output = RetargetedClip::new(name, &target, rate, animation.duration.max(0.0))?;
    let mut counts = DiagnosticCounts::default();

    if workers > 1 {
        for frame in session.run_parallel(&animation, rate, workers)? {
            frame.diagnostics.iter().for_each(|d| counts.add(d));
            output.push_frame(frame.time, &frame.pose);
        }
    } else {
        for frame in session.run(&animation, rate)? {
            let frame = frame?;
            frame.diagnostics.iter().for_each(|d| counts.add(d));
            output.push_frame(frame.time, &frame.pose);
        }
    }

    if json {
        println!("{}", output.to_json()?);
    } else {
        println!("clip: {}", output.name);
        println!("frames: {} at {rate} fps", output.frame_count());
        println!(
            "diagnostics: {} time clamped, {} time wrapped, {} goals clamped",
            counts.clamped_time, counts.wrapped_time, counts.clamped_goals
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check {
            source,
            target,
            config,
        } => run_check(&source, &target, &config),
        Commands::Suggest { source, target } => run_suggest(&source, &target),
        Commands::Run {
            source,
            target,
            config,
            clip,
            rate,
            workers,
            json,
        } => run_retarget(&source, &target, &config, &clip, rate, workers, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
