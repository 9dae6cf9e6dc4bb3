//! bw-export - BigWorld asset export tool
//!
//! Converts a scene snapshot (JSON) into a BigWorld resource tree
//! (.model, .visual, .primitives, .animation, .mfm)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use bigworld_shared::fs::{read_file_with_limit, MAX_ASSET_BYTES};
use bigworld_shared::BIGWORLD_LAYOUT;
use bw_common::{decode_animation, decode_bsp, decode_primitives};
use bw_export::{ExportPipeline, ExportResult, ExportSettings, SceneSnapshot, UnitOutcome};

#[derive(Parser)]
#[command(name = "bw-export")]
#[command(about = "BigWorld asset export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every unit of a scene snapshot
    Export {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Export root directory
        #[arg(short, long)]
        output: PathBuf,

        /// Export settings (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Validate and build every unit without writing files
    Check {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Export settings (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Print the header of a .primitives, .animation or .bsp file
    Inspect {
        /// File to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            settings,
        } => {
            let pipeline = ExportPipeline::new(load_settings(settings.as_deref())?);
            let snapshot = SceneSnapshot::load(&scene)?;
            tracing::info!("Exporting {:?} -> {:?}", scene, output);

            let result = pipeline.export(&snapshot, &output)?;
            print_result(&result);
            if !result.is_success() {
                bail!("{} of {} units failed", result.failed().count(), result.reports.len());
            }
            tracing::info!("Done!");
        }

        Commands::Check { scene, settings } => {
            let pipeline = ExportPipeline::new(load_settings(settings.as_deref())?);
            let snapshot = SceneSnapshot::load(&scene)?;
            tracing::info!("Checking {:?}", scene);

            let result = pipeline.check(&snapshot)?;
            print_result(&result);
            if !result.is_success() {
                bail!("{} of {} units failed", result.failed().count(), result.reports.len());
            }
            tracing::info!("Scene is valid!");
        }

        Commands::Inspect { file } => inspect(&file)?,
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<ExportSettings> {
    match path {
        Some(path) => ExportSettings::load(path),
        None => Ok(ExportSettings::default()),
    }
}

fn print_result(result: &ExportResult) {
    for report in &result.reports {
        match &report.outcome {
            UnitOutcome::Exported => println!(
                "  ok      {} ({} files, {} warnings)",
                report.unit,
                report.files.len(),
                report.warnings.len()
            ),
            UnitOutcome::Failed(err) => {
                println!("  FAILED  {} [{}]: {}", report.unit, err.class(), err)
            }
            UnitOutcome::Cancelled => println!("  skipped {} (cancelled)", report.unit),
        }
        for warning in &report.warnings {
            println!("          warning: {}", warning);
        }
    }
    println!(
        "{} exported, {} failed, {} files",
        result.exported_count(),
        result.failed().count(),
        result.files().count()
    );
}

fn inspect(file: &Path) -> Result<()> {
    let bytes = read_file_with_limit(file, MAX_ASSET_BYTES)?;

    // Detect format by extension
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    if ext == BIGWORLD_LAYOUT.primitives_ext {
        let primitives = decode_primitives(&bytes)
            .with_context(|| format!("Failed to decode {}", file.display()))?;
        println!("{}", file.display());
        println!("  format:   {}", primitives.header.tag_str());
        println!("  stride:   {}", primitives.header.stride);
        println!("  vertices: {}", primitives.header.vertex_count);
        println!("  indices:  {}", primitives.header.index_count);
    } else if ext == BIGWORLD_LAYOUT.animation_ext {
        let animation = decode_animation(&bytes)
            .with_context(|| format!("Failed to decode {}", file.display()))?;
        let header = &animation.header;
        println!("{}", file.display());
        println!("  clip:       {}", header.name_str());
        println!("  tracks:     {}", header.track_count);
        println!("  frames:     {}", header.frame_count);
        println!("  frame rate: {}", header.frame_rate);
        println!("  duration:   {:.3}s", header.duration);
        println!("  looped:     {}", header.looped);
        println!("  keys:       {}", animation.tracks.iter().map(|t| t.keys.len()).sum::<usize>());
        println!("  markers:    {}", animation.markers.len());
    } else if ext == BIGWORLD_LAYOUT.bsp_ext {
        let bsp = decode_bsp(&bytes)
            .with_context(|| format!("Failed to decode {}", file.display()))?;
        println!("{}", file.display());
        println!("  nodes:     {}", bsp.nodes.len());
        println!("  leaves:    {}", bsp.nodes.iter().filter(|n| n.is_leaf()).count());
        println!("  triangles: {}", bsp.triangles.len());
        println!("  vertices:  {}", bsp.vertices.len());
    } else {
        bail!(
            "Unsupported file: {:?} (use .{}, .{} or .{})",
            file,
            BIGWORLD_LAYOUT.primitives_ext,
            BIGWORLD_LAYOUT.animation_ext,
            BIGWORLD_LAYOUT.bsp_ext
        );
    }

    Ok(())
}
