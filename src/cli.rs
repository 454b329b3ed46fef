//
// cli.rs
// seriesnav
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::archive;
use crate::frames::FrameValueMode;
use crate::render::{actual_frame_number, sample_indices};
use crate::session::{FrameOptions, SessionStore};
use crate::web;

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "seriesnav")]
#[command(about = "DICOM series assembly and frame rendering", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble series from a ZIP archive or directory and print a summary
    Inspect {
        input: PathBuf,
        /// Normalize frame values to 0-255 at extraction time
        #[arg(long)]
        auto_normalize: bool,
        /// Print a sub-sampled frame index table for oversized series
        #[arg(long)]
        max_sampled_frames: Option<usize>,
    },
    /// Render one frame of a series to a PNG file
    Render {
        input: PathBuf,
        /// Series Instance UID to render from
        #[arg(long)]
        series: String,
        /// Zero-based frame index
        #[arg(long, default_value_t = 0)]
        frame: usize,
        #[arg(long)]
        window_width: Option<f32>,
        #[arg(long)]
        window_level: Option<f32>,
        #[arg(long, default_value_t = 100)]
        zoom: u32,
        #[arg(long, default_value_t = 1024)]
        max_dim: u32,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the web server
    Web {
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value_t = 8116)]
        port: u16,
    },
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            input,
            auto_normalize,
            max_sampled_frames,
        } => {
            let mode = if auto_normalize {
                FrameValueMode::AutoNormalized
            } else {
                FrameValueMode::Native
            };
            let series = archive::ingest_path(&input, mode)?;
            if series.is_empty() {
                println!("No DICOM series found in {input:?}");
                return Ok(());
            }
            for (uid, series) in &series {
                let meta = &series.metadata;
                println!(
                    "{} | {} {} | {} ({}) | {} frame(s)",
                    uid,
                    meta.modality,
                    meta.series_description,
                    meta.patient_name,
                    meta.patient_id,
                    series.frame_count()
                );
                if let Some(max_sampled) = max_sampled_frames {
                    let sampled = sample_indices(series.frame_count(), max_sampled);
                    if sampled.len() < series.frame_count() {
                        let numbers: Vec<usize> = (0..sampled.len())
                            .map(|i| actual_frame_number(i, series.frame_count(), sampled.len()))
                            .collect();
                        println!("  sampled to {} frame(s): {:?}", sampled.len(), numbers);
                    }
                }
            }
        }
        Commands::Render {
            input,
            series: series_uid,
            frame,
            window_width,
            window_level,
            zoom,
            max_dim,
            output,
        } => {
            let window = parse_window(window_width, window_level)?;
            let series = archive::ingest_path(&input, FrameValueMode::Native)?;
            if !series.contains_key(&series_uid) {
                bail!("Series {series_uid} not found in {input:?}");
            }

            // The session store gives us the same cache-backed render path
            // the web API uses.
            let store = SessionStore::new();
            let session_id = store.create(series, series_uid.as_bytes());
            let payload = store.frame_png(
                &session_id,
                &series_uid,
                frame,
                FrameOptions {
                    window,
                    zoom_percent: Some(zoom),
                    max_dimension: Some(max_dim),
                    instant: false,
                },
            )?;

            let output = output.unwrap_or_else(|| PathBuf::from(format!("frame_{frame:04}.png")));
            std::fs::write(&output, &payload.png)
                .with_context(|| format!("Failed to write {output:?}"))?;
            println!(
                "Saved frame {}/{} ({}x{}) to {:?}",
                frame + 1,
                payload.total_frames,
                payload.width,
                payload.height,
                output
            );
        }
        Commands::Web { host, port } => web::start_server(&host, port).await?,
    }

    Ok(())
}

fn parse_window(width: Option<f32>, level: Option<f32>) -> anyhow::Result<Option<(f32, f32)>> {
    // Windowing requires both parameters to make sense; reject mismatched input early.
    match (width, level) {
        (Some(w), Some(l)) => Ok(Some((w, l))),
        (None, None) => Ok(None),
        _ => Err(anyhow!(
            "Provide both --window-width and --window-level, or neither"
        )),
    }
}
