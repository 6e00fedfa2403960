use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_audit::{AuditStore, HISTORY_LIMIT};
use facegate_core::{frame, DetectionMode, FaceEncoder, FirstMatchMatcher, Gallery, MatchResult, Matcher};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate face login tooling")]
struct Cli {
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    /// Detector resolution: fast or accurate
    #[arg(long, global = true, default_value = "fast")]
    mode: DetectionMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the enrollment directory and list the identities it yields
    Gallery {
        #[arg(short, long, default_value = "known_faces")]
        dir: PathBuf,
    },
    /// Match a single image against the gallery, as a login would
    Identify {
        /// Image file to identify
        image: PathBuf,
        #[arg(short, long, default_value = "known_faces")]
        dir: PathBuf,
        /// Maximum descriptor distance for a match
        #[arg(short, long, default_value_t = facegate_core::DEFAULT_TOLERANCE)]
        tolerance: f32,
    },
    /// Print recent successful logins
    History {
        #[arg(long, default_value = "login_history.db")]
        db: PathBuf,
        #[arg(short = 'n', long, default_value_t = HISTORY_LIMIT)]
        limit: usize,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let models = cli.models.unwrap_or_else(facegate_core::default_model_dir);

    match cli.command {
        Commands::Gallery { dir } => {
            let mut encoder = load_encoder(&models, cli.mode)?;
            let gallery = Gallery::load(&dir, &mut encoder)?;
            if gallery.is_empty() {
                println!("No identities enrolled in {}", dir.display());
            }
            for (i, label) in gallery.labels().enumerate() {
                println!("{:>3}  {label}", i + 1);
            }
        }
        Commands::Identify {
            image,
            dir,
            tolerance,
        } => {
            let mut encoder = load_encoder(&models, cli.mode)?;
            let gallery = Gallery::load(&dir, &mut encoder)?;
            let frame = frame::load_image_file(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let probes = encoder.encode(&frame)?;
            println!("faces detected: {}", probes.len());

            match FirstMatchMatcher::new(tolerance).identify(&probes, &gallery) {
                MatchResult::Matched { identity, distance } => {
                    println!("match: {identity} (distance {distance:.3})");
                }
                MatchResult::NoMatch => println!("no match"),
            }
        }
        Commands::History { db, limit, json } => {
            let store = AuditStore::open_existing(&db)
                .await
                .with_context(|| format!("opening {}", db.display()))?;
            let records = store.recent(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No logins recorded");
            } else {
                for r in &records {
                    println!("{:>5}  {:<24}  {}", r.id, r.username, r.display_timestamp());
                }
            }
            store.close().await?;
        }
    }

    Ok(())
}

fn load_encoder(models: &Path, mode: DetectionMode) -> Result<facegate_core::OnnxFaceEncoder> {
    facegate_core::load_encoder(models, mode)
        .with_context(|| format!("loading models from {}", models.display()))
}
