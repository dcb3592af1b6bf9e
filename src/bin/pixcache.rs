//! pixcache: command-line front end for the image cache.
//!
//! Generates (or fetches from the cache) pixel-art images for prompts,
//! records votes, and dumps everything stored for a prompt.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use pixcache::config::Config;
use pixcache::generator::HttpGenerator;
use pixcache::{BlockingGenerator, ImageGenerator, PixcacheError, Pipeline, Swatch, Vote};

/// Prompt-keyed pixel-art image cache.
#[derive(Parser)]
#[command(name = "pixcache")]
#[command(version = pixcache::PKG_VERSION)]
#[command(about = "Prompt-keyed pixel-art image cache")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generator endpoint (overrides the config file).
    #[arg(long, env = "PIXCACHE_GENERATOR_URL")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a prompt to a 512x512 pixel-art PNG
    Generate {
        /// Prompt text
        prompt: String,
        /// Output file
        #[arg(short, long, default_value = "pixel.png")]
        out: PathBuf,
    },

    /// Vote on a cached prompt
    Vote {
        /// Prompt text
        prompt: String,
        /// "up" or "down" (also +1 / -1)
        #[arg(allow_hyphen_values = true)]
        vote: Vote,
    },

    /// Show everything stored for a prompt
    Details {
        /// Prompt text
        prompt: String,
        /// Write source, full and small PNGs into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Report store availability
    Status,
}

#[derive(Serialize)]
struct SwatchView {
    hex: String,
    foreground: &'static str,
}

impl From<&Swatch> for SwatchView {
    fn from(swatch: &Swatch) -> Self {
        Self {
            hex: swatch.hex(),
            foreground: swatch.foreground.hex(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let generator = build_generator(&config, args.endpoint)?;
    let pipeline = Pipeline::from_config(&config, generator).await?;

    info!(version = pixcache::PKG_VERSION, store = ?pipeline.store_status(), "pixcache ready");

    match args.command {
        Command::Generate { prompt, out } => {
            let rendered = pipeline.render(&prompt).await?;
            std::fs::write(&out, &rendered.png)?;
            let palette: Vec<SwatchView> = rendered.palette.iter().map(SwatchView::from).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "key": rendered.key,
                    "origin": rendered.origin,
                    "rating_sum": rendered.rating_sum,
                    "output": out,
                    "palette": palette,
                }))?
            );
        }
        Command::Vote { prompt, vote } => match pipeline.vote(&prompt, vote).await {
            Ok(rating) => println!("{}", serde_json::to_string_pretty(&rating)?),
            Err(PixcacheError::NotFound(key)) => {
                eprintln!("no cached image for '{key}'");
                std::process::exit(2);
            }
            Err(e) => return Err(e.into()),
        },
        Command::Details { prompt, out_dir } => {
            let details = pipeline.details(&prompt).await?;
            if let Some(dir) = out_dir {
                write_details(&dir, &details)?;
            }
            let palette: Vec<SwatchView> = details.palette.iter().map(SwatchView::from).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "key": details.key,
                    "rating": details.rating,
                    "source_bytes": details.source_png.len(),
                    "palette": palette,
                }))?
            );
        }
        Command::Status => {
            let status = pipeline.store_status();
            let entries = pipeline.store().entry_count().await.ok();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "store": pipeline.store().name(),
                    "available": status.is_available(),
                    "entries": entries,
                }))?
            );
        }
    }

    pipeline.shutdown().await;
    Ok(())
}

/// HTTP generator from the endpoint flag or config, or a stand-in that
/// fails every generation so cache-only commands still work.
fn build_generator(
    config: &Config,
    endpoint: Option<String>,
) -> pixcache::Result<Arc<dyn ImageGenerator>> {
    let endpoint = endpoint.or_else(|| config.generator.endpoint.clone());
    match endpoint {
        Some(url) => {
            let timeout = std::time::Duration::from_secs(config.generator.request_timeout_secs);
            let mut generator = HttpGenerator::with_timeout(url, timeout)?;
            if let Some(key) = config.generator.api_key() {
                generator = generator.api_key(key);
            }
            Ok(Arc::new(generator))
        }
        None => Ok(Arc::new(BlockingGenerator::new("unconfigured", |_: &str| {
            Err(PixcacheError::Generation(
                "no generator endpoint configured (use --endpoint or [generator] endpoint)"
                    .to_string(),
            ))
        }))),
    }
}

fn write_details(dir: &Path, details: &pixcache::Details) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join("source.png"), &details.source_png)?;
    std::fs::write(dir.join("full.png"), &details.full_png)?;
    std::fs::write(dir.join("small.png"), &details.small_png)?;
    Ok(())
}
