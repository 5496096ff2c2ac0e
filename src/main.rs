//! # Outfit Finder CLI (`outfit`)
//!
//! ## Usage
//!
//! ```bash
//! outfit --config ./config/outfit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `outfit serve` | Start the HTTP server |
//! | `outfit analyze <image>` | Run the pipeline once on a local image |
//! | `outfit crawl <url>` | Send images from a shop page to a running server |
//!
//! `serve` and `analyze` need `GEMINI_API_KEY` and `SERPAPI_KEY` in the
//! environment (a `.env` file in the working directory is read too).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use outfit_finder::config::{self, Secrets};
use outfit_finder::crawl::{self, Crawler};
use outfit_finder::logging;
use outfit_finder::models::AnalysisRequest;
use outfit_finder::pipeline::build_pipeline;
use outfit_finder::server;

/// Outfit Finder: describe an outfit photo and find similar products.
#[derive(Parser)]
#[command(
    name = "outfit",
    about = "Outfit Finder: describe an outfit photo and find similar products",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/outfit.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/outfit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Serves `POST /analyze`, `POST /chat`, `GET /health`, and static files
    /// on the address configured in `[server].bind`.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Analyze a local image and print the JSON response.
    Analyze {
        /// Path to the image file.
        image: PathBuf,
    },

    /// Crawl a shop page and send its images to `/analyze`.
    Crawl {
        /// Page to scrape for `<img>` tags.
        url: String,

        /// Stop after this many successful analyses.
        #[arg(long)]
        max_images: Option<usize>,

        /// Override `[crawler].analyze_url`.
        #[arg(long)]
        analyze_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let mut cfg = config::load_config(&cli.config)?;
    let _log_guard = logging::init_logging(&cfg.logging)?;

    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            let secrets = Secrets::from_env()?;
            let pipeline = build_pipeline(&cfg, &secrets)?;
            info!(
                model = %cfg.vision.model,
                upload_dir = %cfg.server.upload_dir.display(),
                "pipeline ready"
            );
            server::run_server(&cfg.server, pipeline).await?;
        }
        Commands::Analyze { image } => {
            let secrets = Secrets::from_env()?;
            let pipeline = build_pipeline(&cfg, &secrets)?;

            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image: {}", image.display()))?;
            let filename = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let response = pipeline.analyze(AnalysisRequest::new(bytes, filename)).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Crawl {
            url,
            max_images,
            analyze_url,
        } => {
            if let Some(analyze_url) = analyze_url {
                cfg.crawler.analyze_url = analyze_url;
            }
            let max_images = crawl::check_max_images(max_images.unwrap_or(cfg.crawler.max_images))?;
            let crawler = Crawler::new(&cfg.crawler)?;
            crawler.run(&url, max_images).await?;
        }
    }

    Ok(())
}
