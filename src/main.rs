use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kb_harvest::{Config, harvest};

#[derive(Parser)]
#[command(name = "kb-harvest")]
#[command(about = "Harvest a knowledge-base site into an offline content tree", long_about = None)]
struct Cli {
    /// JSON configuration file; every field is optional
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory for bundles, documents, videos and the tree document
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Base URL of the site to harvest
    #[arg(long)]
    base_url: Option<String>,

    /// Download embedded videos (1) or only record the articles (0)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    download_video: Option<u8>,
}

impl Cli {
    fn into_config(self) -> kb_harvest::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(data_dir) = self.data_dir {
            config.output.data_dir = data_dir;
        }
        if let Some(base_url) = self.base_url {
            config.site.base_url = base_url;
        }
        if let Some(flag) = self.download_video {
            config.media.download_videos = flag == 1;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match harvest(config).await {
        Ok((tree, stats)) => {
            tracing::info!(
                categories = tree.children.len(),
                attached = stats.attached.total(),
                skipped = stats.skipped.total(),
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, failure_kind = %e.failure_kind(), "Harvest aborted");
            ExitCode::FAILURE
        }
    }
}
