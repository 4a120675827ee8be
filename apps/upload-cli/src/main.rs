//! clipvault-upload entry point.

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clipvault_upload_api::{PartStorage, SessionClient, StorageClient, UploadBackend};
use clipvault_uploader::UploadOrchestrator;
use tracing_subscriber::EnvFilter;

use crate::config::UploaderConfig;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "clipvault-upload", version)]
#[command(about = "Upload a video file as a temporary main video")]
struct Cli {
    /// Video file to upload.
    file: PathBuf,

    /// MIME type sent to the backend; guessed from the extension if omitted.
    #[arg(long)]
    content_type: Option<String>,

    /// Part size in MiB.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    part_size_mib: Option<u64>,

    /// Parts uploaded in parallel.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=16))]
    concurrency: Option<u64>,

    /// Platform API base URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Print the playback URL after the upload completes.
    #[arg(long, default_value_t = false)]
    playback: bool,

    /// Config file to read instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Flags take precedence over the config file and environment.
    fn apply(&self, config: &mut UploaderConfig) {
        if let Some(mib) = self.part_size_mib {
            config.part_size = mib.saturating_mul(MIB);
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n as usize;
        }
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = UploaderConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        file = %cli.file.display(),
        api = %config.api_base_url,
        part_size = config.part_size,
        concurrency = config.concurrency,
        "starting upload"
    );

    let session = Arc::new(
        SessionClient::with_timeout(
            &config.api_base_url,
            config.auth_token(),
            config.api_timeout(),
        )
        .context("creating API client")?,
    );
    let storage = StorageClient::new(config.storage_timeout()).context("creating storage client")?;
    let orchestrator = UploadOrchestrator::new(
        Arc::clone(&session) as Arc<dyn UploadBackend>,
        Arc::new(storage) as Arc<dyn PartStorage>,
        config.upload_options(cli.content_type.clone()),
    );

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling upload");
            cancel.cancel();
        }
    });

    let on_progress = |percent: u8| {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\ruploading {percent:>3}%");
        let _ = err.flush();
    };
    let result = orchestrator.upload_path(&cli.file, Some(&on_progress)).await;
    eprintln!();
    let result = result.with_context(|| format!("uploading {}", cli.file.display()))?;

    println!("{}", result.s3_key);

    if cli.playback {
        let url = session
            .playback_url(&result.s3_key)
            .await
            .context("fetching playback URL")?;
        println!("{url}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "clipvault-upload",
            "clip.mp4",
            "--part-size-mib",
            "8",
            "--concurrency",
            "4",
            "--api-url",
            "https://api.example.com",
            "--playback",
        ])
        .unwrap();
        assert!(cli.playback);

        let mut config = UploaderConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.part_size, 8 * MIB);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.api_base_url, "https://api.example.com");
    }

    #[test]
    fn zero_part_size_rejected() {
        assert!(Cli::try_parse_from(["clipvault-upload", "clip.mp4", "--part-size-mib", "0"]).is_err());
    }

    #[test]
    fn file_is_required() {
        assert!(Cli::try_parse_from(["clipvault-upload"]).is_err());
    }
}
