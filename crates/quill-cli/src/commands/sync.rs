//! Import and refresh command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use quill_core::{
    CollectionId, Config, Fetcher, FsStore, HttpApi, ProgressSink, RemoteClient, SyncEngine,
    SyncError,
};

use crate::logging;
use crate::output::Output;

/// Which run to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Import,
    Refresh,
}

impl Mode {
    fn past_tense(self) -> &'static str {
        match self {
            Mode::Import => "Imported",
            Mode::Refresh => "Refreshed",
        }
    }
}

/// Mirror a collection for the first time
pub async fn import(collection: &str, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    run(Mode::Import, collection, config_path, output).await
}

/// Bring an already mirrored collection up to date
pub async fn refresh(
    collection: &str,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    run(Mode::Refresh, collection, config_path, output).await
}

fn parse_collection(input: &str) -> Result<CollectionId, SyncError> {
    Ok(CollectionId::parse(input)?)
}

async fn run(
    mode: Mode,
    collection: &str,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    // Reject malformed ids before touching config or network
    let id = parse_collection(collection)
        .with_context(|| format!("Could not use '{}'", collection))?;

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    logging::init(&config);

    let api = HttpApi::new(config.http_config()?).context("Failed to create HTTP client")?;
    let fetcher = Fetcher::new(api, RemoteClient::new(config.retry_policy()));
    let engine = SyncEngine::new(
        fetcher,
        FsStore::new(&config.vault_dir),
        &config.sync_folder,
    );

    output.message(&format!("Syncing collection {}...", id));

    let (sink, mut events) = ProgressSink::channel();
    let sync = async {
        match mode {
            Mode::Import => engine.import(&id, sink).await,
            Mode::Refresh => engine.refresh(&id, sink).await,
        }
    };
    // Ends once the run drops its sink
    let progress = async {
        while let Some(event) = events.recv().await {
            output.print_progress(&event);
        }
    };
    let (result, ()) = tokio::join!(sync, progress);

    let result = result.with_context(|| match mode {
        Mode::Import => format!("Import of {} failed", id),
        Mode::Refresh => format!("Refresh of {} failed", id),
    })?;

    let folder = config.vault_dir.join(&config.sync_folder);
    output.print_summary(mode.past_tense(), Some(&folder), &result);

    if result.has_failures() {
        bail!("{} record(s) failed to sync", result.failed);
    }
    Ok(())
}
