//! `sdm get` – download URLs until done or interrupted.

use anyhow::{bail, Context, Result};
use sdm_core::config::SdmConfig;
use sdm_core::progress_store::SqliteProgressStore;
use sdm_core::transport::CurlTransport;
use sdm_core::url_model::derive_filename;
use sdm_core::{EventLoop, FsSpaceChecker, TaskScheduler, TaskState};
use std::path::Path;
use std::sync::Arc;

use crate::cli::console::ConsoleListener;

pub async fn run_get(cfg: &SdmConfig, urls: &[String], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create download directory {}", dir.display()))?;
    let store = SqliteProgressStore::open_default()
        .await
        .context("open progress database")?;
    let events = Arc::new(EventLoop::spawn().context("start event loop")?);
    let scheduler = TaskScheduler::new(
        cfg.clone(),
        Arc::new(store),
        Arc::new(CurlTransport::from_config(cfg)),
        Arc::new(FsSpaceChecker),
        events.clone(),
    );

    let tasks: Vec<_> = urls
        .iter()
        .map(|url| {
            let path = dir.join(derive_filename(url));
            tracing::info!(url = %url, path = %path.display(), "queueing download");
            scheduler.enqueue(path, url.as_str(), Arc::new(ConsoleListener::new()))
        })
        .collect();

    tokio::select! {
        _ = scheduler.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            let paused = scheduler.pause_all();
            eprintln!("interrupted: pausing {paused} download(s), progress is kept");
            scheduler.wait_idle().await;
        }
    }
    events.flush();

    let unfinished: Vec<_> = tasks
        .iter()
        .filter(|t| t.state() != TaskState::Success)
        .collect();
    for t in &unfinished {
        println!(
            "{}: {} at {} / {} bytes",
            t.name(),
            t.state(),
            t.downloaded_length(),
            t.total_length()
        );
    }
    if !unfinished.is_empty() {
        bail!(
            "{} of {} download(s) did not finish; run the same command again to resume",
            unfinished.len(),
            tasks.len()
        );
    }
    Ok(())
}
