//! CLI for the SDM segmented downloader.

mod commands;
mod console;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sdm_core::config;
use std::path::PathBuf;

use commands::{run_forget, run_get, run_status};

/// Top-level CLI for the SDM download manager.
#[derive(Debug, Parser)]
#[command(name = "sdm")]
#[command(about = "SDM: resumable multi-connection downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs; an interrupted download resumes on the next run.
    Get {
        /// Direct HTTP/HTTPS URLs to download.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory to save into (default: current directory).
        #[arg(short = 'd', long = "dir", value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Download at most N files at once (overrides parallel_task_count).
        #[arg(short = 'j', long = "jobs", value_name = "N")]
        jobs: Option<usize>,

        /// Split each new download into N segments (overrides worker_count).
        #[arg(short = 'w', long = "workers", value_name = "N")]
        workers: Option<usize>,
    },

    /// Show every download with stored progress.
    Status,

    /// Drop the stored progress of one download.
    Forget {
        /// Target file the download was writing to.
        file: PathBuf,
        /// Source URL of the download.
        url: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                urls,
                dir,
                jobs,
                workers,
            } => {
                if let Some(n) = jobs {
                    cfg.parallel_task_count = n.max(1);
                }
                if let Some(n) = workers {
                    cfg.worker_count = n.max(1);
                }
                let dir = match dir {
                    Some(d) => absolute(d)?,
                    None => std::env::current_dir().context("current directory")?,
                };
                run_get(&cfg, &urls, &dir).await?;
            }
            CliCommand::Status => run_status().await?,
            CliCommand::Forget { file, url } => run_forget(&absolute(file)?, &url).await?,
        }

        Ok(())
    }
}

/// Stored keys use absolute paths; resolve relative arguments against the cwd.
fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir().context("current directory")?.join(path))
    }
}

#[cfg(test)]
mod tests;
