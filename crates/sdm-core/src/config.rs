use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration loaded from `~/.config/sdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdmConfig {
    /// Maximum number of files in the downloading state at once.
    pub parallel_task_count: usize,
    /// Number of segments (and concurrent range requests) per file.
    pub worker_count: usize,
    /// Connect timeout for every HTTP request, in seconds.
    pub connect_timeout_secs: u64,
    /// Abort a request when no bytes arrive for this many seconds.
    pub read_timeout_secs: u64,
    /// Upper bound on the size of one received chunk (curl receive buffer).
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    /// Delete the unfinished local file when a task is discarded.
    #[serde(default = "default_remove_partial")]
    pub remove_partial_on_discard: bool,
}

fn default_chunk_size() -> usize {
    16 * 1024
}

fn default_remove_partial() -> bool {
    true
}

impl Default for SdmConfig {
    fn default() -> Self {
        Self {
            parallel_task_count: 2,
            worker_count: 3,
            connect_timeout_secs: 30,
            read_timeout_secs: 15,
            chunk_size_bytes: default_chunk_size(),
            remove_partial_on_discard: default_remove_partial(),
        }
    }
}

impl SdmConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
