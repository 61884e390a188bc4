//! Terminal listener: one line per milestone, progress at most twice a second.

use sdm_core::{DownloadListener, ErrorCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Default)]
pub struct ConsoleListener {
    total: AtomicU64,
    last_print: Mutex<Option<Instant>>,
}

impl ConsoleListener {
    pub fn new() -> Self {
        Self::default()
    }
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}

impl DownloadListener for ConsoleListener {
    fn on_start(&self, name: &str, total_length: u64) {
        self.total.store(total_length, Ordering::Relaxed);
        println!("{name}: starting ({:.1} MiB)", mib(total_length));
    }

    fn on_progress(&self, name: &str, downloaded_length: u64) {
        let Ok(mut last) = self.last_print.lock() else {
            return;
        };
        let now = Instant::now();
        if last.is_some_and(|t| now.duration_since(t) < PROGRESS_INTERVAL) {
            return;
        }
        *last = Some(now);
        let total = self.total.load(Ordering::Relaxed);
        let pct = if total > 0 {
            downloaded_length as f64 * 100.0 / total as f64
        } else {
            100.0
        };
        println!(
            "{name}: {:.1} / {:.1} MiB ({:.1}%)",
            mib(downloaded_length),
            mib(total),
            pct
        );
    }

    fn on_finish(&self, name: &str) {
        println!("{name}: done");
    }

    fn on_fail(&self, name: &str, code: ErrorCode) {
        eprintln!("{name}: failed: {code} ({})", code.as_i32());
    }
}
