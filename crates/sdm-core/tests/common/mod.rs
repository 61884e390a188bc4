#![allow(dead_code)]

pub mod range_server;
pub mod scripted;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sdm_core::{DownloadListener, ErrorCode, SdmConfig, SpaceChecker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String, u64),
    Progress(String, u64),
    Finish(String),
    Fail(String, ErrorCode),
}

/// Listener that keeps every callback it receives.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn finishes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Finish(_)))
            .count()
    }

    pub fn failures(&self) -> Vec<ErrorCode> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Fail(_, code) => Some(code),
                _ => None,
            })
            .collect()
    }

    /// Names in the order their runs reported `on_start`.
    pub fn starts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start(name, _) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(_, n) => Some(n),
                _ => None,
            })
            .collect()
    }

    fn push(&self, e: Event) {
        self.events.lock().unwrap().push(e);
    }
}

impl DownloadListener for Recorder {
    fn on_start(&self, name: &str, total_length: u64) {
        self.push(Event::Start(name.to_string(), total_length));
    }
    fn on_progress(&self, name: &str, downloaded_length: u64) {
        self.push(Event::Progress(name.to_string(), downloaded_length));
    }
    fn on_finish(&self, name: &str) {
        self.push(Event::Finish(name.to_string()));
    }
    fn on_fail(&self, name: &str, code: ErrorCode) {
        self.push(Event::Fail(name.to_string(), code));
    }
}

/// Space checker with a fixed answer that remembers what it was asked.
pub struct FixedSpace {
    enough: bool,
    asked: Mutex<Vec<(PathBuf, u64)>>,
}

impl FixedSpace {
    pub fn new(enough: bool) -> Arc<Self> {
        Arc::new(Self {
            enough,
            asked: Mutex::new(Vec::new()),
        })
    }

    pub fn asked(&self) -> Vec<(PathBuf, u64)> {
        self.asked.lock().unwrap().clone()
    }
}

impl SpaceChecker for FixedSpace {
    fn has_enough_space(&self, dir: &Path, required: u64) -> bool {
        self.asked.lock().unwrap().push((dir.to_path_buf(), required));
        self.enough
    }
}

pub fn config(worker_count: usize, parallel_task_count: usize) -> SdmConfig {
    SdmConfig {
        worker_count,
        parallel_task_count,
        ..SdmConfig::default()
    }
}

/// Deterministic body: byte i is `i % 251`.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Poll `cond` every few milliseconds; panic after five seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// `wait_idle` with a timeout so a hung run fails the test instead of the suite.
pub async fn idle(scheduler: &sdm_core::TaskScheduler) {
    tokio::time::timeout(Duration::from_secs(10), scheduler.wait_idle())
        .await
        .expect("scheduler did not become idle");
}
