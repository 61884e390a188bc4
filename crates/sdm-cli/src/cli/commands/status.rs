//! `sdm status` – show stored progress of every download.

use anyhow::Result;
use sdm_core::progress_store::{ProgressStore, SqliteProgressStore};

pub async fn run_status() -> Result<()> {
    let store = SqliteProgressStore::open_default().await?;
    let records = store.list().await?;
    if records.is_empty() {
        println!("No downloads in database.");
        return Ok(());
    }
    println!("{:<12} {:>7} {:>14} {:>9} {}", "FLAG", "DONE", "SIZE", "SEGMENTS", "FILE <- URL");
    for r in records {
        let pct = if r.total_length > 0 {
            format!("{:.1}%", r.downloaded_length as f64 * 100.0 / r.total_length as f64)
        } else {
            "-".to_string()
        };
        println!(
            "{:<12} {:>7} {:>14} {:>9} {}",
            r.flag.as_str(),
            pct,
            r.total_length,
            r.segment_offsets.len(),
            r.key
        );
    }
    Ok(())
}
