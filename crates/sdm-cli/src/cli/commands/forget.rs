//! `sdm forget` – drop stored progress so the next `get` starts from zero.

use anyhow::Result;
use sdm_core::progress_store::{ProgressStore, SqliteProgressStore};
use sdm_core::FileKey;
use std::path::Path;

pub async fn run_forget(file: &Path, url: &str) -> Result<()> {
    let store = SqliteProgressStore::open_default().await?;
    let key = FileKey::new(file, url);
    if store.query_flag(&key).await?.is_none() {
        println!("Nothing stored for {key}.");
        return Ok(());
    }
    store.delete(&key).await?;
    println!("Forgot {key}.");
    Ok(())
}
