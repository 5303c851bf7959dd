use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;

use crate::config::LedgerConfig;
use crate::metrics;
use crate::store::FileStore;

pub fn cmd_status(path: PathBuf, json: bool) -> Result<()> {
    let store = FileStore::open_ro(&path)
        .with_context(|| format!("open ledger store {} (read-only)", path.display()))?;
    let st = store.status();
    let m = metrics::snapshot();
    let cfg = LedgerConfig::from_env();

    if json {
        let v = json!({
            "store": st,
            "metrics": m,
            "avg_log_batch_bytes": m.avg_log_batch_bytes(),
            "config": cfg.to_string(),
        });
        println!("{}", serde_json::to_string(&v)?);
        return Ok(());
    }

    println!("Ledger at {}", st.root);
    println!("  holders          = {}", st.keys);
    println!("  live_bytes       = {}", st.live_bytes);
    println!("  journal_len      = {} bytes", st.log_len);
    println!("  last_lsn         = {}", st.last_lsn);
    if st.poisoned {
        println!("  poisoned         = true (reopen as writer to recover)");
    }
    println!("  replayed_batches = {}", m.log_replayed_batches);
    println!("  torn_tails       = {}", m.log_torn_tails);
    println!("  avg_batch_bytes  = {:.1}", m.avg_log_batch_bytes());
    println!("  {}", cfg);
    Ok(())
}

pub fn cmd_compact(path: PathBuf) -> Result<()> {
    let cfg = LedgerConfig::from_env();
    let mut store = FileStore::open_with_config(&path, &cfg)
        .with_context(|| format!("open ledger store {}", path.display()))?;
    let before = store.status().log_len;
    store.compact()?;
    let after = store.status().log_len;
    println!("Compacted journal: {} -> {} bytes", before, after);
    Ok(())
}
