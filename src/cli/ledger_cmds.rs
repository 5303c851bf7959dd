use anyhow::{anyhow, Context, Result};
use log::debug;
use std::path::PathBuf;

use crate::command::Command;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ledger;
use crate::metrics;
use crate::record::parse_timestamp;
use crate::store::FileStore;

use super::output::print_raw;

fn open_writer(path: &PathBuf, cfg: &LedgerConfig) -> Result<FileStore> {
    FileStore::open_with_config(path, cfg)
        .with_context(|| format!("open ledger store {}", path.display()))
}

fn log_journal_writes() {
    let m = metrics::snapshot();
    debug!(
        "journal: {} batch(es), {} B written, avg {:.1} B/batch",
        m.log_batches_committed,
        m.log_bytes_written,
        m.avg_log_batch_bytes()
    );
}

fn open_reader(path: &PathBuf) -> Result<FileStore> {
    FileStore::open_ro(path).with_context(|| format!("open ledger store {} (read-only)", path.display()))
}

pub fn cmd_init(path: PathBuf, pairs: Vec<String>) -> Result<()> {
    let cfg = LedgerConfig::from_env();
    // разбор до открытия стора: ошибки аргументов не трогают диск
    let cmd = Command::parse_init(&pairs)?;
    let mut store = open_writer(&path, &cfg)?;
    cmd.execute(&mut store, &cfg)?;
    log_journal_writes();
    println!(
        "Initialized {} holder(s) at {}",
        pairs.len() / 2,
        path.display()
    );
    Ok(())
}

pub fn cmd_move(path: PathBuf, from: String, to: String, at: String) -> Result<()> {
    let cfg = LedgerConfig::from_env();
    let timestamp = parse_timestamp(&at).ok_or_else(|| {
        LedgerError::InvalidArgument(format!("Invalid timestamp {:?}, expecting an integer value", at))
    })?;
    let cmd = Command::Move {
        from,
        to,
        timestamp,
    };
    let mut store = open_writer(&path, &cfg)?;
    cmd.execute(&mut store, &cfg)?;
    log_journal_writes();
    println!("OK {}", cmd);
    Ok(())
}

pub fn cmd_query(path: PathBuf, entity: String, decoded: bool) -> Result<()> {
    let store = open_reader(&path)?;
    if decoded {
        let cfg = LedgerConfig::from_env();
        let rec = ledger::load_record(&store, &cfg, &entity)?
            .ok_or_else(|| anyhow!("NOT FOUND '{}'", entity))?;
        println!("{}", rec.holder());
        for iv in rec.history() {
            println!("  {}", iv);
        }
        return Ok(());
    }
    let raw = ledger::query(&store, &entity)?;
    print_raw(&raw)
}

pub fn cmd_query_range(path: PathBuf, start: String, end: String) -> Result<()> {
    let store = open_reader(&path)?;
    let raw = ledger::query_range(&store, &start, &end)?;
    print_raw(&raw)
}

pub fn cmd_delete(path: PathBuf, entity: String) -> Result<()> {
    let cfg = LedgerConfig::from_env();
    let mut store = open_writer(&path, &cfg)?;
    ledger::delete(&mut store, &entity)?;
    log_journal_writes();
    println!("DELETED '{}'", entity);
    Ok(())
}

pub fn cmd_invoke(path: PathBuf, function: String, args: Vec<String>) -> Result<()> {
    let cfg = LedgerConfig::from_env();
    let cmd = Command::parse_invoke(&function, &args)?;
    let payload = match cmd {
        Command::Query { .. } | Command::QueryRange { .. } => {
            let mut store = open_reader(&path)?;
            // Query/QueryRange не пишут, read-only стор безопасен
            cmd.execute(&mut store, &cfg)?
        }
        _ => {
            let mut store = open_writer(&path, &cfg)?;
            let out = cmd.execute(&mut store, &cfg)?;
            log_journal_writes();
            out
        }
    };
    if payload.is_empty() {
        println!("OK {}", cmd);
        Ok(())
    } else {
        print_raw(&payload)
    }
}
