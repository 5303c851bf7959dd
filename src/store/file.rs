//! store/file - persistent KvStore: commit journal + in-memory ordered index.
//!
//! Что внутри:
//! - open / open_with_config: эксклюзивный LOCK, реплей журнала, усечение рваного хвоста.
//! - open_ro: shared LOCK, реплей без усечения, запись запрещена (StoreError::ReadOnly).
//! - Каждая запись (put/delete/apply_batch) - один батч BEGIN..COMMIT, поэтому
//!   apply_batch атомарен: после сбоя виден либо весь батч, либо ничего.
//! - compact(): переписать живые пары одним батчем в tmp-файл и rename поверх журнала.
//! - Если батч не дописался и откатить хвост тоже не вышло, store становится poisoned:
//!   дескриптор закрыт, любая запись - StoreError::Corrupt. Чтение из индекса продолжает
//!   работать; переоткрытие отрежет недописанный хвост при реплее.
//!
//! Layout: <root>/LOCK, <root>/ledger.log

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::LedgerConfig;
use crate::journal::{
    check_journal_file_header, journal_path, replay_into, write_journal_file_header,
    write_record, JOURNAL_HDR_SIZE, JOURNAL_TMP_FILE, REC_BEGIN, REC_COMMIT, REC_DEL,
    REC_HDR_SIZE, REC_PUT,
};
use crate::lock::{try_acquire_lock, LockGuard, LockMode};
use crate::metrics::{
    record_log_batch, record_log_compaction, record_log_fsync, record_log_replayed_batches,
    record_log_torn_tail,
};

use super::{scan_bounds, KvStore, ScanIter, StoreError, WriteOp};

#[derive(Debug, Clone, Serialize)]
pub struct FileStoreStatus {
    pub root: String,
    pub keys: usize,
    pub live_bytes: u64,
    pub log_len: u64,
    pub last_lsn: u64,
    pub readonly: bool,
    pub poisoned: bool,
}

pub struct FileStore {
    root: PathBuf,
    // None в read-only режиме
    file: Option<File>,
    index: BTreeMap<String, Vec<u8>>,
    // размер, который заняли бы живые пары в свежем журнале (без заголовка файла)
    live_bytes: u64,
    log_len: u64,
    last_lsn: u64,
    readonly: bool,
    // хвост журнала в неизвестном состоянии, писать нельзя до переоткрытия
    poisoned: bool,
    data_fsync: bool,
    compact_threshold_bytes: Option<u64>,
    _lock: LockGuard, // держим дескриптор
}

fn reopen_at_end(path: &Path) -> Result<File> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("reopen journal {}", path.display()))?;
    file.seek(SeekFrom::End(0))?;
    Ok(file)
}

/// Куда дописывается журнал. Кроме записи умеет откатить хвост до заданной длины.
trait JournalSink: Write {
    fn rollback_to(&mut self, len: u64) -> io::Result<()>;
    fn sync_journal(&mut self) -> io::Result<()>;
}

impl JournalSink for File {
    fn rollback_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }

    fn sync_journal(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

#[derive(Debug)]
enum AppendError {
    /// батч не записан, хвост возвращён к прежней длине
    RolledBack(io::Error),
    /// откат тоже упал: за `log_len` может лежать кусок батча
    Torn { write: io::Error, rollback: io::Error },
}

/// Write one encoded batch; on failure cut the journal back to `log_len`.
fn append_batch<S: JournalSink>(
    sink: &mut S,
    buf: &[u8],
    log_len: u64,
    fsync: bool,
) -> Result<(), AppendError> {
    let written = sink
        .write_all(buf)
        .and_then(|_| sink.flush())
        .and_then(|_| if fsync { sink.sync_journal() } else { Ok(()) });
    match written {
        Ok(()) => Ok(()),
        Err(write) => match sink.rollback_to(log_len) {
            Ok(()) => Err(AppendError::RolledBack(write)),
            Err(rollback) => Err(AppendError::Torn { write, rollback }),
        },
    }
}

fn poisoned_error() -> StoreError {
    StoreError::Corrupt("journal tail is in an unknown state after a failed write; reopen the store".into())
}

#[inline]
fn frame_len(key: &str, value: &[u8]) -> u64 {
    (REC_HDR_SIZE + key.len() + value.len()) as u64
}

impl FileStore {
    /// Open (or create) a writer store with configuration taken from env.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with_config(root, &LedgerConfig::from_env())
    }

    pub fn open_with_config(root: &Path, cfg: &LedgerConfig) -> Result<Self> {
        if !root.exists() {
            std::fs::create_dir_all(root)
                .with_context(|| format!("create root {}", root.display()))?;
        }
        let lock = try_acquire_lock(root, LockMode::Exclusive)?;

        let path = journal_path(root);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open journal {}", path.display()))?;

        if file.metadata()?.len() < JOURNAL_HDR_SIZE as u64 {
            debug!("FileStore: fresh journal header at {}", path.display());
            file.set_len(0)?;
            write_journal_file_header(&mut file)?;
            file.sync_all()?;
        }
        check_journal_file_header(&mut file)
            .with_context(|| format!("journal {}", path.display()))?;

        let file_len = file.metadata()?.len();
        let mut index = BTreeMap::new();
        let outcome = replay_into(&mut file, file_len, &mut index)?;
        record_log_replayed_batches(outcome.batches);

        if outcome.torn() {
            record_log_torn_tail();
            warn!(
                "FileStore: truncating torn journal tail {} -> {} ({})",
                outcome.file_len,
                outcome.good_len,
                outcome.stop_reason.as_deref().unwrap_or("unknown")
            );
            file.set_len(outcome.good_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(outcome.good_len))?;

        if outcome.batches > 0 {
            info!(
                "FileStore: replayed {} batch(es), {} key(s), last_lsn={}",
                outcome.batches,
                index.len(),
                outcome.last_lsn
            );
        }

        let live_bytes = index.iter().map(|(k, v)| frame_len(k, v)).sum();
        Ok(Self {
            root: root.to_path_buf(),
            file: Some(file),
            index,
            live_bytes,
            log_len: outcome.good_len,
            last_lsn: outcome.last_lsn,
            readonly: false,
            poisoned: false,
            data_fsync: cfg.data_fsync,
            compact_threshold_bytes: cfg.compact_threshold_bytes,
            _lock: lock,
        })
    }

    /// Read-only open: shared lock, no truncation, writes fail with StoreError::ReadOnly.
    pub fn open_ro(root: &Path) -> Result<Self> {
        let lock = try_acquire_lock(root, LockMode::Shared)?;

        let path = journal_path(root);
        let mut file = OpenOptions::new()
            .read(true)
            .open(&path)
            .with_context(|| format!("open journal {}", path.display()))?;
        check_journal_file_header(&mut file)
            .with_context(|| format!("journal {}", path.display()))?;

        let file_len = file.metadata()?.len();
        let mut index = BTreeMap::new();
        let outcome = replay_into(&mut file, file_len, &mut index)?;
        record_log_replayed_batches(outcome.batches);

        let live_bytes = index.iter().map(|(k, v)| frame_len(k, v)).sum();
        Ok(Self {
            root: root.to_path_buf(),
            file: None,
            index,
            live_bytes,
            log_len: outcome.good_len,
            last_lsn: outcome.last_lsn,
            readonly: true,
            poisoned: false,
            data_fsync: false,
            compact_threshold_bytes: None,
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn last_lsn(&self) -> u64 {
        self.last_lsn
    }

    pub fn status(&self) -> FileStoreStatus {
        FileStoreStatus {
            root: self.root.display().to_string(),
            keys: self.index.len(),
            live_bytes: self.live_bytes,
            log_len: self.log_len,
            last_lsn: self.last_lsn,
            readonly: self.readonly,
            poisoned: self.poisoned,
        }
    }

    /// Rewrite the journal so it holds only live pairs (one batch), then swap it in.
    pub fn compact(&mut self) -> Result<()> {
        if self.readonly {
            return Err(StoreError::ReadOnly.into());
        }
        if self.poisoned {
            return Err(poisoned_error().into());
        }
        let tmp_path = self.root.join(JOURNAL_TMP_FILE);
        let final_path = journal_path(&self.root);
        let before = self.log_len;

        let mut buf = Vec::with_capacity(JOURNAL_HDR_SIZE + self.live_bytes as usize + 2 * REC_HDR_SIZE);
        buf.extend_from_slice(crate::journal::JOURNAL_MAGIC);
        buf.extend_from_slice(&[0u8; JOURNAL_HDR_SIZE - 8]);
        let mut lsn = self.last_lsn;
        if !self.index.is_empty() {
            lsn += 1;
            write_record(&mut buf, REC_BEGIN, lsn, b"", b"")?;
            for (k, v) in &self.index {
                write_record(&mut buf, REC_PUT, lsn, k.as_bytes(), v)?;
            }
            write_record(&mut buf, REC_COMMIT, lsn, b"", b"")?;
        }

        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&tmp_path)
                .with_context(|| format!("open {}", tmp_path.display()))?;
            tmp.write_all(&buf)?;
            tmp.sync_all()?;
        }

        // старый дескриптор закрываем до rename
        self.file = None;
        if let Err(e) = std::fs::rename(&tmp_path, &final_path) {
            self.file = Some(self.reopen_or_poison(&final_path)?);
            return Err(e).with_context(|| {
                format!("rename {} -> {}", tmp_path.display(), final_path.display())
            });
        }
        self.file = Some(self.reopen_or_poison(&final_path)?);
        self.log_len = buf.len() as u64;
        self.last_lsn = lsn;

        record_log_compaction();
        info!(
            "FileStore: compacted journal {} -> {} bytes ({} key(s))",
            before,
            self.log_len,
            self.index.len()
        );
        Ok(())
    }

    // ----------------- приватные помощники -----------------

    fn commit(&mut self, ops: &[WriteOp]) -> Result<(), StoreError> {
        if self.readonly {
            return Err(StoreError::ReadOnly);
        }
        if self.poisoned {
            return Err(poisoned_error());
        }
        if ops.is_empty() {
            return Ok(());
        }

        let lsn = self.last_lsn + 1;
        let mut buf = Vec::new();
        write_record(&mut buf, REC_BEGIN, lsn, b"", b"")?;
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    write_record(&mut buf, REC_PUT, lsn, key.as_bytes(), value)?
                }
                WriteOp::Delete { key } => write_record(&mut buf, REC_DEL, lsn, key.as_bytes(), b"")?,
            }
        }
        write_record(&mut buf, REC_COMMIT, lsn, b"", b"")?;

        let log_len = self.log_len;
        let data_fsync = self.data_fsync;
        let file = self.file.as_mut().ok_or(StoreError::ReadOnly)?;
        match append_batch(file, &buf, log_len, data_fsync) {
            Ok(()) => {}
            Err(AppendError::RolledBack(e)) => return Err(StoreError::Io(e)),
            Err(AppendError::Torn { write, rollback }) => {
                error!(
                    "FileStore: lsn={} write failed ({}) and rollback to {} failed ({}); store poisoned",
                    lsn, write, log_len, rollback
                );
                self.poison();
                return Err(poisoned_error());
            }
        }
        if data_fsync {
            record_log_fsync();
        }

        self.log_len += buf.len() as u64;
        self.last_lsn = lsn;
        record_log_batch(buf.len());

        for op in ops {
            self.apply_to_index(op);
        }
        debug!("FileStore: committed lsn={} ({} op(s), {} B)", lsn, ops.len(), buf.len());

        self.maybe_auto_compact();
        Ok(())
    }

    fn poison(&mut self) {
        self.file = None;
        self.poisoned = true;
    }

    fn reopen_or_poison(&mut self, path: &Path) -> Result<File> {
        reopen_at_end(path).map_err(|e| {
            error!("FileStore: cannot reopen journal {}: {:#}; store poisoned", path.display(), e);
            self.poison();
            e
        })
    }

    fn apply_to_index(&mut self, op: &WriteOp) {
        match op {
            WriteOp::Put { key, value } => {
                if let Some(old) = self.index.insert(key.clone(), value.clone()) {
                    self.live_bytes -= frame_len(key, &old);
                }
                self.live_bytes += frame_len(key, value);
            }
            WriteOp::Delete { key } => {
                if let Some(old) = self.index.remove(key) {
                    self.live_bytes -= frame_len(key, &old);
                }
            }
        }
    }

    fn maybe_auto_compact(&mut self) {
        let Some(thr) = self.compact_threshold_bytes else {
            return;
        };
        if self.log_len <= thr || self.live_bytes.saturating_mul(2) > self.log_len {
            return;
        }
        if let Err(e) = self.compact() {
            warn!("FileStore: auto-compaction failed: {:#}", e);
        }
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.index.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.commit(&[WriteOp::put(key, value.to_vec())])
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        if self.readonly {
            return Err(StoreError::ReadOnly);
        }
        if self.poisoned {
            return Err(poisoned_error());
        }
        // отсутствующий ключ - no-op, журнал не трогаем
        if !self.index.contains_key(key) {
            return Ok(());
        }
        self.commit(&[WriteOp::delete(key)])
    }

    fn scan<'a>(&'a self, start: &str, end: &str) -> Result<ScanIter<'a>, StoreError> {
        match scan_bounds(start, end) {
            Some(bounds) => Ok(Box::new(
                self.index
                    .range::<str, _>(bounds)
                    .map(|(k, v)| Ok((k.clone(), v.clone()))),
            )),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn apply_batch(&mut self, ops: &[WriteOp]) -> Result<(), StoreError> {
        self.commit(ops)
    }

    fn atomic_batches(&self) -> bool {
        true
    }
}
