//! Lightweight global metrics for HoldLedger.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Ledger operations (init / move / query / range / delete)
//! - Codec (lenient fallbacks)
//! - Commit log (FileStore): batches, bytes, fsync, replay, compaction

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Ledger -----
static HOLDERS_INITIALIZED: AtomicU64 = AtomicU64::new(0);
static MOVES_TOTAL: AtomicU64 = AtomicU64::new(0);
static MOVES_PARTIAL: AtomicU64 = AtomicU64::new(0);
static MOVE_COMPENSATIONS: AtomicU64 = AtomicU64::new(0);
static QUERIES_TOTAL: AtomicU64 = AtomicU64::new(0);
static RANGE_QUERIES_TOTAL: AtomicU64 = AtomicU64::new(0);
static RANGE_BYTES_RETURNED: AtomicU64 = AtomicU64::new(0);
static DELETES_TOTAL: AtomicU64 = AtomicU64::new(0);

// ----- Codec -----
static LENIENT_DECODE_FALLBACKS: AtomicU64 = AtomicU64::new(0);

// ----- Commit log -----
static LOG_BATCHES_COMMITTED: AtomicU64 = AtomicU64::new(0);
static LOG_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static LOG_FSYNC_CALLS: AtomicU64 = AtomicU64::new(0);
static LOG_REPLAYED_BATCHES: AtomicU64 = AtomicU64::new(0);
static LOG_TORN_TAILS: AtomicU64 = AtomicU64::new(0);
static LOG_COMPACTIONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Ledger
    pub holders_initialized: u64,
    pub moves_total: u64,
    pub moves_partial: u64,
    pub move_compensations: u64,
    pub queries_total: u64,
    pub range_queries_total: u64,
    pub range_bytes_returned: u64,
    pub deletes_total: u64,

    // Codec
    pub lenient_decode_fallbacks: u64,

    // Commit log
    pub log_batches_committed: u64,
    pub log_bytes_written: u64,
    pub log_fsync_calls: u64,
    pub log_replayed_batches: u64,
    pub log_torn_tails: u64,
    pub log_compactions: u64,
}

impl MetricsSnapshot {
    pub fn avg_log_batch_bytes(&self) -> f64 {
        if self.log_batches_committed == 0 {
            0.0
        } else {
            self.log_bytes_written as f64 / self.log_batches_committed as f64
        }
    }
}

// ----- Recorders (Ledger) -----
pub fn record_holder_initialized() {
    HOLDERS_INITIALIZED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_move() {
    MOVES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_move_partial() {
    MOVES_PARTIAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_move_compensation() {
    MOVE_COMPENSATIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_query() {
    QUERIES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_range_query(bytes: usize) {
    RANGE_QUERIES_TOTAL.fetch_add(1, Ordering::Relaxed);
    RANGE_BYTES_RETURNED.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_delete() {
    DELETES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Codec) -----
pub fn record_lenient_decode_fallback() {
    LENIENT_DECODE_FALLBACKS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Commit log) -----
pub fn record_log_batch(bytes: usize) {
    LOG_BATCHES_COMMITTED.fetch_add(1, Ordering::Relaxed);
    LOG_BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_log_fsync() {
    LOG_FSYNC_CALLS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_log_replayed_batches(n: u64) {
    LOG_REPLAYED_BATCHES.fetch_add(n, Ordering::Relaxed);
}

pub fn record_log_torn_tail() {
    LOG_TORN_TAILS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_log_compaction() {
    LOG_COMPACTIONS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        holders_initialized: HOLDERS_INITIALIZED.load(Ordering::Relaxed),
        moves_total: MOVES_TOTAL.load(Ordering::Relaxed),
        moves_partial: MOVES_PARTIAL.load(Ordering::Relaxed),
        move_compensations: MOVE_COMPENSATIONS.load(Ordering::Relaxed),
        queries_total: QUERIES_TOTAL.load(Ordering::Relaxed),
        range_queries_total: RANGE_QUERIES_TOTAL.load(Ordering::Relaxed),
        range_bytes_returned: RANGE_BYTES_RETURNED.load(Ordering::Relaxed),
        deletes_total: DELETES_TOTAL.load(Ordering::Relaxed),

        lenient_decode_fallbacks: LENIENT_DECODE_FALLBACKS.load(Ordering::Relaxed),

        log_batches_committed: LOG_BATCHES_COMMITTED.load(Ordering::Relaxed),
        log_bytes_written: LOG_BYTES_WRITTEN.load(Ordering::Relaxed),
        log_fsync_calls: LOG_FSYNC_CALLS.load(Ordering::Relaxed),
        log_replayed_batches: LOG_REPLAYED_BATCHES.load(Ordering::Relaxed),
        log_torn_tails: LOG_TORN_TAILS.load(Ordering::Relaxed),
        log_compactions: LOG_COMPACTIONS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    HOLDERS_INITIALIZED.store(0, Ordering::Relaxed);
    MOVES_TOTAL.store(0, Ordering::Relaxed);
    MOVES_PARTIAL.store(0, Ordering::Relaxed);
    MOVE_COMPENSATIONS.store(0, Ordering::Relaxed);
    QUERIES_TOTAL.store(0, Ordering::Relaxed);
    RANGE_QUERIES_TOTAL.store(0, Ordering::Relaxed);
    RANGE_BYTES_RETURNED.store(0, Ordering::Relaxed);
    DELETES_TOTAL.store(0, Ordering::Relaxed);

    LENIENT_DECODE_FALLBACKS.store(0, Ordering::Relaxed);

    LOG_BATCHES_COMMITTED.store(0, Ordering::Relaxed);
    LOG_BYTES_WRITTEN.store(0, Ordering::Relaxed);
    LOG_FSYNC_CALLS.store(0, Ordering::Relaxed);
    LOG_REPLAYED_BATCHES.store(0, Ordering::Relaxed);
    LOG_TORN_TAILS.store(0, Ordering::Relaxed);
    LOG_COMPACTIONS.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_batch_bytes_handles_empty_snapshot() {
        let mut m = MetricsSnapshot::default();
        assert_eq!(m.avg_log_batch_bytes(), 0.0);
        m.log_batches_committed = 4;
        m.log_bytes_written = 300;
        assert_eq!(m.avg_log_batch_bytes(), 75.0);
    }
}
