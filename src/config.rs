//! Centralized configuration and builder for HoldLedger.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - LedgerConfig::from_env() reads HL_* env vars; LedgerBuilder starts from env and
//!   allows overrides, `LedgerBuilder::from_default()` ignores env entirely.
//!
//! Compatibility defaults:
//! - strict_decode = false (malformed stored bytes decode to an empty record)
//! - enforce_monotonic = false (move timestamps are not ordered against history)
//! - atomic_move = true, compensate_partial_move = true
//! - data_fsync = false (FileStore flushes, but does not fsync every commit)

use std::fmt;

/// Top-level configuration for ledger operations and the file store.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Surface malformed stored records as DecodeFailure instead of decoding to empty.
    /// Env: HL_STRICT_DECODE (default false)
    pub strict_decode: bool,

    /// Reject move timestamps earlier than the giver's open start or the receiver's
    /// last boundary.
    /// Env: HL_ENFORCE_MONOTONIC (default false)
    pub enforce_monotonic: bool,

    /// Send both writes of a move through KvStore::apply_batch.
    /// Env: HL_ATOMIC_MOVE (default true)
    pub atomic_move: bool,

    /// On a non-atomic store, restore the giver's previous bytes when the receiver write fails.
    /// Env: HL_COMPENSATE_MOVE (default true)
    pub compensate_partial_move: bool,

    /// fsync the commit log after every batch.
    /// Env: HL_DATA_FSYNC (default false)
    pub data_fsync: bool,

    /// Auto-compact the commit log once it exceeds this many bytes (and is at least half garbage).
    /// Env: HL_COMPACT_THRESHOLD_BYTES (default None = never)
    pub compact_threshold_bytes: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            strict_decode: false,
            enforce_monotonic: false,
            atomic_move: true,
            compensate_partial_move: true,
            data_fsync: false,
            compact_threshold_bytes: None,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        let s = v.trim().to_ascii_lowercase();
        s == "1" || s == "true" || s == "yes" || s == "on"
    })
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(on) = env_flag("HL_STRICT_DECODE") {
            cfg.strict_decode = on;
        }
        if let Some(on) = env_flag("HL_ENFORCE_MONOTONIC") {
            cfg.enforce_monotonic = on;
        }
        if let Some(on) = env_flag("HL_ATOMIC_MOVE") {
            cfg.atomic_move = on;
        }
        if let Some(on) = env_flag("HL_COMPENSATE_MOVE") {
            cfg.compensate_partial_move = on;
        }
        if let Some(on) = env_flag("HL_DATA_FSYNC") {
            cfg.data_fsync = on;
        }

        if let Ok(v) = std::env::var("HL_COMPACT_THRESHOLD_BYTES") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.compact_threshold_bytes = Some(n);
            }
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_strict_decode(mut self, on: bool) -> Self {
        self.strict_decode = on;
        self
    }

    pub fn with_enforce_monotonic(mut self, on: bool) -> Self {
        self.enforce_monotonic = on;
        self
    }

    pub fn with_atomic_move(mut self, on: bool) -> Self {
        self.atomic_move = on;
        self
    }

    pub fn with_compensate_partial_move(mut self, on: bool) -> Self {
        self.compensate_partial_move = on;
        self
    }

    pub fn with_data_fsync(mut self, on: bool) -> Self {
        self.data_fsync = on;
        self
    }

    pub fn with_compact_threshold_bytes(mut self, thr: Option<u64>) -> Self {
        self.compact_threshold_bytes = thr;
        self
    }

    /// Decode policy implied by `strict_decode`.
    pub fn decode_mode(&self) -> crate::codec::DecodeMode {
        crate::codec::DecodeMode::from_strict_flag(self.strict_decode)
    }
}

impl fmt::Display for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LedgerConfig {{ \
             strict_decode: {}, \
             enforce_monotonic: {}, \
             atomic_move: {}, \
             compensate_partial_move: {}, \
             data_fsync: {}, \
             compact_threshold_bytes: {} \
             }}",
            self.strict_decode,
            self.enforce_monotonic,
            self.atomic_move,
            self.compensate_partial_move,
            self.data_fsync,
            self.compact_threshold_bytes
                .map(|v| v.to_string())
                .unwrap_or_else(|| "off".to_string()),
        )
    }
}

/// Lightweight builder that produces a LedgerConfig.
#[derive(Clone, Debug)]
pub struct LedgerBuilder {
    cfg: LedgerConfig,
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: LedgerConfig::from_env(),
        }
    }
}

impl LedgerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: LedgerConfig::default(),
        }
    }

    pub fn strict_decode(mut self, on: bool) -> Self {
        self.cfg.strict_decode = on;
        self
    }

    pub fn enforce_monotonic(mut self, on: bool) -> Self {
        self.cfg.enforce_monotonic = on;
        self
    }

    pub fn atomic_move(mut self, on: bool) -> Self {
        self.cfg.atomic_move = on;
        self
    }

    pub fn compensate_partial_move(mut self, on: bool) -> Self {
        self.cfg.compensate_partial_move = on;
        self
    }

    pub fn data_fsync(mut self, on: bool) -> Self {
        self.cfg.data_fsync = on;
        self
    }

    pub fn compact_threshold_bytes(mut self, thr: Option<u64>) -> Self {
        self.cfg.compact_threshold_bytes = thr;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> LedgerConfig {
        self.cfg
    }
}
