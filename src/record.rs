//! record - in-memory model of one entity's holding history.
//!
//! Invariants kept by every mutator here:
//! - at most the final interval is open (`end == None`);
//! - every interval before the final one is closed.
//!
//! Ordering between boundaries is NOT checked (see `LedgerConfig::enforce_monotonic`).

use std::fmt;

use crate::error::{LedgerError, LedgerResult};

/// Timestamps are plain signed integers (decimal on the wire).
pub type Timestamp = i64;

/// Parse a timestamp argument. Accepts an optional sign, no surrounding whitespace.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    s.parse::<Timestamp>().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

impl Interval {
    pub fn open(start: Timestamp) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.start, end),
            None => write!(f, "[{}, ..)", self.start),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolderRecord {
    holder: String,
    history: Vec<Interval>,
}

impl HolderRecord {
    /// Empty record (no intervals yet) - receiving side of a first move.
    pub fn new(holder: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            history: Vec::new(),
        }
    }

    /// Record holding a single open interval starting at `ts`.
    pub fn opened_at(holder: impl Into<String>, ts: Timestamp) -> Self {
        Self {
            holder: holder.into(),
            history: vec![Interval::open(ts)],
        }
    }

    /// Build from externally supplied parts, validating the open/close invariants.
    pub fn from_parts(holder: impl Into<String>, history: Vec<Interval>) -> LedgerResult<Self> {
        let rec = Self {
            holder: holder.into(),
            history,
        };
        rec.check_invariants().map_err(LedgerError::Decode)?;
        Ok(rec)
    }

    /// No validation; used by the lenient decoder which must mirror stored data as-is.
    pub(crate) fn from_parts_unchecked(holder: String, history: Vec<Interval>) -> Self {
        Self { holder, history }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Records are persisted under their entity key; the stored `Holder` always follows it.
    pub(crate) fn set_holder(&mut self, holder: &str) {
        if self.holder != holder {
            self.holder = holder.to_string();
        }
    }

    pub fn history(&self) -> &[Interval] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.holder.is_empty() && self.history.is_empty()
    }

    /// The currently open interval, if the entity holds one.
    pub fn open_interval(&self) -> Option<&Interval> {
        self.history.last().filter(|iv| iv.is_open())
    }

    /// Latest boundary recorded in the history (end of a closed tail, start of an open one).
    pub fn last_boundary(&self) -> Option<Timestamp> {
        self.history.last().map(|iv| iv.end.unwrap_or(iv.start))
    }

    /// Close the open final interval at `ts`.
    pub fn close_open(&mut self, ts: Timestamp) -> LedgerResult<()> {
        match self.history.last_mut() {
            Some(last) if last.is_open() => {
                last.end = Some(ts);
                Ok(())
            }
            _ => Err(LedgerError::not_found(format!(
                "no open interval for {}",
                self.holder
            ))),
        }
    }

    /// Start a new open interval at `ts`. An interval that is still open is closed at `ts` first,
    /// so the history never carries two open intervals.
    pub fn open_at(&mut self, ts: Timestamp) {
        if let Some(last) = self.history.last_mut() {
            if last.is_open() {
                last.end = Some(ts);
            }
        }
        self.history.push(Interval::open(ts));
    }

    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let n = self.history.len();
        for (i, iv) in self.history.iter().enumerate() {
            if iv.is_open() && i + 1 != n {
                return Err(format!(
                    "holder {}: interval #{} is open but not last ({} intervals)",
                    self.holder, i, n
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for HolderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.holder)?;
        for iv in &self.history {
            write!(f, " {}", iv)?;
        }
        Ok(())
    }
}
