//! journal/replay - восстановление индекса из журнала.
//!
//! Семантика:
//! - PUT/DEL буферизуются до COMMIT с тем же LSN; только тогда применяются к индексу.
//! - Частичный хвост, CRC mismatch или нарушение протокола (кадр вне батча, LSN не совпал,
//!   вложенный BEGIN) завершают реплей. `good_len` указывает конец последнего целого батча -
//!   writer усечёт файл до этой длины.
//! - Unknown frame types outside a batch are skipped (forward compatibility).

use anyhow::Result;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::io::{Read, Seek};

use super::reader::{read_next_record, ReadStep};
use super::{JOURNAL_HDR_SIZE, REC_BEGIN, REC_COMMIT, REC_DEL, REC_PUT};

#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    /// Committed batches applied to the index.
    pub batches: u64,
    /// End offset of the last intact batch.
    pub good_len: u64,
    pub file_len: u64,
    pub last_lsn: u64,
    /// Why replay stopped before `file_len`, if it did.
    pub stop_reason: Option<String>,
}

impl ReplayOutcome {
    pub fn torn(&self) -> bool {
        self.good_len < self.file_len
    }
}

enum Pending {
    Put(String, Vec<u8>),
    Del(String),
}

pub fn replay_into<R: Read + Seek>(
    r: &mut R,
    file_len: u64,
    index: &mut BTreeMap<String, Vec<u8>>,
) -> Result<ReplayOutcome> {
    let mut out = ReplayOutcome {
        good_len: JOURNAL_HDR_SIZE as u64,
        file_len,
        ..ReplayOutcome::default()
    };
    let mut pos = JOURNAL_HDR_SIZE as u64;
    let mut open_batch: Option<(u64, Vec<Pending>)> = None;

    loop {
        let (rec, next) = match read_next_record(r, pos, file_len)? {
            ReadStep::Record(rec, next) => (rec, next),
            ReadStep::Tail => {
                if pos < file_len {
                    out.stop_reason = Some(format!("partial frame at off={}", pos));
                } else if open_batch.is_some() {
                    out.stop_reason = Some("batch without COMMIT at end of journal".to_string());
                }
                break;
            }
            ReadStep::Corrupt(reason) => {
                out.stop_reason = Some(reason);
                break;
            }
        };

        match (rec.rec_type, open_batch.as_mut()) {
            (REC_BEGIN, None) => {
                open_batch = Some((rec.lsn, Vec::new()));
            }
            (REC_PUT, Some((lsn, ops))) if *lsn == rec.lsn => match String::from_utf8(rec.key) {
                Ok(k) => ops.push(Pending::Put(k, rec.value)),
                Err(_) => {
                    out.stop_reason = Some(format!("non-UTF-8 key at off={}", rec.pos));
                    break;
                }
            },
            (REC_DEL, Some((lsn, ops))) if *lsn == rec.lsn => match String::from_utf8(rec.key) {
                Ok(k) => ops.push(Pending::Del(k)),
                Err(_) => {
                    out.stop_reason = Some(format!("non-UTF-8 key at off={}", rec.pos));
                    break;
                }
            },
            (REC_COMMIT, Some((lsn, _))) if *lsn == rec.lsn => {
                if let Some((lsn, ops)) = open_batch.take() {
                    for op in ops {
                        match op {
                            Pending::Put(k, v) => {
                                index.insert(k, v);
                            }
                            Pending::Del(k) => {
                                index.remove(&k);
                            }
                        }
                    }
                    out.batches += 1;
                    out.last_lsn = lsn;
                    out.good_len = next;
                }
            }
            (t, None) if !matches!(t, REC_BEGIN | REC_PUT | REC_DEL | REC_COMMIT) => {
                debug!("journal replay: skip unknown frame type {} at off={}", t, rec.pos);
                out.good_len = next;
            }
            (t, _) => {
                out.stop_reason = Some(format!(
                    "unexpected frame type {} (lsn {}) at off={}",
                    t, rec.lsn, rec.pos
                ));
                break;
            }
        }

        pos = next;
    }

    if out.torn() {
        warn!(
            "journal replay: stop at off={} of {} ({})",
            out.good_len,
            file_len,
            out.stop_reason.as_deref().unwrap_or("unknown")
        );
    } else {
        debug!(
            "journal replay: {} batch(es), last_lsn={}",
            out.batches, out.last_lsn
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{write_record, JOURNAL_MAGIC};
    use std::io::Cursor;

    fn header() -> Vec<u8> {
        let mut v = JOURNAL_MAGIC.to_vec();
        v.extend_from_slice(&[0u8; 8]);
        v
    }

    fn batch(buf: &mut Vec<u8>, lsn: u64, puts: &[(&str, &str)]) {
        write_record(buf, REC_BEGIN, lsn, b"", b"").unwrap();
        for (k, v) in puts {
            write_record(buf, REC_PUT, lsn, k.as_bytes(), v.as_bytes()).unwrap();
        }
        write_record(buf, REC_COMMIT, lsn, b"", b"").unwrap();
    }

    #[test]
    fn uncommitted_batch_is_not_applied() {
        let mut buf = header();
        batch(&mut buf, 1, &[("a", "1")]);
        let good = buf.len() as u64;
        write_record(&mut buf, REC_BEGIN, 2, b"", b"").unwrap();
        write_record(&mut buf, REC_PUT, 2, b"b", b"2").unwrap();

        let len = buf.len() as u64;
        let mut idx = BTreeMap::new();
        let out = replay_into(&mut Cursor::new(buf), len, &mut idx).unwrap();
        assert_eq!(out.batches, 1);
        assert_eq!(out.last_lsn, 1);
        assert_eq!(out.good_len, good);
        assert!(out.torn());
        assert_eq!(idx.get("a").map(|v| v.as_slice()), Some(b"1".as_ref()));
        assert!(idx.get("b").is_none());
    }

    #[test]
    fn crc_mismatch_stops_replay() {
        let mut buf = header();
        batch(&mut buf, 1, &[("a", "1")]);
        let good = buf.len();
        batch(&mut buf, 2, &[("b", "2")]);
        // испортим байт значения во втором батче
        let last = buf.len() - 24 - 1;
        buf[last] ^= 0xFF;

        let len = buf.len() as u64;
        let mut idx = BTreeMap::new();
        let out = replay_into(&mut Cursor::new(buf), len, &mut idx).unwrap();
        assert_eq!(out.batches, 1);
        assert_eq!(out.good_len, good as u64);
        assert!(out.stop_reason.unwrap().contains("CRC"));
        assert!(idx.get("b").is_none());
    }

    #[test]
    fn lsn_mismatch_inside_batch_stops_replay() {
        let mut buf = header();
        write_record(&mut buf, REC_BEGIN, 5, b"", b"").unwrap();
        write_record(&mut buf, REC_PUT, 6, b"x", b"y").unwrap();
        write_record(&mut buf, REC_COMMIT, 5, b"", b"").unwrap();

        let len = buf.len() as u64;
        let mut idx = BTreeMap::new();
        let out = replay_into(&mut Cursor::new(buf), len, &mut idx).unwrap();
        assert_eq!(out.batches, 0);
        assert_eq!(out.good_len, JOURNAL_HDR_SIZE as u64);
        assert!(idx.is_empty());
    }
}
