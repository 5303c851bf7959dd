//! ledger - операции над историями владения поверх KvStore.
//!
//! Stateless: every operation takes the store handle (and config where policy matters).
//! Records are always written back under their entity key with `Holder` set to that key.
//!
//! move_holding:
//! - validates everything (entity names, giver exists and holds an open interval, optional
//!   monotonic check) before the first write;
//! - atomic stores get both writes in one `apply_batch`; otherwise the writes are sequential
//!   and a failed receiver write triggers a compensating restore of the giver's old bytes.

use log::{debug, error, warn};

use crate::codec::{decode_with, encode};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::metrics::{
    record_delete, record_holder_initialized, record_move, record_move_compensation,
    record_move_partial, record_query, record_range_query,
};
use crate::record::{HolderRecord, Timestamp};
use crate::store::{KvStore, WriteOp};

fn require_entity(what: &str, entity: &str) -> LedgerResult<()> {
    if entity.is_empty() {
        return Err(LedgerError::invalid(format!("{} entity name must not be empty", what)));
    }
    Ok(())
}

/// Create or overwrite `entity` with a single open interval starting at `timestamp`.
pub fn initialize_holder<S: KvStore + ?Sized>(
    store: &mut S,
    entity: &str,
    timestamp: Timestamp,
) -> LedgerResult<()> {
    require_entity("holder", entity)?;
    let rec = HolderRecord::opened_at(entity, timestamp);
    store.put(entity, &encode(&rec))?;
    record_holder_initialized();
    debug!("initialize_holder: {} opened at {}", entity, timestamp);
    Ok(())
}

/// Bulk initialization. All names are validated before the first write.
///
/// On stores with atomic batches every holder goes into one `apply_batch`: either all records
/// are written or none. Other stores get one put per holder in argument order.
pub fn initialize_holders<S: KvStore + ?Sized>(
    store: &mut S,
    holdings: &[(String, Timestamp)],
) -> LedgerResult<()> {
    for (entity, _) in holdings {
        require_entity("holder", entity)?;
    }
    if holdings.is_empty() {
        return Ok(());
    }

    if store.atomic_batches() {
        let ops: Vec<WriteOp> = holdings
            .iter()
            .map(|(entity, ts)| {
                let rec = HolderRecord::opened_at(entity.as_str(), *ts);
                WriteOp::put(entity.as_str(), encode(&rec))
            })
            .collect();
        store.apply_batch(&ops)?;
        for _ in holdings {
            record_holder_initialized();
        }
        debug!("initialize_holders: {} holder(s) in one batch", holdings.len());
        return Ok(());
    }

    for (entity, ts) in holdings {
        initialize_holder(store, entity, *ts)?;
    }
    Ok(())
}

/// Decoded view of an entity's record using the configured decode policy.
pub fn load_record<S: KvStore + ?Sized>(
    store: &S,
    cfg: &LedgerConfig,
    entity: &str,
) -> LedgerResult<Option<HolderRecord>> {
    match store.get(entity)? {
        Some(bytes) => Ok(Some(decode_with(&bytes, cfg.decode_mode())?)),
        None => Ok(None),
    }
}

/// Transfer the open holding from `from` to `to` at `timestamp`.
pub fn move_holding<S: KvStore + ?Sized>(
    store: &mut S,
    cfg: &LedgerConfig,
    from: &str,
    to: &str,
    timestamp: Timestamp,
) -> LedgerResult<()> {
    require_entity("source", from)?;
    require_entity("target", to)?;
    let mode = cfg.decode_mode();

    let from_bytes = store
        .get(from)?
        .ok_or_else(|| LedgerError::not_found(format!("Entity not found: {}", from)))?;
    let mut from_rec = decode_with(&from_bytes, mode)?;
    from_rec.set_holder(from);

    let open_start = from_rec
        .open_interval()
        .map(|iv| iv.start)
        .ok_or_else(|| LedgerError::not_found(format!("no open interval for {}", from)))?;
    if cfg.enforce_monotonic && timestamp < open_start {
        return Err(LedgerError::invalid(format!(
            "timestamp {} precedes open interval start {} of {}",
            timestamp, open_start, from
        )));
    }

    // Передача самому себе: одна запись, закрыть и открыть на той же границе.
    if from == to {
        from_rec.close_open(timestamp)?;
        from_rec.open_at(timestamp);
        store.put(from, &encode(&from_rec))?;
        record_move();
        debug!("move_holding: {} -> itself at {}", from, timestamp);
        return Ok(());
    }

    let mut to_rec = match store.get(to)? {
        Some(bytes) => decode_with(&bytes, mode)?,
        None => HolderRecord::new(to),
    };
    to_rec.set_holder(to);
    if cfg.enforce_monotonic {
        if let Some(boundary) = to_rec.last_boundary() {
            if timestamp < boundary {
                return Err(LedgerError::invalid(format!(
                    "timestamp {} precedes last boundary {} of {}",
                    timestamp, boundary, to
                )));
            }
        }
    }

    from_rec.close_open(timestamp)?;
    to_rec.open_at(timestamp);
    let from_new = encode(&from_rec);
    let to_new = encode(&to_rec);

    if cfg.atomic_move && store.atomic_batches() {
        store.apply_batch(&[WriteOp::put(from, from_new), WriteOp::put(to, to_new)])?;
    } else {
        store.put(from, &from_new)?;
        if let Err(e) = store.put(to, &to_new) {
            record_move_partial();
            warn!(
                "move_holding: {} closed at {} but write of {} failed: {}",
                from, timestamp, to, e
            );
            if cfg.compensate_partial_move {
                match store.put(from, &from_bytes) {
                    Ok(()) => {
                        record_move_compensation();
                        warn!("move_holding: restored previous record of {}", from);
                    }
                    Err(ce) => {
                        error!(
                            "move_holding: failed to restore {} after partial move: {}",
                            from, ce
                        );
                    }
                }
            }
            return Err(e.into());
        }
    }

    record_move();
    debug!("move_holding: {} -> {} at {}", from, to, timestamp);
    Ok(())
}

/// Raw stored bytes of `entity`, exactly as last persisted.
pub fn query<S: KvStore + ?Sized>(store: &S, entity: &str) -> LedgerResult<Vec<u8>> {
    record_query();
    store
        .get(entity)?
        .ok_or_else(|| LedgerError::not_found(format!("Nil amount for {}", entity)))
}

/// Concatenation (no separators) of raw values for keys in [start, end), ascending.
pub fn query_range<S: KvStore + ?Sized>(store: &S, start: &str, end: &str) -> LedgerResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut matched = 0usize;
    for item in store.scan(start, end)? {
        let (_key, value) = item?;
        out.extend_from_slice(&value);
        matched += 1;
    }
    record_range_query(out.len());
    debug!(
        "query_range: [{:?}, {:?}) matched {} record(s), {} B",
        start,
        end,
        matched,
        out.len()
    );
    Ok(out)
}

/// Remove `entity` unconditionally; absent entities are a no-op.
pub fn delete<S: KvStore + ?Sized>(store: &mut S, entity: &str) -> LedgerResult<()> {
    require_entity("holder", entity)?;
    store.delete(entity)?;
    record_delete();
    debug!("delete: {}", entity);
    Ok(())
}
