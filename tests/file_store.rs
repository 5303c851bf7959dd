// tests/file_store.rs
//
// FileStore: журнал коммитов + индекс.
// - переоткрытие видит все закоммиченные записи;
// - рваный хвост и незакоммиченный батч отбрасываются, writer усекает файл;
// - compact() сохраняет содержимое и уменьшает журнал; авто-компакция по порогу;
// - LOCK: второй writer не открывается, read-only запрещает запись.
//
// Запуск:
//   cargo test --test file_store -- --nocapture

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use HoldLedger::journal::{write_record, JOURNAL_FILE, JOURNAL_HDR_SIZE, REC_BEGIN, REC_PUT};
use HoldLedger::lock::{try_acquire_lock, LockMode};
use HoldLedger::{
    decode, initialize_holders, move_holding, query, query_range, Interval, KvStore,
    LedgerBuilder, FileStore, StoreError, WriteOp,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("hltest-file-{prefix}-{pid}-{t}-{id}"))
}

fn journal_len(root: &PathBuf) -> Result<u64> {
    Ok(fs::metadata(root.join(JOURNAL_FILE))?.len())
}

#[test]
fn reopen_sees_committed_moves() -> Result<()> {
    let root = unique_root("reopen");
    let cfg = LedgerBuilder::from_default().build();
    {
        let mut store = FileStore::open_with_config(&root, &cfg)?;
        assert!(store.is_empty());
        initialize_holders(
            &mut store,
            &[("alice".to_string(), 5), ("bob".to_string(), 8)],
        )?;
        move_holding(&mut store, &cfg, "alice", "carol", 12)?;
        store.delete("bob")?;
    }

    let store = FileStore::open_with_config(&root, &cfg)?;
    assert_eq!(store.len(), 2);
    assert_eq!(
        query(&store, "alice")?,
        br#"{"Holder":"alice","Times":[["5","12"]]}"#.to_vec()
    );
    assert_eq!(
        decode(&query(&store, "carol")?).history(),
        &[Interval::open(12)]
    );
    assert!(store.get("bob")?.is_none());
    // init (один батч на обоих), move (один батч), delete
    assert_eq!(store.last_lsn(), 3);

    let all = query_range(&store, "", "")?;
    assert_eq!(
        all,
        [query(&store, "alice")?, query(&store, "carol")?].concat()
    );
    Ok(())
}

#[test]
fn init_of_several_holders_is_one_commit() -> Result<()> {
    let root = unique_root("init-batch");
    let cfg = LedgerBuilder::from_default().build();
    {
        let mut store = FileStore::open_with_config(&root, &cfg)?;
        initialize_holders(
            &mut store,
            &[
                ("alice".to_string(), 5),
                ("bob".to_string(), 8),
                ("carol".to_string(), 9),
            ],
        )?;
        assert_eq!(store.last_lsn(), 1);
    }
    let store = FileStore::open_with_config(&root, &cfg)?;
    assert_eq!(store.len(), 3);
    assert_eq!(store.last_lsn(), 1);
    assert_eq!(
        decode(&query(&store, "carol")?).history(),
        &[Interval::open(9)]
    );
    Ok(())
}

#[test]
fn absent_delete_does_not_touch_journal() -> Result<()> {
    let root = unique_root("absent-del");
    let mut store = FileStore::open_with_config(&root, &LedgerBuilder::from_default().build())?;
    store.put("a", b"1")?;
    let len = journal_len(&root)?;
    store.delete("zzz")?;
    assert_eq!(journal_len(&root)?, len);
    assert_eq!(store.last_lsn(), 1);
    Ok(())
}

#[test]
fn torn_tail_is_truncated_on_open() -> Result<()> {
    let root = unique_root("torn");
    let cfg = LedgerBuilder::from_default().build();
    {
        let mut store = FileStore::open_with_config(&root, &cfg)?;
        store.put("alice", b"one")?;
        store.put("bob", b"two")?;
    }
    let good = journal_len(&root)?;

    // дописываем половину кадра
    {
        let mut f = OpenOptions::new().append(true).open(root.join(JOURNAL_FILE))?;
        f.write_all(&[2u8, 0, 0, 0, 9, 9, 9])?;
    }
    assert!(journal_len(&root)? > good);

    let mut store = FileStore::open_with_config(&root, &cfg)?;
    assert_eq!(journal_len(&root)?, good);
    assert_eq!(store.get("alice")?, Some(b"one".to_vec()));
    assert_eq!(store.get("bob")?, Some(b"two".to_vec()));

    // после усечения запись продолжается с корректной позиции
    store.put("carol", b"three")?;
    drop(store);
    let store = FileStore::open_with_config(&root, &cfg)?;
    assert_eq!(store.len(), 3);
    assert_eq!(store.get("carol")?, Some(b"three".to_vec()));
    Ok(())
}

#[test]
fn uncommitted_batch_is_ignored() -> Result<()> {
    let root = unique_root("uncommitted");
    let cfg = LedgerBuilder::from_default().build();
    {
        let mut store = FileStore::open_with_config(&root, &cfg)?;
        store.put("alice", b"v1")?;
    }
    let good = journal_len(&root)?;

    // BEGIN + PUT без COMMIT - как будто процесс упал посреди move
    {
        let mut buf = Vec::new();
        write_record(&mut buf, REC_BEGIN, 2, b"", b"")?;
        write_record(&mut buf, REC_PUT, 2, b"alice", b"v2")?;
        write_record(&mut buf, REC_PUT, 2, b"bob", b"v2")?;
        let mut f = OpenOptions::new().append(true).open(root.join(JOURNAL_FILE))?;
        f.write_all(&buf)?;
    }

    let store = FileStore::open_with_config(&root, &cfg)?;
    assert_eq!(store.get("alice")?, Some(b"v1".to_vec()));
    assert!(store.get("bob")?.is_none());
    assert_eq!(store.last_lsn(), 1);
    assert_eq!(journal_len(&root)?, good);
    Ok(())
}

#[test]
fn batch_is_all_or_nothing_across_reopen() -> Result<()> {
    let root = unique_root("batch");
    let cfg = LedgerBuilder::from_default().build();
    {
        let mut store = FileStore::open_with_config(&root, &cfg)?;
        assert!(store.atomic_batches());
        store.apply_batch(&[
            WriteOp::put("a", b"1".to_vec()),
            WriteOp::put("b", b"2".to_vec()),
            WriteOp::delete("a"),
        ])?;
    }
    let store = FileStore::open_with_config(&root, &cfg)?;
    assert!(store.get("a")?.is_none());
    assert_eq!(store.get("b")?, Some(b"2".to_vec()));
    assert_eq!(store.last_lsn(), 1);
    Ok(())
}

#[test]
fn compact_keeps_live_pairs_and_shrinks_journal() -> Result<()> {
    let root = unique_root("compact");
    let cfg = LedgerBuilder::from_default().build();
    let mut store = FileStore::open_with_config(&root, &cfg)?;

    for i in 0..50 {
        store.put("hot", format!("value-{i}").as_bytes())?;
    }
    store.put("cold", b"c")?;
    store.put("gone", b"g")?;
    store.delete("gone")?;

    let before = journal_len(&root)?;
    store.compact()?;
    let after = journal_len(&root)?;
    assert!(after < before, "journal {} -> {}", before, after);
    assert_eq!(store.status().log_len, after);

    // запись после компакции и переоткрытие
    store.put("new", b"n")?;
    let lsn = store.last_lsn();
    drop(store);

    let store = FileStore::open_with_config(&root, &cfg)?;
    assert_eq!(store.get("hot")?, Some(b"value-49".to_vec()));
    assert_eq!(store.get("cold")?, Some(b"c".to_vec()));
    assert_eq!(store.get("new")?, Some(b"n".to_vec()));
    assert!(store.get("gone")?.is_none());
    assert_eq!(store.last_lsn(), lsn);
    assert!(!root.join("ledger.log.tmp").exists());
    Ok(())
}

#[test]
fn compact_of_empty_store_leaves_header_only() -> Result<()> {
    let root = unique_root("compact-empty");
    let mut store = FileStore::open_with_config(&root, &LedgerBuilder::from_default().build())?;
    store.put("x", b"1")?;
    store.delete("x")?;
    store.compact()?;
    assert_eq!(journal_len(&root)?, JOURNAL_HDR_SIZE as u64);
    drop(store);

    let store = FileStore::open_with_config(&root, &LedgerBuilder::from_default().build())?;
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn auto_compaction_bounds_journal_growth() -> Result<()> {
    let root = unique_root("auto-compact");
    let cfg = LedgerBuilder::from_default()
        .compact_threshold_bytes(Some(4096))
        .build();
    let mut store = FileStore::open_with_config(&root, &cfg)?;
    for i in 0..500 {
        store.put("k", format!("{i:08}").as_bytes())?;
    }
    assert!(journal_len(&root)? <= 4096 + 256, "len={}", journal_len(&root)?);
    assert_eq!(store.get("k")?, Some(b"00000499".to_vec()));
    drop(store);

    let store = FileStore::open_with_config(&root, &cfg)?;
    assert_eq!(store.get("k")?, Some(b"00000499".to_vec()));
    Ok(())
}

#[test]
fn scan_respects_half_open_bounds() -> Result<()> {
    let root = unique_root("scan");
    let mut store = FileStore::open_with_config(&root, &LedgerBuilder::from_default().build())?;
    for k in ["a", "b", "ba", "c", "d"] {
        store.put(k, k.as_bytes())?;
    }
    let keys = |s: &str, e: &str| -> Result<Vec<String>> {
        let mut out = Vec::new();
        for item in store.scan(s, e)? {
            out.push(item?.0);
        }
        Ok(out)
    };
    assert_eq!(keys("b", "c")?, vec!["b", "ba"]);
    assert_eq!(keys("", "b")?, vec!["a"]);
    assert_eq!(keys("c", "")?, vec!["c", "d"]);
    assert!(keys("d", "a")?.is_empty());
    Ok(())
}

#[test]
fn second_writer_is_rejected_by_lock() -> Result<()> {
    let root = unique_root("lock");
    let cfg = LedgerBuilder::from_default().build();
    let store = FileStore::open_with_config(&root, &cfg)?;

    assert!(FileStore::open_with_config(&root, &cfg).is_err());
    assert!(FileStore::open_ro(&root).is_err());
    assert!(try_acquire_lock(&root, LockMode::Shared).is_err());

    drop(store);
    let g = try_acquire_lock(&root, LockMode::Exclusive)?;
    assert_eq!(g.mode(), LockMode::Exclusive);
    Ok(())
}

#[test]
fn read_only_store_rejects_writes() -> Result<()> {
    let root = unique_root("ro");
    let cfg = LedgerBuilder::from_default().build();
    {
        let mut store = FileStore::open_with_config(&root, &cfg)?;
        initialize_holders(&mut store, &[("alice".to_string(), 5)])?;
    }

    let mut ro = FileStore::open_ro(&root)?;
    assert!(ro.is_readonly());
    // несколько читателей одновременно
    let ro2 = FileStore::open_ro(&root)?;
    assert_eq!(query(&ro2, "alice")?, query(&ro, "alice")?);

    assert!(matches!(ro.put("bob", b"x"), Err(StoreError::ReadOnly)));
    assert!(matches!(ro.delete("alice"), Err(StoreError::ReadOnly)));
    assert!(ro.compact().is_err());

    let err = move_holding(&mut ro, &cfg, "alice", "bob", 9).unwrap_err();
    assert_eq!(err.kind(), HoldLedger::ErrorKind::StoreFailure);
    assert_eq!(
        decode(&query(&ro, "alice")?).history(),
        &[Interval::open(5)]
    );
    Ok(())
}

#[test]
fn foreign_file_is_not_a_journal() -> Result<()> {
    let root = unique_root("magic");
    fs::create_dir_all(&root)?;
    fs::write(root.join(JOURNAL_FILE), b"definitely not a journal file")?;
    assert!(FileStore::open_with_config(&root, &LedgerBuilder::from_default().build()).is_err());
    Ok(())
}
