//! journal - commit log format for FileStore (HLLOG001).
//!
//! Разделение:
//! - encode.rs - построение заголовка записи с CRC32C и запись кадра
//! - reader.rs - последовательное чтение кадров с проверкой CRC, толерантно к хвосту
//! - replay.rs - реплей committed-батчей в индекс, определение "хорошей" длины файла
//!
//! File layout:
//! - header 16 B: MAGIC "HLLOG001" + reserved u64 (0)
//! - frames: [header 24 B][key][value]
//!
//! Frame header (LE):
//!   type u8 | flags u8 | reserved u16 | lsn u64 | key_len u32 | val_len u32 | crc32c u32
//! CRC covers header[0..20) + payload.
//!
//! A store write is one batch: BEGIN(lsn) PUT/DEL(lsn)... COMMIT(lsn). Replay applies a
//! batch only when its COMMIT is intact, so readers never see half of a batch.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

// -------------------- Константы формата --------------------

pub const JOURNAL_FILE: &str = "ledger.log";
pub const JOURNAL_TMP_FILE: &str = "ledger.log.tmp";
pub const JOURNAL_MAGIC: &[u8; 8] = b"HLLOG001";
pub const JOURNAL_HDR_SIZE: usize = 16;

pub const REC_HDR_SIZE: usize = 24;

pub const REC_OFF_TYPE: usize = 0;
pub const REC_OFF_FLAGS: usize = 1;
pub const REC_OFF_RESERVED: usize = 2;
pub const REC_OFF_LSN: usize = 4;
pub const REC_OFF_KEY_LEN: usize = 12;
pub const REC_OFF_VAL_LEN: usize = 16;
pub const REC_OFF_CRC32: usize = 20;

pub const REC_BEGIN: u8 = 1;
pub const REC_PUT: u8 = 2;
pub const REC_DEL: u8 = 3;
pub const REC_COMMIT: u8 = 4;

// -------------------- Общие утилиты --------------------

#[inline]
pub fn crc32c_of_parts(head_without_crc: &[u8], payload: &[u8]) -> u32 {
    let c = crc32c::crc32c_append(0, head_without_crc);
    crc32c::crc32c_append(c, payload)
}

pub fn journal_path(root: &Path) -> PathBuf {
    root.join(JOURNAL_FILE)
}

/// Write the 16-byte file header at offset 0.
pub fn write_journal_file_header(f: &mut File) -> Result<()> {
    f.seek(SeekFrom::Start(0))?;
    f.write_all(JOURNAL_MAGIC)?;
    f.write_all(&[0u8; JOURNAL_HDR_SIZE - 8])?;
    Ok(())
}

/// Validate the file header. Errors on a short file or a foreign magic.
pub fn check_journal_file_header(f: &mut File) -> Result<()> {
    if f.metadata()?.len() < JOURNAL_HDR_SIZE as u64 {
        return Err(anyhow!("journal too small (< header)"));
    }
    let mut hdr = [0u8; JOURNAL_HDR_SIZE];
    f.seek(SeekFrom::Start(0))?;
    f.read_exact(&mut hdr)?;
    if &hdr[..8] != JOURNAL_MAGIC {
        return Err(anyhow!("bad journal magic"));
    }
    // reserved должен быть нулевым в текущей версии; не проверяем строго (forward-compat)
    let _reserved = LittleEndian::read_u64(&hdr[8..16]);
    Ok(())
}

pub mod encode;
pub mod reader;
pub mod replay;

pub use encode::{build_hdr_with_crc, write_record};
pub use reader::{read_next_record, JournalRecord, ReadStep};
pub use replay::{replay_into, ReplayOutcome};
