//! journal/reader - последовательное чтение кадров журнала с проверкой CRC.
//!
//! Использование:
//!   let len = file.metadata()?.len();
//!   let mut pos = JOURNAL_HDR_SIZE as u64;
//!   loop {
//!       match read_next_record(&mut file, pos, len)? {
//!           ReadStep::Record(rec, next) => { /* обработка rec */ pos = next; }
//!           ReadStep::Tail => break,              // EOF или частичный хвост
//!           ReadStep::Corrupt(reason) => break,   // CRC mismatch - конец валидных данных
//!       }
//!   }

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};

use super::{
    crc32c_of_parts, REC_HDR_SIZE, REC_OFF_CRC32, REC_OFF_KEY_LEN, REC_OFF_LSN, REC_OFF_TYPE,
    REC_OFF_VAL_LEN,
};

/// One frame read back from disk. The flags byte is always written as 0 and is not
/// surfaced; it still takes part in the CRC.
#[derive(Debug, Clone)]
pub struct JournalRecord {
    pub rec_type: u8,
    pub lsn: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Offset of the frame header.
    pub pos: u64,
}

#[derive(Debug)]
pub enum ReadStep {
    /// Valid frame and the offset right after it.
    Record(JournalRecord, u64),
    /// Clean EOF or a partial frame at the end of the file.
    Tail,
    /// Frame fully present but its CRC does not match.
    Corrupt(String),
}

/// Read the frame at `pos`. `file_len` is the current length of the journal.
/// I/O errors other than a short read are returned as Err.
pub fn read_next_record<R: Read + Seek>(r: &mut R, pos: u64, file_len: u64) -> Result<ReadStep> {
    if pos + (REC_HDR_SIZE as u64) > file_len {
        return Ok(ReadStep::Tail);
    }

    r.seek(SeekFrom::Start(pos))?;
    let mut hdr = [0u8; REC_HDR_SIZE];
    if let Err(e) = r.read_exact(&mut hdr) {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(ReadStep::Tail);
        }
        return Err(anyhow!("journal read header at {}: {}", pos, e));
    }

    let key_len = LittleEndian::read_u32(&hdr[REC_OFF_KEY_LEN..REC_OFF_KEY_LEN + 4]) as u64;
    let val_len = LittleEndian::read_u32(&hdr[REC_OFF_VAL_LEN..REC_OFF_VAL_LEN + 4]) as u64;
    let next_pos = pos + REC_HDR_SIZE as u64 + key_len + val_len;

    // payload не умещается - частичный хвост
    if next_pos > file_len {
        return Ok(ReadStep::Tail);
    }

    let mut key = vec![0u8; key_len as usize];
    let mut value = vec![0u8; val_len as usize];
    if let Err(e) = r.read_exact(&mut key).and_then(|_| r.read_exact(&mut value)) {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(ReadStep::Tail);
        }
        return Err(anyhow!("journal read payload at {}: {}", pos, e));
    }

    let crc_expected = LittleEndian::read_u32(&hdr[REC_OFF_CRC32..REC_OFF_CRC32 + 4]);
    let c = crc32c_of_parts(&hdr[..REC_OFF_CRC32], &key);
    let crc_actual = crc32c::crc32c_append(c, &value);
    if crc_actual != crc_expected {
        return Ok(ReadStep::Corrupt(format!(
            "CRC mismatch at off={}, expected={:#010x}, actual={:#010x}",
            pos, crc_expected, crc_actual
        )));
    }

    let rec = JournalRecord {
        rec_type: hdr[REC_OFF_TYPE],
        lsn: LittleEndian::read_u64(&hdr[REC_OFF_LSN..REC_OFF_LSN + 8]),
        key,
        value,
        pos,
    };
    Ok(ReadStep::Record(rec, next_pos))
}
