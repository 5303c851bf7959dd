//! journal/encode - построение заголовка кадра (24 байта) с CRC32C и запись кадра.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;

use super::{
    crc32c_of_parts, REC_HDR_SIZE, REC_OFF_CRC32, REC_OFF_FLAGS, REC_OFF_KEY_LEN, REC_OFF_LSN,
    REC_OFF_RESERVED, REC_OFF_TYPE, REC_OFF_VAL_LEN,
};

/// Build a frame header with CRC32C over header[0..REC_OFF_CRC32] + key + value.
pub fn build_hdr_with_crc(rec_type: u8, lsn: u64, key: &[u8], value: &[u8]) -> [u8; REC_HDR_SIZE] {
    let mut hdr = [0u8; REC_HDR_SIZE];
    hdr[REC_OFF_TYPE] = rec_type;
    hdr[REC_OFF_FLAGS] = 0;
    LittleEndian::write_u16(&mut hdr[REC_OFF_RESERVED..REC_OFF_RESERVED + 2], 0);
    LittleEndian::write_u64(&mut hdr[REC_OFF_LSN..REC_OFF_LSN + 8], lsn);
    LittleEndian::write_u32(&mut hdr[REC_OFF_KEY_LEN..REC_OFF_KEY_LEN + 4], key.len() as u32);
    LittleEndian::write_u32(&mut hdr[REC_OFF_VAL_LEN..REC_OFF_VAL_LEN + 4], value.len() as u32);

    let c = crc32c_of_parts(&hdr[..REC_OFF_CRC32], key);
    let crc = crc32c::crc32c_append(c, value);
    LittleEndian::write_u32(&mut hdr[REC_OFF_CRC32..REC_OFF_CRC32 + 4], crc);
    hdr
}

/// Write one frame [header][key][value] at the writer's current position.
pub fn write_record<W: Write>(
    writer: &mut W,
    rec_type: u8,
    lsn: u64,
    key: &[u8],
    value: &[u8],
) -> Result<()> {
    if key.len() > u32::MAX as usize || value.len() > u32::MAX as usize {
        return Err(anyhow!(
            "journal frame too large: key {} B, value {} B (max {} each)",
            key.len(),
            value.len(),
            u32::MAX
        ));
    }

    let hdr = build_hdr_with_crc(rec_type, lsn, key, value);
    writer.write_all(&hdr)?;
    if !key.is_empty() {
        writer.write_all(key)?;
    }
    if !value.is_empty() {
        writer.write_all(value)?;
    }
    Ok(())
}
