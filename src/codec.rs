//! codec - JSON wire encoding of a holder record.
//!
//! Формат (стабильный, совместим с ранее записанными данными):
//!   {"Holder":"alice","Times":[["5","12"],["20",""]]}
//! - `Times` - массив пар строк [start, end]; end == "" означает открытый интервал.
//! - Field names are matched ASCII case-insensitively (`holder`, `HOLDER`, `times`, ...).
//!   If several spellings of one field are present, the last one in the document wins.
//!   Unknown fields, missing fields and `"Times": null` are accepted.
//!
//! Two decode policies:
//! - lenient (default, compatible): malformed bytes decode to an empty record;
//! - strict: malformed bytes or broken invariants are a `DecodeFailure`.

use log::debug;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LedgerError, LedgerResult};
use crate::metrics::record_lenient_decode_fallback;
use crate::record::{parse_timestamp, HolderRecord, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    #[default]
    Lenient,
    Strict,
}

impl DecodeMode {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            DecodeMode::Strict
        } else {
            DecodeMode::Lenient
        }
    }
}

#[derive(Serialize)]
struct WireOut<'a> {
    #[serde(rename = "Holder")]
    holder: &'a str,
    #[serde(rename = "Times")]
    times: Vec<[String; 2]>,
}

#[derive(Default)]
struct WireIn {
    holder: Option<String>,
    times: Option<Vec<Vec<String>>>,
}

// derive(Deserialize) сравнивает имена полей точно, поэтому обход map вручную,
// в порядке документа: последнее вхождение поля перекрывает предыдущие.
impl<'de> Deserialize<'de> for WireIn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WireInVisitor;

        impl<'de> Visitor<'de> for WireInVisitor {
            type Value = WireIn;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object with Holder and Times fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<WireIn, A::Error> {
                let mut wire = WireIn::default();
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case("holder") {
                        // null не стирает уже прочитанное имя
                        if let Some(h) = map.next_value::<Option<String>>()? {
                            wire.holder = Some(h);
                        }
                    } else if key.eq_ignore_ascii_case("times") {
                        wire.times = map.next_value()?;
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(wire)
            }
        }

        deserializer.deserialize_map(WireInVisitor)
    }
}

/// Encode a record. Never fails for a well-formed record.
pub fn encode(record: &HolderRecord) -> Vec<u8> {
    let times = record
        .history()
        .iter()
        .map(|iv| {
            [
                iv.start.to_string(),
                iv.end.map(|e| e.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    let wire = WireOut {
        holder: record.holder(),
        times,
    };
    // только String и Vec: serde_json здесь не может вернуть ошибку
    serde_json::to_vec(&wire).expect("serializing strings into a Vec<u8> cannot fail")
}

/// Lenient decode: anything that does not match the expected structure yields an empty record.
pub fn decode(bytes: &[u8]) -> HolderRecord {
    match parse(bytes) {
        Ok(rec) => rec,
        Err(reason) => {
            record_lenient_decode_fallback();
            debug!("codec: lenient decode fallback to empty record ({})", reason);
            HolderRecord::default()
        }
    }
}

/// Strict decode: structure and open/close invariants must hold.
pub fn decode_strict(bytes: &[u8]) -> LedgerResult<HolderRecord> {
    let rec = parse(bytes).map_err(LedgerError::Decode)?;
    rec.check_invariants().map_err(LedgerError::Decode)?;
    Ok(rec)
}

pub fn decode_with(bytes: &[u8], mode: DecodeMode) -> LedgerResult<HolderRecord> {
    match mode {
        DecodeMode::Lenient => Ok(decode(bytes)),
        DecodeMode::Strict => decode_strict(bytes),
    }
}

fn parse(bytes: &[u8]) -> std::result::Result<HolderRecord, String> {
    let wire: WireIn = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let raw = wire.times.unwrap_or_default();
    let mut history = Vec::with_capacity(raw.len());
    for (i, pair) in raw.iter().enumerate() {
        if pair.len() != 2 {
            return Err(format!("Times[{}]: expected 2 elements, got {}", i, pair.len()));
        }
        let start = parse_timestamp(&pair[0])
            .ok_or_else(|| format!("Times[{}]: bad start {:?}", i, pair[0]))?;
        let end = if pair[1].is_empty() {
            None
        } else {
            Some(
                parse_timestamp(&pair[1])
                    .ok_or_else(|| format!("Times[{}]: bad end {:?}", i, pair[1]))?,
            )
        };
        history.push(Interval { start, end });
    }
    Ok(HolderRecord::from_parts_unchecked(
        wire.holder.unwrap_or_default(),
        history,
    ))
}
