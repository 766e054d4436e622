//! Binary encoding of partial snapshots.
//!
//! Hosts that ship partials between tasks may keep them in this form and
//! hand evaluators a [`crate::lazy::LazyDatum`] instead of a decoded value.
//! Layout is little-endian POD:
//! - Integers and doubles: raw 8 LE bytes
//! - Booleans: one byte, 0 or 1
//! - Strings: 8-byte LE length prefix + UTF-8 bytes
//! - Arrays/structs: 8-byte LE count + values
//! - Maps: 8-byte LE count + key/value pairs
//! - Every value: 1-byte tag (128 + kind) + payload

use std::io::{Read, Take, Write};
use std::sync::Arc;

use crate::datum::{Datum, DatumKind};
use crate::error::{Result, UdafError};

/// Tag format: tag_byte = 128 + kind value.
const DATUM_TAG_OFFSET: u8 = 128;

/// Deepest Array/Struct/Map nesting accepted by the reader.
const MAX_NESTING_DEPTH: usize = 128;

/// Elements reserved up front; longer sequences grow as they are read.
const MAX_PREALLOC: usize = 4096;

// --- Primitive writers ---

pub fn write_u8(writer: &mut impl Write, v: u8) -> Result<()> {
    writer.write_all(&[v])?;
    Ok(())
}

pub fn write_u64(writer: &mut impl Write, v: u64) -> Result<()> {
    writer.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_i64(writer: &mut impl Write, v: i64) -> Result<()> {
    writer.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_f64(writer: &mut impl Write, v: f64) -> Result<()> {
    writer.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_string(writer: &mut impl Write, s: &str) -> Result<()> {
    write_u64(writer, s.len() as u64)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

// --- Primitive readers ---

pub fn read_u8(reader: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn read_i64(reader: &mut impl Read) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub fn read_f64(reader: &mut impl Read) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length or count prefix. Values above the configured sanity
/// limit are rejected, as are counts that cannot fit in what is left of a
/// bounded input (`min_size` is the smallest encoding of one element).
fn read_len<R: Read>(reader: &mut Take<R>, what: &str, min_size: u64) -> Result<usize> {
    let len = read_u64(reader)?;
    let limit = udaf_config::get_max_encoded_len() as u64;
    if len > limit {
        return Err(UdafError::Format(format!(
            "{} length {} exceeds sanity limit {}",
            what, len, limit
        )));
    }
    if len.saturating_mul(min_size) > reader.limit() {
        return Err(UdafError::Format(format!(
            "{} length {} needs more than the {} bytes remaining",
            what,
            len,
            reader.limit()
        )));
    }
    Ok(len as usize)
}

fn read_text<R: Read>(reader: &mut Take<R>) -> Result<String> {
    let len = read_len(reader, "String", 1)?;
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    String::from_utf8(buf).map_err(|e| UdafError::Format(format!("Invalid UTF-8: {}", e)))
}

pub fn read_string(reader: &mut impl Read) -> Result<String> {
    read_text(&mut Read::take(reader, u64::MAX))
}

// --- Datum ---

pub fn write_datum(writer: &mut impl Write, value: &Datum) -> Result<()> {
    write_u8(writer, DATUM_TAG_OFFSET + value.kind() as u8)?;
    match value {
        Datum::Int(v) => write_i64(writer, *v),
        Datum::Double(v) => write_f64(writer, *v),
        Datum::Bool(v) => write_u8(writer, *v as u8),
        Datum::Text(s) => write_string(writer, s),
        Datum::Array(items) | Datum::Struct(items) => {
            write_u64(writer, items.len() as u64)?;
            for item in items.iter() {
                write_datum(writer, item)?;
            }
            Ok(())
        }
        Datum::Map(pairs) => {
            write_u64(writer, pairs.len() as u64)?;
            for (k, v) in pairs.iter() {
                write_datum(writer, k)?;
                write_datum(writer, v)?;
            }
            Ok(())
        }
        Datum::Null => Ok(()),
    }
}

/// Split a tag byte into its kind.
pub fn kind_from_tag(tag: u8) -> Result<DatumKind> {
    if tag < DATUM_TAG_OFFSET {
        return Err(UdafError::Format(format!("Invalid datum tag {}", tag)));
    }
    DatumKind::try_from(tag - DATUM_TAG_OFFSET)
}

pub fn read_datum(reader: &mut impl Read) -> Result<Datum> {
    read_value(&mut Read::take(reader, u64::MAX), 0)
}

fn read_value<R: Read>(reader: &mut Take<R>, depth: usize) -> Result<Datum> {
    let kind = kind_from_tag(read_u8(reader)?)?;
    match kind {
        DatumKind::Int => Ok(Datum::Int(read_i64(reader)?)),
        DatumKind::Double => Ok(Datum::Double(read_f64(reader)?)),
        DatumKind::Bool => match read_u8(reader)? {
            0 => Ok(Datum::Bool(false)),
            1 => Ok(Datum::Bool(true)),
            other => Err(UdafError::Format(format!("Invalid boolean byte {}", other))),
        },
        DatumKind::Text => Ok(Datum::Text(Arc::from(read_text(reader)?))),
        DatumKind::Array | DatumKind::Struct => {
            check_depth(depth)?;
            let len = read_len(reader, "Sequence", 1)?;
            let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                items.push(read_value(reader, depth + 1)?);
            }
            if kind == DatumKind::Array {
                Ok(Datum::Array(Arc::from(items)))
            } else {
                Ok(Datum::Struct(Arc::from(items)))
            }
        }
        DatumKind::Map => {
            check_depth(depth)?;
            let len = read_len(reader, "Map", 2)?;
            let mut pairs = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                let key = read_value(reader, depth + 1)?;
                let value = read_value(reader, depth + 1)?;
                pairs.push((key, value));
            }
            Ok(Datum::Map(Arc::from(pairs)))
        }
        DatumKind::Null => Ok(Datum::Null),
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(UdafError::Format(format!(
            "Nesting deeper than {} levels",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

/// Encode one value into a fresh byte vector.
pub fn encode_datum(value: &Datum) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_datum(&mut out, value)?;
    Ok(out)
}

/// Decode exactly one value; trailing bytes are a format error.
pub fn decode_datum(bytes: &[u8]) -> Result<Datum> {
    let mut reader = Read::take(bytes, bytes.len() as u64);
    let value = read_value(&mut reader, 0)?;
    if reader.limit() != 0 {
        return Err(UdafError::Format(format!(
            "{} trailing bytes after encoded value",
            reader.limit()
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_u64() {
        let bytes = 42u64.to_le_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(read_u64(&mut cursor).unwrap(), 42);
    }

    #[test]
    fn test_read_string_empty() {
        let data = 0u64.to_le_bytes().to_vec();
        let mut cursor = Cursor::new(&data);
        assert_eq!(read_string(&mut cursor).unwrap(), "");
    }

    #[test]
    fn test_int_layout() {
        let bytes = encode_datum(&Datum::Int(42)).unwrap();
        let mut expected = vec![128u8]; // tag = 128 + 0 (INT)
        expected.extend_from_slice(&42i64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_decode_hand_built_map() {
        let mut data = vec![134u8]; // tag = 128 + 6 (MAP)
        data.extend_from_slice(&1u64.to_le_bytes());
        data.push(129); // DOUBLE key
        data.extend_from_slice(&2.5f64.to_le_bytes());
        data.push(128); // INT value
        data.extend_from_slice(&7i64.to_le_bytes());
        match decode_datum(&data).unwrap() {
            Datum::Map(pairs) => {
                assert_eq!(pairs.len(), 1);
                assert_eq!(pairs[0], (Datum::Double(2.5), Datum::Int(7)));
            }
            other => panic!("Expected Map, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_struct_survives_encoding() {
        let value = Datum::Struct(Arc::from(vec![
            Datum::Double(9.5),
            Datum::from("row"),
            Datum::Null,
            Datum::Array(Arc::from(vec![Datum::Bool(true), Datum::Bool(false)])),
        ]));
        let bytes = encode_datum(&value).unwrap();
        assert_eq!(decode_datum(&bytes).unwrap(), value);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_datum(&Datum::Null).unwrap();
        bytes.push(0);
        assert!(matches!(decode_datum(&bytes), Err(UdafError::Format(_))));
    }

    #[test]
    fn test_legacy_tag_rejected() {
        assert!(matches!(decode_datum(&[3u8]), Err(UdafError::Format(_))));
    }

    #[test]
    fn test_truncated_input_is_io_error() {
        let data = vec![129u8, 0, 0];
        assert!(matches!(decode_datum(&data), Err(UdafError::Io(_))));
    }

    fn count_prefix(tag: u8, count: u64) -> Vec<u8> {
        let mut data = vec![tag];
        data.extend_from_slice(&count.to_le_bytes());
        data
    }

    #[test]
    fn test_map_count_beyond_input_rejected() {
        let data = count_prefix(134, 250_000_000); // MAP
        assert!(matches!(decode_datum(&data), Err(UdafError::Format(_))));
    }

    #[test]
    fn test_struct_count_beyond_input_rejected() {
        let mut data = count_prefix(133, 3); // STRUCT of 3, only 2 present
        data.push(135);
        data.push(135);
        assert!(matches!(decode_datum(&data), Err(UdafError::Format(_))));
        let data = count_prefix(133, u32::MAX as u64);
        assert!(matches!(decode_datum(&data), Err(UdafError::Format(_))));
    }

    #[test]
    fn test_large_count_on_stream_fails_without_reserving() {
        let data = count_prefix(134, 250_000_000);
        let mut cursor = Cursor::new(&data);
        assert!(matches!(read_datum(&mut cursor), Err(UdafError::Io(_))));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut data = Vec::new();
        for _ in 0..10_000 {
            data.extend_from_slice(&count_prefix(132, 1)); // ARRAY of 1
        }
        data.push(135);
        assert!(matches!(decode_datum(&data), Err(UdafError::Format(_))));
    }

    #[test]
    fn test_nesting_within_limit_decodes() {
        let mut value = Datum::Null;
        for _ in 0..MAX_NESTING_DEPTH {
            value = Datum::Array(Arc::from(vec![value]));
        }
        let bytes = encode_datum(&value).unwrap();
        assert_eq!(decode_datum(&bytes).unwrap(), value);
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut data = vec![130u8]; // STRING
        data.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(decode_datum(&data), Err(UdafError::Format(_))));
    }
}
