//! Text and binary (de)serialization for [`Value`], dispatched by OID.
//!
//! Binary format contracts are normative (spec §4.2): big-endian integers
//! and IEEE-754 floats, the `timestamp`/`timestamptz` epoch offset, the
//! standard PostgreSQL array layout, and `-1`-length NULLs in both formats.
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, Result};
use super::{oid, Format, Oid, Value};

/// Encode `value` as wire bytes for `format`, or `None` for SQL NULL.
pub fn encode(value: &Value, format: Format) -> Result<Option<Bytes>> {
    if matches!(value, Value::Null) {
        return Ok(None);
    }
    Ok(Some(match format {
        Format::Text => encode_text(value),
        Format::Binary => encode_binary(value)?,
    }))
}

fn encode_text(value: &Value) -> Bytes {
    match value {
        Value::Null => Bytes::new(),
        Value::Bool(b) => Bytes::from_static(if *b { b"t" } else { b"f" }),
        Value::Int2(v) => Bytes::from(v.to_string()),
        Value::Int4(v) => Bytes::from(v.to_string()),
        Value::Int8(v) => Bytes::from(v.to_string()),
        Value::Float4(v) => Bytes::from(v.to_string()),
        Value::Float8(v) => Bytes::from(v.to_string()),
        Value::Text(s) => Bytes::from(s.clone()),
        Value::Bytea(b) => Bytes::from(format!("\\x{}", hex_encode(b))),
        Value::Date(days) => Bytes::from(format_date(*days)),
        Value::Time(micros) => Bytes::from(format_time(*micros)),
        Value::Timestamp(micros) | Value::TimestampTz(micros) => Bytes::from(format_timestamp(*micros)),
        Value::Uuid(bytes) => Bytes::from(format_uuid(bytes)),
        Value::Array(items, _) => Bytes::from(format_text_array(items)),
        Value::Vector(v) => Bytes::from(format_vector_json(v)),
    }
}

fn encode_binary(value: &Value) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    match value {
        Value::Null => {}
        Value::Bool(b) => buf.put_u8(*b as u8),
        Value::Int2(v) => buf.put_i16(*v),
        Value::Int4(v) => buf.put_i32(*v),
        Value::Int8(v) => buf.put_i64(*v),
        Value::Float4(v) => buf.put_f32(*v),
        Value::Float8(v) => buf.put_f64(*v),
        Value::Text(s) => buf.put_slice(s.as_bytes()),
        Value::Bytea(b) => buf.put_slice(b),
        Value::Date(days) => buf.put_i32(*days),
        Value::Time(micros) => buf.put_i64(*micros),
        Value::Timestamp(micros) | Value::TimestampTz(micros) => buf.put_i64(*micros),
        Value::Uuid(bytes) => buf.put_slice(bytes),
        Value::Array(items, elem_oid) => encode_binary_array(&mut buf, items, *elem_oid)?,
        // No binary form for IRIS VECTOR is defined by PostgreSQL; always
        // carried as text JSON (spec §4.2).
        Value::Vector(v) => buf.put_slice(format_vector_json(v).as_bytes()),
    }
    Ok(buf.freeze())
}

fn encode_binary_array(buf: &mut BytesMut, items: &[Value], elem_oid: Oid) -> Result<()> {
    let ndim = if items.is_empty() { 0 } else { 1 };
    buf.put_i32(ndim);
    buf.put_i32(0); // flags: has-null bit unused, conservative
    buf.put_u32(elem_oid);
    if ndim == 1 {
        buf.put_i32(items.len() as i32);
        buf.put_i32(1); // lower bound
    }
    for item in items {
        match encode(item, Format::Binary)? {
            Some(bytes) => {
                buf.put_i32(bytes.len() as i32);
                buf.put_slice(&bytes);
            }
            None => buf.put_i32(-1),
        }
    }
    Ok(())
}

/// Decode wire bytes for `oid`/`format` into a [`Value`]. `None` bytes means NULL.
pub fn decode(oid: Oid, format: Format, bytes: Option<&[u8]>) -> Result<Value> {
    let Some(bytes) = bytes else { return Ok(Value::Null) };
    match format {
        Format::Text => decode_text(oid, bytes),
        Format::Binary => decode_binary(oid, bytes),
    }
}

fn decode_text(oid_val: Oid, bytes: &[u8]) -> Result<Value> {
    let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok(match oid_val {
        oid::BOOL => Value::Bool(s == "t" || s == "true" || s == "1"),
        oid::INT2 => Value::Int2(s.parse().map_err(|_| DecodeError::Malformed(s.into()))?),
        oid::INT4 => Value::Int4(s.parse().map_err(|_| DecodeError::Malformed(s.into()))?),
        oid::INT8 => Value::Int8(s.parse().map_err(|_| DecodeError::Malformed(s.into()))?),
        oid::FLOAT4 => Value::Float4(s.parse().map_err(|_| DecodeError::Malformed(s.into()))?),
        oid::FLOAT8 => Value::Float8(s.parse().map_err(|_| DecodeError::Malformed(s.into()))?),
        oid::BYTEA => Value::Bytea(Bytes::from(hex_decode(s)?)),
        oid::VECTOR => Value::Vector(super::vector::parse_json_vector(s)?),
        _ => Value::Text(s.to_string()),
    })
}

fn decode_binary(oid_val: Oid, mut bytes: &[u8]) -> Result<Value> {
    Ok(match oid_val {
        oid::BOOL => Value::Bool(require(&bytes, 1)?.get_u8() != 0),
        oid::INT2 => Value::Int2(require(&bytes, 2)?.get_i16()),
        oid::INT4 => Value::Int4(require(&bytes, 4)?.get_i32()),
        oid::INT8 => Value::Int8(require(&bytes, 8)?.get_i64()),
        oid::FLOAT4 => Value::Float4(require(&bytes, 4)?.get_f32()),
        oid::FLOAT8 => Value::Float8(require(&bytes, 8)?.get_f64()),
        oid::DATE => Value::Date(require(&bytes, 4)?.get_i32()),
        oid::TIME => Value::Time(require(&bytes, 8)?.get_i64()),
        oid::TIMESTAMP => Value::Timestamp(require(&bytes, 8)?.get_i64()),
        oid::TIMESTAMPTZ => Value::TimestampTz(require(&bytes, 8)?.get_i64()),
        oid::UUID => {
            if bytes.len() != 16 {
                return Err(DecodeError::BadBinaryLength { expected: 16, got: bytes.len() }.into());
            }
            let mut arr = [0u8; 16];
            arr.copy_from_slice(bytes);
            Value::Uuid(arr)
        }
        oid::BYTEA => Value::Bytea(Bytes::copy_from_slice(bytes)),
        _ => {
            let _ = &mut bytes;
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}

fn require<'a>(bytes: &'a [u8], n: usize) -> Result<&'a [u8]> {
    if bytes.len() < n {
        return Err(DecodeError::BadBinaryLength { expected: n, got: bytes.len() }.into());
    }
    Ok(bytes)
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

fn hex_decode(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("\\x").unwrap_or(s);
    if s.len() % 2 != 0 {
        return Err(DecodeError::Malformed("odd-length hex bytea".into()).into());
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16).ok_or_else(|| DecodeError::Malformed(s.into()))?;
        let lo = (chunk[1] as char).to_digit(16).ok_or_else(|| DecodeError::Malformed(s.into()))?;
        out.push((hi * 16 + lo) as u8);
    }
    Ok(out)
}

fn format_date(days: i32) -> String {
    let (y, m, d) = civil_from_days(days as i64 + super::PG_EPOCH_UNIX_DAYS);
    format!("{y:04}-{m:02}-{d:02}")
}

fn format_time(micros: i64) -> String {
    let total_seconds = micros.div_euclid(1_000_000);
    let frac = micros.rem_euclid(1_000_000);
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{h:02}:{m:02}:{s:02}.{frac:06}")
}

fn format_timestamp(pg_micros: i64) -> String {
    let unix_micros = pg_micros + super::PG_EPOCH_UNIX_MICROS;
    let days = unix_micros.div_euclid(86_400_000_000);
    let micros_of_day = unix_micros.rem_euclid(86_400_000_000);
    let (y, m, d) = civil_from_days(days);
    format!("{} {}", format!("{y:04}-{m:02}-{d:02}"), format_time(micros_of_day))
}

/// Civil calendar date from a day count since 1970-01-01 (Howard Hinnant's
/// `civil_from_days` algorithm; proleptic Gregorian, valid for any i64).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn format_uuid(bytes: &[u8; 16]) -> String {
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

fn format_text_array(items: &[Value]) -> String {
    let mut s = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        match item {
            Value::Null => s.push_str("NULL"),
            Value::Text(t) => {
                s.push('"');
                s.push_str(&t.replace('\\', "\\\\").replace('"', "\\\""));
                s.push('"');
            }
            other => s.push_str(&String::from_utf8_lossy(&encode_text(other))),
        }
    }
    s.push('}');
    s
}

fn format_vector_json(v: &[f32]) -> String {
    let parts: Vec<String> = v.iter().map(|f| f.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_binary_uses_pg_epoch() {
        // 2000-01-01 00:00:01 UTC is 1_000_000 microseconds after the epoch.
        let value = Value::Timestamp(1_000_000);
        let bytes = encode(&value, Format::Binary).unwrap().unwrap();
        assert_eq!(i64::from_be_bytes(bytes[..].try_into().unwrap()), 1_000_000);
    }

    #[test]
    fn date_binary_is_days_since_pg_epoch() {
        let value = Value::Date(0);
        let bytes = encode(&value, Format::Binary).unwrap().unwrap();
        assert_eq!(i32::from_be_bytes(bytes[..].try_into().unwrap()), 0);
        assert_eq!(format_date(0), "2000-01-01");
    }

    #[test]
    fn null_encodes_to_no_bytes() {
        assert!(encode(&Value::Null, Format::Binary).unwrap().is_none());
        assert!(encode(&Value::Null, Format::Text).unwrap().is_none());
    }

    #[test]
    fn int4_round_trips_text_and_binary() {
        let value = Value::Int4(-42);
        let text = encode(&value, Format::Text).unwrap().unwrap();
        assert_eq!(&text[..], b"-42");
        let decoded = decode_text(oid::INT4, &text).unwrap();
        assert_eq!(decoded, value);

        let binary = encode(&value, Format::Binary).unwrap().unwrap();
        let decoded = decode_binary(oid::INT4, &binary).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn bytea_hex_round_trips() {
        let value = Value::Bytea(Bytes::from_static(b"\x00\x01\xff"));
        let text = encode(&value, Format::Text).unwrap().unwrap();
        assert_eq!(&text[..], b"\\x0001ff");
        let decoded = decode_text(oid::BYTEA, &text).unwrap();
        assert_eq!(decoded, value);
    }
}
