//! OID-keyed type/format codec (spec §4.2).
//!
//! Maps PostgreSQL OIDs to text/binary encode and decode functions and
//! defines the in-memory [`Value`] sum type the rest of the gateway passes
//! rows around as (spec §9: "Duck-typed row values -> sum type").
pub mod oid;
pub mod codec;
pub mod vector;

use bytes::Bytes;

pub use oid::Oid;

/// Wire format code: `0` text, `1` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Binary,
}

impl Format {
    pub fn from_code(code: i16) -> Self {
        if code == 1 { Format::Binary } else { Format::Text }
    }

    pub fn code(self) -> i16 {
        match self {
            Format::Text => 0,
            Format::Binary => 1,
        }
    }
}

/// A typed row value (spec §9 GLOSSARY / Duck-typed row values).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    /// UTF-8 text, used for `text`, `varchar`, `numeric` (text form), `json`, `jsonb`.
    Text(String),
    Bytea(Bytes),
    /// Days since 2000-01-01.
    Date(i32),
    /// Microseconds since midnight.
    Time(i64),
    /// Microseconds since 2000-01-01 00:00:00 (no timezone).
    Timestamp(i64),
    /// Microseconds since 2000-01-01 00:00:00 UTC.
    TimestampTz(i64),
    Uuid([u8; 16]),
    /// Array of homogeneously-typed elements with their element OID.
    Array(Vec<Value>, Oid),
    /// IRIS `VECTOR`, carried as a JSON float array on the wire (spec §4.2).
    Vector(Vec<f32>),
}

impl Value {
    /// The OID this value would naturally be described as, when one isn't
    /// already pinned by a `RowDescription`/`ParameterDescription`.
    pub fn natural_oid(&self) -> Oid {
        match self {
            Value::Null => oid::TEXT,
            Value::Bool(_) => oid::BOOL,
            Value::Int2(_) => oid::INT2,
            Value::Int4(_) => oid::INT4,
            Value::Int8(_) => oid::INT8,
            Value::Float4(_) => oid::FLOAT4,
            Value::Float8(_) => oid::FLOAT8,
            Value::Text(_) => oid::TEXT,
            Value::Bytea(_) => oid::BYTEA,
            Value::Date(_) => oid::DATE,
            Value::Time(_) => oid::TIME,
            Value::Timestamp(_) => oid::TIMESTAMP,
            Value::TimestampTz(_) => oid::TIMESTAMPTZ,
            Value::Uuid(_) => oid::UUID,
            Value::Array(_, elem) => oid::array_oid_for(*elem).unwrap_or(oid::TEXT_ARRAY),
            Value::Vector(_) => oid::VECTOR,
        }
    }
}

/// Microseconds-since-Unix-epoch of the PostgreSQL epoch, 2000-01-01 00:00:00 UTC.
///
/// Spec §4.2: "Implementers must apply this exact epoch offset — this is a
/// known bug source when clients request format code 1 for `CURRENT_TIMESTAMP`."
pub const PG_EPOCH_UNIX_MICROS: i64 = 946_684_800_000_000;
/// Days from the Unix epoch (1970-01-01) to the PostgreSQL epoch (2000-01-01).
pub const PG_EPOCH_UNIX_DAYS: i64 = 10_957;

/// Microseconds since the PostgreSQL epoch for the current wall-clock time.
pub fn now_pg_micros() -> i64 {
    let unix_micros = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_micros() as i64;
    unix_micros - PG_EPOCH_UNIX_MICROS
}
