//! PostgreSQL OID constants for the types this gateway emulates (spec §4.2).

/// A PostgreSQL object identifier: a 32-bit integer naming a type, relation,
/// or other catalog object.
pub type Oid = u32;

pub const BOOL: Oid = 16;
pub const BYTEA: Oid = 17;
pub const CHAR: Oid = 18;
pub const INT8: Oid = 20;
pub const INT2: Oid = 21;
pub const INT4: Oid = 23;
pub const TEXT: Oid = 25;
pub const JSON: Oid = 114;
pub const FLOAT4: Oid = 700;
pub const FLOAT8: Oid = 701;
pub const UNKNOWN: Oid = 705;
pub const VARCHAR: Oid = 1043;
pub const DATE: Oid = 1082;
pub const TIME: Oid = 1083;
pub const TIMESTAMP: Oid = 1114;
pub const TIMESTAMPTZ: Oid = 1184;
pub const NUMERIC: Oid = 1700;
pub const JSONB: Oid = 3802;
pub const UUID: Oid = 2950;
pub const REGCLASS: Oid = 2205;

pub const INT4_ARRAY: Oid = 1007;
pub const TEXT_ARRAY: Oid = 1009;
pub const VARCHAR_ARRAY: Oid = 1015;

/// Stable OID assigned to IRIS `VECTOR`. Outside the range PostgreSQL itself
/// allocates (reserved < 16384 by the system); this gateway treats it as a
/// private extension OID, carried as a JSON float array on the wire.
pub const VECTOR: Oid = 16_385;

/// Element OID for a given array OID, used when decoding array literals.
pub fn element_oid_of(array_oid: Oid) -> Option<Oid> {
    match array_oid {
        INT4_ARRAY => Some(INT4),
        TEXT_ARRAY => Some(TEXT),
        VARCHAR_ARRAY => Some(VARCHAR),
        _ => None,
    }
}

/// Array OID for a given element OID, the inverse of [`element_oid_of`].
pub fn array_oid_for(elem_oid: Oid) -> Option<Oid> {
    match elem_oid {
        INT4 => Some(INT4_ARRAY),
        TEXT => Some(TEXT_ARRAY),
        VARCHAR => Some(VARCHAR_ARRAY),
        _ => None,
    }
}

/// Fixed binary width in bytes for fixed-size types, `-1` for variable-length
/// (matches the `typlen` column PostgreSQL reports in `pg_type`/`RowDescription`).
pub fn type_len(oid: Oid) -> i16 {
    match oid {
        BOOL | CHAR => 1,
        INT2 => 2,
        INT4 | FLOAT4 | DATE => 4,
        INT8 | FLOAT8 | TIME | TIMESTAMP | TIMESTAMPTZ => 8,
        UUID => 16,
        _ => -1,
    }
}
