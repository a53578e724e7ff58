//! Deterministic OID assignment for IRIS objects (spec §4.3).
//!
//! `oid(namespace, kind, name)` is a pure function of its inputs (stable
//! across restarts), memoized per-process purely as a read-path optimization.
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::Oid;

/// The kind of catalog object an OID is being generated for (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Table,
    Column,
    Constraint,
    Index,
    Namespace,
    Type,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Table => "table",
            Kind::Column => "column",
            Kind::Constraint => "constraint",
            Kind::Index => "index",
            Kind::Namespace => "namespace",
            Kind::Type => "type",
        }
    }
}

/// Below this value OIDs are reserved for PostgreSQL system objects; the
/// generator never returns one of them (spec §3 `OIDAssignment` invariant).
const SYSTEM_RESERVED_MAX: u32 = 16_384;

/// Pure OID derivation: `SHA256(namespace:kind:name)`, first 4 bytes as a
/// big-endian u32, bumped into the non-system range if it would collide.
pub fn derive(namespace: &str, kind: Kind, name: &str) -> Oid {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let raw = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    if raw < SYSTEM_RESERVED_MAX {
        raw + SYSTEM_RESERVED_MAX
    } else {
        raw
    }
}

/// Process-wide memoization table. Guarantees the same triple always maps to
/// the same `Oid` within one process without recomputing the hash, and that
/// two distinct triples never end up sharing an `Oid` even if their hashes
/// collide (spec §3 `OIDAssignment`, §4.3: "SHA-256-prefix hash, with table
/// disambiguation").
pub struct OidGenerator {
    table: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    forward: HashMap<(String, Kind, String), Oid>,
    reverse: HashMap<Oid, (String, Kind, String)>,
}

impl OidGenerator {
    pub fn new() -> Self {
        Self { table: Mutex::new(Tables::default()) }
    }

    /// Assign (or look up) the OID for `(namespace, kind, name)`. On a hash
    /// collision against a *different* triple, linearly probes forward
    /// (wrapping past `u32::MAX` back above the system-reserved range) until
    /// a free slot is found.
    pub fn oid(&self, namespace: &str, kind: Kind, name: &str) -> Oid {
        let key = (namespace.to_string(), kind, name.to_string());
        let mut tables = self.table.lock().expect("oid table poisoned");
        if let Some(&oid) = tables.forward.get(&key) {
            return oid;
        }

        let mut candidate = derive(namespace, kind, name);
        loop {
            match tables.reverse.get(&candidate) {
                None => break,
                Some(existing) if *existing == key => break,
                Some(_) => {
                    candidate = if candidate == u32::MAX { SYSTEM_RESERVED_MAX } else { candidate + 1 };
                }
            }
        }

        tables.forward.insert(key.clone(), candidate);
        tables.reverse.insert(candidate, key);
        candidate
    }
}

impl Default for OidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_triple_yields_same_oid() {
        let gen = OidGenerator::new();
        let a = gen.oid("SQLUser", Kind::Table, "accounts");
        let b = gen.oid("SQLUser", Kind::Table, "accounts");
        assert_eq!(a, b);
    }

    #[test]
    fn derive_is_pure_and_stable_across_instances() {
        let a = derive("SQLUser", Kind::Table, "accounts");
        let b = derive("SQLUser", Kind::Table, "accounts");
        assert_eq!(a, b);
    }

    #[test]
    fn oid_never_falls_in_system_reserved_range() {
        for name in ["a", "b", "accounts", "orders", "pg_class", ""] {
            let oid = derive("SQLUser", Kind::Table, name);
            assert!(oid >= SYSTEM_RESERVED_MAX, "oid {oid} for {name:?} in reserved range");
        }
    }

    #[test]
    fn different_kinds_can_yield_different_oids_for_same_name() {
        let table_oid = derive("SQLUser", Kind::Table, "x");
        let column_oid = derive("SQLUser", Kind::Column, "x");
        assert_ne!(table_oid, column_oid);
    }

    #[test]
    fn colliding_hash_is_disambiguated_to_a_free_oid() {
        let gen = OidGenerator::new();
        let taken = derive("SQLUser", Kind::Table, "accounts");
        {
            let mut tables = gen.table.lock().unwrap();
            tables.reverse.insert(taken, ("other_ns".to_string(), Kind::Table, "other_name".to_string()));
        }

        let oid = gen.oid("SQLUser", Kind::Table, "accounts");
        assert_ne!(oid, taken, "colliding triple must not reuse the occupied oid");

        // still stable/memoized on a repeat lookup
        assert_eq!(gen.oid("SQLUser", Kind::Table, "accounts"), oid);
    }
}
