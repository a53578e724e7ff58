//! Authentication (spec §4.10 Startup, §6 "SCRAM-SHA-256 ... RFC 7677").
pub mod scram;

use rand::RngCore;

/// Which method the startup phase negotiated for a given user (spec §4.10:
/// "Trust, CleartextPassword, SCRAM-SHA-256").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Trust,
    Cleartext,
    ScramSha256,
}

/// Credentials the gateway checks incoming auth attempts against. In this
/// deployment model the gateway validates against the same credentials it
/// uses for its own backend pool connection (spec is silent on a separate
/// user directory; see `DESIGN.md` Open Question O-3).
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// A fresh, unpredictable 4-byte cancel secret for `BackendKeyData` (spec
/// §4.10, §4.11).
pub fn generate_cancel_secret() -> i32 {
    rand::thread_rng().next_u32() as i32
}
