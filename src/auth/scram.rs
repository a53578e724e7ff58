//! SCRAM-SHA-256 server-side exchange (RFC 5802/7677), channel binding
//! omitted (spec §6: "`SCRAM-SHA-256` only, not `SCRAM-SHA-256-PLUS`").
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, Result};

const ITERATIONS: u32 = 4096;
const MECHANISM: &str = "SCRAM-SHA-256";

pub fn mechanisms() -> Vec<String> {
    vec![MECHANISM.to_string()]
}

type HmacSha256 = Hmac<Sha256>;

/// Server-side state machine across the two SASL round-trips.
pub struct ServerFirst {
    client_first_bare: String,
    server_first: String,
    nonce: String,
    salted_password: [u8; 32],
}

/// Parse the client's `SASLInitialResponse` payload and produce the
/// server-first-message.
pub fn handle_client_first(data: &[u8], password: &str) -> Result<ServerFirst> {
    let text = std::str::from_utf8(data).map_err(|_| AuthError::Scram("client-first not UTF-8".into()))?;
    let bare = text
        .strip_prefix("n,,")
        .ok_or_else(|| AuthError::Scram("channel-binding flag must be 'n' (no binding)".into()))?;

    let client_nonce = parse_field(bare, 'r').ok_or_else(|| AuthError::Scram("missing client nonce".into()))?;

    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_b64 = base64::engine::general_purpose::STANDARD.encode(salt);

    let mut server_nonce_bytes = [0u8; 18];
    rand::thread_rng().fill_bytes(&mut server_nonce_bytes);
    let server_nonce = base64::engine::general_purpose::STANDARD.encode(server_nonce_bytes);
    let nonce = format!("{client_nonce}{server_nonce}");

    let server_first = format!("r={nonce},s={salt_b64},i={ITERATIONS}");
    let salted_password = hi(password.as_bytes(), &salt, ITERATIONS);

    Ok(ServerFirst { client_first_bare: bare.to_string(), server_first, nonce, salted_password })
}

impl ServerFirst {
    pub fn server_first_message(&self) -> &str {
        &self.server_first
    }

    /// Verify the client-final-message's proof and produce the
    /// server-final-message (`v=...`), or an error if the proof is wrong.
    pub fn handle_client_final(&self, data: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(data).map_err(|_| AuthError::Scram("client-final not UTF-8".into()))?;

        let channel_binding = parse_field(text, 'c').ok_or_else(|| AuthError::Scram("missing channel binding".into()))?;
        if channel_binding != base64::engine::general_purpose::STANDARD.encode("n,,") {
            return Err(AuthError::Scram("unexpected channel-binding value".into()).into());
        }
        let nonce = parse_field(text, 'r').ok_or_else(|| AuthError::Scram("missing nonce".into()))?;
        if nonce != self.nonce {
            return Err(AuthError::Scram("nonce mismatch".into()).into());
        }
        let proof_b64 = parse_field(text, 'p').ok_or_else(|| AuthError::Scram("missing proof".into()))?;
        let proof = base64::engine::general_purpose::STANDARD
            .decode(proof_b64)
            .map_err(|_| AuthError::Scram("invalid proof encoding".into()))?;

        let without_proof = {
            let idx = text.rfind(",p=").ok_or_else(|| AuthError::Scram("malformed client-final".into()))?;
            &text[..idx]
        };

        let client_key = hmac(&self.salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);
        let auth_message = format!("{},{},{}", self.client_first_bare, self.server_first, without_proof);
        let client_signature = hmac(&stored_key, auth_message.as_bytes());

        let computed_proof: Vec<u8> = client_key.iter().zip(client_signature.iter()).map(|(a, b)| a ^ b).collect();
        if computed_proof != proof {
            return Err(AuthError::Scram("authentication failed: proof mismatch".into()).into());
        }

        let server_key = hmac(&self.salted_password, b"Server Key");
        let server_signature = hmac(&server_key, auth_message.as_bytes());
        Ok(format!("v={}", base64::engine::general_purpose::STANDARD.encode(server_signature)))
    }
}

fn parse_field(msg: &str, key: char) -> Option<String> {
    msg.split(',').find_map(|part| part.strip_prefix(key).and_then(|p| p.strip_prefix('=')).map(str::to_string))
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// PBKDF2-HMAC-SHA256 with a single 32-byte output block (SCRAM's `Hi`
/// function, RFC 5802 §2.2).
fn hi(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut salt_block = Vec::with_capacity(salt.len() + 4);
    salt_block.extend_from_slice(salt);
    salt_block.extend_from_slice(&1u32.to_be_bytes());

    let mut u = hmac(password, &salt_block);
    let mut result = u;
    for _ in 1..iterations {
        u = hmac(password, &u);
        for (r, u_byte) in result.iter_mut().zip(u.iter()) {
            *r ^= u_byte;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Full round-trip: a fake client implementing the client half of RFC
    /// 5802 against our server half.
    #[test]
    fn full_handshake_succeeds_with_correct_password() {
        let password = "s3cret";
        let client_nonce = "fyko+d2lbbFgONRv9qkxdawL";
        let client_first_bare = format!("n=user,r={client_nonce}");
        let client_first = format!("n,,{client_first_bare}");

        let server = handle_client_first(client_first.as_bytes(), password).unwrap();
        let server_first = server.server_first_message().to_string();

        let nonce = parse_field(&server_first, 'r').unwrap();
        let gs2_b64 = base64::engine::general_purpose::STANDARD.encode("n,,");
        let client_final_without_proof = format!("c={gs2_b64},r={nonce}");

        let salt_b64 = parse_field(&server_first, 's').unwrap();
        let iterations: u32 = parse_field(&server_first, 'i').unwrap().parse().unwrap();
        let salt = base64::engine::general_purpose::STANDARD.decode(salt_b64).unwrap();
        let salted_password = hi(password.as_bytes(), &salt, iterations);

        let client_key = hmac(&salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);
        let auth_message = format!("{client_first_bare},{server_first},{client_final_without_proof}");
        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key.iter().zip(client_signature.iter()).map(|(a, b)| a ^ b).collect();
        let proof_b64 = base64::engine::general_purpose::STANDARD.encode(proof);

        let client_final = format!("{client_final_without_proof},p={proof_b64}");
        let result = server.handle_client_final(client_final.as_bytes());
        assert!(result.is_ok(), "{result:?}");
        assert!(result.unwrap().starts_with("v="));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let client_nonce = "abc123";
        let client_first_bare = format!("n=user,r={client_nonce}");
        let client_first = format!("n,,{client_first_bare}");
        let server = handle_client_first(client_first.as_bytes(), "correct-password").unwrap();
        let server_first = server.server_first_message().to_string();
        let nonce = parse_field(&server_first, 'r').unwrap();
        let gs2_b64 = base64::engine::general_purpose::STANDARD.encode("n,,");

        // Sign with the wrong password's salted key.
        let wrong_salted = hi(b"wrong-password", &[0u8; 16], ITERATIONS);
        let client_key = hmac(&wrong_salted, b"Client Key");
        let stored_key = Sha256::digest(client_key);
        let client_final_without_proof = format!("c={gs2_b64},r={nonce}");
        let auth_message = format!("{client_first_bare},{server_first},{client_final_without_proof}");
        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key.iter().zip(client_signature.iter()).map(|(a, b)| a ^ b).collect();
        let proof_b64 = base64::engine::general_purpose::STANDARD.encode(proof);
        let client_final = format!("{client_final_without_proof},p={proof_b64}");

        assert!(server.handle_client_final(client_final.as_bytes()).is_err());
    }
}
