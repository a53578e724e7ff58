//! Decoding for IRIS `VECTOR` parameters (spec §4.2, §4.5).
//!
//! A vector parameter arrives either as a `[f1,f2,...]` JSON array or as a
//! `base64:<...>` packed-float payload (default element width 4 bytes,
//! little-endian float32, per spec §4.5).
use crate::error::{DecodeError, Result};

/// Parse a `[1.0,2.5,...]` JSON-array string into floats.
pub fn parse_json_vector(s: &str) -> Result<Vec<f32>> {
    let values: Vec<f64> = serde_json::from_str(s)
        .map_err(|e| DecodeError::Malformed(format!("invalid vector JSON: {e}")))?;
    Ok(values.into_iter().map(|v| v as f32).collect())
}

/// Parse either a JSON array or a `base64:<...>` packed-float payload.
pub fn parse_vector_param(s: &str) -> Result<Vec<f32>> {
    if let Some(b64) = s.strip_prefix("base64:") {
        parse_base64_vector(b64)
    } else {
        parse_json_vector(s)
    }
}

fn parse_base64_vector(b64: &str) -> Result<Vec<f32>> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| DecodeError::Malformed(format!("invalid base64 vector payload: {e}")))?;
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::Malformed("base64 vector payload not a multiple of 4 bytes".into()).into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Render floats back into the JSON-array literal substituted into SQL text.
pub fn to_json_literal(v: &[f32]) -> String {
    let parts: Vec<String> = v.iter().map(|f| f.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array() {
        let v = parse_vector_param("[1,2.5,-3]").unwrap();
        assert_eq!(v, vec![1.0, 2.5, -3.0]);
    }

    #[test]
    fn parses_base64_little_endian_f32() {
        use base64::Engine;
        let floats = vec![1.0f32, -2.5, 3.25];
        let mut bytes = Vec::new();
        for f in &floats {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let payload = format!("base64:{b64}");
        let decoded = parse_vector_param(&payload).unwrap();
        assert_eq!(decoded, floats);
    }

    #[test]
    fn rejects_misaligned_base64_payload() {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"abc");
        assert!(parse_vector_param(&format!("base64:{b64}")).is_err());
    }
}
