//! Frame codec: length-prefixed message framing (spec §4.1).
//!
//! A regular message is `tag:u8, len:i32 (inclusive of itself), payload`.
//! The very first message on a connection has no tag byte (`StartupMessage`,
//! `SSLRequest`, `GSSENCRequest`, or `CancelRequest` are disambiguated by
//! payload inspection, see [`read_untagged`]).
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Reject any message whose declared length exceeds this many bytes.
pub const MAX_MESSAGE_LEN: u32 = 256 * 1024 * 1024;

/// Code sent by the client as the first 4 bytes of an `SSLRequest`'s
/// fictitious protocol-version field.
pub const SSL_REQUEST_CODE: i32 = 80877103;
/// Same, for `GSSENCRequest`.
pub const GSSENC_REQUEST_CODE: i32 = 80877104;
/// Same, for `CancelRequest`.
pub const CANCEL_REQUEST_CODE: i32 = 80877102;
/// Protocol version 3.0, the only one this gateway speaks.
pub const PROTOCOL_VERSION_3_0: i32 = 0x0003_0000;

/// Read one tagged message: `(tag, payload-without-length-prefix)`.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(u8, Bytes)> {
    let mut head = [0u8; 5];
    match reader.read_exact(&mut head).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::Eof.into());
        }
        Err(e) => return Err(e.into()),
    }
    let tag = head[0];
    let len = i32::from_be_bytes([head[1], head[2], head[3], head[4]]);
    let body_len = validate_len(len)?;
    let mut body = BytesMut::zeroed(body_len);
    reader.read_exact(&mut body).await?;
    Ok((tag, body.freeze()))
}

/// Outcome of reading the very first message on a client socket.
pub enum FirstMessage {
    Ssl,
    GssEnc,
    Cancel { backend_id: i32, secret: i32 },
    Startup { proto: i32, payload: Bytes },
}

/// Read the first, untagged message and classify it by its embedded code
/// (spec §4.1: "SSLRequest/GSSENCRequest/StartupMessage are distinguished
/// by payload inspection on the first read").
pub async fn read_untagged<R: AsyncRead + Unpin>(reader: &mut R) -> Result<FirstMessage> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = i32::from_be_bytes(len_buf);
    let body_len = validate_len(len)?;
    let mut body = BytesMut::zeroed(body_len);
    reader.read_exact(&mut body).await?;
    let mut body = body.freeze();
    let code = body.get_i32();

    match code {
        SSL_REQUEST_CODE => Ok(FirstMessage::Ssl),
        GSSENC_REQUEST_CODE => Ok(FirstMessage::GssEnc),
        CANCEL_REQUEST_CODE => {
            if body.remaining() < 8 {
                return Err(ProtocolError::Malformed("short CancelRequest".into()).into());
            }
            let backend_id = body.get_i32();
            let secret = body.get_i32();
            Ok(FirstMessage::Cancel { backend_id, secret })
        }
        proto => Ok(FirstMessage::Startup { proto, payload: body }),
    }
}

fn validate_len(len: i32) -> Result<usize> {
    if len < 4 {
        return Err(ProtocolError::Malformed(format!("message length {len} below minimum of 4")).into());
    }
    let body_len = len as u32 - 4;
    if body_len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLarge(body_len).into());
    }
    Ok(body_len as usize)
}

/// Write one tagged message given its already-encoded payload.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, tag: u8, payload: &[u8]) -> Result<()> {
    let len = (payload.len() as u32 + 4).to_be_bytes();
    writer.write_all(&[tag]).await?;
    writer.write_all(&len).await?;
    writer.write_all(payload).await?;
    Ok(())
}

/// Write the untagged startup-style message (no leading tag byte).
pub async fn write_untagged<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = (payload.len() as u32 + 4).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_tagged_message() {
        let mut buf = Vec::new();
        write_message(&mut buf, b'Q', b"SELECT 1\0").await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let (tag, payload) = read_message(&mut cursor).await.unwrap();
        assert_eq!(tag, b'Q');
        assert_eq!(&payload[..], b"SELECT 1\0");
    }

    #[tokio::test]
    async fn rejects_oversized_message() {
        let mut head = Vec::new();
        head.push(b'Q');
        head.extend_from_slice(&(MAX_MESSAGE_LEN + 5).to_be_bytes());
        let mut cursor = std::io::Cursor::new(head);
        let err = read_message(&mut cursor).await.unwrap_err();
        assert_eq!(err.sqlstate(), crate::error::Sqlstate::PROTOCOL_VIOLATION);
    }

    #[tokio::test]
    async fn classifies_ssl_request() {
        let mut buf = Vec::new();
        write_untagged(&mut buf, &SSL_REQUEST_CODE.to_be_bytes()).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(read_untagged(&mut cursor).await.unwrap(), FirstMessage::Ssl));
    }

    #[tokio::test]
    async fn classifies_cancel_request() {
        let mut buf = Vec::new();
        let mut payload = CANCEL_REQUEST_CODE.to_be_bytes().to_vec();
        payload.extend_from_slice(&42i32.to_be_bytes());
        payload.extend_from_slice(&1234i32.to_be_bytes());
        write_untagged(&mut buf, &payload).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        match read_untagged(&mut cursor).await.unwrap() {
            FirstMessage::Cancel { backend_id, secret } => {
                assert_eq!(backend_id, 42);
                assert_eq!(secret, 1234);
            }
            _ => panic!("expected CancelRequest"),
        }
    }
}
