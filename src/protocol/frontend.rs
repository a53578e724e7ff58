//! Frontend (client -> server) message parsing.
use bytes::{Buf, Bytes};
use std::collections::HashMap;

use crate::error::{ProtocolError, Result};

/// A parsed `StartupMessage` body (no leading tag byte on the wire).
#[derive(Debug, Clone)]
pub struct StartupMessage {
    pub params: HashMap<String, String>,
}

impl StartupMessage {
    pub fn parse(mut body: Bytes) -> Result<Self> {
        let mut params = HashMap::new();
        loop {
            let key = read_cstr(&mut body)?;
            if key.is_empty() {
                break;
            }
            let value = read_cstr(&mut body)?;
            params.insert(key, value);
        }
        Ok(Self { params })
    }

    pub fn user(&self) -> Option<&str> {
        self.params.get("user").map(String::as_str)
    }

    pub fn database(&self) -> Option<&str> {
        self.params.get("database").map(String::as_str)
    }
}

/// One frontend message, tagged by its wire byte.
#[derive(Debug)]
pub enum FrontendMessage {
    Password(String),
    SaslInitialResponse { mechanism: String, data: Bytes },
    SaslResponse { data: Bytes },
    Query { sql: String },
    Parse { name: String, sql: String, param_oids: Vec<u32> },
    Bind {
        portal: String,
        statement: String,
        param_formats: Vec<i16>,
        params: Vec<Option<Bytes>>,
        result_formats: Vec<i16>,
    },
    Describe { kind: DescribeKind, name: String },
    Execute { portal: String, max_rows: i32 },
    Close { kind: DescribeKind, name: String },
    Sync,
    Flush,
    Terminate,
    CopyFail { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeKind {
    Statement,
    Portal,
}

impl FrontendMessage {
    /// Parse a tagged message given its tag byte and payload.
    pub fn parse(tag: u8, mut body: Bytes) -> Result<Self> {
        Ok(match tag {
            b'p' => {
                // PasswordMessage and SASLInitialResponse/SASLResponse share tag 'p';
                // disambiguated by the caller's auth-phase state, so we expose both
                // parses and let the caller pick.
                FrontendMessage::Password(read_cstr(&mut body)?)
            }
            b'Q' => FrontendMessage::Query { sql: read_cstr(&mut body)? },
            b'P' => {
                let name = read_cstr(&mut body)?;
                let sql = read_cstr(&mut body)?;
                let n = body.get_i16() as usize;
                let mut param_oids = Vec::with_capacity(n);
                for _ in 0..n {
                    param_oids.push(body.get_u32());
                }
                FrontendMessage::Parse { name, sql, param_oids }
            }
            b'B' => {
                let portal = read_cstr(&mut body)?;
                let statement = read_cstr(&mut body)?;
                let fc = body.get_i16() as usize;
                let mut param_formats = Vec::with_capacity(fc);
                for _ in 0..fc {
                    param_formats.push(body.get_i16());
                }
                let pc = body.get_i16() as usize;
                let mut params = Vec::with_capacity(pc);
                for _ in 0..pc {
                    let len = body.get_i32();
                    if len < 0 {
                        params.push(None);
                    } else {
                        let len = len as usize;
                        if body.remaining() < len {
                            return Err(ProtocolError::Malformed("Bind parameter truncated".into()).into());
                        }
                        params.push(Some(body.split_to(len)));
                    }
                }
                let rc = body.get_i16() as usize;
                let mut result_formats = Vec::with_capacity(rc);
                for _ in 0..rc {
                    result_formats.push(body.get_i16());
                }
                FrontendMessage::Bind { portal, statement, param_formats, params, result_formats }
            }
            b'D' => {
                let kind = read_describe_kind(&mut body)?;
                let name = read_cstr(&mut body)?;
                FrontendMessage::Describe { kind, name }
            }
            b'E' => {
                let portal = read_cstr(&mut body)?;
                let max_rows = body.get_i32();
                FrontendMessage::Execute { portal, max_rows }
            }
            b'C' => {
                let kind = read_describe_kind(&mut body)?;
                let name = read_cstr(&mut body)?;
                FrontendMessage::Close { kind, name }
            }
            b'S' => FrontendMessage::Sync,
            b'H' => FrontendMessage::Flush,
            b'X' => FrontendMessage::Terminate,
            b'f' => FrontendMessage::CopyFail { message: read_cstr(&mut body)? },
            other => return Err(ProtocolError::UnexpectedTag(other, "extended/simple query flow").into()),
        })
    }
}

fn read_describe_kind(body: &mut Bytes) -> Result<DescribeKind> {
    match body.get_u8() {
        b'S' => Ok(DescribeKind::Statement),
        b'P' => Ok(DescribeKind::Portal),
        other => Err(ProtocolError::Malformed(format!("unknown Describe/Close kind {other}")).into()),
    }
}

fn read_cstr(body: &mut Bytes) -> Result<String> {
    let nul = body.iter().position(|&b| b == 0)
        .ok_or_else(|| ProtocolError::Malformed("missing NUL terminator".into()))?;
    let s = body.split_to(nul);
    body.advance(1);
    Ok(String::from_utf8(s.to_vec()).map_err(|e| e.utf8_error())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_startup_message() {
        let mut body = Vec::new();
        body.extend_from_slice(b"user\0alice\0database\0db1\0\0");
        let msg = StartupMessage::parse(Bytes::from(body)).unwrap();
        assert_eq!(msg.user(), Some("alice"));
        assert_eq!(msg.database(), Some("db1"));
    }

    #[test]
    fn parses_query_message() {
        let body = Bytes::from_static(b"SELECT 1\0");
        let msg = FrontendMessage::parse(b'Q', body).unwrap();
        match msg {
            FrontendMessage::Query { sql } => assert_eq!(sql, "SELECT 1"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parses_bind_with_null_and_non_null_params() {
        let mut body = Vec::new();
        body.extend_from_slice(b"\0\0"); // portal, statement
        body.extend_from_slice(&0i16.to_be_bytes()); // param format count
        body.extend_from_slice(&2i16.to_be_bytes()); // param count
        body.extend_from_slice(&(-1i32).to_be_bytes()); // NULL
        body.extend_from_slice(&3i32.to_be_bytes());
        body.extend_from_slice(b"abc");
        body.extend_from_slice(&0i16.to_be_bytes()); // result format count
        let msg = FrontendMessage::parse(b'B', Bytes::from(body)).unwrap();
        match msg {
            FrontendMessage::Bind { params, .. } => {
                assert_eq!(params.len(), 2);
                assert!(params[0].is_none());
                assert_eq!(params[1].as_deref(), Some(&b"abc"[..]));
            }
            _ => panic!("wrong variant"),
        }
    }
}
