//! Backend (server -> client) message encoding.
use bytes::{BufMut, Bytes, BytesMut};

/// Column metadata for a `RowDescription` message.
#[derive(Debug, Clone)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: u32,
    pub column_id: i16,
    pub type_oid: u32,
    pub type_len: i16,
    pub type_mod: i32,
    pub format_code: i16,
}

impl FieldDescription {
    pub fn new(name: impl Into<String>, type_oid: u32, type_len: i16, format_code: i16) -> Self {
        Self {
            name: name.into(),
            table_oid: 0,
            column_id: 0,
            type_oid,
            type_len,
            type_mod: -1,
            format_code,
        }
    }
}

/// One field of an `ErrorResponse` / `NoticeResponse`.
#[derive(Debug, Clone)]
pub struct ErrorFields {
    pub severity: &'static str,
    pub sqlstate: &'static str,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<u32>,
}

impl ErrorFields {
    pub fn new(severity: &'static str, sqlstate: &'static str, message: impl Into<String>) -> Self {
        Self { severity, sqlstate, message: message.into(), detail: None, hint: None, position: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// A backend message ready to be written to the wire (spec §4.1, §6).
#[derive(Debug)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationSasl { mechanisms: Vec<&'static str> },
    AuthenticationSaslContinue { data: Bytes },
    AuthenticationSaslFinal { data: Bytes },
    ParameterStatus { name: String, value: String },
    BackendKeyData { backend_id: i32, secret: i32 },
    ReadyForQuery { tx_status: u8 },
    RowDescription { fields: Vec<FieldDescription> },
    DataRow { values: Vec<Option<Bytes>> },
    CommandComplete { tag: String },
    EmptyQueryResponse,
    ErrorResponse(ErrorFields),
    NoticeResponse(ErrorFields),
    ParameterDescription { oids: Vec<u32> },
    NoData,
    ParseComplete,
    BindComplete,
    CloseComplete,
    PortalSuspended,
}

impl BackendMessage {
    /// Tag byte for this message, or `None` for the untagged negotiation
    /// replies (`N`/`S` to `SSLRequest`) which are written separately.
    pub fn tag(&self) -> u8 {
        match self {
            BackendMessage::AuthenticationOk
            | BackendMessage::AuthenticationCleartextPassword
            | BackendMessage::AuthenticationSasl { .. }
            | BackendMessage::AuthenticationSaslContinue { .. }
            | BackendMessage::AuthenticationSaslFinal { .. } => b'R',
            BackendMessage::ParameterStatus { .. } => b'S',
            BackendMessage::BackendKeyData { .. } => b'K',
            BackendMessage::ReadyForQuery { .. } => b'Z',
            BackendMessage::RowDescription { .. } => b'T',
            BackendMessage::DataRow { .. } => b'D',
            BackendMessage::CommandComplete { .. } => b'C',
            BackendMessage::EmptyQueryResponse => b'I',
            BackendMessage::ErrorResponse(_) => b'E',
            BackendMessage::NoticeResponse(_) => b'N',
            BackendMessage::ParameterDescription { .. } => b't',
            BackendMessage::NoData => b'n',
            BackendMessage::ParseComplete => b'1',
            BackendMessage::BindComplete => b'2',
            BackendMessage::CloseComplete => b'3',
            BackendMessage::PortalSuspended => b's',
        }
    }

    /// Encode the payload (everything after the length prefix).
    pub fn encode_payload(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            BackendMessage::AuthenticationOk => buf.put_i32(0),
            BackendMessage::AuthenticationCleartextPassword => buf.put_i32(3),
            BackendMessage::AuthenticationSasl { mechanisms } => {
                buf.put_i32(10);
                for m in mechanisms {
                    put_cstr(&mut buf, m);
                }
                buf.put_u8(0);
            }
            BackendMessage::AuthenticationSaslContinue { data } => {
                buf.put_i32(11);
                buf.put_slice(data);
            }
            BackendMessage::AuthenticationSaslFinal { data } => {
                buf.put_i32(12);
                buf.put_slice(data);
            }
            BackendMessage::ParameterStatus { name, value } => {
                put_cstr(&mut buf, name);
                put_cstr(&mut buf, value);
            }
            BackendMessage::BackendKeyData { backend_id, secret } => {
                buf.put_i32(*backend_id);
                buf.put_i32(*secret);
            }
            BackendMessage::ReadyForQuery { tx_status } => buf.put_u8(*tx_status),
            BackendMessage::RowDescription { fields } => {
                buf.put_i16(fields.len() as i16);
                for f in fields {
                    put_cstr(&mut buf, &f.name);
                    buf.put_u32(f.table_oid);
                    buf.put_i16(f.column_id);
                    buf.put_u32(f.type_oid);
                    buf.put_i16(f.type_len);
                    buf.put_i32(f.type_mod);
                    buf.put_i16(f.format_code);
                }
            }
            BackendMessage::DataRow { values } => {
                buf.put_i16(values.len() as i16);
                for v in values {
                    match v {
                        Some(bytes) => {
                            buf.put_i32(bytes.len() as i32);
                            buf.put_slice(bytes);
                        }
                        None => buf.put_i32(-1),
                    }
                }
            }
            BackendMessage::CommandComplete { tag } => put_cstr(&mut buf, tag),
            BackendMessage::EmptyQueryResponse => {}
            BackendMessage::ErrorResponse(fields) | BackendMessage::NoticeResponse(fields) => {
                encode_error_fields(&mut buf, fields);
            }
            BackendMessage::ParameterDescription { oids } => {
                buf.put_i16(oids.len() as i16);
                for oid in oids {
                    buf.put_u32(*oid);
                }
            }
            BackendMessage::NoData
            | BackendMessage::ParseComplete
            | BackendMessage::BindComplete
            | BackendMessage::CloseComplete
            | BackendMessage::PortalSuspended => {}
        }
        buf.freeze()
    }
}

fn encode_error_fields(buf: &mut BytesMut, fields: &ErrorFields) {
    buf.put_u8(b'S');
    put_cstr(buf, fields.severity);
    buf.put_u8(b'C');
    put_cstr(buf, fields.sqlstate);
    buf.put_u8(b'M');
    put_cstr(buf, &fields.message);
    if let Some(detail) = &fields.detail {
        buf.put_u8(b'D');
        put_cstr(buf, detail);
    }
    if let Some(hint) = &fields.hint {
        buf.put_u8(b'H');
        put_cstr(buf, hint);
    }
    if let Some(position) = fields.position {
        buf.put_u8(b'P');
        put_cstr(buf, &position.to_string());
    }
    buf.put_u8(0);
}

fn put_cstr(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_for_query_payload_carries_tx_status() {
        let msg = BackendMessage::ReadyForQuery { tx_status: b'I' };
        assert_eq!(msg.tag(), b'Z');
        assert_eq!(&msg.encode_payload()[..], &[b'I']);
    }

    #[test]
    fn data_row_null_is_minus_one_length() {
        let msg = BackendMessage::DataRow { values: vec![None, Some(Bytes::from_static(b"hi"))] };
        let payload = msg.encode_payload();
        assert_eq!(&payload[0..2], &2i16.to_be_bytes());
        assert_eq!(&payload[2..6], &(-1i32).to_be_bytes());
        assert_eq!(&payload[6..10], &2i32.to_be_bytes());
        assert_eq!(&payload[10..12], b"hi");
    }

    #[test]
    fn error_response_includes_sqlstate_and_message() {
        let fields = ErrorFields::new("ERROR", "0A000", "L2 distance is not implemented");
        let msg = BackendMessage::ErrorResponse(fields);
        let payload = msg.encode_payload();
        let s = String::from_utf8_lossy(&payload);
        assert!(s.contains("0A000"));
        assert!(s.contains("L2 distance is not implemented"));
    }
}
