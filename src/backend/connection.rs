//! A single connection to the IRIS backend (spec §4.8).
//!
//! IRIS is reached over a small length-prefixed JSON request/response
//! protocol carried over TCP. This stands in for IRIS's native DBAPI wire
//! format, which the gateway speaks to an in-process bridge process; the
//! executor API above this module (`execute`/`begin`/`commit`/`rollback`)
//! does not change if that transport is swapped for a different one.
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{BackendError, Result, Sqlstate};
use crate::types::Value;

use super::{BackendConfig, ColumnDescriptor, QueryResult};

const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Transaction status of a backend connection (spec §4.8, §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Idle,
    InTransaction,
    Failed,
}

impl TxStatus {
    pub fn as_byte(self) -> u8 {
        match self {
            TxStatus::Idle => b'I',
            TxStatus::InTransaction => b'T',
            TxStatus::Failed => b'E',
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    op: &'a str,
    sql: Option<&'a str>,
    params: Option<&'a [ParamValue]>,
}

/// Wraps a bound parameter's rendered text form. `None` serializes to JSON
/// `null` rather than an empty string, so a bound SQL NULL reaches the IRIS
/// bridge as a real null instead of being indistinguishable from `""`.
#[derive(Serialize)]
struct ParamValue(Option<String>);

#[derive(Deserialize)]
struct Response {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    columns: Vec<ResponseColumn>,
    #[serde(default)]
    rows: Vec<Vec<Option<String>>>,
    #[serde(default)]
    row_count: Option<u64>,
    #[serde(default)]
    tag: Option<String>,
}

#[derive(Deserialize)]
struct ResponseColumn {
    name: String,
    type_oid: u32,
    type_len: i16,
}

/// A live TCP connection to the IRIS backend bridge, affine to one PGWire
/// connection for the lifetime of any open portal (spec §4.8).
pub struct IrisConnection {
    stream: TcpStream,
    tx_status: TxStatus,
}

impl IrisConnection {
    pub async fn connect(config: &BackendConfig) -> Result<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        let mut conn = Self { stream, tx_status: TxStatus::Idle };
        conn.authenticate(config).await?;
        Ok(conn)
    }

    async fn authenticate(&mut self, config: &BackendConfig) -> Result<()> {
        let sql = format!(
            "-- connect user={} namespace={}",
            config.user, config.namespace
        );
        let request = Request { op: "connect", sql: Some(&sql), params: None };
        self.roundtrip(&request).await?;
        Ok(())
    }

    pub fn tx_status(&self) -> TxStatus {
        self.tx_status
    }

    pub fn mark_failed(&mut self) {
        self.tx_status = TxStatus::Failed;
    }

    pub async fn begin(&mut self) -> Result<()> {
        self.simple("START TRANSACTION").await?;
        self.tx_status = TxStatus::InTransaction;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.simple("COMMIT").await?;
        self.tx_status = TxStatus::Idle;
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.simple("ROLLBACK").await?;
        self.tx_status = TxStatus::Idle;
        Ok(())
    }

    /// Healthcheck ping used by the pool's idle-cycling policy.
    pub async fn ping(&mut self) -> Result<()> {
        self.simple("SELECT 1").await
    }

    async fn simple(&mut self, sql: &str) -> Result<()> {
        self.execute(sql, &[]).await?;
        Ok(())
    }

    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let encoded: Vec<ParamValue> = params.iter().map(|v| ParamValue(render_param(v))).collect();
        let request = Request { op: "execute", sql: Some(sql), params: Some(&encoded) };
        let response = self.roundtrip(&request).await?;

        if !response.ok {
            self.tx_status = TxStatus::Failed;
            let message = response.error.unwrap_or_else(|| "backend execution failed".into());
            return Err(BackendError::new(Sqlstate::INTERNAL_ERROR, "IRIS query failed")
                .with_detail(message)
                .into());
        }

        let columns: Vec<ColumnDescriptor> = response
            .columns
            .into_iter()
            .map(|c| ColumnDescriptor { name: c.name, type_oid: c.type_oid, type_len: c.type_len })
            .collect();
        let mut rows = Vec::with_capacity(response.rows.len());
        for raw_row in response.rows {
            let mut row = Vec::with_capacity(raw_row.len());
            for (cell, column) in raw_row.into_iter().zip(columns.iter()) {
                let value = match cell {
                    Some(text) => crate::types::codec::decode(
                        column.type_oid,
                        crate::types::Format::Text,
                        Some(text.as_bytes()),
                    )?,
                    None => Value::Null,
                };
                row.push(value);
            }
            rows.push(row);
        }
        Ok(QueryResult {
            columns,
            rows,
            command_tag: response.tag.unwrap_or_default(),
            row_count_hint: response.row_count,
        })
    }

    async fn roundtrip(&mut self, request: &Request<'_>) -> Result<Response> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| BackendError::new(Sqlstate::INTERNAL_ERROR, format!("encoding backend request: {e}")))?;
        self.write_frame(&payload).await?;
        let frame = self.read_frame().await?;
        serde_json::from_slice(&frame)
            .map_err(|e| BackendError::new(Sqlstate::INTERNAL_ERROR, format!("decoding backend response: {e}")).into())
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Bytes> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            return Err(BackendError::new(Sqlstate::CONNECTION_FAILURE, "backend frame too large").into());
        }
        let mut payload = vec![0u8; len as usize];
        self.stream.read_exact(&mut payload).await?;
        Ok(Bytes::from(payload))
    }
}

/// Renders a bound value to the text form sent to the IRIS bridge. `None`
/// means SQL NULL; it must stay `None` all the way to the wire so the bridge
/// never confuses it with an empty string (`""`).
fn render_param(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Null => return None,
        Value::Bool(b) => b.to_string(),
        Value::Int2(v) => v.to_string(),
        Value::Int4(v) => v.to_string(),
        Value::Int8(v) => v.to_string(),
        Value::Float4(v) => v.to_string(),
        Value::Float8(v) => v.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytea(b) => crate::types::codec::hex_encode(b),
        Value::Date(d) => d.to_string(),
        Value::Time(t) => t.to_string(),
        Value::Timestamp(t) | Value::TimestampTz(t) => t.to_string(),
        Value::Uuid(u) => crate::types::codec::hex_encode(u),
        Value::Array(items, _) => {
            // A NULL array element renders as the literal `NULL` inside the
            // `{...}` text form, matching Postgres's own array-literal syntax;
            // only the top-level bind value's nullness needs the JSON-null path.
            let parts: Vec<String> = items
                .iter()
                .map(|v| render_param(v).unwrap_or_else(|| "NULL".to_string()))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Vector(v) => crate::types::vector::to_json_literal(v),
    };
    Some(rendered)
}
