//! The ReadyForQuery loop: Simple and Extended query flows, Describe,
//! Execute/PortalSuspended, and transaction/portal lifecycle (spec §4.9,
//! §4.10).
use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::auth;
use crate::backend::{ColumnDescriptor, PooledConnection, QueryResult};
use crate::catalog;
use crate::error::{Error, Result, Sqlstate, TranslateError};
use crate::protocol::{self, codec, BackendMessage, DescribeKind, ErrorFields, FieldDescription, FrontendMessage};
use crate::registry::Registry;
use crate::statement::{PortalName, PreparedStatement, StatementName};
use crate::portal::Portal;
use crate::types::{codec as type_codec, Format, Oid, Value};

use super::SharedState;

/// Rows already pulled from the backend for a portal that went
/// `PortalSuspended`. IRIS answers with a fully materialized result set
/// rather than a live cursor, so row-limited `Execute` is emulated by
/// buffering the whole thing here and slicing it across calls (spec §4.10
/// Execute / PortalSuspended).
struct PortalBuffer {
    columns: Vec<ColumnDescriptor>,
    rows: VecDeque<Vec<Value>>,
    select_like: bool,
}

pub struct Session {
    shared: SharedState,
    namespace: String,
    registry: Registry,
    backend: Option<PooledConnection>,
    backend_id: i32,
    cancel_secret: i32,
    skip_until_sync: bool,
    buffers: HashMap<PortalName, PortalBuffer>,
}

impl Session {
    pub fn new(shared: SharedState, namespace: String) -> Self {
        Self {
            shared,
            namespace,
            registry: Registry::new(),
            backend: None,
            backend_id: 0,
            cancel_secret: 0,
            skip_until_sync: false,
            buffers: HashMap::new(),
        }
    }

    pub async fn run(&mut self, stream: &mut TcpStream) -> Result<()> {
        if let Err(e) = self.start(stream).await {
            let _ = protocol::write_backend(stream, &BackendMessage::ErrorResponse(to_error_fields(&e))).await;
            let _ = stream.flush().await;
            return Err(e);
        }

        let result = self.message_loop(stream).await;
        self.shared.cancel_registry.unregister(self.backend_id).await;
        result
    }

    async fn start(&mut self, stream: &mut TcpStream) -> Result<()> {
        let conn = self.shared.backend_pool.acquire().await?;
        self.cancel_secret = auth::generate_cancel_secret();
        self.backend_id = self.shared.cancel_registry.register(self.cancel_secret, self.shared.backend_pool.clone(), conn.lease_id()).await;
        self.backend = Some(conn);

        // Six fields (spec §4.10 Startup): drivers like psycopg2/tokio-postgres
        // branch on `integer_datetimes` before trusting the int64 timestamp
        // encoding `types::codec` emits, so it must be sent like the rest.
        for (name, value) in [
            ("server_version", "14.9 (pgwire-iris)"),
            ("client_encoding", "UTF8"),
            ("DateStyle", "ISO, MDY"),
            ("integer_datetimes", "on"),
            ("TimeZone", "UTC"),
            ("server_encoding", "UTF8"),
        ] {
            protocol::write_backend(stream, &BackendMessage::ParameterStatus { name: name.to_string(), value: value.to_string() }).await?;
        }
        protocol::write_backend(stream, &BackendMessage::BackendKeyData { backend_id: self.backend_id, secret: self.cancel_secret }).await?;
        self.send_ready(stream).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn message_loop(&mut self, stream: &mut TcpStream) -> Result<()> {
        let idle_timeout = self.shared.listen.idle_timeout;
        loop {
            // Idle timeout (spec §5): no frontend message between queries
            // for this long closes the socket, same as a client disconnect.
            let (tag, body) = match tokio::time::timeout(idle_timeout, codec::read_message(stream)).await {
                Ok(Ok(v)) => v,
                Ok(Err(e)) if matches!(e.kind(), crate::error::ErrorKind::Protocol(crate::error::ProtocolError::Eof)) => return Ok(()),
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    tracing::debug!("connection idle timeout elapsed");
                    return Ok(());
                }
            };
            let msg = FrontendMessage::parse(tag, body)?;
            crate::common::trace!(tag = %tag as char, "frontend message");

            if self.skip_until_sync && !matches!(msg, FrontendMessage::Sync | FrontendMessage::Terminate) {
                continue;
            }

            match msg {
                FrontendMessage::Terminate => return Ok(()),
                FrontendMessage::Query { sql } => self.handle_query(stream, &sql).await?,
                FrontendMessage::Parse { name, sql, param_oids } => {
                    if let Err(e) = self.handle_parse(name, sql, param_oids).await {
                        self.fail_recoverable(stream, e).await?;
                    } else {
                        protocol::write_backend(stream, &BackendMessage::ParseComplete).await?;
                    }
                }
                FrontendMessage::Bind { portal, statement, param_formats, params, result_formats } => {
                    if let Err(e) = self.handle_bind(portal, statement, param_formats, params, result_formats) {
                        self.fail_recoverable(stream, e).await?;
                    } else {
                        protocol::write_backend(stream, &BackendMessage::BindComplete).await?;
                    }
                }
                FrontendMessage::Describe { kind, name } => {
                    if let Err(e) = self.handle_describe(stream, kind, name).await {
                        self.fail_recoverable(stream, e).await?;
                    }
                }
                FrontendMessage::Execute { portal, max_rows } => {
                    if let Err(e) = self.handle_execute(stream, portal, max_rows).await {
                        self.fail_recoverable(stream, e).await?;
                    }
                }
                FrontendMessage::Close { kind, name } => {
                    match kind {
                        DescribeKind::Statement => self.registry.close_statement(&StatementName::new(name)),
                        DescribeKind::Portal => {
                            let portal = PortalName::new(name);
                            self.registry.close_portal(&portal);
                            self.buffers.remove(&portal);
                        }
                    }
                    protocol::write_backend(stream, &BackendMessage::CloseComplete).await?;
                }
                FrontendMessage::Sync => {
                    self.skip_until_sync = false;
                    self.send_ready(stream).await?;
                }
                FrontendMessage::Flush => {}
                FrontendMessage::CopyFail { .. } => {}
                FrontendMessage::Password(_) | FrontendMessage::SaslInitialResponse { .. } | FrontendMessage::SaslResponse { .. } => {
                    return Err(crate::error::ProtocolError::UnexpectedTag(tag, "post-authentication").into());
                }
                FrontendMessage::Terminate => unreachable!(),
            }

            stream.flush().await?;
        }
    }

    /// Report a recoverable error to the client and arm skip-until-Sync
    /// (spec §4.10, §7). Fatal errors propagate out of `message_loop` instead.
    async fn fail_recoverable(&mut self, stream: &mut TcpStream, e: Error) -> Result<()> {
        if e.is_fatal() {
            return Err(e);
        }
        protocol::write_backend(stream, &BackendMessage::ErrorResponse(to_error_fields(&e))).await?;
        self.skip_until_sync = true;
        Ok(())
    }

    async fn send_ready(&mut self, stream: &mut TcpStream) -> Result<()> {
        let tx_status = self.backend.as_ref().map(|c| c.tx_status()).unwrap_or(crate::backend::TxStatus::Idle);
        protocol::write_backend(stream, &BackendMessage::ReadyForQuery { tx_status: tx_status.as_byte() }).await
    }

    fn conn(&mut self) -> Result<&mut PooledConnection> {
        self.backend.as_mut().ok_or_else(|| crate::error::BackendError::new(Sqlstate::CONNECTION_FAILURE, "no backend connection").into())
    }

    // ---- Simple Query protocol (spec §4.10) ----

    async fn handle_query(&mut self, stream: &mut TcpStream, sql: &str) -> Result<()> {
        if sql.trim().is_empty() {
            protocol::write_backend(stream, &BackendMessage::EmptyQueryResponse).await?;
            self.send_ready(stream).await?;
            return Ok(());
        }

        for stmt in split_statements(sql) {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            match self.execute_simple_statement(stream, stmt).await {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => {
                    protocol::write_backend(stream, &BackendMessage::ErrorResponse(to_error_fields(&e))).await?;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        self.send_ready(stream).await?;
        Ok(())
    }

    async fn execute_simple_statement(&mut self, stream: &mut TcpStream, sql: &str) -> Result<()> {
        if is_copy(sql) {
            return Err(TranslateError::feature_not_supported("COPY protocol is not supported").into());
        }

        match transaction_kind(sql) {
            Some(TxControl::Begin) => {
                self.conn()?.begin().await?;
                protocol::write_backend(stream, &BackendMessage::CommandComplete { tag: "BEGIN".to_string() }).await?;
                return Ok(());
            }
            Some(TxControl::Commit) => {
                self.conn()?.commit().await?;
                self.registry.close_all_portals();
                self.buffers.clear();
                protocol::write_backend(stream, &BackendMessage::CommandComplete { tag: "COMMIT".to_string() }).await?;
                return Ok(());
            }
            Some(TxControl::Rollback) => {
                self.conn()?.rollback().await?;
                self.registry.close_all_portals();
                self.buffers.clear();
                protocol::write_backend(stream, &BackendMessage::CommandComplete { tag: "ROLLBACK".to_string() }).await?;
                return Ok(());
            }
            None => {}
        }

        let oidgen = self.shared.oidgen.clone();
        if let Some(relation) = catalog::detect(sql)? {
            let conn = self.conn()?;
            let result = catalog::query(relation, conn, &oidgen).await?;
            let fields: Vec<FieldDescription> = result
                .columns
                .iter()
                .map(|c| FieldDescription::new(c.name, c.type_oid, c.type_len, 0))
                .collect();
            protocol::write_backend(stream, &BackendMessage::RowDescription { fields }).await?;
            for row in &result.rows {
                let values = catalog::encode_row(row, &[])?;
                protocol::write_backend(stream, &BackendMessage::DataRow { values }).await?;
            }
            let tag = format!("SELECT {}", result.rows.len());
            protocol::write_backend(stream, &BackendMessage::CommandComplete { tag }).await?;
            return Ok(());
        }

        let translated = self.shared.translator.translate(sql, &self.namespace)?;
        let finalized = crate::translate::finalize_params(&translated.sql, &translated.vector_calls, &[])?;
        let result = self.conn()?.execute(&finalized.sql, &[]).await?;

        if is_select_like(sql) {
            let fields: Vec<FieldDescription> = result
                .columns
                .iter()
                .map(|c| FieldDescription::new(c.name.clone(), c.type_oid, c.type_len, 0))
                .collect();
            protocol::write_backend(stream, &BackendMessage::RowDescription { fields }).await?;
            for row in &result.rows {
                let values = encode_row_text(row)?;
                protocol::write_backend(stream, &BackendMessage::DataRow { values }).await?;
            }
        }
        let tag = command_tag(sql, &result);
        protocol::write_backend(stream, &BackendMessage::CommandComplete { tag }).await?;
        Ok(())
    }

    // ---- Extended Query protocol (spec §4.9, §4.10) ----

    async fn handle_parse(&mut self, name: String, sql: String, param_oids: Vec<u32>) -> Result<()> {
        if is_copy(&sql) {
            return Err(TranslateError::feature_not_supported("COPY protocol is not supported").into());
        }
        let translated = self.shared.translator.translate(&sql, &self.namespace)?;
        let statement = PreparedStatement {
            name: StatementName::new(name),
            source_sql: sql,
            translated_sql: translated.sql,
            vector_calls: translated.vector_calls,
            param_oids,
            result_columns: None,
        };
        self.registry.add_statement(statement)
    }

    fn handle_bind(
        &mut self,
        portal: String,
        statement: String,
        param_formats: Vec<i16>,
        params: Vec<Option<Bytes>>,
        result_formats: Vec<i16>,
    ) -> Result<()> {
        let statement_name = StatementName::new(statement);
        if self.registry.statement(&statement_name).is_none() {
            return Err(TranslateError::invalid_parameter(format!("prepared statement \"{}\" does not exist", statement_name)).into());
        }
        let portal_name = PortalName::new(portal);
        self.buffers.remove(&portal_name);
        self.registry.add_portal(Portal {
            name: portal_name,
            statement: statement_name,
            param_formats: param_formats.into_iter().map(Format::from_code).collect(),
            params,
            result_formats: result_formats.into_iter().map(Format::from_code).collect(),
            rows_sent: 0,
        });
        Ok(())
    }

    async fn handle_describe(&mut self, stream: &mut TcpStream, kind: DescribeKind, name: String) -> Result<()> {
        let statement_name = match kind {
            DescribeKind::Statement => StatementName::new(name),
            DescribeKind::Portal => {
                let portal_name = PortalName::new(name);
                let portal = self
                    .registry
                    .portal(&portal_name)
                    .ok_or_else(|| TranslateError::invalid_parameter(format!("portal \"{portal_name}\" does not exist")))?;
                portal.statement.clone()
            }
        };

        if self.registry.statement(&statement_name).is_none() {
            return Err(TranslateError::invalid_parameter(format!("prepared statement \"{statement_name}\" does not exist")).into());
        }

        self.ensure_result_columns(&statement_name).await?;
        let statement = self.registry.statement(&statement_name).expect("checked above");

        if matches!(kind, DescribeKind::Statement) {
            protocol::write_backend(
                stream,
                &BackendMessage::ParameterDescription { oids: statement.param_oids.iter().map(|o| *o as u32).collect() },
            )
            .await?;
        }

        match &statement.result_columns {
            Some(cols) if !cols.is_empty() => {
                let fields: Vec<FieldDescription> =
                    cols.iter().map(|c| FieldDescription::new(c.name.clone(), c.type_oid, c.type_len, 0)).collect();
                protocol::write_backend(stream, &BackendMessage::RowDescription { fields }).await?;
            }
            _ => {
                protocol::write_backend(stream, &BackendMessage::NoData).await?;
            }
        }
        Ok(())
    }

    /// IRIS has no "prepare without binding" primitive, so the shape of a
    /// `SELECT`-like statement's result is learned by executing it once with
    /// every parameter bound to `NULL` and caching the columns it reports
    /// (spec §4.10 Describe). Non-`SELECT`-like statements describe `NoData`.
    async fn ensure_result_columns(&mut self, name: &StatementName) -> Result<()> {
        {
            let statement = self.registry.statement(name).expect("caller checked existence");
            if statement.result_columns.is_some() {
                return Ok(());
            }
        }
        let statement = self.registry.statement(name).expect("caller checked existence").clone();
        if let Some(relation) = catalog::detect(&statement.source_sql)? {
            let cols: Vec<ColumnDescriptor> = relation
                .columns()
                .iter()
                .map(|c| ColumnDescriptor { name: c.name.to_string(), type_oid: c.type_oid, type_len: c.type_len })
                .collect();
            self.registry.statement_mut(name).expect("exists").result_columns = Some(cols);
            return Ok(());
        }
        if !is_select_like(&statement.source_sql) {
            self.registry.statement_mut(name).expect("exists").result_columns = Some(Vec::new());
            return Ok(());
        }

        let null_params: Vec<Option<String>> = vec![None; statement.param_oids.len()];
        let finalized = crate::translate::finalize_params(&statement.translated_sql, &statement.vector_calls, &null_params)?;
        let result = self.conn()?.execute(&finalized.sql, &vec![Value::Null; finalized.kept_params.len()]).await?;
        self.registry.statement_mut(name).expect("exists").result_columns = Some(result.columns);
        Ok(())
    }

    async fn handle_execute(&mut self, stream: &mut TcpStream, portal_name: String, max_rows: i32) -> Result<()> {
        let portal_name = PortalName::new(portal_name);
        let statement_name = self
            .registry
            .portal(&portal_name)
            .ok_or_else(|| TranslateError::invalid_parameter(format!("portal \"{portal_name}\" does not exist")))?
            .statement
            .clone();

        if !self.buffers.contains_key(&portal_name) {
            self.fill_buffer(&portal_name, &statement_name).await?;
        }

        let limit = if max_rows <= 0 { usize::MAX } else { max_rows as usize };
        let portal = self.registry.portal(&portal_name).expect("bound above");
        let result_formats: Vec<Format> = (0..self.buffers[&portal_name].columns.len().max(1))
            .map(|i| portal.format_for_result(i))
            .collect();

        let buffer = self.buffers.get_mut(&portal_name).expect("filled above");
        if !buffer.select_like {
            // Non-SELECT statements were already fully executed in `fill_buffer`;
            // the buffer's single pseudo-row carries the command tag only.
            let tag = buffer
                .rows
                .pop_front()
                .and_then(|row| match row.first() {
                    Some(Value::Text(t)) => Some(t.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "OK".to_string());
            self.buffers.remove(&portal_name);
            protocol::write_backend(stream, &BackendMessage::CommandComplete { tag }).await?;
            return Ok(());
        }

        let mut sent = 0usize;
        while sent < limit {
            let Some(row) = buffer.rows.pop_front() else { break };
            let values: Vec<Option<Bytes>> = row
                .iter()
                .enumerate()
                .map(|(i, v)| type_codec::encode(v, result_formats.get(i).copied().unwrap_or(Format::Text)))
                .collect::<Result<_>>()?;
            protocol::write_backend(stream, &BackendMessage::DataRow { values }).await?;
            sent += 1;
        }

        if !buffer.rows.is_empty() {
            protocol::write_backend(stream, &BackendMessage::PortalSuspended).await?;
        } else {
            let tag = format!("SELECT {sent}");
            self.buffers.remove(&portal_name);
            protocol::write_backend(stream, &BackendMessage::CommandComplete { tag }).await?;
        }
        Ok(())
    }

    async fn fill_buffer(&mut self, portal_name: &PortalName, statement_name: &StatementName) -> Result<()> {
        let portal = self.registry.portal(portal_name).expect("caller holds a valid portal name").clone();
        let statement = self.registry.statement(statement_name).expect("bind validated this").clone();

        if is_copy(&statement.source_sql) {
            return Err(TranslateError::feature_not_supported("COPY protocol is not supported").into());
        }

        match transaction_kind(&statement.source_sql) {
            Some(TxControl::Begin) => {
                self.conn()?.begin().await?;
                self.buffers.insert(
                    portal_name.clone(),
                    PortalBuffer { columns: Vec::new(), rows: VecDeque::from([vec![Value::Text("BEGIN".into())]]), select_like: false },
                );
                return Ok(());
            }
            Some(TxControl::Commit) => {
                self.conn()?.commit().await?;
                self.registry.close_all_portals();
                self.buffers.clear();
                self.buffers.insert(
                    portal_name.clone(),
                    PortalBuffer { columns: Vec::new(), rows: VecDeque::from([vec![Value::Text("COMMIT".into())]]), select_like: false },
                );
                return Ok(());
            }
            Some(TxControl::Rollback) => {
                self.conn()?.rollback().await?;
                self.registry.close_all_portals();
                self.buffers.clear();
                self.buffers.insert(
                    portal_name.clone(),
                    PortalBuffer { columns: Vec::new(), rows: VecDeque::from([vec![Value::Text("ROLLBACK".into())]]), select_like: false },
                );
                return Ok(());
            }
            None => {}
        }

        let param_text: Vec<Option<String>> = portal
            .params
            .iter()
            .enumerate()
            .map(|(i, raw)| decode_param_text(raw.as_deref(), portal.format_for_param(i), statement.param_oids.get(i).copied()))
            .collect::<Result<_>>()?;

        let oidgen = self.shared.oidgen.clone();
        if let Some(relation) = catalog::detect(&statement.source_sql)? {
            let conn = self.conn()?;
            let result = catalog::query(relation, conn, &oidgen).await?;
            let columns: Vec<ColumnDescriptor> = result
                .columns
                .iter()
                .map(|c| ColumnDescriptor { name: c.name.to_string(), type_oid: c.type_oid, type_len: c.type_len })
                .collect();
            self.buffers.insert(portal_name.clone(), PortalBuffer { columns, rows: result.rows.into(), select_like: true });
            return Ok(());
        }

        let finalized = crate::translate::finalize_params(&statement.translated_sql, &statement.vector_calls, &param_text)?;
        let values: Vec<Value> = finalized
            .kept_params
            .iter()
            .map(|&i| decode_param_value(portal.params[i - 1].as_deref(), portal.format_for_param(i - 1), statement.param_oids.get(i - 1).copied()))
            .collect::<Result<_>>()?;

        let result = self.conn()?.execute(&finalized.sql, &values).await?;
        let select_like = is_select_like(&statement.source_sql);
        if select_like {
            self.buffers.insert(portal_name.clone(), PortalBuffer { columns: result.columns, rows: result.rows.into(), select_like: true });
        } else {
            let tag = command_tag(&statement.source_sql, &result);
            self.buffers.insert(
                portal_name.clone(),
                PortalBuffer { columns: Vec::new(), rows: VecDeque::from([vec![Value::Text(tag)]]), select_like: false },
            );
        }
        Ok(())
    }
}

enum TxControl {
    Begin,
    Commit,
    Rollback,
}

fn transaction_kind(sql: &str) -> Option<TxControl> {
    let first_word = sql.trim().split_whitespace().next()?.to_ascii_uppercase();
    match first_word.as_str() {
        "BEGIN" | "START" => Some(TxControl::Begin),
        "COMMIT" | "END" => Some(TxControl::Commit),
        "ROLLBACK" => Some(TxControl::Rollback),
        _ => None,
    }
}

fn is_copy(sql: &str) -> bool {
    sql.trim_start().get(0..4).map(|s| s.eq_ignore_ascii_case("COPY")).unwrap_or(false)
}

fn is_select_like(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    ["SELECT", "WITH", "SHOW", "EXPLAIN", "VALUES"]
        .iter()
        .any(|kw| trimmed.len() >= kw.len() && trimmed[..kw.len()].eq_ignore_ascii_case(kw))
}

/// Naive top-level `;` split for the Simple Query protocol (spec §4.10):
/// tracks single-quoted strings so a literal semicolon inside one doesn't
/// split the batch.
fn split_statements(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ';' if !in_quote => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

fn command_tag(sql: &str, result: &QueryResult) -> String {
    if !result.command_tag.is_empty() {
        return result.command_tag.clone();
    }
    let first_word = sql.trim().split_whitespace().next().unwrap_or("").to_ascii_uppercase();
    match first_word.as_str() {
        "SELECT" | "WITH" | "SHOW" | "EXPLAIN" | "VALUES" => format!("SELECT {}", result.rows.len()),
        "INSERT" => format!("INSERT 0 {}", result.row_count_hint.unwrap_or(0)),
        "UPDATE" => format!("UPDATE {}", result.row_count_hint.unwrap_or(0)),
        "DELETE" => format!("DELETE {}", result.row_count_hint.unwrap_or(0)),
        other if !other.is_empty() => other.to_string(),
        _ => "OK".to_string(),
    }
}

fn encode_row_text(row: &[Value]) -> Result<Vec<Option<Bytes>>> {
    row.iter().map(|v| type_codec::encode(v, Format::Text)).collect()
}

fn decode_param_value(bytes: Option<&[u8]>, format: Format, declared_oid: Option<Oid>) -> Result<Value> {
    let oid = declared_oid.filter(|&o| o != 0).unwrap_or(crate::types::oid::UNKNOWN);
    type_codec::decode(oid, format, bytes)
}

/// Text-format representation of a bound parameter, needed by
/// [`crate::translate::finalize_params`] regardless of the wire format the
/// client actually sent it in (spec §4.5).
fn decode_param_text(bytes: Option<&[u8]>, format: Format, declared_oid: Option<Oid>) -> Result<Option<String>> {
    let Some(raw) = bytes else { return Ok(None) };
    match format {
        Format::Text => Ok(Some(String::from_utf8_lossy(raw).into_owned())),
        Format::Binary => {
            let value = decode_param_value(Some(raw), format, declared_oid)?;
            Ok(Some(render_value_text(&value)))
        }
    }
}

/// Grounded on `backend::connection::render_param`: the same text rendering
/// IRIS-bound parameters use, reused here to textify binary-format client
/// parameters before they reach the translator's parameter-dependent stage.
fn render_value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int2(v) => v.to_string(),
        Value::Int4(v) => v.to_string(),
        Value::Int8(v) => v.to_string(),
        Value::Float4(v) => v.to_string(),
        Value::Float8(v) => v.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytea(b) => type_codec::hex_encode(b),
        Value::Date(d) => d.to_string(),
        Value::Time(t) => t.to_string(),
        Value::Timestamp(t) | Value::TimestampTz(t) => t.to_string(),
        Value::Uuid(u) => type_codec::hex_encode(u),
        Value::Array(items, _) => {
            let parts: Vec<String> = items.iter().map(render_value_text).collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Vector(v) => crate::types::vector::to_json_literal(v),
    }
}

fn to_error_fields(e: &Error) -> ErrorFields {
    ErrorFields::new("ERROR", e.sqlstate().0, e.redacted_message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_statements_ignores_semicolons_in_quotes() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].trim(), "INSERT INTO t VALUES ('a;b')");
        assert_eq!(stmts[1].trim(), "SELECT 1");
    }

    #[test]
    fn split_statements_drops_trailing_empty_batch() {
        let stmts = split_statements("SELECT 1;  ");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn is_select_like_recognizes_leading_keywords() {
        assert!(is_select_like("  select 1"));
        assert!(is_select_like("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_select_like("INSERT INTO t VALUES (1)"));
    }

    #[test]
    fn is_copy_is_case_insensitive() {
        assert!(is_copy("copy t from stdin"));
        assert!(!is_copy("copying is not a keyword"));
    }

    #[test]
    fn transaction_kind_recognizes_begin_start_commit_rollback() {
        assert!(matches!(transaction_kind("BEGIN"), Some(TxControl::Begin)));
        assert!(matches!(transaction_kind("start transaction"), Some(TxControl::Begin)));
        assert!(matches!(transaction_kind("COMMIT"), Some(TxControl::Commit)));
        assert!(matches!(transaction_kind("END"), Some(TxControl::Commit)));
        assert!(matches!(transaction_kind("rollback"), Some(TxControl::Rollback)));
        assert!(transaction_kind("SELECT 1").is_none());
    }

    #[test]
    fn command_tag_prefers_backend_tag_when_present() {
        let result = QueryResult { command_tag: "CREATE TABLE".to_string(), ..Default::default() };
        assert_eq!(command_tag("CREATE TABLE t (x int)", &result), "CREATE TABLE");
    }

    #[test]
    fn command_tag_falls_back_by_verb() {
        let result = QueryResult { row_count_hint: Some(3), ..Default::default() };
        assert_eq!(command_tag("UPDATE t SET x = 1", &result), "UPDATE 3");
        assert_eq!(command_tag("DELETE FROM t", &result), "DELETE 3");

        let select_result = QueryResult { rows: vec![vec![], vec![]], ..Default::default() };
        assert_eq!(command_tag("SELECT * FROM t", &select_result), "SELECT 2");
    }

    #[test]
    fn render_value_text_formats_scalars() {
        assert_eq!(render_value_text(&Value::Int4(42)), "42");
        assert_eq!(render_value_text(&Value::Bool(true)), "true");
        assert_eq!(render_value_text(&Value::Text("hi".to_string())), "hi");
        assert_eq!(render_value_text(&Value::Null), "");
    }

    #[test]
    fn render_value_text_formats_arrays_and_vectors() {
        let arr = Value::Array(vec![Value::Int4(1), Value::Int4(2)], crate::types::oid::INT4_ARRAY);
        assert_eq!(render_value_text(&arr), "{1,2}");
        assert_eq!(render_value_text(&Value::Vector(vec![1.0, 2.5])), "[1,2.5]");
    }

    #[test]
    fn decode_param_text_passes_through_text_format() {
        let text = decode_param_text(Some(b"hello"), Format::Text, None).unwrap();
        assert_eq!(text, Some("hello".to_string()));
        assert_eq!(decode_param_text(None, Format::Text, None).unwrap(), None);
    }
}
