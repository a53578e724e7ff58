//! Gateway error types and SQLSTATE mapping.
//!
//! Mirrors the "connection usable after most errors" policy in spec §7:
//! an [`Error`] carries enough information for the connection state machine
//! to decide whether to emit `ErrorResponse` and keep going, or terminate.
use std::{backtrace::Backtrace, fmt, io};

/// A specialized [`Result`] type for gateway operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Five-character PostgreSQL error code returned in `ErrorResponse` field `C`.
///
/// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sqlstate(pub &'static str);

impl Sqlstate {
    pub const SUCCESSFUL_COMPLETION: Sqlstate = Sqlstate("00000");
    pub const SYNTAX_ERROR: Sqlstate = Sqlstate("42601");
    pub const UNDEFINED_TABLE: Sqlstate = Sqlstate("42P01");
    pub const DUPLICATE_PREPARED_STATEMENT: Sqlstate = Sqlstate("42P05");
    pub const INVALID_PARAMETER_VALUE: Sqlstate = Sqlstate("22023");
    pub const QUERY_CANCELED: Sqlstate = Sqlstate("57014");
    pub const FEATURE_NOT_SUPPORTED: Sqlstate = Sqlstate("0A000");
    pub const INVALID_AUTH_SPEC: Sqlstate = Sqlstate("28P01");
    pub const PROTOCOL_VIOLATION: Sqlstate = Sqlstate("08P01");
    pub const CONNECTION_FAILURE: Sqlstate = Sqlstate("08006");
    pub const IN_FAILED_SQL_TRANSACTION: Sqlstate = Sqlstate("25P02");
    pub const INTERNAL_ERROR: Sqlstate = Sqlstate("XX000");
}

impl fmt::Display for Sqlstate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// All possible errors from the gateway.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Attach extra context, e.g. the SQL text that triggered the error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The SQLSTATE this error should be reported to the client as.
    pub fn sqlstate(&self) -> Sqlstate {
        self.kind.sqlstate()
    }

    /// Whether the connection remains usable after this error is reported
    /// (spec §7: most errors don't kill the connection; framing/auth/OOM do).
    pub fn is_fatal(&self) -> bool {
        match &self.kind {
            // A duplicate-name error is a normal client mistake, not a
            // framing violation; the connection stays usable (spec §4.9).
            ErrorKind::Protocol(ProtocolError::DuplicatePreparedStatement(_)) => false,
            ErrorKind::Protocol(_) | ErrorKind::Auth(_) | ErrorKind::Io(_) => true,
            _ => false,
        }
    }

    /// User-visible message with internals (IRIS class names, stack frames)
    /// stripped, per spec §7's "never disclose internal paths" policy.
    pub fn redacted_message(&self) -> String {
        match &self.kind {
            ErrorKind::Backend(e) => e.redacted_message(),
            other => other.to_string(),
        }
    }
}

/// All possible error kinds from the gateway.
pub enum ErrorKind {
    Protocol(ProtocolError),
    Auth(AuthError),
    Translate(TranslateError),
    Catalog(CatalogError),
    Backend(BackendError),
    Io(io::Error),
    Utf8(std::str::Utf8Error),
    Decode(DecodeError),
}

impl ErrorKind {
    pub fn sqlstate(&self) -> Sqlstate {
        match self {
            ErrorKind::Protocol(ProtocolError::DuplicatePreparedStatement(_)) => {
                Sqlstate::DUPLICATE_PREPARED_STATEMENT
            }
            ErrorKind::Protocol(_) => Sqlstate::PROTOCOL_VIOLATION,
            ErrorKind::Auth(_) => Sqlstate::INVALID_AUTH_SPEC,
            ErrorKind::Translate(e) => e.sqlstate,
            ErrorKind::Catalog(_) => Sqlstate::FEATURE_NOT_SUPPORTED,
            ErrorKind::Backend(e) => e.sqlstate,
            ErrorKind::Io(_) => Sqlstate::CONNECTION_FAILURE,
            ErrorKind::Utf8(_) => Sqlstate::PROTOCOL_VIOLATION,
            ErrorKind::Decode(_) => Sqlstate::INVALID_PARAMETER_VALUE,
        }
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<AuthError>e => ErrorKind::Auth(e));
from!(<TranslateError>e => ErrorKind::Translate(e));
from!(<CatalogError>e => ErrorKind::Catalog(e));
from!(<BackendError>e => ErrorKind::Backend(e));
from!(<std::io::Error>e => ErrorKind::Io(e));
from!(<std::str::Utf8Error>e => ErrorKind::Utf8(e));
from!(<DecodeError>e => ErrorKind::Decode(e));

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }
        fmt::Display::fmt(&self.kind, f)?;
        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            write!(f, "\n\nStack backtrace:\n{}", self.backtrace)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => e.fmt(f),
            Self::Auth(e) => e.fmt(f),
            Self::Translate(e) => e.fmt(f),
            Self::Catalog(e) => e.fmt(f),
            Self::Backend(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
        }
    }
}

/// Frame/codec level error (spec §4.1, §7 "Protocol framing error").
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message length {0} exceeds 256 MiB limit")]
    MessageTooLarge(u32),
    #[error("unexpected message tag {0:?} in {1}")]
    UnexpectedTag(u8, &'static str),
    #[error("connection closed before a complete message was read")]
    Eof,
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("prepared statement \"{0}\" already exists")]
    DuplicatePreparedStatement(String),
}

/// Authentication failure (spec §7 "Auth failure").
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unsupported authentication method requested by client")]
    UnsupportedMethod,
    #[error("password authentication failed for user \"{0}\"")]
    BadPassword(String),
    #[error("SCRAM exchange failed: {0}")]
    Scram(String),
}

/// SQL translation failure (spec §4.4, §4.5, §7).
#[derive(Debug)]
pub struct TranslateError {
    pub sqlstate: Sqlstate,
    pub message: String,
    pub hint: Option<String>,
}

impl TranslateError {
    pub fn feature_not_supported(message: impl Into<String>) -> Self {
        Self { sqlstate: Sqlstate::FEATURE_NOT_SUPPORTED, message: message.into(), hint: None }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self { sqlstate: Sqlstate::SYNTAX_ERROR, message: message.into(), hint: None }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self { sqlstate: Sqlstate::INVALID_PARAMETER_VALUE, message: message.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::error::Error for TranslateError {}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Catalog emulation failure (spec §4.6).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("relation {0} is not emulated")]
    UnsupportedRelation(String),
    #[error("mixed joins across emulated and real tables are not supported")]
    MixedJoin,
}

/// Error bubbled up from the IRIS backend executor (spec §4.8).
#[derive(Debug)]
pub struct BackendError {
    pub sqlstate: Sqlstate,
    pub message: String,
    pub iris_detail: Option<String>,
}

impl BackendError {
    pub fn new(sqlstate: Sqlstate, message: impl Into<String>) -> Self {
        Self { sqlstate, message: message.into(), iris_detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.iris_detail = Some(detail.into());
        self
    }

    /// Strip IRIS-internal detail for client consumption; full text still
    /// available via [`tracing`] at the call site.
    fn redacted_message(&self) -> String {
        self.message.clone()
    }
}

impl std::error::Error for BackendError {}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Value decode failure (wire bytes -> typed [`crate::types::Value`]).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("oid {0} has no registered codec")]
    UnknownOid(u32),
    #[error("expected {expected} bytes for binary format, got {got}")]
    BadBinaryLength { expected: usize, got: usize },
    #[error("invalid UTF-8 in text value")]
    InvalidUtf8,
    #[error("malformed value: {0}")]
    Malformed(String),
}
