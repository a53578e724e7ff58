//! PostgreSQL frontend/backend wire protocol v3.0 (spec §4.1, §6).
pub mod codec;
pub mod frontend;
pub mod backend;

pub use backend::{BackendMessage, ErrorFields, FieldDescription};
pub use frontend::{DescribeKind, FrontendMessage, StartupMessage};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Write a backend message to `writer`. Does not flush; callers batch
/// several messages (e.g. `RowDescription` + many `DataRow`) and flush once.
pub async fn write_backend<W: AsyncWrite + Unpin>(writer: &mut W, msg: &BackendMessage) -> Result<()> {
    let payload = msg.encode_payload();
    codec::write_message(writer, msg.tag(), &payload).await
}

/// Write the single-byte SSL negotiation reply (`S` to upgrade, `N` to
/// refuse). Unlike regular messages this has no length prefix at all.
pub async fn write_ssl_reply<W: AsyncWrite + Unpin>(writer: &mut W, accept: bool) -> Result<()> {
    writer.write_all(&[if accept { b'S' } else { b'N' }]).await?;
    Ok(())
}
