//! Listener and per-connection dispatch (spec §4.11).
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::auth::{AuthMethod, Credentials};
use crate::backend::BackendPool;
use crate::cancel::CancelRegistry;
use crate::config::Cli;
use crate::connection::{self, SharedState};
use crate::error::Result;
use crate::oid::OidGenerator;
use crate::translate::Translator;

/// Capacity of the process-wide SQL translation cache (spec §4.4).
const TRANSLATION_CACHE_CAPACITY: usize = 4096;

/// Build the shared state and accept connections until the process is
/// killed. One `tokio::spawn`ed task per connection (spec §5: "one task per
/// connection"); the translator, OID generator, backend pool, and cancel
/// registry are the only state shared across them.
pub async fn run(cli: Cli) -> Result<()> {
    let oidgen = Arc::new(OidGenerator::new());
    let translator = Arc::new(Translator::new(
        NonZeroUsize::new(TRANSLATION_CACHE_CAPACITY).expect("constant is non-zero"),
        oidgen.clone(),
    ));
    let backend_pool = BackendPool::spawn(cli.backend_config());
    let cancel_registry = CancelRegistry::new();
    let credentials = Credentials { user: cli.backend_user.clone(), password: cli.backend_password.clone() };
    let auth_method = if credentials.password.is_empty() { AuthMethod::Trust } else { AuthMethod::ScramSha256 };

    let listen = cli.listen_config();
    let shared = SharedState { translator, oidgen, backend_pool, cancel_registry, credentials, auth_method, listen };

    let addr = (cli.listen_host.as_str(), cli.listen_port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(host = %cli.listen_host, port = cli.listen_port, "pgwire-iris listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true).ok();
        let shared = shared.clone();
        tokio::spawn(async move {
            tracing::debug!(%peer, "connection accepted");
            connection::handle(stream, shared).await;
            tracing::debug!(%peer, "connection closed");
        });
    }
}
