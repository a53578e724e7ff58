//! Per-connection protocol state machine (spec §4.10).
//!
//! `Accepting -> Startup -> Authenticating -> ReadyForQuery -> (Simple |
//! Extended)* -> Terminating`. One task owns one [`tokio::net::TcpStream`]
//! end to end; nothing else touches its registries or its backend lease
//! (spec §5).
mod session;

use std::sync::Arc;

use bytes::Bytes;
use tokio::net::TcpStream;

use crate::auth::{self, AuthMethod, Credentials};
use crate::backend::BackendPool;
use crate::cancel::CancelRegistry;
use crate::config::{ListenConfig, TlsMode};
use crate::error::{AuthError, ErrorKind, ProtocolError, Result};
use crate::oid::OidGenerator;
use crate::protocol::{self, codec, BackendMessage, ErrorFields, FrontendMessage, StartupMessage};
use crate::translate::Translator;

use session::Session;

/// Everything a connection task needs that is shared across the whole
/// server (spec §4.11: "a single global BackendRegistry and TranslationCache").
#[derive(Clone)]
pub struct SharedState {
    pub translator: Arc<Translator>,
    pub oidgen: Arc<OidGenerator>,
    pub backend_pool: BackendPool,
    pub cancel_registry: CancelRegistry,
    pub credentials: Credentials,
    pub auth_method: AuthMethod,
    pub listen: ListenConfig,
}

/// Drive one accepted client socket from Startup through Terminating.
/// Any I/O error or fatal protocol error ends the task; the socket is
/// dropped on return either way.
pub async fn handle(stream: TcpStream, shared: SharedState) {
    crate::common::span!("connection");
    if let Err(e) = run(stream, shared).await {
        tracing::warn!(error = %e, "connection ended with error");
    }
}

async fn run(mut stream: TcpStream, shared: SharedState) -> Result<()> {
    // Startup-phase timeout (spec §5): a client that opens a socket and
    // never completes StartupMessage/auth would otherwise hold a task and a
    // pooled backend connection open forever (slowloris). Only the
    // negotiation/auth handshake is bounded; the query loop that follows
    // has its own, separate idle timeout.
    let startup_timeout = shared.listen.startup_timeout;
    let negotiated = match tokio::time::timeout(startup_timeout, negotiate_and_authenticate(&mut stream, &shared)).await {
        Ok(outcome) => outcome?,
        Err(_) => return Err(ProtocolError::Eof.into()),
    };
    let Some(()) = negotiated else { return Ok(()) }; // cancel request handled, or client disconnected early

    // Every client is mapped onto the same IRIS schema regardless of the
    // `database` startup parameter it sent (spec §4.7: `public` <-> `SQLUser`
    // is the gateway's one and only schema mapping).
    let mut session = Session::new(shared, "SQLUser".to_string());
    session.run(&mut stream).await
}

async fn negotiate_and_authenticate(stream: &mut TcpStream, shared: &SharedState) -> Result<Option<()>> {
    let startup = match negotiate_startup(stream, shared).await? {
        Some(startup) => startup,
        None => return Ok(None),
    };

    let user = startup.user().unwrap_or("unknown").to_string();

    if let Err(e) = authenticate(stream, shared, &user).await {
        let fields = error_fields(&e);
        let _ = protocol::write_backend(stream, &BackendMessage::ErrorResponse(fields)).await;
        return Err(e);
    }

    Ok(Some(()))
}

/// Consume `SSLRequest`/`GSSENCRequest` negotiation until the real
/// `StartupMessage` arrives, or `None` if the client hangs up first.
/// Actually terminating TLS is an external collaborator (spec §6 Non-goals);
/// `tls_mode` only controls whether `SSLRequest` is accepted (`S`) and, for
/// `Require`, whether a client that skipped it is allowed to proceed.
async fn negotiate_startup(stream: &mut TcpStream, shared: &SharedState) -> Result<Option<StartupMessage>> {
    let accept_ssl = shared.listen.tls_mode != TlsMode::Disable;
    let mut saw_ssl_request = false;
    loop {
        match codec::read_untagged(stream).await {
            Ok(codec::FirstMessage::Ssl) => {
                protocol::write_ssl_reply(stream, accept_ssl).await?;
                saw_ssl_request = true;
            }
            Ok(codec::FirstMessage::GssEnc) => {
                protocol::write_ssl_reply(stream, false).await?;
            }
            Ok(codec::FirstMessage::Cancel { backend_id, secret }) => {
                // Real clients open a fresh connection to send this (spec
                // §4.10); no reply is ever sent on this socket.
                shared.cancel_registry.cancel(backend_id, secret).await;
                return Ok(None);
            }
            Ok(codec::FirstMessage::Startup { payload, .. }) => {
                if shared.listen.tls_mode == TlsMode::Require && !saw_ssl_request {
                    return Err(AuthError::UnsupportedMethod.into());
                }
                return Ok(Some(StartupMessage::parse(payload)?));
            }
            Err(e) if matches!(e.kind(), ErrorKind::Protocol(crate::error::ProtocolError::Eof)) => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }
}

async fn authenticate(stream: &mut TcpStream, shared: &SharedState, user: &str) -> Result<()> {
    match shared.auth_method {
        AuthMethod::Trust => {
            send_auth_ok(stream).await?;
        }
        AuthMethod::Cleartext => {
            protocol::write_backend(stream, &BackendMessage::AuthenticationCleartextPassword).await?;
            flush(stream).await?;
            let (tag, body) = codec::read_message(stream).await?;
            let FrontendMessage::Password(password) = FrontendMessage::parse(tag, body)? else {
                return Err(AuthError::UnsupportedMethod.into());
            };
            if password != shared.credentials.password {
                return Err(AuthError::BadPassword(user.to_string()).into());
            }
            send_auth_ok(stream).await?;
        }
        AuthMethod::ScramSha256 => {
            scram_handshake(stream, shared).await?;
            send_auth_ok(stream).await?;
        }
    }
    Ok(())
}

async fn scram_handshake(stream: &mut TcpStream, shared: &SharedState) -> Result<()> {
    protocol::write_backend(
        stream,
        &BackendMessage::AuthenticationSasl { mechanisms: vec!["SCRAM-SHA-256"] },
    )
    .await?;
    flush(stream).await?;

    let (tag, body) = codec::read_message(stream).await?;
    let FrontendMessage::SaslInitialResponse { data, .. } = FrontendMessage::parse(tag, body)? else {
        return Err(AuthError::Scram("expected SASLInitialResponse".into()).into());
    };
    let server = auth::scram::handle_client_first(&data, &shared.credentials.password)?;
    protocol::write_backend(
        stream,
        &BackendMessage::AuthenticationSaslContinue { data: Bytes::from(server.server_first_message().to_string()) },
    )
    .await?;
    flush(stream).await?;

    let (tag, body) = codec::read_message(stream).await?;
    let FrontendMessage::SaslResponse { data } = FrontendMessage::parse(tag, body)? else {
        return Err(AuthError::Scram("expected SASLResponse".into()).into());
    };
    let server_final = server.handle_client_final(&data)?;
    protocol::write_backend(
        stream,
        &BackendMessage::AuthenticationSaslFinal { data: Bytes::from(server_final) },
    )
    .await?;
    Ok(())
}

async fn send_auth_ok(stream: &mut TcpStream) -> Result<()> {
    protocol::write_backend(stream, &BackendMessage::AuthenticationOk).await
}

async fn flush(stream: &mut TcpStream) -> Result<()> {
    use tokio::io::AsyncWriteExt;
    stream.flush().await?;
    Ok(())
}

fn error_fields(e: &crate::error::Error) -> ErrorFields {
    ErrorFields::new("FATAL", e.sqlstate().0, e.redacted_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn ssl_request_is_refused_then_startup_is_parsed() {
        let (mut server, mut client) = loopback_pair().await;

        let client_task = tokio::spawn(async move {
            let mut ssl = Vec::new();
            protocol::codec::write_untagged(&mut ssl, &protocol::codec::SSL_REQUEST_CODE.to_be_bytes()).await.unwrap();
            client.write_all(&ssl).await.unwrap();

            let mut reply = [0u8; 1];
            tokio::io::AsyncReadExt::read_exact(&mut client, &mut reply).await.unwrap();
            assert_eq!(reply[0], b'N');

            let mut framed = Vec::new();
            framed.extend_from_slice(&protocol::codec::PROTOCOL_VERSION_3_0.to_be_bytes());
            framed.extend_from_slice(b"user\0alice\0database\0mydb\0\0");
            protocol::codec::write_untagged(&mut client, &framed).await.unwrap();
        });

        let shared = SharedState {
            translator: Arc::new(Translator::new(
                std::num::NonZeroUsize::new(16).unwrap(),
                Arc::new(OidGenerator::new()),
            )),
            oidgen: Arc::new(OidGenerator::new()),
            backend_pool: crate::backend::BackendPool::spawn(crate::backend::BackendConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                user: "alice".to_string(),
                password: String::new(),
                namespace: "SQLUser".to_string(),
                pool_size: 1,
                query_timeout: std::time::Duration::from_secs(30),
            }),
            cancel_registry: CancelRegistry::new(),
            credentials: Credentials { user: "alice".into(), password: String::new() },
            auth_method: AuthMethod::Trust,
            listen: ListenConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                tls_mode: TlsMode::Disable,
                debug: false,
                startup_timeout: std::time::Duration::from_secs(10),
                idle_timeout: std::time::Duration::from_secs(600),
            },
        };

        let startup = negotiate_startup(&mut server, &shared).await.unwrap().expect("startup parsed");
        assert_eq!(startup.user(), Some("alice"));
        client_task.await.unwrap();
    }
}
