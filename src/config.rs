//! Startup configuration: CLI flags and environment variables (spec §6).
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// How the listener handles `SSLRequest` negotiation (spec §6: "TLS mode").
/// TLS termination itself is an external collaborator (spec Non-goals);
/// this only controls whether the gateway demands the client attempt it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum TlsMode {
    /// Always reply `N`; plaintext only.
    Disable,
    /// Reply `S` if the client asks, but also accept a plain StartupMessage.
    Prefer,
    /// Reply `S` and reject any StartupMessage that didn't negotiate TLS first.
    Require,
}

/// PostgreSQL wire-protocol gateway for InterSystems IRIS.
#[derive(Debug, Clone, Parser)]
#[command(name = "pgwire-iris", version, about)]
pub struct Cli {
    /// Host to listen for PostgreSQL client connections on.
    #[arg(long, env = "PGWIRE_LISTEN_HOST", default_value = "0.0.0.0")]
    pub listen_host: String,

    /// Port to listen for PostgreSQL client connections on.
    #[arg(long, env = "PGWIRE_LISTEN_PORT", default_value_t = 5432)]
    pub listen_port: u16,

    /// IRIS backend host.
    #[arg(long, env = "PGWIRE_BACKEND_HOST", default_value = "localhost")]
    pub backend_host: String,

    /// IRIS backend superserver port.
    #[arg(long, env = "PGWIRE_BACKEND_PORT", default_value_t = 1972)]
    pub backend_port: u16,

    /// IRIS username used for the backend connection pool.
    #[arg(long, env = "PGWIRE_BACKEND_USER", default_value = "_SYSTEM")]
    pub backend_user: String,

    /// IRIS password used for the backend connection pool.
    #[arg(long, env = "PGWIRE_BACKEND_PASSWORD", default_value = "")]
    pub backend_password: String,

    /// IRIS namespace queries execute against.
    #[arg(long, env = "PGWIRE_BACKEND_NAMESPACE", default_value = "USER")]
    pub backend_namespace: String,

    /// Number of pooled backend connections.
    #[arg(long, env = "PGWIRE_BACKEND_POOL_SIZE", default_value_t = 8)]
    pub backend_pool_size: usize,

    /// Enable verbose (debug-level) logging.
    #[arg(long, env = "PGWIRE_DEBUG", default_value_t = false)]
    pub debug: bool,

    /// How `SSLRequest` negotiation is handled.
    #[arg(long, env = "PGWIRE_TLS_MODE", value_enum, default_value_t = TlsMode::Disable)]
    pub tls_mode: TlsMode,

    /// Startup-phase timeout in seconds; guards against slowloris clients
    /// that open a socket and never complete StartupMessage/auth (spec §5).
    #[arg(long, env = "PGWIRE_STARTUP_TIMEOUT_SECS", default_value_t = 10)]
    pub startup_timeout_secs: u64,

    /// Connection idle timeout in seconds; closes the socket if no frontend
    /// message arrives between queries for this long (spec §5).
    #[arg(long, env = "PGWIRE_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Per-query timeout in seconds enforced by the backend pool (spec §5).
    #[arg(long, env = "PGWIRE_QUERY_TIMEOUT_SECS", default_value_t = 30)]
    pub query_timeout_secs: u64,
}

impl Cli {
    /// Subset of fields the backend pool cares about.
    pub fn backend_config(&self) -> crate::backend::BackendConfig {
        crate::backend::BackendConfig {
            host: self.backend_host.clone(),
            port: self.backend_port,
            user: self.backend_user.clone(),
            password: self.backend_password.clone(),
            namespace: self.backend_namespace.clone(),
            pool_size: self.backend_pool_size,
            query_timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }

    /// Subset of fields the listener/connection state machine cares about.
    pub fn listen_config(&self) -> ListenConfig {
        ListenConfig {
            host: self.listen_host.clone(),
            port: self.listen_port,
            tls_mode: self.tls_mode,
            debug: self.debug,
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

/// Listener-facing configuration, generalized out of `Cli` so the
/// connection state machine doesn't need the backend/CLI fields (spec §6).
#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    pub tls_mode: TlsMode,
    pub debug: bool,
    pub startup_timeout: Duration,
    pub idle_timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_no_args() {
        let cli = Cli::parse_from(["pgwire-iris"]);
        assert_eq!(cli.listen_port, 5432);
        assert_eq!(cli.backend_namespace, "USER");
        assert_eq!(cli.tls_mode, TlsMode::Disable);
        assert_eq!(cli.startup_timeout_secs, 10);
        assert_eq!(cli.idle_timeout_secs, 600);
        assert_eq!(cli.query_timeout_secs, 30);
    }

    #[test]
    fn tls_mode_flag_parses() {
        let cli = Cli::parse_from(["pgwire-iris", "--tls-mode", "require"]);
        assert_eq!(cli.tls_mode, TlsMode::Require);
    }

    #[test]
    fn listen_config_carries_timeouts() {
        let cli = Cli::parse_from(["pgwire-iris", "--startup-timeout-secs", "5", "--idle-timeout-secs", "120"]);
        let listen = cli.listen_config();
        assert_eq!(listen.startup_timeout, Duration::from_secs(5));
        assert_eq!(listen.idle_timeout, Duration::from_secs(120));
    }
}
