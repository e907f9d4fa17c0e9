//! Default configuration values for ghproxy.
//!
//! Shared by the policy parser, the environment configuration and tests.

use std::time::Duration;

/// Default listen host when the policy file does not set one.
pub const HOST: &str = "0.0.0.0";

/// Default listen port when the policy file does not set one.
pub const PORT: u16 = 8080;

/// Default response size ceiling (10 GiB).
pub const SIZE_LIMIT: u64 = 10 * 1024 * 1024 * 1024;

/// Default policy file path, relative to the working directory.
pub const POLICY_FILE: &str = "config.json";

/// Default interval between policy reloads in seconds.
pub const RELOAD_INTERVAL_SECS: u64 = 600;

/// Default interval between policy reloads.
pub const RELOAD_INTERVAL: Duration = Duration::from_secs(RELOAD_INTERVAL_SECS);

/// Default upstream connect timeout (TCP and TLS handshake) in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default wait for upstream response headers in seconds.
pub const RESPONSE_HEADER_TIMEOUT_SECS: u64 = 300;

/// Default idle timeout for pooled upstream connections in seconds.
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Default maximum idle pooled connections per upstream host.
pub const POOL_MAX_IDLE_PER_HOST: usize = 1000;

/// Default TCP keep-alive interval for upstream connections in seconds.
pub const TCP_KEEPALIVE_SECS: u64 = 30;

/// Default maximum number of internally followed redirects per request.
pub const MAX_REDIRECT_HOPS: usize = 10;

/// Largest request body buffered so it can be replayed on redirect hops
/// (1 MiB). Bigger or unsized bodies are streamed to the first hop only.
pub const REPLAY_BUFFER_LIMIT: usize = 1024 * 1024;

/// Default maximum concurrent inbound connections.
pub const MAX_CONNECTIONS: usize = 10_000;

/// Grace period for in-flight connections on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
