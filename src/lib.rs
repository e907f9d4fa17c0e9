//! ghproxy - A policy-enforcing reverse proxy for GitHub downloads
//!
//! Clients prefix a GitHub URL with the proxy's address
//! (`http://proxy:8080/https://github.com/owner/repo/releases/...`) and the
//! proxy fetches it for them, subject to a reloadable whitelist/blacklist.
//!
//! # Overview
//!
//! - Release assets, archives, raw files, blob views, gists and git
//!   smart-HTTP endpoints are recognised and access-controlled per repository
//! - Arbitrary hosts can optionally be proxied under their own lists
//! - Redirects to GitHub-shaped URLs are handed back through the proxy;
//!   other redirects (CDN hops) are followed internally
//! - `.gitmodules` files are rewritten so submodules use the proxy too
//! - Responses above a size ceiling are refused with 413
//!
//! # Example
//!
//! ```rust,no_run
//! use ghproxy::{config::EnvVarConfig, server};
//! use ghproxy_core::PolicyStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> ghproxy_core::Result<()> {
//! let policy = Arc::new(PolicyStore::open("config.json"));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//! server::serve(listener, policy, Arc::new(EnvVarConfig::new()), CancellationToken::new()).await
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`] - Configuration management from environment variables
//! - [`env_vars`] - Environment variable constants
//! - [`server`] - Accept loop, shutdown and startup info
//! - [`connection`] - Connection limiting and tracking
//! - [`args`] - Command line argument parsing
//!
//! # Re-exports from ghproxy-core
//!
//! Core functionality is provided by the `ghproxy-core` crate:
//! - [`classifier`] - GitHub URL classification
//! - [`access`] - Whitelist / blacklist decisions
//! - [`policy`] - Reloadable policy store
//! - [`request_handler`] - HTTP request processing and forwarding
//! - [`rewriter`] - `.gitmodules` rewriting

#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod connection;
pub mod env_vars;
pub mod server;

// Re-export ghproxy-core modules
pub use ghproxy_core::access;
pub use ghproxy_core::classifier;
pub use ghproxy_core::policy;
pub use ghproxy_core::request_handler;
pub use ghproxy_core::rewriter;
pub use ghproxy_core::types;

// Re-export commonly used items at crate root
pub use config::{EnvVarConfig, get_max_connections, get_reload_interval, get_upstream_config};
pub use ghproxy_core::{
    // Aggregated configuration trait
    ConfigProvider,
    // Composable configuration traits
    ConnectionProvider,
    // Error types
    GhProxyError,
    // Policy
    PolicySnapshot,
    PolicyStore,
    // Configuration structs
    UpstreamConfig,
    UpstreamProvider,
};
