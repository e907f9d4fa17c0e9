//! ghproxy Core - GitHub reverse proxy components
//!
//! This crate provides the core functionality of the ghproxy reverse proxy:
//! - URL classification of GitHub release, blob, git, raw and gist targets
//! - Whitelist / blacklist access control over a reloadable policy snapshot
//! - A streaming proxy engine with redirect resolution and a size ceiling
//! - `.gitmodules` rewriting so submodules are fetched through the proxy
//!
//! # Overview
//!
//! `ghproxy-core` does not own a listener. The binary crate accepts
//! connections and hands each request to
//! [`request_handler::handle_request`] together with the shared
//! [`PolicyStore`], a [`ConfigProvider`] and a pooled HTTP client.
//!
//! # Example
//!
//! ```rust,no_run
//! use ghproxy_core::{ConnectionProvider, PolicyStore, UpstreamConfig, UpstreamProvider};
//! use ghproxy_core::request_handler::build_http_client;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct MyConfig {
//!     upstream: UpstreamConfig,
//! }
//!
//! impl UpstreamProvider for MyConfig {
//!     fn upstream_config(&self) -> &UpstreamConfig { &self.upstream }
//! }
//!
//! impl ConnectionProvider for MyConfig {
//!     fn max_connections(&self) -> usize { 10_000 }
//!     fn reload_interval(&self) -> Duration { Duration::from_secs(600) }
//! }
//!
//! let config = Arc::new(MyConfig { upstream: UpstreamConfig::default() });
//! let policy = Arc::new(PolicyStore::open("config.json"));
//! let client = build_http_client(&config.upstream).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`classifier`] - GitHub URL shapes and target normalization
//! - [`access`] - Whitelist / blacklist decisions
//! - [`policy`] - Policy snapshot, store and periodic reload
//! - [`request_handler`] - Request processing and upstream forwarding
//! - [`rewriter`] - `.gitmodules` submodule URL rewriting
//! - [`types`] - Static configuration and the [`ConfigProvider`] trait
//! - [`error`] - Error types and result aliases
//! - [`headers`] - HTTP header constants
//! - [`defaults`] - Default values

#![forbid(unsafe_code)]

pub mod access;
pub mod classifier;
pub mod defaults;
pub mod error;
pub mod headers;
pub mod policy;
pub mod request_handler;
pub mod rewriter;
#[cfg(test)]
pub mod test_utils;
pub mod types;

// Re-export commonly used items at crate root
pub use classifier::{GithubShape, GithubTarget};
pub use error::{DenyReason, GhProxyError, Result};
pub use policy::{PolicySnapshot, PolicyStore, spawn_reload_task};
pub use types::{
    // Aggregated configuration trait
    ConfigProvider,
    // Composable configuration traits
    ConnectionProvider,
    // Configuration structs
    UpstreamConfig,
    UpstreamProvider,
};
