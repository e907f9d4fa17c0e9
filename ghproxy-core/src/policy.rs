//! Reloadable access policy.
//!
//! The policy is read from a JSON file and published as an immutable
//! [`PolicySnapshot`] through a [`PolicyStore`]. Readers take an
//! `Arc<PolicySnapshot>` and keep a consistent view for as long as they hold
//! it; a reload parses the whole file first and only then swaps the pointer,
//! so no reader ever sees a half-applied policy. Old snapshots are freed when
//! their last reader drops them.
//!
//! # File format
//!
//! ```json
//! {
//!   "host": "0.0.0.0",
//!   "port": 8080,
//!   "sizeLimit": 10737418240,
//!   "whiteList": ["owner/repo", "owner2"],
//!   "blackList": [],
//!   "allowProxyAll": false,
//!   "otherWhiteList": [],
//!   "otherBlackList": []
//! }
//! ```
//!
//! Every field is optional. A missing file at startup yields the default
//! policy; a missing or malformed file at reload keeps the previous one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::defaults;
use crate::error::{GhProxyError, Result};

/// An immutable, fully-populated access policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicySnapshot {
    /// Listen host, read once at startup
    pub host: String,
    /// Listen port, read once at startup
    pub port: u16,
    /// Largest declared upstream `Content-Length` that is proxied, in bytes
    pub size_limit: u64,
    /// `owner/repo` prefixes allowed for GitHub targets (empty = all)
    pub white_list: Vec<String>,
    /// `owner/repo` prefixes denied for GitHub targets
    pub black_list: Vec<String>,
    /// Whether non-GitHub targets may be proxied at all
    pub allow_proxy_all: bool,
    /// Substrings allowed for non-GitHub targets (empty = all)
    pub other_white_list: Vec<String>,
    /// Substrings denied for non-GitHub targets
    pub other_black_list: Vec<String>,
}

impl Default for PolicySnapshot {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            size_limit: defaults::SIZE_LIMIT,
            white_list: Vec::new(),
            black_list: Vec::new(),
            allow_proxy_all: false,
            other_white_list: Vec::new(),
            other_black_list: Vec::new(),
        }
    }
}

/// On-disk shape of the policy file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PolicyFile {
    host: String,
    port: i64,
    size_limit: i64,
    white_list: Vec<String>,
    black_list: Vec<String>,
    allow_proxy_all: bool,
    other_white_list: Vec<String>,
    other_black_list: Vec<String>,
}

impl PolicySnapshot {
    /// Parses a policy document, filling defaults for unset values.
    ///
    /// `sizeLimit <= 0` and `port` of zero or out of range fall back to the
    /// defaults, so every snapshot carries a usable ceiling.
    ///
    /// ```
    /// use ghproxy_core::policy::PolicySnapshot;
    ///
    /// let json = r#"{"whiteList": ["foo/bar"], "sizeLimit": 0}"#;
    /// let policy = PolicySnapshot::from_json(json).unwrap();
    /// assert_eq!(policy.white_list, vec!["foo/bar".to_string()]);
    /// assert_eq!(policy.size_limit, 10 * 1024 * 1024 * 1024);
    /// assert_eq!(policy.port, 8080);
    /// ```
    pub fn from_json(document: &str) -> Result<Self> {
        let file: PolicyFile = serde_json::from_str(document)
            .map_err(|e| GhProxyError::ConfigLoad(format!("invalid policy document: {e}")))?;

        let port = u16::try_from(file.port)
            .ok()
            .filter(|port| *port != 0)
            .unwrap_or(defaults::PORT);
        let size_limit = u64::try_from(file.size_limit)
            .ok()
            .filter(|limit| *limit > 0)
            .unwrap_or(defaults::SIZE_LIMIT);
        let host = if file.host.trim().is_empty() {
            defaults::HOST.to_string()
        } else {
            file.host
        };

        Ok(Self {
            host,
            port,
            size_limit,
            white_list: file.white_list,
            black_list: file.black_list,
            allow_proxy_all: file.allow_proxy_all,
            other_white_list: file.other_white_list,
            other_black_list: file.other_black_list,
        })
    }

    /// Reads and parses a policy file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let document = std::fs::read_to_string(path).map_err(|e| read_error(path, e))?;
        Self::from_json(&document)
    }
}

fn read_error(path: &Path, err: std::io::Error) -> GhProxyError {
    GhProxyError::ConfigLoad(format!("cannot read {}: {err}", path.display()))
}

/// Holder of the current [`PolicySnapshot`].
///
/// Cheap to read from any number of tasks concurrently; replaced wholesale
/// by [`PolicyStore::reload`].
#[derive(Debug)]
pub struct PolicyStore {
    current: ArcSwap<PolicySnapshot>,
    source: PathBuf,
}

impl PolicyStore {
    /// Creates a store publishing `snapshot`, reloadable from `source`.
    pub fn new(snapshot: PolicySnapshot, source: impl Into<PathBuf>) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            source: source.into(),
        }
    }

    /// Loads the initial policy from `source`.
    ///
    /// Never fails: an unreadable or malformed file is logged and the
    /// default policy is published instead.
    pub fn open(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let snapshot = match PolicySnapshot::from_path(&source) {
            Ok(snapshot) => {
                info!(path = %source.display(), "Loaded policy");
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "Using default policy");
                PolicySnapshot::default()
            }
        };
        Self::new(snapshot, source)
    }

    /// Returns the snapshot in force right now.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Publishes a new snapshot.
    pub fn replace(&self, snapshot: PolicySnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Path the policy is reloaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Re-reads the policy file and publishes it.
    ///
    /// On error the current snapshot stays in force.
    pub async fn reload(&self) -> Result<()> {
        let document = tokio::fs::read_to_string(&self.source)
            .await
            .map_err(|e| read_error(&self.source, e))?;
        let snapshot = PolicySnapshot::from_json(&document)?;
        self.replace(snapshot);
        Ok(())
    }
}

/// Spawns the periodic policy reload task.
///
/// The first reload happens one `interval` after spawning. The task ends
/// when `shutdown` is cancelled; a zero interval disables reloading.
pub fn spawn_reload_task(
    store: Arc<PolicyStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if interval.is_zero() {
            warn!("Policy reload disabled (zero interval)");
            return;
        }

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Policy reload task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match store.reload().await {
                        Ok(()) => info!(path = %store.source().display(), "Policy reloaded"),
                        Err(e) => {
                            warn!(error = %e, "Policy reload failed, keeping previous policy")
                        }
                    }
                }
            }
        }
    })
}
