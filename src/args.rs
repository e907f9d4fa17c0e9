//! Command line argument parsing for ghproxy.
//!
//! This module defines the CLI interface using [`clap`] for argument parsing.
//! The listen address normally comes from the policy file; `--bind` and
//! `--listen` override it.
//!
//! # Example
//!
//! ```no_run
//! use ghproxy::args::Args;
//! use clap::Parser;
//!
//! let args = Args::parse();
//! if let Err(e) = args.validate() {
//!     eprintln!("Configuration error: {}", e);
//!     std::process::exit(1);
//! }
//! ```

use clap::Parser;
use ghproxy_core::{PolicySnapshot, defaults};
use std::path::PathBuf;

/// Command line arguments for ghproxy.
///
/// # Example
///
/// ```
/// use ghproxy::args::Args;
/// use clap::Parser;
///
/// let args =
///     Args::try_parse_from(["ghproxy", "--config", "/etc/ghproxy.json", "-l", "9000"]).unwrap();
/// assert_eq!(args.config.to_str(), Some("/etc/ghproxy.json"));
/// assert_eq!(args.listen, Some(9000));
/// ```
#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(
    long_about = "A policy-enforcing reverse proxy for GitHub downloads\nPrefix any GitHub release, archive, raw, gist or git URL with the proxy address.\n\nExample usage:\n  ghproxy --config config.json\n  ghproxy -c config.json -l 9000 --verbose\n  curl http://localhost:8080/https://github.com/owner/repo/releases/download/v1/a.tgz"
)]
#[command(
    after_help = "Environment variables:\n  PROXY_CONNECT_TIMEOUT_SECS          Upstream connect timeout (default: 30)\n  PROXY_RESPONSE_HEADER_TIMEOUT_SECS  Wait for upstream headers (default: 300)\n  MAX_REDIRECT_HOPS                   Redirects followed per request (default: 10)\n  PROXY_REPLAY_BUFFER_BYTES           Largest request body resent on redirects (default: 1048576)\n  MAX_CONNECTIONS                     Concurrent connections, 0 = unlimited (default: 10000)\n  CONFIG_RELOAD_INTERVAL_SECS         Policy reload period, 0 = never (default: 600)\n  RUST_LOG                            Log filter (default: info)"
)]
pub struct Args {
    /// Path to the JSON policy file
    #[arg(
        long,
        short = 'c',
        help = "Policy file (host, port, sizeLimit, lists)",
        value_name = "FILE",
        default_value = defaults::POLICY_FILE
    )]
    pub config: PathBuf,

    /// Address to bind to, overriding the policy file's `host`
    #[arg(
        long,
        short = 'b',
        help = "Bind address (overrides the policy file)",
        value_name = "ADDRESS"
    )]
    pub bind: Option<String>,

    /// Port to listen on, overriding the policy file's `port`
    #[arg(
        long,
        short = 'l',
        help = "Listen port (overrides the policy file)",
        value_name = "PORT"
    )]
    pub listen: Option<u16>,

    /// Enable verbose output
    #[arg(
        long,
        short = 'v',
        help = "Show detailed configuration and startup information"
    )]
    pub verbose: bool,

    /// Enable quiet mode (minimal output)
    #[arg(
        long,
        short = 'q',
        help = "Suppress configuration output, show only essential messages",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output logs in JSON format (for structured logging)
    #[arg(long, help = "Output logs in JSON format for structured logging")]
    pub json_logs: bool,
}

impl Args {
    /// Validates the parsed command line arguments.
    ///
    /// Performs the following validations:
    /// - The listen port, if given, must be greater than 0
    /// - The bind address, if given, must be a valid IP address
    ///
    /// # Example
    ///
    /// ```
    /// use ghproxy::args::Args;
    /// use clap::Parser;
    ///
    /// let args = Args::try_parse_from(["ghproxy", "-l", "0"]).unwrap();
    /// assert!(args.validate().is_err());
    ///
    /// let args = Args::try_parse_from(["ghproxy", "-b", "127.0.0.1", "-l", "8080"]).unwrap();
    /// assert!(args.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), String> {
        if self.listen == Some(0) {
            return Err("Port must be greater than 0".to_string());
        }

        if let Some(bind) = &self.bind
            && bind.parse::<std::net::IpAddr>().is_err()
        {
            return Err(format!("Invalid bind address: '{bind}'"));
        }

        Ok(())
    }

    /// Resolves the listen address: CLI overrides first, then the policy.
    pub fn listen_addr(&self, policy: &PolicySnapshot) -> (String, u16) {
        let host = self.bind.clone().unwrap_or_else(|| policy.host.clone());
        let port = self.listen.unwrap_or(policy.port);
        (host, port)
    }
}
