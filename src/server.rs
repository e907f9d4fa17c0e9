//! Server loop and startup output.
//!
//! [`serve`] owns the accept loop: it admits connections through the
//! [`ConnectionLimiter`], serves each one on its own task with hyper's HTTP/1
//! server, keeps the policy reload task running, and drains in-flight
//! connections when the shutdown token is cancelled.

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::args::Args;
use crate::connection::{ConnectionLimiter, ConnectionTracker};
use crate::{config, env_vars};
use ghproxy_core::request_handler::{build_http_client, handle_request};
use ghproxy_core::{ConfigProvider, PolicySnapshot, PolicyStore, defaults, spawn_reload_task};

/// Serves proxy requests on `listener` until `shutdown` is cancelled.
///
/// The policy reload task runs for as long as the server does. After
/// cancellation no new connections are accepted, open connections are asked
/// to finish their current request, and the call returns once they have or
/// the shutdown grace period elapsed.
pub async fn serve<C>(
    listener: TcpListener,
    policy: Arc<PolicyStore>,
    config: Arc<C>,
    shutdown: CancellationToken,
) -> ghproxy_core::Result<()>
where
    C: ConfigProvider + 'static,
{
    let http_client = build_http_client(config.upstream_config())?;
    let limiter = ConnectionLimiter::new(config.max_connections());
    let tracker = ConnectionTracker::new();
    let reload_task = spawn_reload_task(
        policy.clone(),
        config.reload_interval(),
        shutdown.child_token(),
    );

    loop {
        let (stream, addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    continue;
                }
            },
        };

        let admission = limiter.admit();
        if !admission.is_admitted() {
            warn!(
                client = %addr,
                max_connections = limiter.max_connections(),
                "Connection limit reached, dropping connection"
            );
            continue;
        }

        debug!(client = %addr, "New connection");

        let io = TokioIo::new(stream);
        let policy = policy.clone();
        let config = config.clone();
        let http_client = http_client.clone();
        let conn_shutdown = shutdown.clone();

        tracker.spawn(async move {
            let _admission = admission;
            let service = service_fn(move |req| {
                handle_request(req, false, policy.clone(), config.clone(), http_client.clone())
            });

            let mut conn = std::pin::pin!(http1::Builder::new().serve_connection(io, service));
            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = conn_shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };

            if let Err(err) = result {
                debug!(client = %addr, error = %err, "Connection error");
            }
        });
    }

    info!("Shutting down, waiting for in-flight connections");
    if !tracker.wait_for_shutdown(defaults::SHUTDOWN_GRACE).await {
        warn!(
            remaining = tracker.count(),
            "Shutdown grace period elapsed with connections still open"
        );
    }

    if let Err(err) = reload_task.await {
        warn!(error = %err, "Policy reload task ended abnormally");
    }

    info!("Server stopped");
    Ok(())
}

/// Cancels `shutdown` when the process receives Ctrl-C.
pub fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(err) => warn!(error = %err, "Failed to listen for Ctrl-C"),
        }
        shutdown.cancel();
    });
}

/// Print startup banner with configuration
pub fn print_startup_info(args: &Args, policy: &PolicySnapshot, host: &str, port: u16) {
    if args.quiet {
        // Quiet mode: only essential information
        println!("🚀 ghproxy v{} starting on {host}:{port}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // Normal/verbose mode: full configuration display
    println!("🐙 {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("   {}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("📡 Network Configuration:");
    println!("   Listen:         {host}:{port}");
    println!("   Policy File:    {}", args.config.display());
    println!();

    let upstream = config::get_upstream_config();
    println!("🔧 Upstream Configuration:");
    println!("   Connect:        {} seconds", upstream.connect_timeout.as_secs());
    println!(
        "   Headers:        {} seconds",
        upstream.response_header_timeout.as_secs()
    );
    println!("   Redirect Hops:  {}", upstream.max_redirect_hops);
    println!("   Size Ceiling:   {} MiB", policy.size_limit / (1024 * 1024));

    print_policy_summary(policy);

    // Show environment configuration in verbose mode
    if args.verbose {
        print_env_config();
    }

    println!();
    println!("🚀 Server starting...");
}

/// Print access policy summary
fn print_policy_summary(policy: &PolicySnapshot) {
    println!("🔒 Access Policy:");

    if policy.white_list.is_empty() {
        println!("   GitHub:         All repositories");
    } else {
        println!("   Whitelist:      {} entries", policy.white_list.len());
    }
    if !policy.black_list.is_empty() {
        println!("   Blacklist:      {} entries", policy.black_list.len());
    }

    if policy.allow_proxy_all {
        println!("   Other Hosts:    Allowed");
        if !policy.other_white_list.is_empty() {
            println!("   Other Whitelist: {} entries", policy.other_white_list.len());
        }
        if !policy.other_black_list.is_empty() {
            println!("   Other Blacklist: {} entries", policy.other_black_list.len());
        }
    } else {
        println!("   Other Hosts:    Refused");
    }

    let reload = config::get_reload_interval();
    if reload.is_zero() {
        println!("   Reload:         Disabled");
    } else {
        println!("   Reload:         Every {} seconds", reload.as_secs());
    }
}

/// Print environment variable configuration status (used in verbose mode)
fn print_env_config() {
    println!();
    println!("🔧 Environment Variables:");

    for &var_name in env_vars::all_env_vars() {
        match env::var(var_name) {
            Ok(value) => println!("   {var_name:<36} = {value}"),
            Err(_) => println!("   {var_name:<36} = [NOT SET]"),
        }
    }
}
