use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ghproxy::args::Args;
use ghproxy::config::EnvVarConfig;
use ghproxy::server;
use ghproxy_core::PolicyStore;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(err) = args.validate() {
        eprintln!("❌ Configuration error: {err}");
        std::process::exit(1);
    }

    init_logging(&args);

    let policy = Arc::new(PolicyStore::open(&args.config));
    let snapshot = policy.snapshot();
    let (host, port) = args.listen_addr(&snapshot);

    server::print_startup_info(&args, &snapshot, &host, port);

    let listener = match TcpListener::bind((host.as_str(), port)).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("❌ Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        }
    };

    info!(host = %host, port, "ghproxy is running");
    if !args.quiet {
        println!("✅ ghproxy is running on {host}:{port}");
    }

    let shutdown = CancellationToken::new();
    server::cancel_on_ctrl_c(shutdown.clone());

    let config = Arc::new(EnvVarConfig::new());
    if let Err(err) = server::serve(listener, policy, config, shutdown).await {
        error!(error = %err, "Server failed");
        std::process::exit(1);
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the CLI verbosity.
fn init_logging(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}
