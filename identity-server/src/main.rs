use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use identity_server::{create_app, IdentityServer, ServerConfig};

/// Identity service HTTP server
#[derive(Parser, Debug)]
#[command(name = "identity-server")]
#[command(about = "User registration, authentication and session HTTP API")]
struct Args {
    /// Server bind address (overrides the config file)
    #[arg(long, env = "IDENTITY_HOST")]
    host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(short, long, env = "IDENTITY_PORT")]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short, long, default_value = "identity-server.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = ServerConfig::load(Some(&args.config)).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    init_tracing(&config, args.verbose)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting identity server");

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .context("Invalid bind address")?;

    let server = IdentityServer::connect(config).await?;
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!(%addr, "identity server listening");
    info!("health check available at http://{addr}/health");
    info!("auth endpoints available at http://{addr}/api/v1/auth");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("identity server stopped");
    Ok(())
}

fn init_tracing(config: &ServerConfig, verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        "identity_server=debug,auth_identity=debug,tower_http=debug,sqlx=warn".to_string()
    } else {
        format!("{},sqlx=warn", config.logging.level)
    };

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&default_directive))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.logging.json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
