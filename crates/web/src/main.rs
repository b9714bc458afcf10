mod args;
mod dashboard;
mod handlers;
mod hub;
mod messages;
mod poller;

use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{ConnectInfo, FromRef},
    http::{Request, header},
};
use pipeline_monitor_core::{config::Config, models::StatusDocument, util::check_repository};
use pipeline_monitor_github::{GitHub, remote::resolve_repository};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tower_http::{
    normalize_path::NormalizePath,
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::{Level, Span};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{args::Args, handlers::build_router, hub::Hub, poller::Poller};

#[derive(Clone, FromRef)]
pub struct AppState {
    config: Arc<Config>,
    hub: Arc<Hub>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argp::parse_args_or_exit(argp::DEFAULT);
    let env_filter = EnvFilter::builder()
        .with_default_directive(
            if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO }.into(),
        )
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.apply_env();

    tracing::info!("Initializing pipeline monitor for {}", config.monitor.repo_path.display());
    config.monitor.repo_path =
        check_repository(&config.monitor.repo_path).context("Invalid repository path")?;
    let reports_dir = config.monitor.reports_dir();
    tokio::fs::create_dir_all(&reports_dir)
        .await
        .with_context(|| format!("Failed to create {}", reports_dir.display()))?;

    let repository =
        resolve_repository(config.github.repository.as_deref(), &config.monitor.repo_path).await;
    let github = match (&config.github.token, repository) {
        (Some(_), Some(repository)) => {
            tracing::info!("Monitoring GitHub repository {}", repository);
            Some(GitHub::new(&config.github, repository)?)
        }
        _ => {
            tracing::warn!(
                "GitHub token or repository not configured; workflow and pull request status disabled"
            );
            None
        }
    };

    let dashboard_path = config.monitor.dashboard_path();
    if let Err(e) = dashboard::write(&dashboard_path, config.server.port).await {
        tracing::error!("Failed to create dashboard: {:?}", e);
    }

    let config = Arc::new(config);
    let hub = Arc::new(Hub::new(StatusDocument::default()));
    let state = AppState { config: config.clone(), hub: hub.clone() };

    let addr = SocketAddr::from((config.server.host, config.server.port));
    let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("WebSocket server: Listening on {}", addr);
    tracing::info!("Dashboard available at http://{}/dashboard", addr);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match shutdown_signal().await {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
            shutdown.cancel();
        }
    });

    let poller = Poller::new(&config, github, hub);
    let web_server = async {
        let result = serve(listener, state, shutdown.clone()).await;
        tracing::info!("Web server stopped");
        result
    };
    let (result, ()) = tokio::join!(web_server, poller.run(shutdown.clone()));
    result?;

    tracing::info!("Shut down gracefully");
    Ok(())
}

/// Serve until `shutdown` is cancelled, then close every viewer connection.
async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let hub = state.hub.clone();
    let service = axum::ServiceExt::<axum::extract::Request>::into_make_service_with_connect_info::<
        SocketAddr,
    >(app(state));
    axum::serve(listener, service)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            let closed = hub.close_all().await;
            tracing::info!("Closed {} viewer connections", closed);
        })
        .await
        .context("Web server error")
}

// Normalization wraps the router so it runs before route matching
fn app(state: AppState) -> NormalizePath<Router> {
    let router = build_router(&state.config.monitor.dashboard_path()).with_state(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(ClientSpan)
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    );
    NormalizePath::trim_trailing_slash(router)
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}

#[derive(Debug, Clone)]
pub struct ClientSpan;

impl<B> MakeSpan<B> for ClientSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let ip = request
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok())
            .or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(socket_addr)| socket_addr.ip())
            })
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("[unknown]");
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            ip = %ip,
            user_agent = %user_agent,
        )
    }
}
