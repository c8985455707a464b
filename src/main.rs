use anyhow::Context;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use swagger_gate::{
    auth::{gate_middleware, SwaggerGate},
    handlers::docs,
    middleware::{health_check, trace_layer},
    state::AppState,
    utils::Config,
};
use tokio::signal;
use tower::ServiceBuilder;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swagger_gate=debug,tower_http=debug".into()),
        )
        .init();

    // Load configuration; gate construction is fatal on bad credentials or
    // malformed access-key entries.
    let config = Arc::new(Config::from_env()?);
    let gate = Arc::new(
        SwaggerGate::new(&config.swagger).context("invalid documentation gate configuration")?,
    );
    info!(docs_path = %gate.uri_path(), "documentation gate configured");

    let app = create_app(gate, config.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid HOST/PORT configuration")?;
    info!("Server listening on {}", addr);

    // Run the server with graceful shutdown; the gate needs caller
    // addresses, so serve with connect info.
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn create_app(gate: Arc<SwaggerGate>, config: Arc<Config>) -> Router {
    let docs_path = gate.uri_path().to_string();
    let state = AppState {
        gate: gate.clone(),
        config,
    };

    Router::new()
        .route("/health", get(health_check))
        .route(&docs_path, get(docs::index))
        .route(&format!("{docs_path}/index.html"), get(docs::index))
        .route(&format!("{docs_path}/openapi.json"), get(docs::openapi))
        .fallback(docs::not_found)
        .layer(
            ServiceBuilder::new()
                // Request tracing
                .layer(trace_layer())
                // Documentation authorization gate
                .layer(from_fn_with_state(gate, gate_middleware)),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
