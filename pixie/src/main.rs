mod auth_gate;
mod bootstrap;
mod handlers;
mod orchestrator;
mod routes;
mod state;

use bootstrap::Application;
use pixie_core::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to load configuration");
        std::process::exit(1);
    });
    let addr = "0.0.0.0:3000";

    let app = Application::bootstrap(config)
        .await
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "bootstrap failed");
            std::process::exit(1);
        });

    let router = routes::build_router(app.ctx.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|err| {
            tracing::error!(%addr, error = %err, "failed to bind listener");
            std::process::exit(1);
        });
    tracing::info!(%addr, "pixie listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|err| tracing::error!(error = %err, "server error"));

    app.shutdown().await;
    tracing::info!("pixie stopped");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".parse().unwrap()))
        .init();
}

/// Ctrl-C or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for Ctrl-C");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
