use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ffbuilder_api::config::ServerConfig;
use ffbuilder_api::router::build_app_router;
use ffbuilder_api::state::AppState;
use ffbuilder_events::EventBroadcaster;
use ffbuilder_worker::{JobRegistry, JobRunner};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "ffbuilder_api=debug,ffbuilder_worker=debug,ffbuilder_events=info,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let subscriber = tracing_subscriber::registry().with(filter);
    if json_logs {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        output_path = %config.output_path.display(),
        ffmpeg_bin = %config.ffmpeg_bin,
        "Loaded server configuration",
    );

    // --- Output directory ---
    tokio::fs::create_dir_all(&config.output_path)
        .await
        .expect("Failed to create output directory");

    // --- Event broadcaster ---
    let broadcaster = Arc::new(EventBroadcaster::new());

    // --- Job runner ---
    let runner = Arc::new(JobRunner::new(
        config.ffmpeg_config(),
        Arc::new(JobRegistry::new()),
        Arc::clone(&broadcaster),
    ));
    tracing::info!("Job runner ready");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        runner: Arc::clone(&runner),
        broadcaster: Arc::clone(&broadcaster),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting ffbuilder server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let stopped = runner.stop_all().await;
    tracing::info!(stopped, "Running conversions stopped");

    broadcaster.close_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
