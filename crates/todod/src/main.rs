//! todod — the todo API daemon.
//!
//! Single binary that assembles the subsystems:
//! - Record store (redb)
//! - Todo service
//! - REST API (todos + rollout management)
//! - Rollout controller with HTTP telemetry sampling
//!
//! # Usage
//!
//! ```text
//! todod serve --port 8080 --data-dir /var/lib/todod
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use todo_api::CorsConfig;
use todo_rollout::{HttpSampler, RolloutController, RolloutPolicy, TrafficRouter};
use todo_service::TodoService;
use todo_store::TodoStore;

#[derive(Parser)]
#[command(name = "todod", about = "Todo API daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and rollout controller.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080", env = "TODOD_PORT")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/todod", env = "TODOD_DATA_DIR")]
        data_dir: PathBuf,

        /// Comma-separated CORS origin allow-list. `*` allows any origin.
        #[arg(long, default_value = "*", env = "ALLOWED_ORIGINS")]
        allowed_origins: String,

        /// Version identifier currently serving all traffic.
        #[arg(long, default_value = "v1", env = "TODOD_STABLE_VERSION")]
        stable_version: String,

        /// Telemetry collector address (host:port).
        #[arg(long, default_value = "127.0.0.1:9090", env = "TODOD_TELEMETRY_ADDR")]
        telemetry_addr: String,

        /// Path prefix for error-rate sample lookups.
        #[arg(long, default_value = "/metrics/error-rate")]
        telemetry_path: String,

        /// Initial canary traffic weight (0-100).
        #[arg(long, default_value = "10", env = "TODOD_CANARY_WEIGHT")]
        canary_weight: u8,

        /// Error rate at or above which a canary is rolled back.
        #[arg(long, default_value = "1.0", env = "TODOD_ALARM_THRESHOLD")]
        alarm_threshold: f64,

        /// Canary evaluation window in seconds.
        #[arg(long, default_value = "300")]
        evaluation_window_secs: u64,

        /// Telemetry sampling interval in seconds.
        #[arg(long, default_value = "60")]
        tick_interval_secs: u64,

        /// Per-sample timeout in seconds.
        #[arg(long, default_value = "5")]
        sample_timeout_secs: u64,

        /// Consecutive skipped samples tolerated before rollback.
        #[arg(long, default_value = "3")]
        max_consecutive_skips: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,todod=debug,todo=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            data_dir,
            allowed_origins,
            stable_version,
            telemetry_addr,
            telemetry_path,
            canary_weight,
            alarm_threshold,
            evaluation_window_secs,
            tick_interval_secs,
            sample_timeout_secs,
            max_consecutive_skips,
        } => {
            let policy = RolloutPolicy {
                initial_weight: canary_weight,
                alarm_threshold,
                evaluation_window_ms: evaluation_window_secs * 1000,
                tick_interval_ms: tick_interval_secs * 1000,
                sample_timeout_ms: sample_timeout_secs * 1000,
                max_consecutive_skips,
            };
            run_serve(
                port,
                data_dir,
                &allowed_origins,
                &stable_version,
                &telemetry_addr,
                &telemetry_path,
                policy,
            )
            .await
        }
    }
}

async fn run_serve(
    port: u16,
    data_dir: PathBuf,
    allowed_origins: &str,
    stable_version: &str,
    telemetry_addr: &str,
    telemetry_path: &str,
    policy: RolloutPolicy,
) -> anyhow::Result<()> {
    info!("todod starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("todos.redb");

    // ── Initialize subsystems ──────────────────────────────────

    // Record store.
    let store = TodoStore::open(&db_path)?;
    info!(path = ?db_path, "record store opened");

    // Todo service.
    let service = TodoService::new(store);
    info!("todo service initialized");

    // Traffic router and rollout controller.
    let traffic = Arc::new(TrafficRouter::new(stable_version));
    let sampler = Arc::new(HttpSampler::new(telemetry_addr, telemetry_path));
    let controller = RolloutController::new(sampler, traffic, policy);
    info!(telemetry = telemetry_addr, "rollout controller initialized");

    // CORS allow-list.
    let cors = parse_origins(allowed_origins);

    // ── Start API server ───────────────────────────────────────

    let router = todo_api::build_router(service, controller.clone(), cors);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
    });

    server.await?;

    // Stop any running control loop without disturbing deployment state.
    controller.shutdown().await;

    info!("todod stopped");
    Ok(())
}

/// Split a comma-separated origin list, dropping empty entries.
fn parse_origins(raw: &str) -> CorsConfig {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if origins.is_empty() {
        CorsConfig::wildcard()
    } else {
        CorsConfig::new(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_wildcard_default() {
        let cors = parse_origins("*");
        // Wildcard config allows any origin; exercised via the middleware
        // tests — here we only check the parse doesn't drop the entry.
        assert!(format!("{cors:?}").contains('*'));
    }

    #[test]
    fn parse_origins_splits_and_trims() {
        let cors = parse_origins("https://a.example, https://b.example ,");
        let debug = format!("{cors:?}");
        assert!(debug.contains("https://a.example"));
        assert!(debug.contains("https://b.example"));
    }
}
