//! Conference server binary
//!
//! Run with: cargo run -p trade-conference --bin trade-conference-server

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use trade_conference::{config::ConferenceConfig, server::ConferenceServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trade_conference=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                 Trade Document Conference                 ║
║        AI-assisted compliance review of trade files       ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Load configuration
    let config_path = std::env::var("CONFERENCE_CONFIG").ok().map(PathBuf::from);
    let config = ConferenceConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - AI model: {}", config.ai.model);
    tracing::info!(
        "  - Workers: {} (queue capacity {})",
        config.processing.effective_worker_count(),
        config.processing.queue_capacity
    );
    tracing::info!(
        "  - Binary path: files under {} bytes, {}s deadline",
        config.analyzer.binary_size_threshold,
        config.analyzer.binary_timeout_secs
    );
    tracing::info!(
        "  - Text fallback: {}s deadline, {} chars max",
        config.analyzer.text_timeout_secs,
        config.analyzer.max_text_chars
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
        signal.cancel();
    });

    // Create and start server
    let server = ConferenceServer::new(config, shutdown).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/conferences             - Submit stored files");
    println!("  GET  /api/conferences/:id/status  - Poll progress");
    println!("  GET  /api/conferences/:id         - Full results");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
