use anyhow::Context;
use diagram_server::core::cache::CachingGenerator;
use diagram_server::core::generator::MermaidCli;
use diagram_server::settings::get_config;
use diagram_server::{AppState, init_route};
use poem::listener::TcpListener;
use tracing::Level;

use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config()?;

    let log_level = Level::DEBUG;
    // Logging to File when a log dir is configured
    let _guard = match &config.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "app.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                .with_max_level(log_level)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_target(false)
                .init();
            None
        }
    };

    tracing::info!("Initializing Diagram Service...");
    tracing::info!("run with config: {:?}", config);

    let mut cli = MermaidCli::from_command_line(&config.mermaid_cli)
        .context("mermaid_cli must name a program")?;
    if let Some(puppeteer_config) = &config.puppeteer_config {
        cli = cli.with_puppeteer_config(puppeteer_config);
    }

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("could not create {}", config.output_dir.display()))?;

    let generator = Arc::new(CachingGenerator::new(
        cli,
        config.output_dir.clone(),
        config.cache_ttl(),
        config.cleanup_interval(),
    ));
    let _sweeper = generator.clone().spawn_sweeper(config.cleanup_interval());

    // Init App State
    let app_state = Arc::new(AppState {
        generator,
        output_dir: config.output_dir.clone(),
    });

    tracing::info!("Diagram generator initialized successfully");

    let app = init_route(app_state, &config);
    tracing::info!("run server on {}:{}", config.host, config.port);
    poem::Server::new(TcpListener::bind(format!(
        "{}:{}",
        config.host, config.port
    )))
    .run_with_graceful_shutdown(
        app,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("shutting down");
        },
        Some(config.shutdown_timeout()),
    )
    .await
    .context("server stopped with an error")
}
