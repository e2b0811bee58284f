use anyhow::Result;
use clap::Parser;
use tracing::info;
use viva_screen::{create_router, AppState, Config};

#[derive(Debug, Parser)]
#[command(name = "viva-screen", about = "Live assessment session engine")]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/viva-screen")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} starting", cfg.service.name);
    info!("Dialogue transport at {}", cfg.transport.nats_url);
    info!(
        "Session defaults: {}s budget, {}s silence threshold, {} strikes",
        cfg.session.time_budget_secs, cfg.session.silence_threshold_secs, cfg.session.strike_limit
    );

    let state = AppState::new(cfg.transport.nats_url.clone(), cfg.session.clone());
    let router = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
