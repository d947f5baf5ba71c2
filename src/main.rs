use anyhow::{Context, Result};
use clap::Parser;
use loqa_companion::{create_router, AppState, Config, SessionCoordinator, SessionEvent};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "loqa-companion", about = "Conversation session daemon")]
struct Args {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/loqa-companion")]
    config: String,

    /// Override the HTTP port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    info!("Loqa Companion v0.1.0");
    info!("Loaded config: {}", cfg.service.name);
    info!("Voice notes will be saved to {}", cfg.recordings_dir().display());
    info!("Capture source: {}", cfg.capture.source);

    let coordinator = SessionCoordinator::from_config(&cfg)?;
    tokio::spawn(log_events(coordinator.subscribe()));

    let state = AppState::new(coordinator);
    let app = create_router(state);

    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", cfg.service.http.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Notice { text }) => warn!("Notice: {}", text),
            Ok(event) => info!("Session event: {:?}", event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event logger lagged, skipped {} events", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
