//! Storemind server - knowledge search and demand forecasting API

use clap::Parser;
use std::net::SocketAddr;
use storemind::config::Config;
use storemind::database::{init_pool, migrations};
use storemind::embedding::EmbeddingService;
use storemind::server::{router, AppState};
use tracing::info;

#[derive(Parser)]
#[command(name = "storemind-server", about = "Storemind API server")]
struct Args {
    /// Bind address (overrides BIND_ADDRESS)
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides PORT)
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storemind=debug".parse()?),
        )
        .init();

    info!("Starting Storemind server v{}", storemind::VERSION);

    let args = Args::parse();
    let config = Config::from_env()?;
    config.validate()?;

    let pool = init_pool(&config.database).await?;
    migrations::run(&pool).await?;

    // The embedding model loads exactly once here; every request reuses the
    // same handle
    info!("Loading embedding model (downloads on first run)");
    let embedding = EmbeddingService::new()?;
    info!("Embedding model ready ({} dimensions)", embedding.dimensions());

    let state = AppState::new(pool, embedding, &config);
    let app = router(state);

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;

    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
