//! Storemind trainer - batch forecast model training
//!
//! Trains one product's model, or every product discovered in the sales
//! history. Per-product failures are reported and skipped, never fatal.

use clap::Parser;
use std::sync::Arc;
use storemind::config::Config;
use storemind::database::{init_pool, migrations, SalesStore};
use storemind::forecast::{ForecastService, FsModelStorage};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "storemind-trainer", about = "Train forecast models from sales history")]
struct Args {
    /// Train only this product (default: whole catalog)
    #[arg(long)]
    product: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storemind=debug".parse()?),
        )
        .init();

    info!("Starting Storemind trainer v{}", storemind::VERSION);

    let args = Args::parse();
    let config = Config::from_env()?;
    config.validate()?;

    let pool = init_pool(&config.database).await?;
    migrations::run(&pool).await?;

    let sales = SalesStore::new(pool);
    let service = ForecastService::new(
        Arc::new(sales),
        Arc::new(FsModelStorage::new(config.forecast.model_dir.clone())),
    );

    match args.product {
        Some(product_id) => {
            let summary = service.train(&product_id).await?;
            info!(
                "Trained '{}' on {} distinct dates",
                summary.product_id, summary.distinct_points
            );
        }
        None => {
            let report = service.train_all().await?;
            info!("Trained {} products", report.trained.len());
            for skipped in &report.skipped {
                warn!("Skipped '{}': {}", skipped.product_id, skipped.reason);
            }
        }
    }

    Ok(())
}
