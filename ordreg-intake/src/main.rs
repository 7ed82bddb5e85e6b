//! ordreg-intake - Order Intake Microservice
//!
//! Ingests unstructured order messages (chat text, pasted email) and
//! converts them into normalized, auditable golden records ready for
//! review and ERP sync. Serves HTTP REST + SSE.

use anyhow::Result;
use clap::Parser;
use ordreg_common::events::EventBus;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ordreg_intake::catalog::{CatalogHandle, CatalogIndex};
use ordreg_intake::config::IntakeConfig;
use ordreg_intake::AppState;

/// Order intake service
#[derive(Parser, Debug)]
#[command(name = "ordreg-intake", version, about)]
struct Args {
    /// Root data folder (overrides ORDREG_ROOT_FOLDER and TOML)
    #[arg(long)]
    root_folder: Option<String>,

    /// Listen address
    #[arg(long, default_value = "127.0.0.1:5810")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Starting ordreg-intake (Order Intake) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve configuration and root folder
    let config = IntakeConfig::resolve(args.root_folder.as_deref());
    config.ensure_root_folder()?;

    // Step 2: Open or create database
    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = ordreg_intake::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 3: Load the master catalog into an immutable index
    let entries = ordreg_intake::config::load_catalog_or_empty(&config.catalog_path);
    let catalog = Arc::new(CatalogHandle::new(CatalogIndex::build(entries, 1)));

    // Step 4: Select the extraction backend
    let extractor = ordreg_intake::config::build_extractor(&config);

    // Step 5: Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);

    let state = AppState::new(
        db_pool,
        event_bus,
        catalog,
        extractor,
        Some(config.catalog_path.clone()),
    );
    let app = ordreg_intake::build_router(state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!("Listening on http://{}", args.listen);
    info!("Health check: http://{}/health", args.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
