//! Vivi server binary

use clap::Parser;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vivi::{
    config::Args,
    db::MongoClient,
    server,
    store::{MemoryStore, MirrorStore, MongoStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vivi={},info", log_level).into()),
        )
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Vivi - social ledger + content mirror");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri.as_deref().unwrap_or("(none, in-memory mirror)"));
    info!("Max voice upload: {} bytes", args.max_voice_bytes);
    info!("======================================");

    let store: Arc<dyn MirrorStore> = match &args.mongodb_uri {
        Some(uri) => {
            let client = MongoClient::new(uri, &args.mongodb_db).await?;
            info!("MongoDB connected successfully");
            Arc::new(MongoStore::new(client).await?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let state = Arc::new(server::AppState::new(args, store)?);

    let (shutdown_tx, _) = broadcast::channel(1);
    state.spawn_sync_tasks(&shutdown_tx);

    tokio::select! {
        result = server::run(Arc::clone(&state)) => {
            if let Err(e) = result {
                error!("Server error: {:?}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    let _ = shutdown_tx.send(());
    info!(cursor = state.listener.cursor(), "Vivi shut down");
    Ok(())
}
