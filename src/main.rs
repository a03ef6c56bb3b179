use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_gallery::{
    api,
    config::{Config, MetadataBackend, MetadataConfig, StorageBackend, StorageConfig},
    object_store as obj,
    storage::{self, MetadataStore},
    workflow::MediaWorkflow,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "media-gallery starting");

    // Load configuration
    let config = Config::load()?;

    let objects = object_store(&config.storage)?;
    let metadata = metadata_store(&config.metadata, &config.node.data_dir)?;

    let workflow = MediaWorkflow::new(objects, metadata);
    let state = Arc::new(AppState::new(config.clone(), workflow));

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

fn object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn obj::ObjectStore>> {
    match config.backend {
        StorageBackend::Local => {
            let store = obj::LocalStore::new(&config.local_storage_path, &config.public_base_url)?;
            info!(
                "Using local storage backend at: {}",
                config.local_storage_path
            );
            Ok(Arc::new(store))
        }
        StorageBackend::Azure => {
            let (Some(account), Some(sas), Some(container)) =
                (&config.account, &config.sas_token, &config.container)
            else {
                anyhow::bail!("Azure storage settings were not validated");
            };
            let store = obj::AzureBlobStore::new(
                account,
                sas.expose(),
                container,
                config.endpoint.as_deref(),
            )?;
            info!(account = %account, container = %container, "Using Azure blob storage backend");
            Ok(Arc::new(store))
        }
    }
}

fn metadata_store(
    config: &MetadataConfig,
    data_dir: &str,
) -> anyhow::Result<Arc<dyn MetadataStore>> {
    match config.backend {
        MetadataBackend::Local => {
            let db = storage::Database::open(data_dir)?;
            info!(records = db.count()?, "Database opened at: {}", data_dir);
            Ok(Arc::new(db))
        }
        MetadataBackend::Cosmos => {
            let (Some(endpoint), Some(key)) = (&config.cosmos_endpoint, &config.cosmos_key) else {
                anyhow::bail!("Cosmos settings were not validated");
            };
            let store = storage::CosmosStore::new(endpoint, key.expose())?;
            info!(
                endpoint = %endpoint,
                database = storage::DATABASE_ID,
                collection = storage::COLLECTION_ID,
                "Using Cosmos DB metadata backend"
            );
            Ok(Arc::new(store))
        }
        MetadataBackend::Relay => {
            let Some(url) = &config.relay_url else {
                anyhow::bail!("RELAY_URL was not validated");
            };
            let client = storage::RelayClient::new(url)?;
            info!(relay = %url, "Using metadata relay backend");
            Ok(Arc::new(client))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
