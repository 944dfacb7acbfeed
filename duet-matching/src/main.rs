use std::sync::Arc;

use axum::middleware;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use duet_matching::config::{AppConfig, StoreBackend};
use duet_matching::{routes, AppState};
use duet_shared::clients::rabbitmq::RabbitMQClient;
use duet_shared::clients::redis::RedisClient;
use duet_shared::middleware::metrics_middleware;
use duet_shared::store::{MemoryStore, RedisDocumentStore};
use duet_shared::DocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    duet_shared::middleware::init_tracing("duet-matching");

    let config = AppConfig::load()?;
    let port = config.port;

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory document store, data is lost on restart");
            Arc::new(MemoryStore::with_max_attempts(config.transaction_max_attempts))
        }
        StoreBackend::Redis => {
            let redis = RedisClient::connect(&config.redis_url).await?;
            tracing::info!(url = %config.redis_url, "connected to Redis");
            Arc::new(RedisDocumentStore::new(
                redis,
                config.redis_key_prefix.clone(),
                config.transaction_max_attempts,
            ))
        }
    };

    let rabbitmq = if config.publish_events {
        let client = RabbitMQClient::connect(&config.rabbitmq_url).await?;
        Some(client)
    } else {
        None
    };

    let metrics_handle = duet_shared::middleware::init_metrics()?;

    let mut state = AppState::new(store, config).with_metrics(metrics_handle);
    if let Some(client) = rabbitmq {
        state = state.with_rabbitmq(client);
    }

    let app = routes::router(Arc::new(state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "duet-matching starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
