pub mod catalog;
pub mod config;
pub mod events;
pub mod matching;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::Mutex;

use duet_shared::clients::rabbitmq::RabbitMQClient;
use duet_shared::DocumentStore;

use config::AppConfig;
use matching::{DeckRegistry, SwipeDeck};

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: AppConfig,
    pub rabbitmq: Option<RabbitMQClient>,
    pub metrics_handle: Option<PrometheusHandle>,
    pub decks: DeckRegistry,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Self {
        let decks = DeckRegistry::new(chrono::Duration::seconds(config.deck_ttl_secs as i64));
        Self {
            store,
            config,
            rabbitmq: None,
            metrics_handle: None,
            decks,
        }
    }

    pub fn with_rabbitmq(mut self, rabbitmq: RabbitMQClient) -> Self {
        self.rabbitmq = Some(rabbitmq);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub async fn deck(&self, viewer_id: &str) -> Option<Arc<Mutex<SwipeDeck>>> {
        self.decks.get(viewer_id).await
    }

    /// Replaces the viewer's deck with a freshly built one.
    pub async fn install_deck(&self, deck: SwipeDeck) -> Arc<Mutex<SwipeDeck>> {
        self.decks.install(deck).await
    }
}
