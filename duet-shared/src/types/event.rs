use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `duet.{domain}.{entity}.{action}`
/// Example: `duet.matching.match.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub profile_id: Option<String>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            profile_id: None,
            data,
        }
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    pub const MATCHING_LIKE_SENT: &str = "duet.matching.like.sent";
    pub const MATCHING_MATCH_CREATED: &str = "duet.matching.match.created";
}

/// Event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LikeSent {
        pub from_profile_id: String,
        pub to_profile_id: String,
        pub context: String,
    }

    /// Consumed by chat/notification services to unlock the conversation
    /// keyed by `match_id`.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchCreated {
        pub match_id: String,
        pub profile_ids: [String; 2],
        pub context: String,
    }
}
