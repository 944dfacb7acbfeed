use duet_shared::clients::rabbitmq::RabbitMQClient;
use duet_shared::types::event::{payloads, routing_keys, Event};

use crate::models::LikeContext;

const SOURCE: &str = "duet-matching";

pub async fn publish_like_sent(
    rabbitmq: &RabbitMQClient,
    from_profile_id: &str,
    to_profile_id: &str,
    context: LikeContext,
) {
    let event = Event::new(
        SOURCE,
        routing_keys::MATCHING_LIKE_SENT,
        payloads::LikeSent {
            from_profile_id: from_profile_id.to_string(),
            to_profile_id: to_profile_id.to_string(),
            context: context.as_str().to_string(),
        },
    )
    .with_profile(from_profile_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::MATCHING_LIKE_SENT, &event)
        .await
    {
        tracing::error!(error = %e, "failed to publish like.sent event");
    }
}

/// Emitted once per pair, by the swipe that created the match.
pub async fn publish_match_created(
    rabbitmq: &RabbitMQClient,
    match_id: &str,
    profile_ids: [String; 2],
    context: LikeContext,
    actor_id: &str,
) {
    let event = Event::new(
        SOURCE,
        routing_keys::MATCHING_MATCH_CREATED,
        payloads::MatchCreated {
            match_id: match_id.to_string(),
            profile_ids,
            context: context.as_str().to_string(),
        },
    )
    .with_profile(actor_id);

    if let Err(e) = rabbitmq
        .publish(routing_keys::MATCHING_MATCH_CREATED, &event)
        .await
    {
        tracing::error!(error = %e, match_id = %match_id, "failed to publish match.created event");
    }
}
