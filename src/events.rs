//! Event fan-out over NATS.
//!
//! Fire-and-forget from the core's perspective: a publish failure is logged
//! and never fails the request that produced the event.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventBus {
    client: Option<async_nats::Client>,
}

impl EventBus {
    pub fn new(client: Option<async_nats::Client>) -> Self {
        Self { client }
    }

    pub async fn connect(url: Option<&str>) -> Self {
        let client = match url {
            Some(url) => match async_nats::connect(url).await {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!("NATS connect failed, events disabled: {e}");
                    None
                }
            },
            None => None,
        };
        Self { client }
    }

    pub async fn publish(&self, event: &DomainEvent) {
        let Some(client) = &self.client else {
            tracing::debug!(subject = event.subject(), "event bus not configured, dropping event");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(subject = event.subject(), "event serialization failed: {e}");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), "event publish failed: {e}");
        }
    }
}
