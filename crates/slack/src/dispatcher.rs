use std::sync::Arc;

use async_trait::async_trait;
use fomo_core::{crosses_threshold, HandlerResponse, InterfaceError, ReactionEvent};
use fomo_store::{CounterStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{parse_event, CallbackEvent, ParseError, SlackEnvelope};
use crate::notifier::{NotificationEmitter, NotifyError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Malformed(#[from] ParseError),
    #[error("unknown event type `{envelope_type}`")]
    UnknownEventType { envelope_type: String },
    #[error("counter increment failed for `{key}`: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl DispatchError {
    pub fn to_interface_error(&self) -> InterfaceError {
        match self {
            Self::Malformed(error) => InterfaceError::bad_request(error.to_string()),
            Self::UnknownEventType { .. } => InterfaceError::bad_request("unknown event type"),
            Self::Store { .. } | Self::Notify(_) => InterfaceError::upstream(self.to_string()),
        }
    }

    /// The reply the platform should receive for this failure.
    pub fn response(&self) -> HandlerResponse {
        self.to_interface_error().to_response()
    }
}

/// Transport-neutral entry point shared by the HTTP and function URL adapters.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle_event(&self, body: &[u8]) -> Result<HandlerResponse, DispatchError>;
}

pub struct EventDispatcher {
    store: Arc<dyn CounterStore>,
    emitter: NotificationEmitter,
    threshold: u64,
}

impl EventDispatcher {
    pub fn new(store: Arc<dyn CounterStore>, emitter: NotificationEmitter, threshold: u64) -> Self {
        Self { store, emitter, threshold }
    }

    async fn handle_reaction(
        &self,
        event: &ReactionEvent,
        event_id: Option<&str>,
    ) -> Result<HandlerResponse, DispatchError> {
        let key = event.message_key();
        let correlation_id = event_id.unwrap_or("none");

        let value = self.store.incr(key.as_str()).await.map_err(|source| {
            warn!(
                event_name = "reaction.count_failed",
                correlation_id,
                key = %key,
                error = %source,
                "failed to increment reaction counter"
            );
            DispatchError::Store { key: key.to_string(), source }
        })?;

        debug!(
            event_name = "reaction.counted",
            correlation_id,
            key = %key,
            reaction = %event.reaction,
            value,
            threshold = self.threshold,
            "reaction counted"
        );

        if crosses_threshold(value, self.threshold) {
            info!(
                event_name = "reaction.threshold_crossed",
                correlation_id,
                key = %key,
                value,
                "message reached the reaction threshold"
            );
            self.emitter.emit(&event.channel_id, &event.message_ts).await.map_err(|error| {
                warn!(
                    event_name = "notification.failed",
                    correlation_id,
                    key = %key,
                    error = %error,
                    "failed to send hot message notification"
                );
                DispatchError::from(error)
            })?;
        }

        Ok(HandlerResponse::ok())
    }
}

#[async_trait]
impl WebhookHandler for EventDispatcher {
    async fn handle_event(&self, body: &[u8]) -> Result<HandlerResponse, DispatchError> {
        if body.is_empty() {
            debug!(event_name = "webhook.empty_body", "no body provided in request");
            return Ok(HandlerResponse::bad_request(Vec::new()));
        }

        match parse_event(body)? {
            SlackEnvelope::UrlVerification { challenge } => {
                info!(event_name = "webhook.url_verification", "answering url verification");
                Ok(HandlerResponse::text(challenge))
            }
            SlackEnvelope::Callback { event_id, event, team_id } => match event {
                CallbackEvent::ReactionAdded(reaction) => {
                    self.handle_reaction(&reaction, event_id.as_deref()).await
                }
                CallbackEvent::Other { event_type } => {
                    debug!(
                        event_name = "webhook.ignored",
                        correlation_id = event_id.as_deref().unwrap_or("none"),
                        team_id = %team_id,
                        event_type = %event_type,
                        "ignoring callback event"
                    );
                    Ok(HandlerResponse::ok())
                }
            },
            SlackEnvelope::Unknown { envelope_type } => {
                Err(DispatchError::UnknownEventType { envelope_type })
            }
        }
    }
}
