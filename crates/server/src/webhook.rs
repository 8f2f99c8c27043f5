use std::sync::Arc;

use fomo_core::HandlerResponse;
use fomo_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use fomo_slack::{SignatureVerifier, WebhookHandler};
use tracing::{error, warn};
use uuid::Uuid;

/// Front door shared by the HTTP and function URL adapters.
///
/// Runs the optional signature check before any parsing, then hands the raw
/// body to the dispatcher and flattens its result into a `HandlerResponse`.
#[derive(Clone)]
pub struct WebhookGateway {
    handler: Arc<dyn WebhookHandler>,
    verifier: Option<Arc<SignatureVerifier>>,
}

impl WebhookGateway {
    pub fn new(handler: Arc<dyn WebhookHandler>, verifier: Option<Arc<SignatureVerifier>>) -> Self {
        Self { handler, verifier }
    }

    /// `header` looks up a request header by its lowercase name.
    pub fn verify<'a>(
        &self,
        header: impl Fn(&str) -> Option<&'a str>,
        body: &[u8],
    ) -> Result<(), HandlerResponse> {
        let Some(verifier) = &self.verifier else {
            return Ok(());
        };

        verifier.verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), body).map_err(|error| {
            warn!(
                event_name = "webhook.signature_rejected",
                error = %error,
                "rejecting webhook request with an invalid signature"
            );
            error.to_interface_error().to_response()
        })
    }

    pub async fn deliver(&self, body: &[u8]) -> HandlerResponse {
        let correlation_id = Uuid::new_v4().to_string();

        match self.handler.handle_event(body).await {
            Ok(response) => response,
            Err(error) => {
                let response = error.response();
                if response.status_code >= 500 {
                    error!(
                        event_name = "webhook.failed",
                        correlation_id = %correlation_id,
                        status_code = response.status_code,
                        error = %error,
                        "webhook handling failed"
                    );
                } else {
                    warn!(
                        event_name = "webhook.rejected",
                        correlation_id = %correlation_id,
                        status_code = response.status_code,
                        error = %error,
                        "webhook request rejected"
                    );
                }
                response
            }
        }
    }

    /// Like `deliver`, but on its own task so a dropped client connection
    /// cannot cancel a notification that is already under way.
    pub async fn deliver_detached(&self, body: Vec<u8>) -> HandlerResponse {
        let gateway = self.clone();
        match tokio::spawn(async move { gateway.deliver(&body).await }).await {
            Ok(response) => response,
            Err(join_error) => {
                error!(
                    event_name = "webhook.task_failed",
                    error = %join_error,
                    "webhook task did not complete"
                );
                HandlerResponse::empty(500)
            }
        }
    }
}
