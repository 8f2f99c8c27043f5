use std::collections::HashMap;

use base64::Engine;
use fomo_core::HandlerResponse;
use lambda_runtime::{service_fn, Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::webhook::WebhookGateway;

/// Set by the Lambda runtime in every function environment.
pub const LAMBDA_RUNTIME_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

#[derive(Debug, Default, Deserialize)]
pub struct FunctionUrlRequest {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "isBase64Encoded", default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct FunctionUrlResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl From<HandlerResponse> for FunctionUrlResponse {
    fn from(response: HandlerResponse) -> Self {
        Self {
            status_code: response.status_code,
            headers: response.headers.into_iter().collect(),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FunctionUrlError {
    #[error("failed to decode base64 request body: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub fn is_lambda_environment() -> bool {
    std::env::var_os(LAMBDA_RUNTIME_ENV).is_some()
}

pub async fn run(gateway: WebhookGateway) -> Result<(), LambdaError> {
    lambda_runtime::run(service_fn(move |event: LambdaEvent<FunctionUrlRequest>| {
        let gateway = gateway.clone();
        async move {
            let (request, _context) = event.into_parts();
            handle(&gateway, request).await.map_err(LambdaError::from)
        }
    }))
    .await
}

/// Converts one function URL invocation into a webhook delivery.
///
/// A body that claims to be base64 but is not is reported to the runtime as an
/// error and never reaches the dispatcher.
pub async fn handle(
    gateway: &WebhookGateway,
    request: FunctionUrlRequest,
) -> Result<FunctionUrlResponse, FunctionUrlError> {
    let raw_body = request.body.unwrap_or_default();
    let body = if request.is_base64_encoded {
        base64::engine::general_purpose::STANDARD.decode(raw_body.as_bytes()).map_err(|error| {
            warn!(
                event_name = "webhook.base64_rejected",
                error = %error,
                "function url body is not valid base64"
            );
            FunctionUrlError::from(error)
        })?
    } else {
        raw_body.into_bytes()
    };

    let header = |name: &str| {
        request
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    };
    if let Err(rejected) = gateway.verify(header, &body) {
        return Ok(rejected.into());
    }

    Ok(gateway.deliver(&body).await.into())
}
