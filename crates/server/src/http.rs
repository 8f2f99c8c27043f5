use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use fomo_core::HandlerResponse;
use fomo_slack::ChatClient;
use fomo_store::CounterStore;
use secrecy::SecretString;
use tracing::{error, info};

use crate::bootstrap::Application;
use crate::webhook::WebhookGateway;
use crate::{admin, health};

#[derive(Clone)]
pub struct AppState {
    pub gateway: WebhookGateway,
    pub store: Arc<dyn CounterStore>,
    pub chat: Arc<dyn ChatClient>,
    pub admin_token: Option<SecretString>,
}

impl AppState {
    pub fn from_application(app: &Application) -> Self {
        Self {
            gateway: app.gateway.clone(),
            store: app.store.clone(),
            chat: app.chat.clone(),
            admin_token: app.config.server.admin_auth_token.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(webhook))
        .route("/healthz", get(health::liveness))
        .route("/readyz", get(health::readiness))
        .route("/leave", get(admin::leave_channel))
        .with_state(state)
}

pub async fn serve(
    app: Application,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let address: SocketAddr = app
        .config
        .server
        .listen
        .parse()
        .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidInput, error))?;
    let listener = tokio::net::TcpListener::bind(address).await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        mode = "http",
        bind_address = %address,
        "fomo-server listening for webhook requests"
    );

    axum::serve(listener, router(AppState::from_application(&app)))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|error| {
            error!(
                event_name = "system.server.error",
                correlation_id = "shutdown",
                error = %error,
                "http server terminated unexpectedly"
            );
            error
        })
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            error!(
                event_name = "webhook.body_read_failed",
                error = %rejection,
                "failed to read webhook request body"
            );
            return to_http_response(HandlerResponse::empty(500));
        }
    };

    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    if let Err(rejected) = state.gateway.verify(header, &body) {
        return to_http_response(rejected);
    }

    to_http_response(state.gateway.deliver_detached(body.to_vec()).await)
}

pub fn to_http_response(response: HandlerResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut http_response = Response::new(Body::from(response.body));
    *http_response.status_mut() = status;
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
        {
            http_response.headers_mut().insert(name, value);
        }
    }
    http_response
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use fomo_core::config::AppConfig;
    use fomo_slack::RecordingChatClient;
    use fomo_store::{CounterStore, InMemoryCounterStore, StoreError};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::{router, AppState};
    use crate::bootstrap::assemble;

    pub(crate) struct UnavailableStore;

    #[async_trait]
    impl CounterStore for UnavailableStore {
        async fn incr(&self, _key: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }

        async fn healthy(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }
    }

    pub(crate) fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.notification.channel = "CNOTIFY".to_owned();
        config.notification.threshold = 2;
        config.slack.bot_token = "xoxb-test".to_owned().into();
        config.store.addr = "memory://".to_owned();
        config.server.admin_auth_token = Some("admin-secret".to_owned().into());
        config
    }

    pub(crate) fn test_app(
        config: AppConfig,
        store: Arc<dyn CounterStore>,
        chat: Arc<RecordingChatClient>,
    ) -> Router {
        let app = assemble(config, store, chat);
        router(AppState::from_application(&app))
    }

    fn memory_store(config: &AppConfig) -> Arc<dyn CounterStore> {
        Arc::new(InMemoryCounterStore::new(config.notification.window()))
    }

    pub(crate) fn memory_app(config: AppConfig, chat: Arc<RecordingChatClient>) -> Router {
        let store = memory_store(&config);
        test_app(config, store, chat)
    }

    pub(crate) async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn post(body: &'static str) -> Request<Body> {
        Request::builder().method("POST").uri("/").body(Body::from(body)).expect("request")
    }

    const REACTION: &str = r#"{"type":"event_callback","team_id":"T1","event_id":"Ev1",
        "event":{"type":"reaction_added","user":"U1","reaction":"eyes",
        "item":{"type":"message","channel":"C1","ts":"1730000000.000100"}}}"#;

    #[tokio::test]
    async fn challenge_is_answered_as_plain_text() {
        let app = memory_app(test_config(), Arc::new(RecordingChatClient::new()));

        let response = app
            .oneshot(post(r#"{"token":"x","challenge":"C123","type":"url_verification"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").and_then(|value| value.to_str().ok()),
            Some("text")
        );
        assert_eq!(body_text(response).await, "C123");
    }

    #[tokio::test]
    async fn empty_body_is_a_bad_request() {
        let app = memory_app(test_config(), Arc::new(RecordingChatClient::new()));

        let response = app.oneshot(post("")).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn reaching_threshold_over_http_posts_one_notification() {
        let chat = Arc::new(RecordingChatClient::new());
        let app = memory_app(test_config(), chat.clone());

        for _ in 0..3 {
            let response = app.clone().oneshot(post(REACTION)).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let sent = chat.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "CNOTIFY");
    }

    #[tokio::test]
    async fn store_failure_is_an_internal_error() {
        let chat = Arc::new(RecordingChatClient::new());
        let app = test_app(test_config(), Arc::new(UnavailableStore), chat.clone());

        let response = app.oneshot(post(REACTION)).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "");
        assert!(chat.sent().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_envelope_is_a_bad_request_with_reason() {
        let app = memory_app(test_config(), Arc::new(RecordingChatClient::new()));

        let response = app.oneshot(post(r#"{"type":"app_rate_limited"}"#)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "unknown event type");
    }

    #[tokio::test]
    async fn unsigned_request_is_rejected_when_signing_secret_is_set() {
        let mut config = test_config();
        config.slack.signing_secret = Some("signing-secret".to_owned().into());
        let chat = Arc::new(RecordingChatClient::new());
        let store = memory_store(&config);
        let app = test_app(config, store.clone(), chat);

        let response = app.oneshot(post(REACTION)).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.incr("T1_C1_1730000000.000100").await.expect("incr"), 1);
    }
}
