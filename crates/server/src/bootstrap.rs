use std::sync::Arc;

use fomo_core::config::AppConfig;
use fomo_slack::{
    ChatClient, ChatError, EventDispatcher, NotificationEmitter, SignatureVerifier, SlackWebClient,
};
use fomo_store::redis_store::connection_info;
use fomo_store::{ConnectPolicy, CounterStore, InMemoryCounterStore, RedisCounterStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

use crate::webhook::WebhookGateway;

/// Selects the process-local counter store instead of Redis.
pub const MEMORY_STORE_ADDR: &str = "memory://";

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<dyn CounterStore>,
    pub chat: Arc<dyn ChatClient>,
    pub gateway: WebhookGateway,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("counter store connection failed: {0}")]
    Store(#[source] StoreError),
    #[error("slack client setup failed: {0}")]
    Chat(#[source] ChatError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        threshold = config.notification.threshold,
        window_secs = config.notification.window_secs,
        "starting application bootstrap"
    );

    let store = connect_store(&config).await?;

    let slack = SlackWebClient::new(
        &config.slack.api_base,
        config.slack.bot_token.clone(),
        config.server.upstream_timeout(),
    )
    .map_err(BootstrapError::Chat)?;
    let identity = slack.auth_test().await.map_err(BootstrapError::Chat)?;
    info!(
        event_name = "system.bootstrap.slack_authenticated",
        correlation_id = "bootstrap",
        bot_user_id = %identity.user_id,
        team_id = identity.team_id.as_deref().unwrap_or("unknown"),
        "slack bot token verified"
    );

    Ok(assemble(config, store, Arc::new(slack)))
}

/// Wires already-connected collaborators into the webhook pipeline.
pub fn assemble(
    config: AppConfig,
    store: Arc<dyn CounterStore>,
    chat: Arc<dyn ChatClient>,
) -> Application {
    let emitter = NotificationEmitter::new(chat.clone(), config.notification.channel.clone());
    let dispatcher = EventDispatcher::new(store.clone(), emitter, config.notification.threshold);

    let verifier = config.slack.signing_secret.clone().map(SignatureVerifier::new).map(Arc::new);
    if verifier.is_none() {
        warn!(
            event_name = "system.bootstrap.signature_disabled",
            correlation_id = "bootstrap",
            "CHAT_SIGNING_SECRET is not set; webhook signatures are not verified"
        );
    }
    if config.server.admin_auth_token.is_none() {
        warn!(
            event_name = "system.bootstrap.admin_disabled",
            correlation_id = "bootstrap",
            "ADMIN_AUTH_TOKEN is not set; the leave endpoint rejects every request"
        );
    }

    let gateway = WebhookGateway::new(Arc::new(dispatcher), verifier);
    Application { config, store, chat, gateway }
}

pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, BootstrapError> {
    let window = config.notification.window();

    if config.store.addr.trim() == MEMORY_STORE_ADDR {
        warn!(
            event_name = "system.bootstrap.memory_store",
            correlation_id = "bootstrap",
            "using the in-memory counter store; counts are not shared between processes"
        );
        return Ok(Arc::new(InMemoryCounterStore::new(window)));
    }

    let info = connection_info(&config.store.addr, config.store.password.as_ref(), config.store.db)
        .map_err(BootstrapError::Store)?;
    let store = RedisCounterStore::connect(
        info,
        window,
        config.server.upstream_timeout(),
        &ConnectPolicy::default(),
    )
    .await
    .map_err(BootstrapError::Store)?;

    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use fomo_core::config::AppConfig;
    use fomo_store::StoreError;

    use super::{connect_store, BootstrapError, MEMORY_STORE_ADDR};

    fn config_with_store(addr: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.notification.channel = "CNOTIFY".to_owned();
        config.slack.bot_token = "xoxb-test".to_owned().into();
        config.store.addr = addr.to_owned();
        config
    }

    #[tokio::test]
    async fn memory_address_selects_in_memory_store() {
        let store = connect_store(&config_with_store(MEMORY_STORE_ADDR)).await.expect("store");

        assert_eq!(store.incr("T1_C1_1.0").await.expect("incr"), 1);
        store.healthy().await.expect("healthy");
    }

    #[tokio::test]
    async fn invalid_store_address_fails_before_connecting() {
        let error = match connect_store(&config_with_store("memcached://cache:11211")).await {
            Ok(_) => panic!("memcached scheme must be rejected"),
            Err(error) => error,
        };

        assert!(matches!(error, BootstrapError::Store(StoreError::InvalidAddress { .. })));
    }
}
