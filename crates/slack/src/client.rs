use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("failed to build slack http client: {0}")]
    Client(String),
    #[error("slack {method} request failed: {reason}")]
    Transport { method: &'static str, reason: String },
    #[error("slack {method} returned http status {status}")]
    Status { method: &'static str, status: u16 },
    #[error("slack {method} failed: {error}")]
    Api { method: &'static str, error: String },
    #[error("slack {method} response is missing `{field}`")]
    MissingField { method: &'static str, field: &'static str },
}

/// The three Web API calls the bot makes after startup.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), ChatError>;
    async fn get_permalink(&self, channel: &str, message_ts: &str) -> Result<String, ChatError>;
    async fn leave_conversation(&self, channel: &str) -> Result<(), ChatError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    error: Option<String>,
    #[serde(flatten)]
    payload: T,
}

#[derive(Debug, Deserialize)]
struct NoPayload {}

#[derive(Debug, Deserialize)]
struct AuthTestPayload {
    user_id: Option<String>,
    team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermalinkPayload {
    permalink: Option<String>,
}

/// Slack Web API client authenticated with the bot token.
///
/// Every request is bounded by the timeout given at construction; failures are
/// returned as-is with no retry.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        api_base: &str,
        bot_token: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, ChatError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("fomo-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|error| ChatError::Client(error.to_string()))?;

        Ok(Self { http, api_base: api_base.trim_end_matches('/').to_owned(), bot_token })
    }

    /// Checks the bot token; called once at startup so a bad token fails fast.
    pub async fn auth_test(&self) -> Result<AuthIdentity, ChatError> {
        const METHOD: &str = "auth.test";
        let payload: AuthTestPayload = self.call(METHOD, self.post(METHOD)).await?;
        let user_id = payload
            .user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or(ChatError::MissingField { method: METHOD, field: "user_id" })?;

        Ok(AuthIdentity { user_id, team_id: payload.team_id })
    }

    fn post(&self, method: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
    }

    fn get(&self, method: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
    }

    async fn call<T>(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ChatError>
    where
        T: DeserializeOwned,
    {
        debug!(event_name = "slack.api.request", method, "calling slack web api");

        let response = request
            .send()
            .await
            .map_err(|error| ChatError::Transport { method, reason: error.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status { method, status: status.as_u16() });
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|error| ChatError::Transport { method, reason: error.to_string() })?;
        if !envelope.ok {
            return Err(ChatError::Api {
                method,
                error: envelope.error.unwrap_or_else(|| "unknown_error".to_owned()),
            });
        }

        Ok(envelope.payload)
    }
}

#[async_trait]
impl ChatClient for SlackWebClient {
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        const METHOD: &str = "chat.postMessage";
        let request = self.post(METHOD).json(&json!({
            "channel": channel,
            "text": text,
        }));
        let _: NoPayload = self.call(METHOD, request).await?;
        Ok(())
    }

    async fn get_permalink(&self, channel: &str, message_ts: &str) -> Result<String, ChatError> {
        const METHOD: &str = "chat.getPermalink";
        let request = self.get(METHOD).query(&[("channel", channel), ("message_ts", message_ts)]);
        let payload: PermalinkPayload = self.call(METHOD, request).await?;

        payload
            .permalink
            .filter(|value| !value.trim().is_empty())
            .ok_or(ChatError::MissingField { method: METHOD, field: "permalink" })
    }

    async fn leave_conversation(&self, channel: &str) -> Result<(), ChatError> {
        const METHOD: &str = "conversations.leave";
        let request = self.post(METHOD).json(&json!({ "channel": channel }));
        let _: NoPayload = self.call(METHOD, request).await?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub text: String,
}

/// In-process chat client that records calls instead of talking to Slack.
///
/// Permalinks are synthesised from the channel and timestamp. Individual calls
/// can be made to fail to exercise downstream error paths.
#[derive(Debug, Default)]
pub struct RecordingChatClient {
    sent: Mutex<Vec<SentMessage>>,
    permalink_requests: Mutex<Vec<(String, String)>>,
    left: Mutex<Vec<String>>,
    fail_permalink: bool,
    fail_send: bool,
    fail_leave: bool,
}

impl RecordingChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_permalink(mut self) -> Self {
        self.fail_permalink = true;
        self
    }

    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn failing_leave(mut self) -> Self {
        self.fail_leave = true;
        self
    }

    pub fn permalink_for(channel: &str, message_ts: &str) -> String {
        format!("https://fomo.slack.com/archives/{channel}/p{}", message_ts.replace('.', ""))
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn permalink_requests(&self) -> Vec<(String, String)> {
        self.permalink_requests.lock().await.clone()
    }

    pub async fn left(&self) -> Vec<String> {
        self.left.lock().await.clone()
    }
}

#[async_trait]
impl ChatClient for RecordingChatClient {
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        if self.fail_send {
            return Err(ChatError::Api {
                method: "chat.postMessage",
                error: "channel_not_found".to_owned(),
            });
        }
        self.sent
            .lock()
            .await
            .push(SentMessage { channel: channel.to_owned(), text: text.to_owned() });
        Ok(())
    }

    async fn get_permalink(&self, channel: &str, message_ts: &str) -> Result<String, ChatError> {
        self.permalink_requests.lock().await.push((channel.to_owned(), message_ts.to_owned()));
        if self.fail_permalink {
            return Err(ChatError::Api {
                method: "chat.getPermalink",
                error: "message_not_found".to_owned(),
            });
        }
        Ok(Self::permalink_for(channel, message_ts))
    }

    async fn leave_conversation(&self, channel: &str) -> Result<(), ChatError> {
        if self.fail_leave {
            return Err(ChatError::Api {
                method: "conversations.leave",
                error: "not_in_channel".to_owned(),
            });
        }
        self.left.lock().await.push(channel.to_owned());
        Ok(())
    }
}
