use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::client::{ChatClient, ChatError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("could not resolve permalink for {channel_id}/{message_ts}: {source}")]
    Permalink {
        channel_id: String,
        message_ts: String,
        #[source]
        source: ChatError,
    },
    #[error("could not post notification to {channel}: {source}")]
    Send {
        channel: String,
        #[source]
        source: ChatError,
    },
}

/// Text posted to the notification channel. Slack renders `<url|label>` as a link.
pub fn attention_message(permalink: &str) -> String {
    format!("This message appears to be getting plenty of attention: <{permalink}|here>")
}

/// Posts a link to a hot message into the configured notification channel.
pub struct NotificationEmitter {
    chat: Arc<dyn ChatClient>,
    notification_channel: String,
}

impl NotificationEmitter {
    pub fn new(chat: Arc<dyn ChatClient>, notification_channel: impl Into<String>) -> Self {
        Self { chat, notification_channel: notification_channel.into() }
    }

    pub async fn emit(&self, channel_id: &str, message_ts: &str) -> Result<(), NotifyError> {
        let permalink = self.chat.get_permalink(channel_id, message_ts).await.map_err(|source| {
            NotifyError::Permalink {
                channel_id: channel_id.to_owned(),
                message_ts: message_ts.to_owned(),
                source,
            }
        })?;

        self.chat
            .send_message(&self.notification_channel, &attention_message(&permalink))
            .await
            .map_err(|source| NotifyError::Send {
                channel: self.notification_channel.clone(),
                source,
            })?;

        info!(
            event_name = "notification.sent",
            channel_id,
            message_ts,
            notification_channel = %self.notification_channel,
            "posted hot message notification"
        );
        Ok(())
    }
}
