use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{info, warn};

use crate::http::AppState;

/// Header carrying the admin token (not the standard `Authorization`).
pub const ADMIN_TOKEN_HEADER: &str = "authentication";

#[derive(Debug, Default, Deserialize)]
pub struct LeaveQuery {
    pub channel: Option<String>,
}

/// `GET /leave?channel=<id>`: makes the bot leave a channel.
pub async fn leave_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LeaveQuery>,
) -> (StatusCode, &'static str) {
    let presented = headers.get(ADMIN_TOKEN_HEADER).and_then(|value| value.to_str().ok());
    let authorized = match (&state.admin_token, presented) {
        (Some(expected), Some(presented)) => expected.expose_secret() == presented,
        _ => false,
    };
    if !authorized {
        warn!(event_name = "admin.leave.forbidden", "leave request with a missing or wrong token");
        return (StatusCode::FORBIDDEN, "Forbidden");
    }

    let Some(channel) = query.channel.filter(|channel| !channel.trim().is_empty()) else {
        warn!(event_name = "admin.leave.missing_channel", "leave request without a channel");
        return (StatusCode::BAD_REQUEST, "Bad Request");
    };

    match state.chat.leave_conversation(&channel).await {
        Ok(()) => {
            info!(event_name = "admin.leave.completed", channel = %channel, "left channel");
            (StatusCode::OK, "")
        }
        Err(error) => {
            warn!(
                event_name = "admin.leave.failed",
                channel = %channel,
                error = %error,
                "failed to leave channel"
            );
            (StatusCode::BAD_REQUEST, "Bad Request")
        }
    }
}
