use fomo_core::ReactionEvent;
use serde::Deserialize;
use thiserror::Error;

const URL_VERIFICATION: &str = "url_verification";
const EVENT_CALLBACK: &str = "event_callback";
const REACTION_ADDED: &str = "reaction_added";
const MESSAGE_ITEM: &str = "message";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEnvelope {
    UrlVerification { challenge: String },
    Callback { team_id: String, event_id: Option<String>, event: CallbackEvent },
    Unknown { envelope_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackEvent {
    ReactionAdded(ReactionEvent),
    /// Any inner event the bot does not act on, including reactions to
    /// non-message items such as files.
    Other { event_type: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed event: {reason}")]
    MalformedEvent { reason: String },
}

impl ParseError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent { reason: reason.into() }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    envelope_type: Option<String>,
    challenge: Option<String>,
    team_id: Option<String>,
    event_id: Option<String>,
    event: Option<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    user: Option<String>,
    reaction: Option<String>,
    item: Option<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "type")]
    item_type: Option<String>,
    channel: Option<String>,
    ts: Option<String>,
}

/// Decodes an Events API request body.
///
/// Only the fields the bot needs are read; everything else in the payload is
/// ignored so new platform fields never break intake.
pub fn parse_event(body: &[u8]) -> Result<SlackEnvelope, ParseError> {
    let raw: RawEnvelope = serde_json::from_slice(body)
        .map_err(|error| ParseError::malformed(format!("invalid JSON: {error}")))?;

    let envelope_type =
        non_empty(raw.envelope_type).ok_or_else(|| ParseError::malformed("missing `type`"))?;

    match envelope_type.as_str() {
        URL_VERIFICATION => {
            Ok(SlackEnvelope::UrlVerification { challenge: raw.challenge.unwrap_or_default() })
        }
        EVENT_CALLBACK => {
            let team_id = raw.team_id.unwrap_or_default();
            let event = raw
                .event
                .ok_or_else(|| ParseError::malformed("event_callback without `event`"))?;
            let event = parse_callback_event(&team_id, event)?;
            Ok(SlackEnvelope::Callback { team_id, event_id: non_empty(raw.event_id), event })
        }
        _ => Ok(SlackEnvelope::Unknown { envelope_type }),
    }
}

fn parse_callback_event(team_id: &str, event: RawEvent) -> Result<CallbackEvent, ParseError> {
    let event_type =
        non_empty(event.event_type).ok_or_else(|| ParseError::malformed("missing `event.type`"))?;
    if event_type != REACTION_ADDED {
        return Ok(CallbackEvent::Other { event_type });
    }

    let item =
        event.item.ok_or_else(|| ParseError::malformed("reaction_added without `event.item`"))?;
    let item_type = item.item_type.unwrap_or_else(|| MESSAGE_ITEM.to_owned());
    if item_type != MESSAGE_ITEM {
        return Ok(CallbackEvent::Other { event_type: format!("{REACTION_ADDED}:{item_type}") });
    }

    if team_id.trim().is_empty() {
        return Err(ParseError::malformed("reaction_added without `team_id`"));
    }
    let channel_id = non_empty(item.channel)
        .ok_or_else(|| ParseError::malformed("reaction_added without `event.item.channel`"))?;
    let message_ts = non_empty(item.ts)
        .ok_or_else(|| ParseError::malformed("reaction_added without `event.item.ts`"))?;

    Ok(CallbackEvent::ReactionAdded(ReactionEvent {
        team_id: team_id.to_owned(),
        channel_id,
        message_ts,
        reaction: event.reaction.unwrap_or_default(),
        user_id: event.user.unwrap_or_default(),
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
