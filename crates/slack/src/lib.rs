//! Slack Integration - Events API webhook intake and Web API calls
//!
//! This crate turns raw webhook bodies into counter increments and
//! notifications:
//! - **Events** (`events`) - envelope parsing into tagged variants
//! - **Dispatcher** (`dispatcher`) - the `WebhookHandler` shared by every adapter
//! - **Notifier** (`notifier`) - permalink lookup and the notification post
//! - **Client** (`client`) - Slack Web API over reqwest
//! - **Signature** (`signature`) - optional `v0` request signing check
//!
//! # Architecture
//!
//! ```text
//! Adapter → [SignatureVerifier] → EventDispatcher → parse_event
//!                                       ↓
//!                             CounterStore::incr → value == N?
//!                                                     ↓
//!                                        NotificationEmitter → ChatClient
//! ```
//!
//! Nothing in this crate knows whether it is running behind HTTP or a function
//! URL; adapters hand over bytes and receive a `HandlerResponse`.

pub mod client;
pub mod dispatcher;
pub mod events;
pub mod notifier;
pub mod signature;

pub use client::{ChatClient, ChatError, RecordingChatClient, SlackWebClient};
pub use dispatcher::{DispatchError, EventDispatcher, WebhookHandler};
pub use events::{parse_event, CallbackEvent, ParseError, SlackEnvelope};
pub use notifier::{NotificationEmitter, NotifyError};
pub use signature::{SignatureError, SignatureVerifier};
