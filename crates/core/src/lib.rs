pub mod config;
pub mod domain;
pub mod errors;

pub use domain::counter::{crosses_threshold, CounterWindow, ExpiryPolicy};
pub use domain::message_key::MessageKey;
pub use domain::reaction::ReactionEvent;
pub use domain::response::HandlerResponse;
pub use errors::InterfaceError;
