pub mod counter;
pub mod message_key;
pub mod reaction;
pub mod response;
