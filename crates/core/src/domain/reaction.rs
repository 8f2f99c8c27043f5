use serde::{Deserialize, Serialize};

use crate::domain::message_key::MessageKey;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub team_id: String,
    pub channel_id: String,
    /// Platform-issued message identity; never interpreted as a clock.
    pub message_ts: String,
    pub reaction: String,
    pub user_id: String,
}

impl ReactionEvent {
    pub fn message_key(&self) -> MessageKey {
        MessageKey::new(&self.team_id, &self.channel_id, &self.message_ts)
    }
}

#[cfg(test)]
mod tests {
    use super::ReactionEvent;

    #[test]
    fn message_key_ignores_reaction_and_user() {
        let first = ReactionEvent {
            team_id: "T1".to_owned(),
            channel_id: "C1".to_owned(),
            message_ts: "1730000000.1000".to_owned(),
            reaction: "eyes".to_owned(),
            user_id: "U1".to_owned(),
        };
        let second =
            ReactionEvent { reaction: "tada".to_owned(), user_id: "U2".to_owned(), ..first.clone() };

        assert_eq!(first.message_key(), second.message_key());
        assert_eq!(first.message_key().as_str(), "T1_C1_1730000000.1000");
    }
}
