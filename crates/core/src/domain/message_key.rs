use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a reacted-to message across every observed workspace.
///
/// Rendered as `<team>_<channel>_<ts>`. The team id is part of the key so two
/// workspaces sharing channel ids never share a counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey(String);

impl MessageKey {
    pub fn new(team_id: &str, channel_id: &str, message_ts: &str) -> Self {
        Self(format!("{team_id}_{channel_id}_{message_ts}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
