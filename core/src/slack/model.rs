use serde::{Deserialize, Serialize};

/// One message of a thread as returned by the conversation API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub author_id: String,
    /// Epoch seconds with sub-second precision (Slack `ts`).
    pub timestamp: f64,
    pub text: String,
    pub thread_root: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    pub channel_id: String,
    pub thread_ts: String,
    pub reply_count: u32,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackThread {
    pub metadata: ThreadMetadata,
    pub messages: Vec<RawMessage>,
}

/// Profile fields used to pick a display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub display_name: Option<String>,
}

impl SlackUser {
    /// First non-blank of real name, profile display name, handle.
    pub fn preferred_name(&self) -> Option<String> {
        [&self.real_name, &self.display_name, &self.name]
            .into_iter()
            .flatten()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
            .map(str::to_string)
    }
}

// Wire shapes of the Web API responses.

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RepliesResponse {
    pub ok: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub has_more: bool,
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseMetadata {
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireMessage {
    pub ts: String,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: String,
    pub reply_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserInfoResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub user: Option<WireUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireUser {
    pub id: String,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub profile: Option<WireProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireProfile {
    pub display_name: Option<String>,
    pub real_name: Option<String>,
}

impl From<WireUser> for SlackUser {
    fn from(wire: WireUser) -> Self {
        let (display_name, profile_real_name) = match wire.profile {
            Some(p) => (p.display_name, p.real_name),
            None => (None, None),
        };
        SlackUser {
            id: wire.id,
            name: wire.name,
            real_name: wire.real_name.or(profile_real_name),
            display_name,
        }
    }
}
