//! Chat log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::MediaKind;

/// Message identifier derived from the creation time in milliseconds.
///
/// The store bumps it past the previous id, so ids are strictly increasing
/// even when two messages share a millisecond.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub(crate) fn after(previous: Option<MessageId>, now: DateTime<Utc>) -> Self {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match previous {
            Some(MessageId(prev)) => MessageId(millis.max(prev + 1)),
            None => MessageId(millis),
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Media shown alongside a user message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    /// Server-side path of a clip produced for this answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<String>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
