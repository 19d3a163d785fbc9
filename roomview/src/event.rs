use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Membership {
    Invite,
    Join,
    Leave,
    Ban,
    Knock,
}

/// A membership state change for `user_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberChange {
    pub user_id: String,
    pub membership: Option<Membership>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// The state this event replaced, when known.
    pub prev: Option<MemberState>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberState {
    pub membership: Option<Membership>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl MemberChange {
    fn prev_membership(&self) -> Option<Membership> {
        self.prev.as_ref().and_then(|p| p.membership)
    }

    /// A transition into `Join` from anything else.
    pub fn is_join(&self) -> bool {
        self.membership == Some(Membership::Join) && self.prev_membership() != self.membership
    }

    /// A transition from `Join` (or `Knock`) into `Leave`; unbans and rejected invites don't count.
    pub fn is_leave(&self) -> bool {
        self.membership == Some(Membership::Leave)
            && self.prev.is_some()
            && !matches!(
                self.prev_membership(),
                Some(Membership::Leave | Membership::Ban | Membership::Invite)
            )
    }

    pub fn is_rename(&self) -> bool {
        let prev = self.prev.as_ref().and_then(|p| p.display_name.as_deref());
        self.prev.is_some() && prev != self.display_name.as_deref()
    }

    pub fn is_avatar_update(&self) -> bool {
        let prev = self.prev.as_ref().and_then(|p| p.avatar_url.as_deref());
        self.prev.is_some() && prev != self.avatar_url.as_deref()
    }

    pub(crate) fn membership_changed(&self) -> bool {
        self.prev.is_none() || self.prev_membership() != self.membership
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageKind {
    Text,
    Emote,
    Notice,
    Image,
    Audio,
    Video,
    File,
    Location,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    pub original_name: String,
    pub mime_type: String,
    pub size: Option<u64>,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageContent {
    pub kind: MessageKind,
    /// Plain-text body.
    pub body: String,
    /// MIME type of the body; `text/html` when `formatted_body` is set.
    pub mime_type: String,
    pub formatted_body: Option<String>,
    pub file: Option<FileInfo>,
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            body: body.into(),
            mime_type: String::from("text/plain"),
            formatted_body: None,
            file: None,
        }
    }

    pub fn html(body: impl Into<String>, formatted_body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            body: body.into(),
            mime_type: String::from("text/html"),
            formatted_body: Some(formatted_body.into()),
            file: None,
        }
    }

    pub fn file(kind: MessageKind, body: impl Into<String>, file: FileInfo) -> Self {
        Self {
            kind,
            body: body.into(),
            mime_type: file.mime_type.clone(),
            formatted_body: None,
            file: Some(file),
        }
    }

    pub fn has_file_content(&self) -> bool {
        self.file.is_some()
    }

    pub fn has_text_content(&self) -> bool {
        matches!(
            self.kind,
            MessageKind::Text | MessageKind::Emote | MessageKind::Notice
        )
    }
}

/// The closed set of payloads a timeline row can carry.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload {
    Message(MessageContent),
    Member(MemberChange),
    RoomName { name: String },
    RoomTopic { topic: String },
    RoomAliases { aliases: Vec<String> },
    CanonicalAlias { alias: String },
    RoomAvatar { url: Option<String> },
    Encryption,
    /// An event whose sole effect is redacting `redacts`.
    Redaction {
        redacts: String,
        reason: Option<String>,
    },
    Other { event_type: String },
}

impl Payload {
    /// The protocol-level event type.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Message(_) => "m.room.message",
            Self::Member(_) => "m.room.member",
            Self::RoomName { .. } => "m.room.name",
            Self::RoomTopic { .. } => "m.room.topic",
            Self::RoomAliases { .. } => "m.room.aliases",
            Self::CanonicalAlias { .. } => "m.room.canonical_alias",
            Self::RoomAvatar { .. } => "m.room.avatar",
            Self::Encryption => "m.room.encryption",
            Self::Redaction { .. } => "m.room.redaction",
            Self::Other { event_type } => event_type,
        }
    }
}

/// Tombstone left on a redacted event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RedactionInfo {
    pub redaction_id: String,
    pub reason: Option<String>,
}

/// A timeline event as seen by the projection.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Empty while pending.
    pub id: String,
    pub transaction_id: String,
    pub sender_id: String,
    /// `None` when missing or invalid.
    pub timestamp: Option<DateTime<Utc>>,
    /// `Some` for state events.
    pub state_key: Option<String>,
    /// The state event sets exactly what was already current.
    pub repeats_state: bool,
    pub redacted_because: Option<RedactionInfo>,
    pub payload: Payload,
}

impl Event {
    pub fn new(id: impl Into<String>, sender_id: impl Into<String>, payload: Payload) -> Self {
        let state_key = match &payload {
            Payload::Member(m) => Some(m.user_id.clone()),
            Payload::RoomName { .. }
            | Payload::RoomTopic { .. }
            | Payload::RoomAliases { .. }
            | Payload::CanonicalAlias { .. }
            | Payload::RoomAvatar { .. }
            | Payload::Encryption => Some(String::new()),
            _ => None,
        };
        Self {
            id: id.into(),
            transaction_id: String::new(),
            sender_id: sender_id.into(),
            timestamp: None,
            state_key,
            repeats_state: false,
            redacted_because: None,
            payload,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = transaction_id.into();
        self
    }

    pub fn with_repeated_state(mut self) -> Self {
        self.repeats_state = true;
        self
    }

    pub fn redacted(mut self, redaction: RedactionInfo) -> Self {
        self.redacted_because = Some(redaction);
        self
    }

    pub fn is_redacted(&self) -> bool {
        self.redacted_because.is_some()
    }

    pub fn is_state_event(&self) -> bool {
        self.state_key.is_some()
    }

    pub fn as_member(&self) -> Option<&MemberChange> {
        match &self.payload {
            Payload::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageContent> {
        match &self.payload {
            Payload::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The id once committed, the transaction id while pending.
    pub fn display_id(&self) -> &str {
        if self.id.is_empty() {
            &self.transaction_id
        } else {
            &self.id
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeliveryStatus {
    Submitted,
    FileUploaded,
    Departed,
    ReachedServer,
    SendingFailed,
}

/// A locally originated event awaiting acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingEvent {
    pub event: Event,
    pub status: DeliveryStatus,
    pub last_updated: DateTime<Utc>,
    /// Free-form note (e.g. a send error) attached by the sender.
    pub annotation: String,
}

impl PendingEvent {
    pub fn new(event: Event, last_updated: DateTime<Utc>) -> Self {
        Self {
            event,
            status: DeliveryStatus::Submitted,
            last_updated,
            annotation: String::new(),
        }
    }
}

/// Snapshot of a file transfer tied to an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileTransferInfo {
    pub status: TransferStatus,
    pub progress: u64,
    pub total: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferStatus {
    #[default]
    None,
    Started,
    Completed,
    Failed,
    Cancelled,
}
