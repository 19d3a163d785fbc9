//! Human-readable one-line renderings of timeline events.
//!
//! Name resolution and body prettifying (linkification, escaping) are delegated to the caller
//! through [`TextContext`].

use alloc::format;
use alloc::string::{String, ToString};
use std::sync::LazyLock;

use regex::Regex;

use crate::event::{Event, Membership, MessageContent, Payload};

/// Collaborator that turns ids and raw bodies into presentable text.
pub trait TextContext {
    /// The display name of a room member.
    fn member_name(&self, user_id: &str) -> String {
        user_id.to_string()
    }

    /// Prettifies a plain-text body.
    fn pretty_print(&self, text: &str) -> String {
        text.to_string()
    }
}

static USER_PILL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a href="https://matrix.to/#/@[^"]*:[^"]*">(.*?)</a>"#)
        .expect("user pill pattern is valid")
});

static REPLY_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^> <@[^>]*:[^>]*> [^\n]*\n(?:>[^\n]*\n)*\n(.*)$")
        .expect("reply fallback pattern is valid")
});

/// "Redacted" or "Redacted: <reason>".
pub fn redacted_text(event: &Event) -> Option<String> {
    let info = event.redacted_because.as_ref()?;
    Some(match info.reason.as_deref() {
        Some(reason) if !reason.is_empty() => format!("Redacted: {reason}"),
        _ => String::from("Redacted"),
    })
}

/// The message body with any quoted reply fallback stripped.
pub fn message_body(event: &Event) -> String {
    let Some(content) = event.as_message() else {
        return String::new();
    };
    match REPLY_FALLBACK.captures(&content.body) {
        Some(caps) => caps
            .get(1)
            .map_or_else(String::new, |m| m.as_str().to_string()),
        None => content.body.clone(),
    }
}

/// Renders `event` the way a timeline row displays it.
pub fn display_text<C: TextContext + ?Sized>(event: &Event, ctx: &C) -> String {
    if let Some(text) = redacted_text(event) {
        return text;
    }
    match &event.payload {
        Payload::Message(content) => message_text(content, ctx),
        Payload::Member(change) => {
            let subject = ctx.member_name(&change.user_id);
            let self_targeted = event.sender_id == change.user_id;
            let prev = change.prev.as_ref().and_then(|p| p.membership);
            match change.membership {
                Some(Membership::Invite) if event.repeats_state => {
                    format!("reinvited {subject} to the room")
                }
                Some(m @ (Membership::Invite | Membership::Join)) => {
                    if event.repeats_state {
                        return String::from("joined the room (repeated)");
                    }
                    if change.membership_changed() {
                        return if m == Membership::Invite {
                            format!("invited {subject} to the room")
                        } else {
                            String::from("joined the room")
                        };
                    }
                    profile_change_text(change)
                }
                Some(Membership::Leave) => match (prev, self_targeted) {
                    (Some(Membership::Ban), false) => format!("unbanned {subject}"),
                    (Some(Membership::Ban), true) => String::from("self-unbanned"),
                    (_, false) => format!("has kicked {subject} from the room"),
                    (_, true) => String::from("left the room"),
                },
                Some(Membership::Ban) if self_targeted => String::from("self-banned from the room"),
                Some(Membership::Ban) => format!("banned {subject} from the room"),
                Some(Membership::Knock) => String::from("knocked"),
                None => String::from("made something unknown"),
            }
        }
        Payload::RoomAliases { aliases } => format!("set aliases to: {}", aliases.join(", ")),
        Payload::CanonicalAlias { alias } if alias.is_empty() => {
            String::from("cleared the room main alias")
        }
        Payload::CanonicalAlias { alias } => format!("set the room main alias to: {alias}"),
        Payload::RoomName { name } if name.is_empty() => String::from("cleared the room name"),
        Payload::RoomName { name } => format!("set the room name to: {name}"),
        Payload::RoomTopic { topic } if topic.is_empty() => String::from("cleared the topic"),
        Payload::RoomTopic { topic } => format!("set the topic to: {topic}"),
        Payload::RoomAvatar { .. } => String::from("changed the room avatar"),
        Payload::Encryption => String::from("activated End-to-End Encryption"),
        Payload::Redaction { .. } | Payload::Other { .. } => String::from("Unknown Event"),
    }
}

fn message_text<C: TextContext + ?Sized>(content: &MessageContent, ctx: &C) -> String {
    if content.has_text_content() && content.mime_type != "text/plain" {
        let html = content.formatted_body.as_deref().unwrap_or(&content.body);
        return USER_PILL
            .replace_all(html, r#"<b class="user-pill">$1</b>"#)
            .into_owned();
    }
    if let Some(file) = &content.file {
        let caption = if file.original_name.is_empty() {
            ctx.pretty_print(&content.body)
        } else {
            file.original_name.clone()
        };
        if caption.is_empty() {
            return String::from("a file");
        }
        return caption;
    }
    ctx.pretty_print(&content.body)
}

fn profile_change_text(change: &crate::event::MemberChange) -> String {
    let mut text = String::new();
    if change.is_rename() {
        match change.display_name.as_deref() {
            None | Some("") => text.push_str("cleared their display name"),
            Some(name) => {
                text.push_str("changed their display name to ");
                text.push_str(name);
            }
        }
    }
    if change.is_avatar_update() {
        if !text.is_empty() {
            text.push_str(" and ");
        }
        match change.avatar_url.as_deref() {
            None | Some("") => text.push_str("cleared the avatar"),
            Some(_) => text.push_str("updated the avatar"),
        }
    }
    text
}
