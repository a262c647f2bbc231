//! Journal text composition. Pure functions so the exact report formats
//! stay pinned by tests.

use umbra_transport::{ChatMessage, Entity};

/// Human-readable label for an entity: `First Last (@username|id)` for
/// users, `"Title" (id)` for groups and channels. Missing name parts are
/// skipped rather than rendered as placeholders.
pub(crate) fn entity_label(entity: &Entity) -> String {
    match entity {
        Entity::User(profile) => {
            let mut name = profile.first_name.trim().to_string();
            if let Some(last_name) = profile
                .last_name
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
            {
                if !name.is_empty() {
                    name.push(' ');
                }
                name.push_str(last_name);
            }
            let handle = match profile
                .username
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
            {
                Some(username) => format!("(@{username}|{})", profile.id),
                None => format!("({})", profile.id),
            };
            if name.is_empty() {
                handle
            } else {
                format!("{name} {handle}")
            }
        }
        Entity::Chat(profile) | Entity::Channel(profile) => {
            format!("\"{}\" ({})", profile.title, profile.id)
        }
    }
}

/// Where a typing notification happened: `private` for direct chats,
/// `in "Title" (id)` otherwise.
pub(crate) fn chat_context(entity: &Entity) -> String {
    match entity {
        Entity::User(_) => "private".to_string(),
        Entity::Chat(profile) | Entity::Channel(profile) => {
            format!("in \"{}\" ({})", profile.title, profile.id)
        }
    }
}

/// The stable part of a typing line. Coalescing matches on this prefix.
pub(crate) fn typing_prefix(user: &Entity, chat: &Entity) -> String {
    format!("TYPING from: {} {}", entity_label(user), chat_context(chat))
}

pub(crate) fn typing_line(prefix: &str, clock_hms: &str) -> String {
    format!("{prefix} {clock_hms}")
}

/// One deleted-message row. Unknown content and missing links render empty.
pub(crate) fn shadow_row(message: Option<&ChatMessage>, link: Option<&str>) -> String {
    format!(
        "[before]({}): {}",
        link.unwrap_or_default(),
        message.map(|message| message.text.as_str()).unwrap_or_default()
    )
}

pub(crate) fn edit_report(
    author: &str,
    before_text: &str,
    before_link: Option<&str>,
    after_text: &str,
    after_link: Option<&str>,
) -> String {
    format!(
        "EDIT from: {author}\n\n[before]({}): {before_text}\n\n[after]({}): {after_text}",
        before_link.unwrap_or_default(),
        after_link.unwrap_or_default()
    )
}

pub(crate) fn delete_report(attribution: Option<&str>, rows: &[String]) -> String {
    format!(
        "REMOVE msg from {}:\n{}",
        attribution.unwrap_or_default(),
        rows.join("\n")
    )
}
