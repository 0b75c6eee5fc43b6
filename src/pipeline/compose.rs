//! Chat message assembly.
//!
//! Both engine modes build their message lists here, then pass them through
//! [`normalize`]: system messages are hoisted to the front (stable order),
//! consecutive same-role messages merge into one, and every content string
//! is sanitised. Providers therefore always see `[system, user]` and never
//! reject a request over message-ordering rules.

use crate::catalog::ReviewRequest;
use crate::pipeline::chat::{ChatMessage, Role};

/// Private-use glyph PowerPoint emits for arrow bullets; some providers
/// reject it. Removed both as the raw character and as a literal escape.
const ARROW_GLYPH: char = '\u{f0e0}';
const ARROW_ESCAPE: &str = "\\uf0e0";

/// Messages for one combined call: persona (and schema) as system, one user
/// message per request prompt, the optional context, then the payload last.
pub fn combined_messages(
    persona_set: &str,
    format_description: Option<&str>,
    requests: &[ReviewRequest],
    context: Option<&str>,
    wire_payload: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![system_message(persona_set, format_description)];
    for request in requests {
        messages.push(ChatMessage::user(request.prompt.clone()));
    }
    push_context_and_payload(&mut messages, context, wire_payload);
    normalize(messages)
}

/// Messages for one detailed call: a single request prompt instead of the
/// whole batch.
pub fn detailed_messages(
    persona_set: &str,
    format_description: Option<&str>,
    request: &ReviewRequest,
    context: Option<&str>,
    wire_payload: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![
        system_message(persona_set, format_description),
        ChatMessage::user(request.prompt.clone()),
    ];
    push_context_and_payload(&mut messages, context, wire_payload);
    normalize(messages)
}

fn system_message(persona_set: &str, format_description: Option<&str>) -> ChatMessage {
    let content = match format_description {
        Some(desc) => format!("[{persona_set}]\n[{desc}]"),
        None => format!("[{persona_set}]"),
    };
    ChatMessage::system(content)
}

fn push_context_and_payload(
    messages: &mut Vec<ChatMessage>,
    context: Option<&str>,
    wire_payload: &str,
) {
    if let Some(context) = context {
        if !context.is_empty() {
            messages.push(ChatMessage::user(format!("[{context}]")));
        }
    }
    messages.push(ChatMessage::user(wire_payload.to_string()));
}

/// Hoist system messages to the front, merge consecutive same-role
/// messages with newline joins, and sanitise all content.
pub fn normalize(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let (system, rest): (Vec<_>, Vec<_>) = messages
        .into_iter()
        .partition(|m| m.role == Role::System);

    let mut merged: Vec<ChatMessage> = Vec::new();
    for message in system.into_iter().chain(rest) {
        match merged.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push('\n');
                last.content.push_str(&message.content);
            }
            _ => merged.push(message),
        }
    }

    for message in &mut merged {
        message.content = sanitize(&message.content);
    }
    merged
}

/// Strip the arrow glyph in both of its observed spellings.
pub fn sanitize(text: &str) -> String {
    text.replace(ARROW_GLYPH, "").replace(ARROW_ESCAPE, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ReviewRequest;

    fn request(name: &str, prompt: &str) -> ReviewRequest {
        ReviewRequest::new(name, prompt, 0.3, 0.2)
    }

    #[test]
    fn combined_layout_is_system_then_one_user() {
        let messages = combined_messages(
            "persona",
            Some("schema"),
            &[request("A", "do a"), request("B", "do b")],
            Some("project context"),
            "\"payload\"",
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with("[persona]"));
        assert!(messages[0].content.contains("[schema]"));
        assert_eq!(messages[1].role, Role::User);
        let user = &messages[1].content;
        let a = user.find("do a").unwrap();
        let b = user.find("do b").unwrap();
        let ctx = user.find("[project context]").unwrap();
        let payload = user.find("\"payload\"").unwrap();
        assert!(a < b && b < ctx && ctx < payload);
    }

    #[test]
    fn detailed_layout_carries_one_prompt() {
        let messages = detailed_messages("persona", None, &request("A", "do a"), None, "\"p\"");
        assert_eq!(messages.len(), 2);
        assert!(!messages[0].content.contains('\n'));
        assert!(messages[1].content.starts_with("do a"));
        assert!(messages[1].content.ends_with("\"p\""));
    }

    #[test]
    fn normalize_hoists_system_messages_stably() {
        let messages = normalize(vec![
            ChatMessage::user("u1"),
            ChatMessage::system("s1"),
            ChatMessage::user("u2"),
            ChatMessage::system("s2"),
        ]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "s1\ns2");
        assert_eq!(messages[1].content, "u1\nu2");
    }

    #[test]
    fn sanitize_strips_both_arrow_spellings() {
        assert_eq!(sanitize("a\u{f0e0}b"), "ab");
        assert_eq!(sanitize("a\\uf0e0b"), "ab");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn empty_context_is_dropped() {
        let messages = detailed_messages("p", None, &request("A", "x"), Some(""), "\"p\"");
        assert!(!messages[1].content.contains("[]"));
    }
}
