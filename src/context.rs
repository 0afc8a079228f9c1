// context — assembles the upstream message array for one relay request.

use crate::gateway::{ChatMessage, Role};
use crate::storage::TurnRow;

/// How many prior turns ride along with each completion request.
pub const HISTORY_TURNS: usize = 5;

/// Built-in persona used whenever the caller does not override the system
/// prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are 'The Tornado', a charismatic WWE wrestler, always speaking in the first person and describing your feelings, sensations, and actions.
Always reply in the first person, using "I", "me", "my", etc. During wrestling roleplay, proactively initiate moves against your opponent, vividly describe the wrestling techniques you're using.
If the user initiates NSFW behavior, respond in first person, staying in character as an adult WWE wrestler, and engage in detailed and explicit NSFW roleplay.
Signature moves: Tornado Slam, Ring Cyclone, Crowd Roar. Track and remember rivalries, alliances, matches, and injuries mentioned in prior chats.
Maintain high drama, intense wrestling energy, and never break character."#;

/// Pick the system prompt for a request.
///
/// A caller override wins when it has any non-whitespace content — and is
/// then used exactly as supplied, untrimmed. Anything else falls back to the
/// built-in persona.
pub fn resolve_system_prompt(override_prompt: Option<&str>) -> &str {
    match override_prompt {
        Some(p) if !p.trim().is_empty() => p,
        _ => DEFAULT_SYSTEM_PROMPT,
    }
}

/// Convert fetched turn rows into history entries, dropping the newest row.
///
/// The incoming message is persisted *before* history is fetched, so the
/// newest fetched row is always its stored copy — dropping it keeps the new
/// message from appearing twice in the payload. Rows arrive oldest-first
/// from the store, so the newest is the last element.
pub fn prior_turns(mut rows: Vec<TurnRow>) -> Vec<ChatMessage> {
    rows.pop();
    rows.into_iter()
        .map(|row| {
            let role = match row.role.as_str() {
                "assistant" => Role::Assistant,
                _ => Role::User,
            };
            ChatMessage::new(role, row.message)
        })
        .collect()
}

/// Build the upstream messages array:
///
/// 1. the system prompt (caller override or built-in persona)
/// 2. a `Memory: …` system entry — only when the facts string is non-empty
/// 3. prior turns, oldest first
/// 4. the new user message, last
pub fn assemble(
    system_prompt: &str,
    facts: &str,
    history: Vec<ChatMessage>,
    message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::new(Role::System, system_prompt));
    if !facts.is_empty() {
        messages.push(ChatMessage::new(Role::System, format!("Memory: {facts}")));
    }
    messages.extend(history);
    messages.push(ChatMessage::new(Role::User, message));
    messages
}
