// memory — keyword-trigger updates to the per-user character-facts string.

/// Event keywords scanned in every user message (case-insensitive substring
/// match). `injur` deliberately catches "injury", "injured", "injuries".
const EVENT_TRIGGERS: &[&str] = &[
    "slam", "cyclone", "roar", "injur", "pain", "nsfw", "sex", "fuck", "kiss", "touch",
];

/// Apply the trigger rules to a user's existing facts string.
///
/// Returns the grown string when at least one trigger fired, `None` when the
/// message changes nothing — callers skip the write entirely on `None`. Both
/// rules may fire on one message; their segments append in rule order, each
/// carrying the message with its original casing. The facts string only ever
/// grows; there is no pruning.
pub fn updated_facts(existing: &str, message: &str) -> Option<String> {
    let lowered = message.to_lowercase();
    let mut updated = existing.to_string();

    if lowered.contains("match") {
        updated.push_str(&format!(" | New match discussed: {message}"));
    }
    if EVENT_TRIGGERS.iter().any(|t| lowered.contains(t)) {
        updated.push_str(&format!(" | Notable event: {message}"));
    }

    if updated != existing {
        Some(updated)
    } else {
        None
    }
}
