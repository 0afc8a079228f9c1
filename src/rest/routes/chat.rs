// rest/routes/chat.rs — POST /wrestling_bot, the relay pipeline.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::context::{self, HISTORY_TURNS};
use crate::gateway::Role;
use crate::memory;
use crate::AppContext;

type ApiError = (StatusCode, Json<Value>);

#[derive(Deserialize)]
pub struct ChatRequest {
    /// Required — but deserialized as optional so the missing-field error is
    /// ours, not a framework rejection.
    pub user_id: Option<String>,
    /// Required, same treatment.
    pub message: Option<String>,
    /// Optional system-prompt override.
    pub system_p: Option<String>,
}

/// Relay one user message through the persona bot.
///
/// Pipeline order matters: the user turn is persisted *before* history is
/// fetched, the assistant turn and memory update only happen after a
/// successful upstream call. An upstream failure therefore leaves the user
/// turn in the log with no paired reply.
pub async fn wrestling_bot(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    // Empty strings count as missing.
    let (user_id, message) = match (non_empty(body.user_id), non_empty(body.message)) {
        (Some(u), Some(m)) => (u, m),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing user_id or message." })),
            ))
        }
    };

    debug!(user_id = %user_id, "relay request received");

    ctx.storage
        .append_turn(&user_id, &message, Role::User.as_str())
        .await
        .map_err(storage_error)?;

    // One extra row so the just-persisted message can be dropped from history.
    let rows = ctx
        .storage
        .recent_turns(&user_id, HISTORY_TURNS + 1)
        .await
        .map_err(storage_error)?;
    let history = context::prior_turns(rows);

    let facts = ctx
        .storage
        .get_facts(&user_id)
        .await
        .map_err(storage_error)?;

    let system_prompt = context::resolve_system_prompt(body.system_p.as_deref());
    let messages = context::assemble(system_prompt, &facts, history, &message);

    let reply = match ctx.gateway.complete(&messages).await {
        Ok(reply) => reply,
        Err(e) => {
            // The user turn stays persisted; no assistant turn, no memory update.
            warn!(user_id = %user_id, error = %e, "completion failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Mistral API error", "details": e.details() })),
            ));
        }
    };

    ctx.storage
        .append_turn(&user_id, &reply, Role::Assistant.as_str())
        .await
        .map_err(storage_error)?;

    // Read-modify-write against the facts value fetched during assembly, no
    // transaction: two concurrent requests for one user can lose an append.
    // Accepted — see DESIGN.md.
    if let Some(updated) = memory::updated_facts(&facts, &message) {
        ctx.storage
            .upsert_facts(&user_id, &updated)
            .await
            .map_err(storage_error)?;
    }

    Ok(Json(json!({ "response": reply })))
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

fn storage_error(e: anyhow::Error) -> ApiError {
    error!(error = %e, "storage operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}
