// SPDX-License-Identifier: MIT
// gateway — upstream chat-completions client.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RelayConfig;

/// Token cap sent with every completion request.
pub const MAX_TOKENS: u32 = 250;
/// Sampling temperature sent with every completion request.
pub const TEMPERATURE: f32 = 0.8;

/// Outbound request timeout. Long generations can take tens of seconds;
/// a hung connection still gets cut off.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

// ─── Wire types ───────────────────────────────────────────────────────────────

/// Chat role in the completions wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the `messages` array sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    /// Absent/null for tool-call responses — treated as malformed here since
    /// the relay never requests tools.
    content: Option<String>,
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Upstream answered with a non-2xx status; the body text is preserved so
    /// callers can surface it.
    #[error("upstream returned {status}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream response had no completion content")]
    MalformedResponse,
}

impl GatewayError {
    /// The `details` payload surfaced to API callers: the upstream body parsed
    /// back to JSON when possible, otherwise the raw text / error message.
    pub fn details(&self) -> serde_json::Value {
        match self {
            GatewayError::Status { body, .. } => serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::Value::String(body.clone())),
            GatewayError::Transport(e) => serde_json::Value::String(e.to_string()),
            GatewayError::MalformedResponse => serde_json::Value::String(self.to_string()),
        }
    }
}

// ─── CompletionGateway ────────────────────────────────────────────────────────

/// Client for the upstream chat-completions API. Built once at startup; the
/// underlying reqwest client reuses its connection pool across requests.
pub struct CompletionGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl CompletionGateway {
    pub fn new(config: &RelayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/v1/chat/completions", config.api_base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Send the assembled message array upstream and return the trimmed reply.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        debug!(model = %self.model, messages = messages.len(), "sending completion request");

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages,
                max_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, "upstream completion call failed");
            return Err(GatewayError::Status { status, body });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(GatewayError::MalformedResponse)?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let messages = vec![
            ChatMessage::new(Role::System, "persona"),
            ChatMessage::new(Role::User, "hello"),
        ];
        let body = serde_json::to_value(ChatCompletionRequest {
            model: "mistral-large-latest",
            messages: &messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        })
        .unwrap();

        assert_eq!(body["model"], "mistral-large-latest");
        assert_eq!(body["max_tokens"], 250);
        // f32 widening may not be bit-exact in Value form
        assert!((body["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[test]
    fn response_content_extraction() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Bring it on!  "}}]}"#,
        )
        .unwrap();
        let content = parsed.choices[0].message.content.as_deref().unwrap();
        assert_eq!(content.trim(), "Bring it on!");
    }

    #[test]
    fn null_content_reads_as_missing() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        )
        .unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn status_details_parses_json_body() {
        let err = GatewayError::Status {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            body: r#"{"message":"rate limited"}"#.to_string(),
        };
        assert_eq!(err.details()["message"], "rate limited");
    }

    #[test]
    fn status_details_falls_back_to_raw_text() {
        let err = GatewayError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "upstream exploded".to_string(),
        };
        assert_eq!(
            err.details(),
            serde_json::Value::String("upstream exploded".to_string())
        );
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(Role::System.as_str(), "system");
    }
}
