use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Sampling parameters sent with every completion. Kept low-randomness so
/// the model sticks to the requested section layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

pub trait CompletionClient {
    fn complete(&self, prompt: &str, sampling: &SamplingConfig) -> CoreResult<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatCompletionRequest {
    /// Single-turn request: the whole prompt travels as one user message.
    pub fn single_turn(prompt: &str, sampling: &SamplingConfig) -> Self {
        Self {
            model: sampling.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Extract `choices[0].message.content` from a chat-completions body.
pub fn completion_text(body: &str) -> CoreResult<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| CoreError::Inference(format!("malformed completion body: {}", e)))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(CoreError::EmptyResponse(
            "model returned no completion text".to_string(),
        ));
    }
    Ok(content)
}

pub fn classify_inference_status(status: u16) -> &'static str {
    match status {
        400 => "request rejected",
        401 | 403 => "authentication rejected",
        404 => "model or endpoint not found",
        413 => "prompt too large",
        429 => "quota or rate limit exceeded",
        500..=599 => "inference service unavailable",
        _ => "unexpected response",
    }
}

/// Build the error for a non-2xx completion reply, surfacing the provider's
/// own message when the body carries one.
pub fn inference_status_error(status: u16, body: &str) -> CoreError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|m| !m.trim().is_empty());
    let class = classify_inference_status(status);
    match detail {
        Some(message) => CoreError::Inference(format!("{} (HTTP {}): {}", class, status, message)),
        None => CoreError::Inference(format!("{} (HTTP {})", class, status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_text_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"SUMMARY:\nDisk full"}}]}"#;
        assert_eq!(completion_text(body).unwrap(), "SUMMARY:\nDisk full");
    }

    #[test]
    fn test_blank_completion_is_empty_response() {
        let body = r#"{"choices":[{"message":{"content":"   \n"}}]}"#;
        assert!(matches!(
            completion_text(body),
            Err(CoreError::EmptyResponse(_))
        ));
        assert!(matches!(
            completion_text(r#"{"choices":[]}"#),
            Err(CoreError::EmptyResponse(_))
        ));
    }

    #[test]
    fn test_malformed_body_is_inference_error() {
        assert!(matches!(
            completion_text("<html>bad gateway</html>"),
            Err(CoreError::Inference(_))
        ));
    }

    #[test]
    fn test_status_error_includes_provider_message() {
        let err = inference_status_error(429, r#"{"error":{"message":"Rate limit reached"}}"#);
        let msg = err.to_string();
        assert!(msg.contains("quota or rate limit exceeded"));
        assert!(msg.contains("HTTP 429"));
        assert!(msg.contains("Rate limit reached"));

        let err = inference_status_error(401, "not json");
        assert_eq!(
            err.to_string(),
            "inference error: authentication rejected (HTTP 401)"
        );
    }

    #[test]
    fn test_single_turn_request_shape() {
        let req = ChatCompletionRequest::single_turn("hello", &SamplingConfig::default());
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], DEFAULT_MODEL);
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "hello");
        assert_eq!(v["max_tokens"], 2048);
    }
}
