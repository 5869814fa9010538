use crate::config::InferenceSettings;
use crate::error::{CoreError, CoreResult};
use crate::llm::interface::{
    completion_text, inference_status_error, ChatCompletionRequest, CompletionClient,
    SamplingConfig,
};
use crate::transport::{http_agent, read_reply};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible `chat/completions` client (Groq by default).
pub struct ChatCompletionsClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: SecretString,
}

impl ChatCompletionsClient {
    pub fn new(api_base: &str, api_key: SecretString, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
        }
    }

    pub fn from_settings(settings: &InferenceSettings, timeout: Duration) -> Self {
        Self::new(
            &settings.api_base,
            SecretString::new(settings.api_key.expose_secret().into()),
            timeout,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CompletionClient for ChatCompletionsClient {
    fn complete(&self, prompt: &str, sampling: &SamplingConfig) -> CoreResult<String> {
        let request = ChatCompletionRequest::single_turn(prompt, sampling);
        let payload = serde_json::to_string(&request)?;
        debug!(
            endpoint = %self.endpoint,
            model = %sampling.model,
            prompt_chars = prompt.len(),
            "sending completion request"
        );

        let reply = read_reply(
            self.agent
                .post(&self.endpoint)
                .header(
                    "Authorization",
                    &format!("Bearer {}", self.api_key.expose_secret()),
                )
                .header("Content-Type", "application/json")
                .send(payload),
        )
        .map_err(|e| CoreError::Inference(format!("request to {} failed: {}", self.endpoint, e)))?;

        if !reply.is_success() {
            return Err(inference_status_error(reply.status, &reply.body));
        }
        let text = completion_text(&reply.body)?;
        debug!(response_chars = text.len(), "completion received");
        Ok(text)
    }
}
