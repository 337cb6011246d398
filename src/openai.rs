use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cancel::run_cancellable;
use crate::error::{ClientError, ClientResult};
use crate::github::{log_failure, validate_response};

pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

const PROBE_PROMPT: &str = "Say this is a test!";
const USER_AGENT: &str = "commit-digest";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Minimal chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(model: &str) -> ClientResult<Self> {
        Self::with_base_url(OPENAI_API_BASE_URL, model)
    }

    pub fn with_base_url(base_url: &str, model: &str) -> ClientResult<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that `api_key` can run a chat completion.
    ///
    /// Returns `Ok(true)` on success. Any failure (bad key, rate limit, network) is returned
    /// as an error rather than `Ok(false)`; callers treat an error as "key not usable".
    pub async fn test_api_key(
        &self,
        api_key: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<bool> {
        self.chat(api_key, &[ChatMessage { role: "user", content: PROBE_PROMPT }], cancel)
            .await
            .inspect_err(|e| log_failure(e, "Error testing api key for OpenAI"))?;
        Ok(true)
    }

    /// Run one chat completion with a system and a user prompt and return the reply text.
    pub async fn complete(
        &self,
        api_key: Option<&str>,
        system_prompt: &str,
        user_prompt: &str,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<String> {
        let messages = [
            ChatMessage { role: "system", content: system_prompt },
            ChatMessage { role: "user", content: user_prompt },
        ];
        let reply = self
            .chat(api_key, &messages, cancel)
            .await
            .inspect_err(|e| log_failure(e, "OpenAI completion failed"))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }

    async fn chat(
        &self,
        api_key: Option<&str>,
        messages: &[ChatMessage<'_>],
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<ChatResponse> {
        let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
            return Err(ClientError::validation("OpenAI API key is required"));
        };

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage { role: m.role, content: m.content })
                .collect(),
        };
        tracing::debug!("POST {} (model {})", url, self.model);

        let request = async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?;
            let response = validate_response(response, &url)?;
            let bytes = response.bytes().await?;
            serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
                url: url.clone(),
                source,
            })
        };

        run_cancellable(cancel, request).await
    }
}
