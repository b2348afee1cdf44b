use serde::Deserialize;

use crate::{
    error::{Error, Result},
    remix::{ChatBackend, ChatRequest},
};

pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV_VAR: &str = "OPENAI_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// [`ChatBackend`] for the OpenAI chat-completions HTTP API and compatible
/// servers.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Build from OPENAI_API_KEY (required) and OPENAI_BASE_URL.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!("{API_KEY_ENV_VAR} is not configured"))
            })?;
        let base_url = std::env::var(BASE_URL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(api_key, base_url))
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletion {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
    }
}

impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        tracing::debug!(model = %request.model, "chat completion request");
        let completion: ChatCompletion = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(completion.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remix::ChatMessage;

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let backend = OpenAiBackend::new("key", "http://localhost:8080/v1/");
        assert_eq!(
            backend.endpoint(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn request_body_matches_api_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            temperature: 0.0,
            max_tokens: Some(5),
        };
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 5);

        let without_limit = ChatRequest {
            max_tokens: None,
            ..request
        };
        let body = serde_json::to_value(&without_limit).unwrap();
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn completion_text_is_first_choice() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"OK"}}]}"#,
        )
        .unwrap();
        assert_eq!(completion.into_text(), "OK");

        let empty: ChatCompletion = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.into_text(), "");
    }
}
