use crate::config::MistralConfig;
use crate::error::ExternalApiError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("pdf-ai-ops/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat request; unset fields fall back to the client's configuration.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatCompletion {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
    }
}

pub struct MistralClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl MistralClient {
    pub fn new(config: &MistralConfig, timeout: Duration) -> Result<Self, ExternalApiError> {
        let base = Url::parse(config.base_url.trim_end_matches('/')).map_err(|error| {
            ExternalApiError::new(format!("invalid Mistral base url {}: {error}", config.base_url))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        if api_key.is_none() {
            tracing::warn!("Mistral API key not configured, AI enrichment will fall back");
        }

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base.as_str().trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatModel for MistralClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatCompletion, ExternalApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ExternalApiError::new("Mistral API key not configured"))?;

        let payload = ChatPayload {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_completion(status.as_u16(), &body)
    }
}

fn parse_completion(status: u16, body: &str) -> Result<ChatCompletion, ExternalApiError> {
    if status >= 400 {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .or_else(|| value.pointer("/message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Unknown error".to_string());

        return Err(ExternalApiError::with_status(
            format!("Mistral API error: {message}"),
            status,
            body,
        ));
    }

    serde_json::from_str(body).map_err(|error| ExternalApiError {
        message: format!("Invalid JSON response from Mistral API: {error}"),
        status_code: Some(status),
        response_body: Some(body.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_content_is_read_from_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Key themes: pumps"}}]}"#;
        let completion = parse_completion(200, body).expect("valid completion");
        assert_eq!(completion.first_content(), Some("Key themes: pumps"));
    }

    #[test]
    fn error_status_keeps_message_status_and_body() {
        let body = r#"{"error":{"message":"Unauthorized"}}"#;
        let error = parse_completion(401, body).expect_err("401 should fail");
        assert_eq!(error.message, "Mistral API error: Unauthorized");
        assert_eq!(error.status_code, Some(401));
        assert_eq!(error.response_body.as_deref(), Some(body));

        let error = parse_completion(502, "<html>bad gateway</html>").expect_err("502 should fail");
        assert_eq!(error.message, "Mistral API error: Unknown error");
    }

    #[test]
    fn malformed_json_is_an_external_error() {
        let error = parse_completion(200, "not json").expect_err("body is not json");
        assert!(error.message.starts_with("Invalid JSON response from Mistral API"));
        assert_eq!(error.status_code, Some(200));
    }

    #[test]
    fn payload_uses_configured_defaults() {
        let messages = vec![ChatMessage::user("Hello")];
        let payload = ChatPayload {
            model: "mistral-medium",
            messages: &messages,
            max_tokens: 1000,
            temperature: 0.7,
        };
        let value = serde_json::to_value(&payload).expect("serializable");
        assert_eq!(value["model"], "mistral-medium");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 1000);
    }

    #[test]
    fn endpoint_is_built_from_base_url() {
        let config = MistralConfig {
            base_url: "https://api.mistral.ai/v1/".to_string(),
            ..MistralConfig::default()
        };
        let client = MistralClient::new(&config, Duration::from_secs(5)).expect("client builds");
        assert_eq!(client.endpoint(), "https://api.mistral.ai/v1/chat/completions");

        let config = MistralConfig {
            base_url: "not a url".to_string(),
            ..MistralConfig::default()
        };
        assert!(MistralClient::new(&config, Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let client = MistralClient::new(&MistralConfig::default(), Duration::from_secs(5))
            .expect("client builds");
        let error = client
            .analyze_text("text", "analyze", None)
            .await
            .expect_err("no key configured");
        assert_eq!(error.message, "Mistral API key not configured");
        assert!(!client.health_check().await);
    }
}
