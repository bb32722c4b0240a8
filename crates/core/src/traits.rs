use crate::error::ExternalApiError;
use crate::mistral::{ChatCompletion, ChatMessage, ChatRequest};
use async_trait::async_trait;
use serde_json::Value;

/// Chat-completion style language model used to enrich placeholder output.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatCompletion, ExternalApiError>;

    async fn analyze_text(
        &self,
        text: &str,
        task: &str,
        context: Option<&str>,
    ) -> Result<ChatCompletion, ExternalApiError> {
        let mut system = format!(
            "You are an AI assistant specialized in document analysis. \
             Your task is to {task}. Provide structured, accurate analysis."
        );
        if let Some(context) = context {
            system.push_str(&format!("\n\nAdditional context: {context}"));
        }

        self.chat_completion(ChatRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(text),
        ]))
        .await
    }

    async fn extract_structured_data(
        &self,
        text: &str,
        schema: &Value,
        instructions: Option<&str>,
    ) -> Result<ChatCompletion, ExternalApiError> {
        let schema = serde_json::to_string_pretty(schema)
            .map_err(|error| ExternalApiError::new(format!("schema is not serializable: {error}")))?;
        let mut system = format!(
            "You are an expert at extracting structured data from text.\n\
             Extract information according to this JSON schema:\n\n{schema}\n\n\
             Return only valid JSON that matches the schema."
        );
        if let Some(instructions) = instructions {
            system.push_str(&format!("\n\nAdditional instructions: {instructions}"));
        }

        self.chat_completion(ChatRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("Extract structured data from this text:\n\n{text}")),
        ]))
        .await
    }

    async fn summarize_content(
        &self,
        text: &str,
        summary_type: &str,
        max_length: Option<usize>,
    ) -> Result<ChatCompletion, ExternalApiError> {
        let length = max_length
            .map(|words| format!(" in maximum {words} words"))
            .unwrap_or_default();

        self.chat_completion(ChatRequest::new(vec![
            ChatMessage::system(format!(
                "You are an expert at creating {summary_type} summaries.\n\
                 Create a {summary_type} summary{length}."
            )),
            ChatMessage::user(format!("Summarize this text:\n\n{text}")),
        ]))
        .await
    }

    async fn health_check(&self) -> bool {
        let request = ChatRequest::new(vec![ChatMessage::user("Hello")]).with_max_tokens(10);
        match self.chat_completion(request).await {
            Ok(_) => true,
            Err(error) => {
                tracing::error!(model = self.model_name(), error = %error, "llm health check failed");
                false
            }
        }
    }
}
