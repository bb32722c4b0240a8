use thiserror::Error;

/// Failure reported by the external LLM collaborator.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExternalApiError {
    pub message: String,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
}

impl ExternalApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            response_body: None,
        }
    }

    pub fn with_status(
        message: impl Into<String>,
        status_code: u16,
        response_body: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            status_code: Some(status_code),
            response_body: Some(response_body.into()),
        }
    }
}

impl From<reqwest::Error> for ExternalApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::new(format!("Mistral API call timed out: {error}"))
        } else if error.is_decode() {
            Self::new(format!("Invalid JSON response from Mistral API: {error}"))
        } else {
            Self::new(format!("Network error calling Mistral API: {error}"))
        }
    }
}

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("pdf parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    InvalidRange(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for PdfError {
    fn from(error: lopdf::Error) -> Self {
        PdfError::Parse(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Invalid PDF content provided")]
    InvalidInput,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} functionality is disabled")]
    FeatureDisabled(&'static str),

    #[error("{0}")]
    EmptyContent(&'static str),

    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("AI processing failed: {0}")]
    ExternalApi(#[from] ExternalApiError),

    #[error("Operation {operation} timed out after {seconds} seconds")]
    Timeout { operation: String, seconds: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error("{0}")]
    Unexpected(String),
}

impl From<serde_json::Error> for OperationError {
    fn from(error: serde_json::Error) -> Self {
        OperationError::Unexpected(format!("serialize error: {error}"))
    }
}

pub type Result<T, E = OperationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_envelope_wording() {
        assert_eq!(
            OperationError::InvalidInput.to_string(),
            "Invalid PDF content provided"
        );
        assert_eq!(
            OperationError::FeatureDisabled("Embeddings").to_string(),
            "Embeddings functionality is disabled"
        );
        assert_eq!(
            OperationError::Timeout {
                operation: "ocr".to_string(),
                seconds: 5
            }
            .to_string(),
            "Operation ocr timed out after 5 seconds"
        );
    }

    #[test]
    fn external_errors_keep_status_and_body() {
        let error = ExternalApiError::with_status("Mistral API error: bad key", 401, "{}");
        assert_eq!(error.status_code, Some(401));
        assert_eq!(error.response_body.as_deref(), Some("{}"));

        let wrapped = OperationError::from(error);
        assert_eq!(wrapped.to_string(), "AI processing failed: Mistral API error: bad key");
    }
}
