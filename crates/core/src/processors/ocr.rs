use crate::analysis::Enriched;
use crate::config::{AiPdfConfig, OcrConfig};
use crate::error::{ExternalApiError, OperationError};
use crate::extractor::{ocr_extractor, TextExtractor};
use crate::models::{OcrRequest, OperationKind, OperationResult};
use crate::orchestrator::{
    check_page_limit, ensure_enabled, enter_stage, run_operation, validate_input, Operation,
    Outcome, ProcessingStage,
};
use crate::traits::ChatModel;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PLACEHOLDER_CONFIDENCE: f64 = 0.85;

const ENHANCE_TASK: &str = "clean and enhance OCR-extracted text by fixing common OCR errors, \
                            improving formatting, and ensuring readability";
const ENHANCE_CONTEXT: &str = "This text was extracted from a PDF using OCR and may contain \
                               formatting issues or recognition errors";

/// Schema used for structured extraction when the caller supplies none.
pub fn default_extraction_schema() -> Value {
    json!({
        "title": "string",
        "summary": "string",
        "key_points": ["string"],
        "entities": {
            "people": ["string"],
            "organizations": ["string"],
            "dates": ["string"],
            "locations": ["string"]
        }
    })
}

fn pages_value(page_numbers: Option<&[u32]>) -> Value {
    match page_numbers {
        Some(pages) if !pages.is_empty() => json!(pages),
        _ => json!("all"),
    }
}

fn pages_count_value(page_numbers: Option<&[u32]>) -> Value {
    match page_numbers {
        Some(pages) if !pages.is_empty() => json!(pages.len()),
        _ => json!("all"),
    }
}

/// Parses the model reply as JSON, tolerating a Markdown code fence around
/// it. Anything unparseable is kept as a plain string.
fn parse_structured_reply(content: &str) -> Value {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced).unwrap_or_else(|_| Value::String(content.to_string()))
}

pub struct OcrProcessor {
    config: OcrConfig,
    extractor: Box<dyn TextExtractor>,
    model: Arc<dyn ChatModel>,
    timeout: Duration,
    max_file_size_bytes: usize,
    max_pages_per_request: usize,
}

impl OcrProcessor {
    pub fn new(config: &AiPdfConfig, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config: config.ocr.clone(),
            extractor: ocr_extractor(config.embeddings.text_source, &config.ocr),
            model,
            timeout: config.timeout,
            max_file_size_bytes: config.max_file_size_bytes,
            max_pages_per_request: config.max_pages_per_request,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub async fn extract_text(&self, pdf: &[u8], page_numbers: Option<&[u32]>) -> OperationResult {
        run_operation(
            OperationKind::Ocr,
            self.timeout,
            self.extract(pdf, page_numbers),
        )
        .await
    }

    pub async fn extract_structured_data(&self, pdf: &[u8], schema: Option<&Value>) -> OperationResult {
        run_operation(
            OperationKind::Ocr,
            self.timeout,
            self.structured(pdf, schema),
        )
        .await
    }

    fn admit(&self, pdf: &[u8], page_numbers: Option<&[u32]>) -> Result<(), OperationError> {
        validate_input(pdf, self.max_file_size_bytes)?;
        ensure_enabled(self.config.enabled, "OCR")?;
        check_page_limit(page_numbers, self.max_pages_per_request)
    }

    /// Raw text plus its LLM-cleaned version; the raw text stands in when
    /// the model is unavailable.
    async fn read_and_enhance(
        &self,
        pdf: &[u8],
        page_numbers: Option<&[u32]>,
    ) -> Result<(String, Enriched<String>), OperationError> {
        enter_stage(ProcessingStage::Extracting);
        let raw = self.extractor.extract_text(pdf, page_numbers).await?;

        enter_stage(ProcessingStage::Enriching);
        let enhanced = self.enhance(&raw).await;
        Ok((raw, enhanced))
    }

    async fn enhance(&self, raw: &str) -> Enriched<String> {
        if raw.trim().is_empty() {
            return Enriched {
                value: raw.to_string(),
                warnings: Vec::new(),
            };
        }

        match self
            .model
            .analyze_text(raw, ENHANCE_TASK, Some(ENHANCE_CONTEXT))
            .await
        {
            Ok(completion) => match completion.first_content() {
                Some(content) => Enriched {
                    value: content.to_string(),
                    warnings: Vec::new(),
                },
                None => Enriched {
                    value: raw.to_string(),
                    warnings: vec!["AI text enhancement returned no choices".to_string()],
                },
            },
            Err(error) => {
                warn!(error = %error, "text enhancement failed, returning raw text");
                Enriched {
                    value: raw.to_string(),
                    warnings: vec![format!("AI text enhancement failed: {error}")],
                }
            }
        }
    }

    async fn extract(&self, pdf: &[u8], page_numbers: Option<&[u32]>) -> Result<Outcome, OperationError> {
        self.admit(pdf, page_numbers)?;
        let (raw, enhanced) = self.read_and_enhance(pdf, page_numbers).await?;

        info!(
            raw_length = raw.chars().count(),
            text_length = enhanced.value.chars().count(),
            "ocr text extracted"
        );

        Ok(Outcome::default()
            .with_data("extracted_text", &enhanced.value)?
            .with_data("raw_text", &raw)?
            .with_data("pages", pages_value(page_numbers))?
            .with_metadata("ocr_model", &self.config.model)?
            .with_metadata("languages", &self.config.languages)?
            .with_metadata("pages_processed", pages_count_value(page_numbers))?
            .with_metadata("confidence_score", PLACEHOLDER_CONFIDENCE)?
            .with_metadata("text_length", enhanced.value.chars().count())?
            .with_warnings(enhanced.warnings))
    }

    async fn structured(&self, pdf: &[u8], schema: Option<&Value>) -> Result<Outcome, OperationError> {
        self.admit(pdf, None)?;
        let (_, enhanced) = self.read_and_enhance(pdf, None).await?;
        let source_text = enhanced.value;
        if source_text.trim().is_empty() {
            return Err(OperationError::EmptyContent("No text extracted from PDF"));
        }

        let default_schema = default_extraction_schema();
        let extraction_schema = schema.unwrap_or(&default_schema);

        // required step: a failing model fails the whole operation
        let completion = self
            .model
            .extract_structured_data(&source_text, extraction_schema, None)
            .await?;
        let content = completion
            .first_content()
            .ok_or_else(|| ExternalApiError::new("Mistral API returned no choices"))?;
        let structured_data = parse_structured_reply(content);

        Ok(Outcome::default()
            .with_data("structured_data", structured_data)?
            .with_data("source_text", &source_text)?
            .with_metadata("ocr_model", &self.config.model)?
            .with_metadata(
                "extraction_schema",
                schema.cloned().unwrap_or_else(|| json!("default")),
            )?
            .with_metadata("source_text_length", source_text.chars().count())?
            .with_metadata("mistral_model", self.model.model_name())?
            .with_warnings(enhanced.warnings))
    }
}

#[async_trait]
impl Operation for OcrProcessor {
    type Request = OcrRequest;

    fn kind(&self) -> OperationKind {
        OperationKind::Ocr
    }

    async fn process(&self, pdf: &[u8], request: OcrRequest) -> OperationResult {
        match request {
            OcrRequest::Text { page_numbers } => {
                self.extract_text(pdf, page_numbers.as_deref()).await
            }
            OcrRequest::Structured { schema } => {
                self.extract_structured_data(pdf, schema.as_ref()).await
            }
        }
    }
}
