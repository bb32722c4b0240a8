use crate::error::OperationError;
use crate::models::{OperationKind, OperationResult};
use crate::pdf_ops::has_pdf_signature;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// A PDF analysis capability producing the uniform result envelope.
#[async_trait]
pub trait Operation: Send + Sync {
    type Request: Send + 'static;

    fn kind(&self) -> OperationKind;

    /// Never fails: every error is reported inside the envelope.
    async fn process(&self, pdf: &[u8], request: Self::Request) -> OperationResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Validating,
    Extracting,
    Chunking,
    Embedding,
    Ranking,
    Enriching,
    Done,
    Failed,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Validating => "validating",
            ProcessingStage::Extracting => "extracting",
            ProcessingStage::Chunking => "chunking",
            ProcessingStage::Embedding => "embedding",
            ProcessingStage::Ranking => "ranking",
            ProcessingStage::Enriching => "enriching",
            ProcessingStage::Done => "done",
            ProcessingStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub fn enter_stage(stage: ProcessingStage) {
    debug!(stage = %stage, "pipeline stage");
}

/// Payload of a successful operation before it is wrapped in an envelope.
#[derive(Debug, Default)]
pub struct Outcome {
    pub data: Map<String, Value>,
    pub metadata: Map<String, Value>,
    pub warnings: Vec<String>,
}

impl Outcome {
    pub fn with_data<T: Serialize>(mut self, key: &str, value: T) -> Result<Self, OperationError> {
        self.data.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn with_metadata<T: Serialize>(
        mut self,
        key: &str,
        value: T,
    ) -> Result<Self, OperationError> {
        self.metadata.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Rejects empty input, input without the `%PDF-` signature and input
/// larger than `max_bytes`.
pub fn validate_input(pdf: &[u8], max_bytes: usize) -> Result<(), OperationError> {
    enter_stage(ProcessingStage::Validating);
    if !has_pdf_signature(pdf) {
        return Err(OperationError::InvalidInput);
    }
    if pdf.len() > max_bytes {
        return Err(OperationError::InvalidRequest(format!(
            "PDF is {} bytes, the maximum is {max_bytes} bytes",
            pdf.len()
        )));
    }
    Ok(())
}

pub fn ensure_enabled(enabled: bool, feature: &'static str) -> Result<(), OperationError> {
    if enabled {
        Ok(())
    } else {
        Err(OperationError::FeatureDisabled(feature))
    }
}

pub fn check_page_limit(page_numbers: Option<&[u32]>, max_pages: usize) -> Result<(), OperationError> {
    match page_numbers {
        Some(pages) if pages.len() > max_pages => Err(OperationError::InvalidRequest(format!(
            "{} pages requested, the maximum per request is {max_pages}",
            pages.len()
        ))),
        _ => Ok(()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Unexpected error: {detail}")
}

/// Runs `work` under a whole-operation deadline and wraps whatever it
/// returns in an [`OperationResult`]. A panic inside `work` becomes a failed
/// envelope as well.
pub async fn run_operation<F>(kind: OperationKind, timeout: Duration, work: F) -> OperationResult
where
    F: Future<Output = Result<Outcome, OperationError>>,
{
    let request_id = Uuid::new_v4();
    let span = info_span!("operation", kind = %kind, request_id = %request_id);

    async move {
        let started = Instant::now();
        let guarded = AssertUnwindSafe(work).catch_unwind();
        let outcome = match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(OperationError::Unexpected(panic_message(payload))),
            Err(_) => Err(OperationError::Timeout {
                operation: kind.as_str().to_string(),
                seconds: timeout.as_secs(),
            }),
        };

        let mut result = match outcome {
            Ok(outcome) => {
                enter_stage(ProcessingStage::Done);
                OperationResult::succeeded(kind, outcome.data, outcome.metadata, outcome.warnings)
            }
            Err(error) => {
                enter_stage(ProcessingStage::Failed);
                warn!(error = %error, "operation failed");
                OperationResult::failed(kind, error.to_string())
            }
        };
        result
            .metadata
            .insert("request_id".to_string(), Value::String(request_id.to_string()));

        let result = result.with_processing_time(started.elapsed().as_secs_f64());
        info!(
            success = result.success,
            seconds = result.processing_time_seconds,
            warnings = result.warnings.len(),
            "operation finished"
        );
        result
    }
    .instrument(span)
    .await
}
