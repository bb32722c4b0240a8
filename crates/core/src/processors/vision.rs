//! Layout analysis and object detection.
//!
//! No vision model is wired in: both operations start from fixed detections
//! and use the chat model only to describe them.

use crate::config::{AiPdfConfig, VisionConfig};
use crate::error::OperationError;
use crate::models::{OperationKind, OperationResult, VisionRequest};
use crate::orchestrator::{
    check_page_limit, ensure_enabled, enter_stage, run_operation, validate_input, Operation,
    Outcome, ProcessingStage,
};
use crate::traits::ChatModel;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_OBJECT_TYPES: [&str; 6] =
    ["table", "chart", "image", "text_block", "header", "footer"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    #[serde(rename = "type")]
    pub kind: String,
    pub bbox: [u32; 4],
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Margins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutStructure {
    pub document_type: String,
    pub page_orientation: String,
    pub margins: Margins,
    pub columns: u32,
    pub text_regions: Vec<TextRegion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub resolution: String,
    pub clarity: String,
    pub skew_angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutData {
    pub pages: Vec<u32>,
    pub layout_structure: LayoutStructure,
    pub reading_order: Vec<u32>,
    pub quality_metrics: QualityMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureSummary {
    pub document_type: String,
    pub columns: u32,
    pub text_regions: usize,
    pub orientation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutAnalysis {
    pub interpretation: String,
    pub structure_summary: StructureSummary,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub bbox: [u32; 4],
    pub confidence: f64,
    pub page: u32,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub total_objects: usize,
    pub by_type: BTreeMap<String, usize>,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detections {
    pub objects: Vec<DetectedObject>,
    pub summary: DetectionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectAnalysis {
    pub analysis: String,
    pub object_summary: DetectionSummary,
    pub insights: Vec<String>,
}

fn region(kind: &str, bbox: [u32; 4], confidence: f64) -> TextRegion {
    TextRegion {
        kind: kind.to_string(),
        bbox,
        confidence,
    }
}

pub fn placeholder_layout(page_numbers: Option<&[u32]>) -> LayoutData {
    let pages = match page_numbers {
        Some(pages) if !pages.is_empty() => pages.to_vec(),
        _ => vec![1, 2, 3],
    };

    LayoutData {
        pages,
        layout_structure: LayoutStructure {
            document_type: "multi_column".to_string(),
            page_orientation: "portrait".to_string(),
            margins: Margins {
                top: 72,
                bottom: 72,
                left: 54,
                right: 54,
            },
            columns: 2,
            text_regions: vec![
                region("header", [54, 720, 540, 750], 0.95),
                region("body_text", [54, 400, 250, 700], 0.88),
                region("body_text", [270, 400, 540, 700], 0.88),
                region("footer", [54, 50, 540, 80], 0.92),
            ],
        },
        reading_order: vec![1, 2, 3, 4],
        quality_metrics: QualityMetrics {
            resolution: "good".to_string(),
            clarity: "high".to_string(),
            skew_angle: 0.2,
        },
    }
}

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn placeholder_detections() -> Vec<DetectedObject> {
    vec![
        DetectedObject {
            kind: "table".to_string(),
            bbox: [100, 300, 450, 500],
            confidence: 0.92,
            page: 1,
            properties: properties(json!({"rows": 5, "columns": 3, "has_header": true})),
        },
        DetectedObject {
            kind: "chart".to_string(),
            bbox: [200, 150, 400, 280],
            confidence: 0.87,
            page: 2,
            properties: properties(
                json!({"chart_type": "bar_chart", "title": "detected", "axes": ["x", "y"]}),
            ),
        },
        DetectedObject {
            kind: "image".to_string(),
            bbox: [50, 600, 250, 750],
            confidence: 0.95,
            page: 1,
            properties: properties(json!({"format": "embedded", "size": "medium"})),
        },
    ]
}

/// Keeps detections of the requested types at or above `threshold` and
/// summarises what survived.
pub fn filter_detections(
    objects: Vec<DetectedObject>,
    object_types: &[String],
    threshold: f64,
) -> Detections {
    let objects = objects
        .into_iter()
        .filter(|object| object_types.iter().any(|kind| *kind == object.kind))
        .filter(|object| object.confidence >= threshold)
        .collect::<Vec<_>>();

    let mut by_type = BTreeMap::new();
    for object in &objects {
        *by_type.entry(object.kind.clone()).or_insert(0) += 1;
    }
    let avg_confidence = if objects.is_empty() {
        0.0
    } else {
        let total = objects.iter().map(|object| object.confidence).sum::<f64>();
        (total / objects.len() as f64 * 100.0).round() / 100.0
    };

    Detections {
        summary: DetectionSummary {
            total_objects: objects.len(),
            by_type,
            avg_confidence,
        },
        objects,
    }
}

pub fn structure_summary(layout: &LayoutData) -> StructureSummary {
    let structure = &layout.layout_structure;
    StructureSummary {
        document_type: structure.document_type.clone(),
        columns: structure.columns,
        text_regions: structure.text_regions.len(),
        orientation: structure.page_orientation.clone(),
    }
}

pub fn layout_recommendations(layout: &LayoutData) -> Vec<String> {
    let mut recommendations = Vec::new();
    if layout.quality_metrics.skew_angle > 1.0 {
        recommendations.push(
            "Document appears to be skewed - consider deskewing for better OCR results".to_string(),
        );
    }
    if layout.layout_structure.columns > 1 {
        recommendations.push(
            "Multi-column layout detected - text extraction order may need adjustment".to_string(),
        );
    }
    if layout.quality_metrics.resolution == "low" {
        recommendations.push(
            "Low resolution detected - consider using higher resolution scans for better results"
                .to_string(),
        );
    }
    recommendations
}

pub fn object_insights(summary: &DetectionSummary) -> Vec<String> {
    let mut insights = Vec::new();
    if let Some(tables) = summary.by_type.get("table").filter(|count| **count > 0) {
        insights.push(format!(
            "Document contains {tables} table(s) - structured data extraction may be valuable"
        ));
    }
    if let Some(charts) = summary.by_type.get("chart").filter(|count| **count > 0) {
        insights.push(format!(
            "Document contains {charts} chart(s) - data visualization analysis available"
        ));
    }
    if summary.total_objects > 0 && summary.avg_confidence < 0.7 {
        insights.push(
            "Low confidence in object detection - document quality may need improvement"
                .to_string(),
        );
    }
    insights
}

/// Why the model produced no description.
#[derive(Debug, Error)]
enum DescribeError {
    #[error("unavailable")]
    Unavailable,
    #[error("failed")]
    Failed(String),
}

impl DescribeError {
    fn warning(&self, prefix: &str) -> Option<String> {
        match self {
            DescribeError::Unavailable => None,
            DescribeError::Failed(message) => Some(format!("{prefix}: {message}")),
        }
    }
}

pub struct VisionProcessor {
    config: VisionConfig,
    model: Arc<dyn ChatModel>,
    delay: Duration,
    timeout: Duration,
    max_file_size_bytes: usize,
    max_pages_per_request: usize,
}

impl VisionProcessor {
    pub fn new(config: &AiPdfConfig, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config: config.vision.clone(),
            model,
            delay: Duration::ZERO,
            timeout: config.timeout,
            max_file_size_bytes: config.max_file_size_bytes,
            max_pages_per_request: config.max_pages_per_request,
        }
    }

    /// Simulated detection latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn analyze_layout(&self, pdf: &[u8], page_numbers: Option<&[u32]>) -> OperationResult {
        run_operation(
            OperationKind::Vision,
            self.timeout,
            self.layout(pdf, page_numbers),
        )
        .await
    }

    pub async fn detect_objects(&self, pdf: &[u8], object_types: Option<&[String]>) -> OperationResult {
        run_operation(
            OperationKind::Vision,
            self.timeout,
            self.objects(pdf, object_types),
        )
        .await
    }

    fn admit(&self, pdf: &[u8], page_numbers: Option<&[u32]>) -> Result<(), OperationError> {
        validate_input(pdf, self.max_file_size_bytes)?;
        ensure_enabled(self.config.enabled, "Vision analysis")?;
        check_page_limit(page_numbers, self.max_pages_per_request)
    }

    async fn simulate_detection(&self) {
        enter_stage(ProcessingStage::Extracting);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    async fn describe(&self, payload: &str, task: &str, context: &str) -> Result<String, DescribeError> {
        enter_stage(ProcessingStage::Enriching);
        match self.model.analyze_text(payload, task, Some(context)).await {
            Ok(completion) => completion
                .first_content()
                .map(str::to_string)
                .ok_or(DescribeError::Unavailable),
            Err(error) => {
                warn!(error = %error, "ai vision description failed");
                Err(DescribeError::Failed(error.to_string()))
            }
        }
    }

    async fn layout(&self, pdf: &[u8], page_numbers: Option<&[u32]>) -> Result<Outcome, OperationError> {
        self.admit(pdf, page_numbers)?;
        self.simulate_detection().await;
        let layout = placeholder_layout(page_numbers);

        let mut warnings = Vec::new();
        let interpretation = match self
            .describe(
                &serde_json::to_string(&layout)?,
                "interpret and describe the document layout structure in a user-friendly way",
                "This is layout analysis data from a PDF document including bounding boxes, \
                 text regions, and structural information",
            )
            .await
        {
            Ok(text) => text,
            Err(error) => {
                warnings.extend(error.warning("AI layout interpretation failed"));
                format!("Layout analysis completed but AI interpretation {error}")
            }
        };

        let analysis = LayoutAnalysis {
            interpretation,
            structure_summary: structure_summary(&layout),
            recommendations: layout_recommendations(&layout),
        };
        info!(pages = layout.pages.len(), "layout analysed");

        let pages = match page_numbers {
            Some(pages) if !pages.is_empty() => json!(pages.len()),
            _ => json!("all"),
        };
        Ok(Outcome::default()
            .with_data("layout_analysis", &analysis)?
            .with_data("pages", &layout.pages)?
            .with_data("raw_layout_data", &layout)?
            .with_metadata("vision_model", &self.config.model)?
            .with_metadata("confidence_threshold", self.config.confidence_threshold)?
            .with_metadata("pages_analyzed", pages)?
            .with_metadata("analysis_type", "layout")?
            .with_warnings(warnings))
    }

    async fn objects(&self, pdf: &[u8], object_types: Option<&[String]>) -> Result<Outcome, OperationError> {
        self.admit(pdf, None)?;
        let object_types = match object_types {
            Some(types) if !types.is_empty() => types.to_vec(),
            _ => DEFAULT_OBJECT_TYPES.iter().map(|kind| kind.to_string()).collect(),
        };

        self.simulate_detection().await;
        let detections = filter_detections(
            placeholder_detections(),
            &object_types,
            self.config.confidence_threshold,
        );

        let mut warnings = Vec::new();
        let description = match self
            .describe(
                &serde_json::to_string(&detections)?,
                "analyze and describe the detected objects in the document",
                "This is object detection data from a PDF document including tables, charts, \
                 images, and their properties",
            )
            .await
        {
            Ok(text) => text,
            Err(error) => {
                warnings.extend(error.warning("AI object analysis failed"));
                format!("Object detection completed but AI analysis {error}")
            }
        };

        let analysis = ObjectAnalysis {
            analysis: description,
            insights: object_insights(&detections.summary),
            object_summary: detections.summary.clone(),
        };
        info!(objects = detections.objects.len(), "objects detected");

        Ok(Outcome::default()
            .with_data("object_analysis", &analysis)?
            .with_data("detected_objects", &detections)?
            .with_data("object_types", &object_types)?
            .with_metadata("vision_model", &self.config.model)?
            .with_metadata("confidence_threshold", self.config.confidence_threshold)?
            .with_metadata("object_types_searched", &object_types)?
            .with_metadata("objects_detected", detections.objects.len())?
            .with_metadata("analysis_type", "object_detection")?
            .with_warnings(warnings))
    }
}

#[async_trait]
impl Operation for VisionProcessor {
    type Request = VisionRequest;

    fn kind(&self) -> OperationKind {
        OperationKind::Vision
    }

    async fn process(&self, pdf: &[u8], request: VisionRequest) -> OperationResult {
        match request {
            VisionRequest::Layout { page_numbers } => {
                self.analyze_layout(pdf, page_numbers.as_deref()).await
            }
            VisionRequest::Objects { object_types } => {
                self.detect_objects(pdf, object_types.as_deref()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fakes::FakeChatModel;

    const PDF: &[u8] = b"%PDF-1.5\n";

    fn types(kinds: &[&str]) -> Vec<String> {
        kinds.iter().map(|kind| kind.to_string()).collect()
    }

    #[test]
    fn detections_are_filtered_by_type_and_confidence() {
        let all = filter_detections(placeholder_detections(), &types(&DEFAULT_OBJECT_TYPES), 0.5);
        assert_eq!(all.summary.total_objects, 3);
        assert_eq!(all.summary.avg_confidence, 0.91);

        let tables = filter_detections(placeholder_detections(), &types(&["table"]), 0.5);
        assert_eq!(tables.summary.total_objects, 1);
        assert_eq!(tables.summary.by_type.get("table"), Some(&1));
        assert!(tables.summary.by_type.get("chart").is_none());

        let confident = filter_detections(placeholder_detections(), &types(&DEFAULT_OBJECT_TYPES), 0.9);
        assert_eq!(confident.summary.total_objects, 2);
        assert!(confident.objects.iter().all(|object| object.kind != "chart"));
    }

    #[test]
    fn insights_follow_the_summary() {
        let detections = filter_detections(placeholder_detections(), &types(&["table", "chart"]), 0.0);
        let insights = object_insights(&detections.summary);
        assert_eq!(insights.len(), 2);
        assert!(insights[0].starts_with("Document contains 1 table(s)"));

        let none = filter_detections(placeholder_detections(), &types(&["footer"]), 0.0);
        assert!(object_insights(&none.summary).is_empty());
    }

    #[test]
    fn layout_recommendations_flag_columns_and_skew() {
        let mut layout = placeholder_layout(None);
        assert_eq!(layout.pages, vec![1, 2, 3]);
        assert_eq!(layout_recommendations(&layout).len(), 1);

        layout.quality_metrics.skew_angle = 2.5;
        layout.quality_metrics.resolution = "low".to_string();
        assert_eq!(layout_recommendations(&layout).len(), 3);
        assert_eq!(structure_summary(&layout).text_regions, 4);
    }

    #[tokio::test]
    async fn layout_analysis_wraps_interpretation() {
        let model = Arc::new(FakeChatModel::replying("Two column report"));
        let processor = VisionProcessor::new(&AiPdfConfig::default(), model);
        let result = processor
            .process(
                PDF,
                VisionRequest::Layout {
                    page_numbers: Some(vec![2]),
                },
            )
            .await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.operation_type, "vision");
        assert_eq!(result.data["layout_analysis"]["interpretation"], "Two column report");
        assert_eq!(result.data["layout_analysis"]["structure_summary"]["columns"], 2);
        assert_eq!(result.data["raw_layout_data"]["pages"], json!([2]));
        assert_eq!(result.metadata["analysis_type"], "layout");
    }

    #[tokio::test]
    async fn failing_model_degrades_layout_interpretation() {
        let result = VisionProcessor::new(&AiPdfConfig::default(), Arc::new(FakeChatModel::failing()))
            .analyze_layout(PDF, None)
            .await;

        assert!(result.success);
        assert_eq!(
            result.data["layout_analysis"]["interpretation"],
            "Layout analysis completed but AI interpretation failed"
        );
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.metadata["pages_analyzed"], "all");
    }

    #[tokio::test]
    async fn model_without_choices_leaves_no_warning() {
        let processor =
            VisionProcessor::new(&AiPdfConfig::default(), Arc::new(FakeChatModel::without_choices()));

        let layout = processor.analyze_layout(PDF, None).await;
        assert!(layout.success);
        assert_eq!(
            layout.data["layout_analysis"]["interpretation"],
            "Layout analysis completed but AI interpretation unavailable"
        );
        assert!(layout.warnings.is_empty());

        let objects = processor.detect_objects(PDF, None).await;
        assert_eq!(
            objects.data["object_analysis"]["analysis"],
            "Object detection completed but AI analysis unavailable"
        );
        assert!(objects.warnings.is_empty());
    }

    #[tokio::test]
    async fn object_detection_respects_threshold_from_config() {
        let mut config = AiPdfConfig::default();
        config.vision.confidence_threshold = 0.9;
        let result = VisionProcessor::new(&config, Arc::new(FakeChatModel::failing()))
            .detect_objects(PDF, None)
            .await;

        assert!(result.success);
        assert_eq!(result.metadata["objects_detected"], 2);
        assert_eq!(result.data["detected_objects"]["summary"]["total_objects"], 2);
        assert_eq!(
            result.data["object_analysis"]["analysis"],
            "Object detection completed but AI analysis failed"
        );
        assert_eq!(result.data["object_types"].as_array().map(Vec::len), Some(6));
    }

    #[tokio::test]
    async fn disabled_vision_is_reported() {
        let mut config = AiPdfConfig::default();
        config.vision.enabled = false;
        let result = VisionProcessor::new(&config, Arc::new(FakeChatModel::replying("x")))
            .detect_objects(PDF, Some(&types(&["table"])))
            .await;

        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec!["Vision analysis functionality is disabled".to_string()]
        );
    }
}
