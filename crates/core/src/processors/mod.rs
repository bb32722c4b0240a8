mod embeddings;
mod ocr;
mod vision;

pub use embeddings::{EmbeddingBatch, EmbeddingsProcessor};
pub use ocr::{default_extraction_schema, OcrProcessor};
pub use vision::{
    filter_detections, layout_recommendations, object_insights, placeholder_detections,
    placeholder_layout, structure_summary, DetectedObject, DetectionSummary, Detections,
    LayoutAnalysis, LayoutData, ObjectAnalysis, StructureSummary, VisionProcessor,
    DEFAULT_OBJECT_TYPES,
};
