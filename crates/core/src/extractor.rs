use crate::config::{OcrConfig, TextSource};
use crate::error::{OperationError, PdfError};
use async_trait::async_trait;
use lopdf::Document;
use std::time::Duration;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Text of the requested pages (all pages when `None`). An unreadable
    /// but well-formed document yields an empty string.
    async fn extract_text(
        &self,
        pdf: &[u8],
        page_numbers: Option<&[u32]>,
    ) -> Result<String, OperationError>;
}

#[derive(Debug, Clone)]
enum Template {
    Document,
    Ocr { model: String, languages: String },
}

/// Returns fixed template text in place of a real extraction engine.
#[derive(Debug, Clone)]
pub struct PlaceholderExtractor {
    template: Template,
    delay: Duration,
}

impl PlaceholderExtractor {
    pub fn document() -> Self {
        Self {
            template: Template::Document,
            delay: Duration::ZERO,
        }
    }

    pub fn ocr(model: impl Into<String>, languages: impl Into<String>) -> Self {
        Self {
            template: Template::Ocr {
                model: model.into(),
                languages: languages.into(),
            },
            delay: Duration::ZERO,
        }
    }

    /// Simulated processing latency before the text is returned.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn render(&self, page_numbers: Option<&[u32]>) -> String {
        match &self.template {
            Template::Document => DOCUMENT_PLACEHOLDER.to_string(),
            Template::Ocr { model, languages } => {
                let pages = page_numbers
                    .map(|pages| format!("{pages:?}"))
                    .unwrap_or_else(|| "all".to_string());
                format!(
                    "[OCR PLACEHOLDER - Text extracted from PDF using {model}]\n\n\
                     This is a placeholder implementation for OCR text extraction.\n\
                     In a real implementation, this would contain the actual text\n\
                     extracted from the PDF document using the configured OCR engine.\n\n\
                     Configuration:\n\
                     - OCR Model: {model}\n\
                     - Languages: {languages}\n\
                     - Pages: {pages}"
                )
            }
        }
    }
}

#[async_trait]
impl TextExtractor for PlaceholderExtractor {
    async fn extract_text(
        &self,
        _pdf: &[u8],
        page_numbers: Option<&[u32]>,
    ) -> Result<String, OperationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.render(page_numbers))
    }
}

const DOCUMENT_PLACEHOLDER: &str = "This is placeholder text extracted from a PDF document for embeddings processing.

The document contains various sections including:
- Introduction and overview
- Technical specifications and requirements
- Implementation details and methodology
- Data analysis and results
- Conclusions and recommendations

In a real implementation, this would contain the actual text content
extracted from the PDF using a PDF text extraction library or
the OCR pipeline for scanned documents.

The text would be properly formatted and cleaned for optimal
embeddings generation and semantic search capabilities.

Key topics covered in this document:
- Machine learning and artificial intelligence
- Natural language processing techniques
- Document analysis and information extraction
- Workflow automation and integration
- API design and microservices architecture

This placeholder demonstrates the structure and format of text
that would be processed for embeddings generation.";

/// Reads the text layer of the in-memory PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn extract_pages(
        &self,
        pdf: &[u8],
        page_numbers: Option<&[u32]>,
    ) -> Result<Vec<(u32, String)>, PdfError> {
        let document = Document::load_mem(pdf)?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            if page_numbers.is_some_and(|wanted| !wanted.contains(&page_no)) {
                continue;
            }

            let text = document.extract_text(&[page_no])?;
            if !text.trim().is_empty() {
                pages.push((page_no, text));
            }
        }

        Ok(pages)
    }
}

#[async_trait]
impl TextExtractor for LopdfExtractor {
    async fn extract_text(
        &self,
        pdf: &[u8],
        page_numbers: Option<&[u32]>,
    ) -> Result<String, OperationError> {
        let pages = self.extract_pages(pdf, page_numbers)?;
        tracing::debug!(pages = pages.len(), "extracted pdf text layer");

        Ok(pages
            .into_iter()
            .map(|(_, text)| text.trim().to_string())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

pub fn document_extractor(source: TextSource) -> Box<dyn TextExtractor> {
    match source {
        TextSource::Placeholder => Box::new(PlaceholderExtractor::document()),
        TextSource::Lopdf => Box::new(LopdfExtractor),
    }
}

/// OCR text source: the OCR template unless real text extraction is selected.
pub fn ocr_extractor(source: TextSource, config: &OcrConfig) -> Box<dyn TextExtractor> {
    match source {
        TextSource::Placeholder => Box::new(PlaceholderExtractor::ocr(
            config.model.clone(),
            config.languages.clone(),
        )),
        TextSource::Lopdf => Box::new(LopdfExtractor),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::pdf_with_pages;
    use super::*;

    #[tokio::test]
    async fn document_placeholder_is_stable() {
        let extractor = PlaceholderExtractor::document();
        let first = extractor.extract_text(b"%PDF-1.4", None).await.expect("placeholder");
        let second = extractor.extract_text(b"%PDF-1.7 other", None).await.expect("placeholder");
        assert_eq!(first, second);
        assert!(first.starts_with("This is placeholder text"));
    }

    #[tokio::test]
    async fn ocr_placeholder_names_model_and_pages() {
        let extractor = PlaceholderExtractor::ocr("tesseract", "eng");
        let text = extractor
            .extract_text(b"%PDF-1.4", Some(&[1, 3]))
            .await
            .expect("placeholder");
        assert!(text.contains("using tesseract"));
        assert!(text.contains("Pages: [1, 3]"));
    }

    #[tokio::test]
    async fn lopdf_reads_generated_text_layer() {
        let pdf = pdf_with_pages(&["Hello pump", "Second page"]);
        let pages = LopdfExtractor.extract_pages(&pdf, None).expect("readable pdf");
        assert_eq!(pages.len(), 2);
        assert!(pages[0].1.contains("Hello"));

        let only_second = LopdfExtractor
            .extract_text(&pdf, Some(&[2]))
            .await
            .expect("readable pdf");
        assert!(only_second.contains("Second"));
        assert!(!only_second.contains("Hello"));
    }

    #[tokio::test]
    async fn lopdf_rejects_garbage() {
        let result = LopdfExtractor.extract_text(b"%PDF-1.4\n%broken", None).await;
        assert!(matches!(result, Err(OperationError::Pdf(PdfError::Parse(_)))));
    }
}
