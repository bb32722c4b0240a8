use crate::error::PdfError;
use lopdf::{Document, Object};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const PDF_SIGNATURE: &[u8] = b"%PDF-";
const PAGE_RANGE_PATTERN: &str = r"^\s*(\d*)\s*-\s*(\d*)\s*$";

pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.starts_with(PDF_SIGNATURE)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
    pub width_inches: f64,
    pub height_inches: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfMetadata {
    pub page_count: usize,
    pub file_size_bytes: usize,
    pub file_size_mb: f64,
    pub encrypted: bool,
    pub metadata: BTreeMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_dimensions: Option<PageDimensions>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn object_as_f64(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(*value as f64),
        _ => None,
    }
}

fn object_as_text(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => {
            let text = match bytes.as_slice() {
                [0xFE, 0xFF, rest @ ..] => {
                    let units = rest
                        .chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect::<Vec<_>>();
                    String::from_utf16_lossy(&units)
                }
                raw => String::from_utf8_lossy(raw).to_string(),
            };
            Some(text).filter(|text| !text.is_empty())
        }
        Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
        Object::Integer(value) => Some(value.to_string()),
        Object::Real(value) => Some(value.to_string()),
        Object::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

fn media_box(document: &Document, page_id: lopdf::ObjectId) -> Option<PageDimensions> {
    let mut current = document.get_dictionary(page_id).ok()?;
    // MediaBox is inheritable from the page tree
    loop {
        if let Ok(Object::Array(values)) = current.get(b"MediaBox") {
            let numbers = values.iter().filter_map(object_as_f64).collect::<Vec<_>>();
            if let [x0, y0, x1, y1] = numbers[..] {
                let width = (x1 - x0).abs();
                let height = (y1 - y0).abs();
                return Some(PageDimensions {
                    width,
                    height,
                    width_inches: round2(width / 72.0),
                    height_inches: round2(height / 72.0),
                });
            }
            return None;
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = document.get_dictionary(parent).ok()?;
    }
}

pub fn read_metadata(pdf: &[u8]) -> Result<PdfMetadata, PdfError> {
    let document = Document::load_mem(pdf)?;
    let pages = document.get_pages();

    let mut metadata = BTreeMap::new();
    let info = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| match object {
            Object::Reference(id) => document.get_dictionary(*id).ok(),
            Object::Dictionary(dictionary) => Some(dictionary),
            _ => None,
        });
    if let Some(info) = info {
        for (key, value) in info.iter() {
            metadata.insert(String::from_utf8_lossy(key).to_string(), object_as_text(value));
        }
    }

    let page_dimensions = pages
        .values()
        .next()
        .and_then(|page_id| media_box(&document, *page_id));

    Ok(PdfMetadata {
        page_count: pages.len(),
        file_size_bytes: pdf.len(),
        file_size_mb: round2(pdf.len() as f64 / (1024.0 * 1024.0)),
        encrypted: document.is_encrypted(),
        metadata,
        page_dimensions,
    })
}

/// Parses `"5"`, `"1-3"`, `"-4"` or `"2-"` against a document of
/// `total_pages` pages into an inclusive 0-based index range.
pub fn parse_page_range(range: &str, total_pages: usize) -> Result<(usize, usize), PdfError> {
    let range = range.trim();

    if !range.contains('-') {
        let page = range
            .parse::<usize>()
            .map_err(|_| PdfError::InvalidRange(format!("Invalid page range format: {range}")))?;
        if page < 1 || page > total_pages {
            return Err(PdfError::InvalidRange(format!(
                "Page {page} is out of range (1-{total_pages})"
            )));
        }
        return Ok((page - 1, page - 1));
    }

    let pattern = Regex::new(PAGE_RANGE_PATTERN)?;
    let captures = pattern.captures(range).ok_or_else(|| {
        PdfError::InvalidRange(format!("Invalid page numbers in range: {range}"))
    })?;
    let bound = |index: usize, default: usize| -> Result<usize, PdfError> {
        match captures.get(index).map(|m| m.as_str()).filter(|s| !s.is_empty()) {
            Some(digits) => digits.parse::<usize>().map_err(|_| {
                PdfError::InvalidRange(format!("Invalid page numbers in range: {range}"))
            }),
            None => Ok(default),
        }
    };
    let start = bound(1, 1)?;
    let end = bound(2, total_pages)?;

    if start < 1 || end < 1 {
        return Err(PdfError::InvalidRange(
            "Page numbers must be greater than 0".to_string(),
        ));
    }
    if start > total_pages || end > total_pages {
        return Err(PdfError::InvalidRange(format!(
            "Page range {start}-{end} exceeds document length ({total_pages} pages)"
        )));
    }
    if start > end {
        return Err(PdfError::InvalidRange(format!(
            "Invalid range: start page ({start}) is greater than end page ({end})"
        )));
    }

    Ok((start - 1, end - 1))
}

fn extract_page_span(pdf: &[u8], first: u32, last: u32) -> Result<Vec<u8>, PdfError> {
    let mut document = Document::load_mem(pdf)?;
    let doomed = document
        .get_pages()
        .keys()
        .copied()
        .filter(|page| *page < first || *page > last)
        .collect::<Vec<_>>();

    document.delete_pages(&doomed);
    document.prune_objects();
    document.renumber_objects();

    let mut bytes = Vec::new();
    document.save_to(&mut bytes)?;
    Ok(bytes)
}

/// One output document per range, keyed `page_N.pdf` or `pages_A-B.pdf`.
pub fn split_by_ranges(pdf: &[u8], ranges: &[String]) -> Result<Vec<(String, Vec<u8>)>, PdfError> {
    let total_pages = Document::load_mem(pdf)?.get_pages().len();
    if total_pages == 0 {
        return Err(PdfError::NoPages);
    }

    let mut outputs = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (start, end) = parse_page_range(range, total_pages)?;
        let name = if start == end {
            format!("page_{}.pdf", start + 1)
        } else {
            format!("pages_{}-{}.pdf", start + 1, end + 1)
        };
        let bytes = extract_page_span(pdf, start as u32 + 1, end as u32 + 1)?;
        outputs.push((name, bytes));
    }

    tracing::info!(outputs = outputs.len(), "split pdf by ranges");
    Ok(outputs)
}

pub fn split_into_pages(pdf: &[u8]) -> Result<Vec<(String, Vec<u8>)>, PdfError> {
    let total_pages = Document::load_mem(pdf)?.get_pages().len();
    if total_pages == 0 {
        return Err(PdfError::NoPages);
    }

    (1..=total_pages as u32)
        .map(|page| Ok((format!("page_{page}.pdf"), extract_page_span(pdf, page, page)?)))
        .collect()
}

pub fn write_outputs(outputs: &[(String, Vec<u8>)], directory: &Path) -> Result<Vec<PathBuf>, PdfError> {
    std::fs::create_dir_all(directory)?;
    outputs
        .iter()
        .map(|(name, bytes)| {
            let path = directory.join(name);
            std::fs::write(&path, bytes)?;
            Ok(path)
        })
        .collect()
}
