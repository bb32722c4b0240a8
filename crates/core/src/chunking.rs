use crate::config::EmbeddingsConfig;
use crate::error::OperationError;
use crate::models::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, OperationError> {
        if chunk_size == 0 {
            return Err(OperationError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(OperationError::InvalidConfig(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Words the window advances by; always at least one.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl TryFrom<&EmbeddingsConfig> for ChunkingConfig {
    type Error = OperationError;

    fn try_from(value: &EmbeddingsConfig) -> Result<Self, Self::Error> {
        ChunkingConfig::new(value.chunk_size, value.overlap)
    }
}

/// Splits `text` into overlapping word windows of `config.chunk_size` words.
///
/// The final window may be shorter. Empty or whitespace-only input yields no
/// chunks.
pub fn split_into_chunks(text: &str, config: ChunkingConfig) -> Vec<Chunk> {
    let words = text.split_whitespace().collect::<Vec<_>>();
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        let window = &words[start..end];

        chunks.push(Chunk {
            id: chunks.len(),
            text: window.join(" "),
            start_word: start,
            end_word: end,
            word_count: window.len(),
        });

        if end == words.len() {
            break;
        }
        start += config.stride();
    }

    chunks
}

/// First `max_chars` characters of `text`, with an ellipsis when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}
