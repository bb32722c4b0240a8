use crate::config::{EmbedderBackend, EmbeddingsConfig};
use crate::models::Embedding;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
    fn embed(&self, text: &str) -> Embedding;
}

/// Stand-in for a sentence embedding model.
///
/// Every component is drawn uniformly from `[-1, 1]` by a generator seeded
/// from the SHA-256 digest of the exact input text, so identical text always
/// yields a bit-identical vector. The vectors carry no semantic meaning.
#[derive(Debug, Clone)]
pub struct SeededEmbedder {
    pub dimensions: usize,
    pub model: String,
}

impl Default for SeededEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            model: crate::config::DEFAULT_EMBEDDINGS_MODEL.to_string(),
        }
    }
}

impl Embedder for SeededEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Embedding {
        let mut rng = StdRng::seed_from_u64(text_seed(text));
        (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0f64..=1.0))
            .collect()
    }
}

fn text_seed(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}

/// Hashed character-trigram embedder; similar strings land near each other.
#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
    pub model: String,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            model: "char-trigram".to_string(),
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Embedding {
        let mut vector = vec![0f64; self.dimensions.max(1)];
        let chars = text.to_lowercase().chars().collect::<Vec<_>>();

        for window in chars.windows(3) {
            // FNV-1a over the trigram's UTF-8 bytes
            let mut hash = 1469598103934665603u64;
            let mut buffer = [0u8; 4];
            for ch in window {
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f64>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

pub fn embedder_from_config(config: &EmbeddingsConfig) -> Box<dyn Embedder> {
    match config.backend {
        EmbedderBackend::Seeded => Box::new(SeededEmbedder {
            dimensions: config.dimensions,
            model: config.model.clone(),
        }),
        EmbedderBackend::Ngram => Box::new(CharacterNgramEmbedder {
            dimensions: config.dimensions,
            ..CharacterNgramEmbedder::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_embedder_is_deterministic() {
        let embedder = SeededEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow");
        let second = embedder.embed("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[test]
    fn seeded_embedder_outputs_configured_length_in_range() {
        let embedder = SeededEmbedder::default();
        for text in ["abc", "a different text entirely"] {
            let vector = embedder.embed(text);
            assert_eq!(vector.len(), 384);
            assert!(vector.iter().all(|value| (-1.0..=1.0).contains(value)));
        }
        assert_ne!(embedder.embed("abc"), embedder.embed("abd"));
    }

    #[test]
    fn ngram_embedder_is_normalized() {
        let embedder = CharacterNgramEmbedder {
            dimensions: 32,
            ..CharacterNgramEmbedder::default()
        };
        let vector = embedder.embed("pressure relief valve");
        assert_eq!(vector.len(), 32);
        let norm = vector.iter().map(|value| value * value).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(embedder.embed("ab").iter().all(|value| *value == 0.0));
    }

    #[test]
    fn backend_is_selected_from_config() {
        let mut config = EmbeddingsConfig {
            dimensions: 16,
            ..EmbeddingsConfig::default()
        };
        assert_eq!(
            embedder_from_config(&config).model_name(),
            crate::config::DEFAULT_EMBEDDINGS_MODEL
        );

        config.backend = EmbedderBackend::Ngram;
        let embedder = embedder_from_config(&config);
        assert_eq!(embedder.model_name(), "char-trigram");
        assert_eq!(embedder.embed("some text").len(), 16);
    }
}
