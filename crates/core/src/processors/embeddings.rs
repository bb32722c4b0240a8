use crate::analysis::{analyze_content, enrich_results};
use crate::cache::{cache_key, EmbeddingCache};
use crate::chunking::{preview, split_into_chunks, ChunkingConfig};
use crate::config::{AiPdfConfig, EmbeddingsConfig};
use crate::embeddings::{embedder_from_config, Embedder};
use crate::error::OperationError;
use crate::extractor::{document_extractor, TextExtractor};
use crate::models::{Chunk, EmbeddingRecord, EmbeddingsRequest, OperationKind, OperationResult};
use crate::orchestrator::{
    ensure_enabled, enter_stage, run_operation, validate_input, Operation, Outcome,
    ProcessingStage,
};
use crate::similarity::rank;
use crate::traits::ChatModel;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TEXT_PREVIEW_CHARS: usize = 100;

/// Records from one embedding pass and the cache traffic it caused.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingBatch {
    pub records: Vec<EmbeddingRecord>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

/// Chunk, embed and rank pipeline over the text of one PDF.
pub struct EmbeddingsProcessor {
    config: EmbeddingsConfig,
    extractor: Box<dyn TextExtractor>,
    embedder: Box<dyn Embedder>,
    cache: Option<Arc<EmbeddingCache>>,
    model: Arc<dyn ChatModel>,
    timeout: Duration,
    max_file_size_bytes: usize,
}

impl EmbeddingsProcessor {
    pub fn new(config: &AiPdfConfig, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config: config.embeddings.clone(),
            extractor: document_extractor(config.embeddings.text_source),
            embedder: embedder_from_config(&config.embeddings),
            cache: EmbeddingCache::from_config(&config.cache).map(Arc::new),
            model,
            timeout: config.timeout,
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Replaces the cache, e.g. to share one between processors. `None`
    /// turns caching off.
    pub fn with_cache(mut self, cache: Option<Arc<EmbeddingCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    pub async fn generate_text_embeddings(
        &self,
        pdf: &[u8],
        chunk_size: Option<usize>,
    ) -> OperationResult {
        run_operation(
            OperationKind::Embeddings,
            self.timeout,
            self.generate(pdf, chunk_size),
        )
        .await
    }

    pub async fn similarity_search(&self, pdf: &[u8], query: &str, top_k: usize) -> OperationResult {
        run_operation(
            OperationKind::Embeddings,
            self.timeout,
            self.search(pdf, query, top_k),
        )
        .await
    }

    /// Embeds `chunks` in order, consulting the cache before the embedder.
    pub async fn embed_batch(&self, chunks: &[Chunk]) -> EmbeddingBatch {
        let mut batch = EmbeddingBatch {
            records: Vec::with_capacity(chunks.len()),
            ..EmbeddingBatch::default()
        };

        for chunk in chunks {
            let embedding = match &self.cache {
                Some(cache) => {
                    let key = cache_key(&chunk.text);
                    match cache.get(&key).await {
                        Some(vector) => {
                            batch.cache_hits += 1;
                            vector
                        }
                        None => {
                            batch.cache_misses += 1;
                            let vector = self.embedder.embed(&chunk.text);
                            cache.put(key, vector.clone()).await;
                            vector
                        }
                    }
                }
                None => self.embedder.embed(&chunk.text),
            };

            batch.records.push(EmbeddingRecord {
                chunk_id: chunk.id,
                embedding,
                text_preview: preview(&chunk.text, TEXT_PREVIEW_CHARS),
                word_count: chunk.word_count,
            });
        }

        debug!(
            chunks = chunks.len(),
            cache_hits = batch.cache_hits,
            cache_misses = batch.cache_misses,
            "embedded chunks"
        );
        batch
    }

    fn admit(&self, pdf: &[u8]) -> Result<(), OperationError> {
        validate_input(pdf, self.max_file_size_bytes)?;
        ensure_enabled(self.config.enabled, "Embeddings")
    }

    async fn chunk_document(
        &self,
        pdf: &[u8],
        chunking: ChunkingConfig,
    ) -> Result<(String, Vec<Chunk>), OperationError> {
        enter_stage(ProcessingStage::Extracting);
        let text = self.extractor.extract_text(pdf, None).await?;
        if text.trim().is_empty() {
            return Err(OperationError::EmptyContent("No text content found in PDF"));
        }

        enter_stage(ProcessingStage::Chunking);
        let chunks = split_into_chunks(&text, chunking);
        Ok((text, chunks))
    }

    async fn generate(&self, pdf: &[u8], chunk_size: Option<usize>) -> Result<Outcome, OperationError> {
        self.admit(pdf)?;
        let chunk_size = chunk_size.unwrap_or(self.config.chunk_size);
        let chunking = ChunkingConfig::new(chunk_size, self.config.overlap)?;
        let (text, chunks) = self.chunk_document(pdf, chunking).await?;

        enter_stage(ProcessingStage::Embedding);
        let batch = self.embed_batch(&chunks).await;

        enter_stage(ProcessingStage::Enriching);
        let analysis = analyze_content(self.model.as_ref(), &text, &chunks).await;

        let text_length = text.chars().count();
        info!(chunks = chunks.len(), text_length, "generated embeddings");

        Ok(Outcome::default()
            .with_data("embeddings", &batch.records)?
            .with_data("chunks", &chunks)?
            .with_data("text_content", &text)?
            .with_data("content_analysis", &analysis.value)?
            .with_metadata("embeddings_model", self.embedder.model_name())?
            .with_metadata("chunk_size", chunk_size)?
            .with_metadata("overlap", self.config.overlap)?
            .with_metadata("total_chunks", chunks.len())?
            .with_metadata("total_text_length", text_length)?
            .with_metadata("embedding_dimensions", self.embedder.dimensions())?
            .with_metadata("cache_hits", batch.cache_hits)?
            .with_metadata("cache_misses", batch.cache_misses)?
            .with_warnings(analysis.warnings))
    }

    async fn search(&self, pdf: &[u8], query: &str, top_k: usize) -> Result<Outcome, OperationError> {
        self.admit(pdf)?;
        if query.trim().is_empty() {
            return Err(OperationError::EmptyQuery);
        }

        let chunking = ChunkingConfig::try_from(&self.config)?;
        let (_, chunks) = self.chunk_document(pdf, chunking).await?;

        enter_stage(ProcessingStage::Embedding);
        let batch = self.embed_batch(&chunks).await;
        // the query vector is never cached
        let query_vector = self.embedder.embed(query);

        enter_stage(ProcessingStage::Ranking);
        let raw = rank(&query_vector, &batch.records, &chunks, top_k);

        enter_stage(ProcessingStage::Enriching);
        let enriched = enrich_results(self.model.as_ref(), query, &raw).await;

        info!(results = raw.len(), searched = chunks.len(), "similarity search finished");

        Ok(Outcome::default()
            .with_data("search_results", &enriched.value)?
            .with_data("raw_similarities", &raw)?
            .with_data("query", query)?
            .with_metadata("query", query)?
            .with_metadata("top_k", top_k)?
            .with_metadata("total_chunks_searched", chunks.len())?
            .with_metadata("embeddings_model", self.embedder.model_name())?
            .with_metadata("search_type", "semantic_similarity")?
            .with_metadata("cache_hits", batch.cache_hits)?
            .with_metadata("cache_misses", batch.cache_misses)?
            .with_warnings(enriched.warnings))
    }
}

#[async_trait]
impl Operation for EmbeddingsProcessor {
    type Request = EmbeddingsRequest;

    fn kind(&self) -> OperationKind {
        OperationKind::Embeddings
    }

    async fn process(&self, pdf: &[u8], request: EmbeddingsRequest) -> OperationResult {
        match request {
            EmbeddingsRequest::Generate { chunk_size } => {
                self.generate_text_embeddings(pdf, chunk_size).await
            }
            EmbeddingsRequest::Search { query, top_k } => {
                self.similarity_search(pdf, &query, top_k).await
            }
        }
    }
}
