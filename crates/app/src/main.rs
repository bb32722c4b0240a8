use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pdf_ai_ops_core::config::DEFAULT_MISTRAL_BASE_URL;
use pdf_ai_ops_core::{
    read_metadata, split_by_ranges, split_into_pages, write_outputs, AiPdfConfig, CacheConfig,
    ChatModel, EmbedderBackend, EmbeddingsConfig, EmbeddingsProcessor, EmbeddingsRequest,
    MistralClient, MistralConfig, OcrConfig, OcrProcessor, OcrRequest, Operation,
    OperationResult, TextSource, VisionConfig, VisionProcessor, VisionRequest,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-ai-ops", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Seeded,
    Ngram,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Placeholder,
    Lopdf,
}

#[derive(Args)]
struct Settings {
    /// Mistral API key; AI enrichment falls back when unset
    #[arg(long, global = true, env = "AI_PDF_MISTRAL_API_KEY", hide_env_values = true)]
    mistral_api_key: Option<String>,

    #[arg(long, global = true, env = "AI_PDF_MISTRAL_BASE_URL", default_value = DEFAULT_MISTRAL_BASE_URL)]
    mistral_base_url: String,

    #[arg(long, global = true, env = "AI_PDF_MISTRAL_MODEL", default_value = "mistral-medium")]
    mistral_model: String,

    #[arg(long, global = true, env = "AI_PDF_MISTRAL_MAX_TOKENS", default_value_t = 1000)]
    mistral_max_tokens: u32,

    #[arg(long, global = true, env = "AI_PDF_MISTRAL_TEMPERATURE", default_value_t = 0.7)]
    mistral_temperature: f64,

    #[arg(long, global = true, env = "AI_PDF_OCR_ENABLED", default_value_t = true, action = ArgAction::Set)]
    ocr_enabled: bool,

    #[arg(long, global = true, env = "AI_PDF_OCR_MODEL", default_value = "tesseract")]
    ocr_model: String,

    #[arg(long, global = true, env = "AI_PDF_OCR_LANGUAGES", default_value = "eng")]
    ocr_languages: String,

    #[arg(long, global = true, env = "AI_PDF_VISION_ENABLED", default_value_t = true, action = ArgAction::Set)]
    vision_enabled: bool,

    #[arg(long, global = true, env = "AI_PDF_VISION_MODEL", default_value = "yolov5")]
    vision_model: String,

    /// Minimum confidence for reported detections
    #[arg(long, global = true, env = "AI_PDF_VISION_CONFIDENCE_THRESHOLD", default_value_t = 0.5)]
    vision_confidence_threshold: f64,

    #[arg(long, global = true, env = "AI_PDF_EMBEDDINGS_ENABLED", default_value_t = true, action = ArgAction::Set)]
    embeddings_enabled: bool,

    #[arg(
        long,
        global = true,
        env = "AI_PDF_EMBEDDINGS_MODEL",
        default_value = "sentence-transformers/all-MiniLM-L6-v2"
    )]
    embeddings_model: String,

    /// Words per chunk
    #[arg(long, global = true, env = "AI_PDF_EMBEDDINGS_CHUNK_SIZE", default_value_t = 512)]
    embeddings_chunk_size: usize,

    /// Words shared by consecutive chunks
    #[arg(long, global = true, env = "AI_PDF_EMBEDDINGS_OVERLAP", default_value_t = 50)]
    embeddings_overlap: usize,

    #[arg(long, global = true, env = "AI_PDF_EMBEDDINGS_DIMENSIONS", default_value_t = 384)]
    embeddings_dimensions: usize,

    #[arg(long, global = true, env = "AI_PDF_EMBEDDINGS_BACKEND", value_enum, default_value = "seeded")]
    embeddings_backend: Backend,

    /// Where document text comes from
    #[arg(long, global = true, env = "AI_PDF_TEXT_SOURCE", value_enum, default_value = "placeholder")]
    text_source: Source,

    #[arg(long, global = true, env = "AI_PDF_CACHE_ENABLED", default_value_t = true, action = ArgAction::Set)]
    cache_enabled: bool,

    /// Maximum cached embeddings
    #[arg(long, global = true, env = "AI_PDF_CACHE_CAPACITY", default_value_t = 4096)]
    cache_capacity: usize,

    #[arg(long, global = true, env = "AI_PDF_CACHE_TTL_SECONDS", default_value_t = 3600)]
    cache_ttl_seconds: u64,

    /// Deadline for a whole operation
    #[arg(long, global = true, env = "AI_PDF_TIMEOUT_SECONDS", default_value_t = 300)]
    timeout_seconds: u64,

    /// Recorded only; LLM calls are attempted once
    #[arg(long, global = true, env = "AI_PDF_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    #[arg(long, global = true, env = "AI_PDF_MAX_PAGES_PER_REQUEST", default_value_t = 50)]
    max_pages_per_request: usize,

    #[arg(long, global = true, env = "AI_PDF_MAX_FILE_SIZE_MB", default_value_t = 50)]
    max_file_size_mb: usize,
}

impl Settings {
    fn to_config(&self) -> AiPdfConfig {
        AiPdfConfig {
            mistral: MistralConfig {
                api_key: self.mistral_api_key.clone(),
                base_url: self.mistral_base_url.clone(),
                model: self.mistral_model.clone(),
                max_tokens: self.mistral_max_tokens,
                temperature: self.mistral_temperature,
            },
            ocr: OcrConfig {
                enabled: self.ocr_enabled,
                model: self.ocr_model.clone(),
                languages: self.ocr_languages.clone(),
            },
            vision: VisionConfig {
                enabled: self.vision_enabled,
                model: self.vision_model.clone(),
                confidence_threshold: self.vision_confidence_threshold,
            },
            embeddings: EmbeddingsConfig {
                enabled: self.embeddings_enabled,
                model: self.embeddings_model.clone(),
                chunk_size: self.embeddings_chunk_size,
                overlap: self.embeddings_overlap,
                dimensions: self.embeddings_dimensions,
                backend: match self.embeddings_backend {
                    Backend::Seeded => EmbedderBackend::Seeded,
                    Backend::Ngram => EmbedderBackend::Ngram,
                },
                text_source: match self.text_source {
                    Source::Placeholder => TextSource::Placeholder,
                    Source::Lopdf => TextSource::Lopdf,
                },
            },
            cache: CacheConfig {
                enabled: self.cache_enabled,
                capacity: self.cache_capacity,
                ttl: Duration::from_secs(self.cache_ttl_seconds),
            },
            timeout: Duration::from_secs(self.timeout_seconds),
            max_retries: self.max_retries,
            max_pages_per_request: self.max_pages_per_request,
            max_file_size_bytes: self.max_file_size_mb.saturating_mul(1024 * 1024),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Chunk the document text and embed every chunk.
    Embed {
        #[arg(long)]
        pdf: PathBuf,
        /// Override the configured chunk size for this run.
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Rank document chunks against a query.
    Search {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Extract text, or structured data with --structured.
    Ocr {
        #[arg(long)]
        pdf: PathBuf,
        /// Comma separated page numbers.
        #[arg(long, value_delimiter = ',')]
        pages: Vec<u32>,
        #[arg(long)]
        structured: bool,
        /// JSON file with the extraction schema.
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Analyse page layout, or detect objects with --objects.
    Vision {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long, value_delimiter = ',')]
        pages: Vec<u32>,
        #[arg(long)]
        objects: bool,
        /// Comma separated object types, e.g. table,chart.
        #[arg(long, value_delimiter = ',')]
        object_types: Vec<String>,
    },
    /// Print page count, document info and page size.
    Metadata {
        #[arg(long)]
        pdf: PathBuf,
    },
    /// Split into one file per range ("5", "1-3", "-4", "2-"), or per page.
    Split {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long, value_delimiter = ',')]
        ranges: Vec<String>,
        #[arg(long, default_value = "split")]
        out_dir: PathBuf,
    },
    /// Check that the language model answers.
    Health,
}

async fn read_pdf(path: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await?;
    info!(path = %path.display(), bytes = bytes.len(), "loaded pdf");
    Ok(bytes)
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn emit(result: &OperationResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if !result.success {
        anyhow::bail!("{} operation failed: {}", result.operation_type, result.errors.join("; "));
    }
    for warning in &result.warnings {
        warn!(warning = %warning, "operation warning");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.settings.to_config();
    config.validate()?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-ai-ops boot"
    );

    let model: Arc<dyn ChatModel> = Arc::new(MistralClient::new(&config.mistral, config.timeout)?);

    match cli.command {
        Command::Embed { pdf, chunk_size } => {
            let bytes = read_pdf(&pdf).await?;
            let processor = EmbeddingsProcessor::new(&config, model);
            emit(&processor.process(&bytes, EmbeddingsRequest::Generate { chunk_size }).await)?;
        }
        Command::Search { pdf, query, top_k } => {
            let bytes = read_pdf(&pdf).await?;
            let processor = EmbeddingsProcessor::new(&config, model);
            emit(&processor.process(&bytes, EmbeddingsRequest::Search { query, top_k }).await)?;
        }
        Command::Ocr {
            pdf,
            pages,
            structured,
            schema,
        } => {
            let bytes = read_pdf(&pdf).await?;
            let request = if structured {
                let schema = match schema {
                    Some(path) => Some(serde_json::from_slice(&tokio::fs::read(path).await?)?),
                    None => None,
                };
                OcrRequest::Structured { schema }
            } else {
                OcrRequest::Text {
                    page_numbers: non_empty(pages),
                }
            };
            let processor = OcrProcessor::new(&config, model);
            emit(&processor.process(&bytes, request).await)?;
        }
        Command::Vision {
            pdf,
            pages,
            objects,
            object_types,
        } => {
            let bytes = read_pdf(&pdf).await?;
            let request = if objects {
                VisionRequest::Objects {
                    object_types: non_empty(object_types),
                }
            } else {
                VisionRequest::Layout {
                    page_numbers: non_empty(pages),
                }
            };
            let processor = VisionProcessor::new(&config, model);
            emit(&processor.process(&bytes, request).await)?;
        }
        Command::Metadata { pdf } => {
            let bytes = read_pdf(&pdf).await?;
            let metadata = read_metadata(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Split {
            pdf,
            ranges,
            out_dir,
        } => {
            let bytes = read_pdf(&pdf).await?;
            let outputs = if ranges.is_empty() {
                split_into_pages(&bytes)?
            } else {
                split_by_ranges(&bytes, &ranges)?
            };
            let written = write_outputs(&outputs, &out_dir)?;
            info!(files = written.len(), out_dir = %out_dir.display(), "split written");
            for path in written {
                println!("{}", path.display());
            }
        }
        Command::Health => {
            let healthy = model.health_check().await;
            println!(
                "{}",
                serde_json::json!({
                    "status": if healthy { "healthy" } else { "unhealthy" },
                    "model": model.model_name(),
                    "checked_at": Utc::now().to_rfc3339(),
                })
            );
            if !healthy {
                anyhow::bail!("language model health check failed");
            }
        }
    }

    Ok(())
}
