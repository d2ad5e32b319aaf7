//! In-process embedding provider backed by a candle BERT model.
//!
//! The first call downloads the model weights via the Hugging Face hub
//! (cached on disk for later runs) and loads them once per process; the
//! loaded model is a lazy singleton, so concurrent first calls share a
//! single load instead of racing. Inference is CPU-bound and runs on the
//! blocking thread pool.
//!
//! This module is only available when the `local` feature is enabled.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::api::sync::Api;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::embedding::{check_dimensions, EmbeddingProvider};
use crate::error::{Result, SearchError};

const PROVIDER: &str = "local";

/// Sentence-transformer checkpoint used for both indexing and queries.
/// Changing it invalidates every stored embedding; re-index after.
const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Output dimensionality of `all-MiniLM-L6-v2`.
const DIMENSIONS: usize = 384;

/// Token budget per input; longer texts are truncated by the tokenizer.
const MAX_TOKENS: usize = 512;

/// Process-wide model singleton. `OnceCell` gives the single-flight
/// guarantee: concurrent first uses wait on one load.
static ENCODER: OnceCell<Arc<BertEncoder>> = OnceCell::const_new();

fn model_err(e: impl Display) -> SearchError {
    SearchError::provider(PROVIDER, e.to_string())
}

/// An [`EmbeddingProvider`] running a BERT sentence encoder in-process.
///
/// Embeddings are mean-pooled over the attention mask and L2-normalized,
/// so cosine similarity degenerates to a dot product downstream.
#[derive(Debug, Default, Clone)]
pub struct LocalEmbeddingProvider;

impl LocalEmbeddingProvider {
    /// Create a provider handle. The model itself loads on first use.
    pub fn new() -> Self {
        Self
    }

    async fn encoder() -> Result<Arc<BertEncoder>> {
        ENCODER
            .get_or_try_init(|| async {
                tokio::task::spawn_blocking(BertEncoder::load)
                    .await
                    .map_err(|e| model_err(format!("model load task failed: {e}")))?
                    .map(Arc::new)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::provider(PROVIDER, "model returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let encoder = Self::encoder().await?;
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors =
            tokio::task::spawn_blocking(move || encoder.encode(&owned))
                .await
                .map_err(|e| model_err(format!("embedding task failed: {e}")))??;

        for vector in &vectors {
            check_dimensions(DIMENSIONS, vector)?;
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// The loaded model, tokenizer, and device. Immutable after load.
struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEncoder {
    /// Fetch (or reuse from the hub cache) and load the model files.
    fn load() -> Result<Self> {
        info!(model = MODEL_ID, "loading local embedding model");

        let api = Api::new().map_err(model_err)?;
        let repo = api.model(MODEL_ID.to_string());
        let config_file = repo.get("config.json").map_err(model_err)?;
        let tokenizer_file = repo.get("tokenizer.json").map_err(model_err)?;
        let weights_file = repo.get("model.safetensors").map_err(model_err)?;

        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_file).map_err(model_err)?,
        )
        .map_err(|e| model_err(format!("parse model config: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_file)
            .map_err(|e| model_err(format!("load tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        let _ = tokenizer.with_truncation(Some(TruncationParams {
            max_length: MAX_TOKENS,
            ..Default::default()
        }));

        let device = Device::Cpu;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_file], DTYPE, &device)
                .map_err(|e| model_err(format!("load weights: {e}")))?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|e| model_err(format!("load model: {e}")))?;

        info!(model = MODEL_ID, dimensions = DIMENSIONS, "local embedding model ready");
        Ok(Self { model, tokenizer, device })
    }

    /// Tokenize, forward, mean-pool over the attention mask, L2-normalize.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| model_err(format!("tokenization failed: {e}")))?;

        let ids: Vec<Tensor> = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_ids(), &self.device).map_err(model_err))
            .collect::<Result<_>>()?;
        let masks: Vec<Tensor> = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_attention_mask(), &self.device).map_err(model_err))
            .collect::<Result<_>>()?;

        let input_ids = Tensor::stack(&ids, 0).map_err(model_err)?;
        let attention_mask = Tensor::stack(&masks, 0).map_err(model_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(model_err)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(model_err)?;

        // Mean pooling: zero out padding positions, sum over the sequence,
        // divide by each row's real token count.
        let mask = attention_mask.to_dtype(DTYPE).map_err(model_err)?;
        let mask_expanded = mask.unsqueeze(2).map_err(model_err)?;
        let summed = hidden
            .broadcast_mul(&mask_expanded)
            .and_then(|t| t.sum(1))
            .map_err(model_err)?;
        let counts = mask.sum_keepdim(1).map_err(model_err)?;
        let pooled = summed.broadcast_div(&counts).map_err(model_err)?;

        // L2 normalization.
        let norm = pooled
            .sqr()
            .and_then(|t| t.sum_keepdim(1))
            .and_then(|t| t.sqrt())
            .map_err(model_err)?;
        let normalized = pooled.broadcast_div(&norm).map_err(model_err)?;

        normalized.to_vec2::<f32>().map_err(model_err)
    }
}
