use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use mcqrag_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch_on_device;

/// In-process XLM-RoBERTa sentence encoder (BGE-M3 and similar checkpoints).
///
/// `model_dir` must contain `tokenizer.json`, `config.json` and either
/// `model.safetensors` or `pytorch_model.bin`.
pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    model_name: String,
    dim: usize,
    max_len: usize,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "Loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;
        let dim = raw
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;
        let config: XLMRobertaConfig = serde_json::from_value(raw)?;

        let dtype = DType::F32;
        let vb = match weights_path(model_dir)? {
            Weights::SafeTensors(path) => {
                debug!(path = %path.display(), "Loading safetensors weights");
                // SAFETY: the file is opened read-only and must not be modified while mapped.
                unsafe { VarBuilder::from_mmaped_safetensors(&[path], dtype, &device)? }
            }
            Weights::Pickle(path) => {
                debug!(path = %path.display(), "Loading pickle weights");
                let weights = candle_core::pickle::read_all(&path)?;
                let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
                VarBuilder::from_tensors(weights_map, dtype, &device)
            }
        };
        let model = XLMRobertaModel::new(&config, vb)?;
        let model_name = model_dir
            .file_name()
            .map_or_else(|| "xlm-roberta".to_string(), |n| n.to_string_lossy().into_owned());
        info!(model = %model_name, dim, max_len, "Embedding model loaded");
        Ok(Self { model, tokenizer, device, model_name, dim, max_len })
    }

    fn forward(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch_on_device(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?)
    }
}

enum Weights {
    SafeTensors(PathBuf),
    Pickle(PathBuf),
}

fn weights_path(model_dir: &Path) -> Result<Weights> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(Weights::SafeTensors(safetensors));
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        return Ok(Weights::Pickle(pickle));
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

impl Embedder for EmbeddingModel {
    fn embedder_id(&self) -> String {
        format!("xlm-roberta:{}:{}", self.model_name, self.dim)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let out = self.forward(texts)?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Embedded batch");
        Ok(out)
    }
}
