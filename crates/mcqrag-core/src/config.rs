//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys), then extracts one
//! immutable [`Settings`] value.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Ok(Self::from_figment(Self::layered(Path::new("."), &env_name)))
    }

    /// Same layering as [`Config::load`] with config files read from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Ok(Self::from_figment(Self::layered(dir, &env_name)))
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    fn layered(dir: &Path, env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full settings tree.
    pub fn settings(&self) -> Result<Settings> {
        self.settings_with(|_| {})
    }

    /// Extract, apply command-line `overrides`, then validate.
    pub fn settings_with(&self, overrides: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        overrides(&mut settings);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub evaluation: EvaluationSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub documents: String,
    pub questions: String,
    pub ground_truth: String,
    pub output: String,
    pub index_dir: String,
    pub vector_table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            documents: "answer_template.md".into(),
            questions: "question.csv".into(),
            ground_truth: "true_result.csv".into(),
            output: "predictions.csv".into(),
            index_dir: "./indexes".into(),
            vector_table: "chunks".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 150 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    Local,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_dir: String,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
    pub query_prefix: String,
    pub passage_prefix: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            model_dir: "models/bge-m3".into(),
            dim: 1024,
            max_len: 256,
            batch_size: 32,
            query_prefix: String::new(),
            passage_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    MinMax,
    ReciprocalRank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub top_k_dense: usize,
    pub top_k_lexical: usize,
    pub dense_weight: f32,
    pub lexical_weight: f32,
    pub fusion: FusionStrategy,
    pub rrf_k: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            top_k_dense: 20,
            top_k_lexical: 20,
            dense_weight: 0.6,
            lexical_weight: 0.4,
            fusion: FusionStrategy::MinMax,
            rrf_k: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Fixed sampling seed; `None` means unseeded generation.
    pub seed: Option<u64>,
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1".into(),
            model: "microsoft/Phi-3-mini-4k-instruct".into(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 100,
            seed: None,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub workers: usize,
    pub question_timeout_secs: u64,
    pub sampling_seed: u64,
    pub score_weight: f64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self { workers: 1, question_timeout_secs: 300, sampling_seed: 42, score_weight: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Optional JSON log file.
    pub file: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".into(), file: None }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be > 0".into()));
        }
        if c.overlap >= c.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                c.overlap, c.chunk_size
            )));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into()));
        }
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be > 0".into()));
        }
        if r.top_k_dense == 0 && r.top_k_lexical == 0 {
            return Err(Error::InvalidConfig(
                "at least one of retrieval.top_k_dense and retrieval.top_k_lexical must be > 0".into(),
            ));
        }
        if !(r.dense_weight >= 0.0 && r.lexical_weight >= 0.0) || r.dense_weight + r.lexical_weight <= 0.0 {
            return Err(Error::InvalidConfig("retrieval weights must be non-negative and not both zero".into()));
        }
        if r.rrf_k.is_nan() || r.rrf_k < 0.0 {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be >= 0".into()));
        }
        if self.generation.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("generation.endpoint must not be empty".into()));
        }
        let e = &self.evaluation;
        if e.workers == 0 {
            return Err(Error::InvalidConfig("evaluation.workers must be >= 1".into()));
        }
        if e.question_timeout_secs == 0 {
            return Err(Error::InvalidConfig("evaluation.question_timeout_secs must be > 0".into()));
        }
        if !(e.score_weight.is_finite() && e.score_weight >= 0.0) {
            return Err(Error::InvalidConfig("evaluation.score_weight must be a finite non-negative number".into()));
        }
        Ok(())
    }

    pub fn index_dir(&self) -> PathBuf {
        expand_path(&self.data.index_dir)
    }

    pub fn tantivy_dir(&self) -> PathBuf {
        self.index_dir().join("tantivy")
    }

    pub fn lancedb_dir(&self) -> PathBuf {
        self.index_dir().join("lancedb")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.index_dir().join("index_manifest.json")
    }

    pub fn output_path(&self) -> PathBuf {
        expand_path(&self.data.output)
    }

    /// `<stem>_evaluation.json` next to the predictions file.
    pub fn summary_path(&self) -> PathBuf {
        summary_path_for(&self.output_path())
    }
}

pub fn summary_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "predictions".to_string());
    output.with_file_name(format!("{stem}_evaluation.json"))
}

/// Expand a user-provided path string:
/// - leading `~` becomes the home directory
/// - `${VAR}` and `$VAR` are substituted from the environment
///
/// The result is not canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
