//! Shared pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENCODER_MODEL: &str = "all-mpnet-base-v2";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_K: usize = 6;
pub const DEFAULT_MAX_TOKENS: u32 = 350;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Paths and model settings needed to assemble the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `(N, D)` embedding matrix: `.npy` or `.parquet`.
    pub embeddings_path: PathBuf,
    /// JSON array of N provision records, index-aligned with the matrix.
    pub records_path: PathBuf,
    /// Directory containing `model.onnx` and `tokenizer.json`.
    pub encoder_model_dir: PathBuf,
    pub encoder_model_name: String,
    pub max_seq_len: usize,
    pub llm_model: String,
    pub llm_base_url: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub default_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embeddings_path: PathBuf::from("data/final_legal_embeddings.npy"),
            records_path: PathBuf::from("data/final_legal_laws_metadata.json"),
            encoder_model_dir: PathBuf::from("models").join(DEFAULT_ENCODER_MODEL),
            encoder_model_name: DEFAULT_ENCODER_MODEL.to_string(),
            max_seq_len: 384,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: 30,
            default_k: DEFAULT_K,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_k == 0 {
            return Err(ConfigError::Zero {
                field: "default_k",
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Zero {
                field: "max_tokens",
            });
        }
        if self.max_seq_len == 0 {
            return Err(ConfigError::Zero {
                field: "max_seq_len",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "request_timeout_secs",
            });
        }
        if self.llm_model.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "llm_model",
            });
        }
        if self.llm_base_url.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "llm_base_url",
            });
        }
        Ok(())
    }
}

/// The authority the answerer is bound to and its mandated refusal sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPolicy {
    /// Full title used in the rule preamble.
    pub authority: String,
    /// Emitted verbatim when the context does not answer the question.
    pub refusal: String,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        Self {
            authority: "National Penal Code of Nepal, 2017".to_string(),
            refusal: "The provided sections of the National Penal Code, 2017 do not mention this."
                .to_string(),
        }
    }
}
