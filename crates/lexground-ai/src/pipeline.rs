//! Service assembly: corpus, index, encoder and chat client, built once and
//! shared read-only by every query.

use std::sync::Arc;
use std::time::Duration;

use lexground_core::{CorpusStats, PipelineConfig, PromptPolicy};
use lexground_store::{CorpusCache, CorpusStore, FlatIndex};
use thiserror::Error;
use tracing::info;

use crate::answer::{GroundedAnswer, GroundedAnswerer};
use crate::encoder::QueryEncoder;
use crate::llm::{ChatModel, OpenAiCompatClient};
use crate::retriever::{RetrievalResult, Retriever};
use crate::{GenerationError, RetrievalError, StartupError};

/// Environment variable holding the generative model credential.
pub const API_KEY_VAR: &str = "GROQ_API_KEY";

/// Either stage of [`Pipeline::ask`] can fail independently.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Retrieved provisions together with the model's grounded answer.
#[derive(Debug, Clone)]
pub struct Consultation {
    pub retrieval: RetrievalResult,
    pub answer: GroundedAnswer,
}

/// The assembled question-answering pipeline.
#[derive(Clone)]
pub struct Pipeline {
    retriever: Retriever,
    answerer: GroundedAnswerer,
    default_k: usize,
}

impl Pipeline {
    /// Assemble from already-constructed services.
    ///
    /// Builds the index over the corpus and checks the encoder against it.
    pub fn assemble(
        config: &PipelineConfig,
        policy: PromptPolicy,
        corpus: Arc<CorpusStore>,
        encoder: Arc<dyn QueryEncoder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let index = Arc::new(FlatIndex::build(corpus.embeddings()));
        let retriever = Retriever::new(corpus, index, encoder)?;
        let answerer = GroundedAnswerer::new(
            chat,
            &config.llm_model,
            config.max_tokens,
            Duration::from_secs(config.request_timeout_secs),
            policy,
        );
        info!(
            llm = %config.llm_model,
            default_k = config.default_k,
            "pipeline ready"
        );
        Ok(Self {
            retriever,
            answerer,
            default_k: config.default_k,
        })
    }

    /// Assemble over the corpus held by `cache`, loading it on first use.
    pub fn from_cache(
        config: &PipelineConfig,
        policy: PromptPolicy,
        cache: &CorpusCache,
        encoder: Arc<dyn QueryEncoder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let corpus = cache.get_or_load()?;
        Self::assemble(config, policy, corpus, encoder, chat)
    }

    /// Build every service from configuration, in order: config, credential,
    /// corpus, encoder, HTTP client. The corpus comes from `cache`, so a
    /// process that rebuilds its pipeline reads the artifacts only once.
    #[cfg(feature = "onnx")]
    pub fn from_config(
        config: &PipelineConfig,
        policy: PromptPolicy,
        cache: &CorpusCache,
        api_key: Option<&str>,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let api_key = require_credential(api_key)?;
        let corpus = cache.get_or_load()?;
        let encoder = crate::Embedder::load(
            &config.encoder_model_dir,
            &config.encoder_model_name,
            config.max_seq_len,
        )
        .map_err(|e| StartupError::Encoder(format!("{e:#}")))?;
        let chat = http_chat_model(config, api_key)?;
        Self::assemble(config, policy, corpus, Arc::new(encoder), chat)
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn stats(&self) -> CorpusStats {
        self.retriever.corpus_stats()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn answerer(&self) -> &GroundedAnswerer {
        &self.answerer
    }

    /// Retrieve with `k`, or the configured default when `None`.
    pub fn retrieve(
        &self,
        question: &str,
        k: Option<usize>,
    ) -> Result<RetrievalResult, RetrievalError> {
        self.retriever
            .retrieve(question, k.unwrap_or(self.default_k))
    }

    /// Retrieve, then answer strictly from the retrieved context.
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<Consultation, AskError> {
        let retrieval = self.retrieve(question, k)?;
        let answer = self.answerer.answer(&retrieval.context, question).await?;
        Ok(Consultation { retrieval, answer })
    }
}

/// A present, non-blank credential, or [`StartupError::MissingCredential`].
pub fn require_credential(api_key: Option<&str>) -> Result<String, StartupError> {
    match api_key.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(StartupError::MissingCredential(API_KEY_VAR)),
    }
}

/// The HTTP chat client described by `config`.
pub fn http_chat_model(
    config: &PipelineConfig,
    api_key: String,
) -> Result<Arc<dyn ChatModel>, StartupError> {
    let client = OpenAiCompatClient::new(
        &config.llm_base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )
    .map_err(StartupError::HttpClient)?;
    Ok(Arc::new(client))
}
