//! AI layer: query encoding (ONNX Runtime), grounded retrieval, and the
//! refusal-bound generative answerer.

mod error;
pub use error::{EncodeError, GenerationError, RetrievalError, StartupError};

pub mod encoder;
pub use encoder::QueryEncoder;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
pub use embedder::Embedder;

pub mod retriever;
pub use retriever::{RetrievalHit, RetrievalResult, Retriever, build_context};

pub mod prompt;

pub mod answer;
pub use answer::{GroundedAnswer, GroundedAnswerer, TEMPERATURE, parse_response};

pub mod llm;
pub use llm::{ChatMessage, ChatModel, ChatRequest, OpenAiCompatClient};

mod pipeline;
pub use pipeline::{
    API_KEY_VAR, AskError, Consultation, Pipeline, http_chat_model, require_credential,
};
