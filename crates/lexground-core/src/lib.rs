pub mod config;
pub mod provision;

pub use config::{ConfigError, PipelineConfig, PromptPolicy};
pub use provision::{CITATION_NOT_AVAILABLE, CorpusStats, ProvisionKey, ProvisionRecord};
