mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lexground_ai::{API_KEY_VAR, Embedder, Pipeline, Retriever};
use lexground_core::{PipelineConfig, PromptPolicy};
use lexground_store::{CorpusCache, FlatIndex};

#[derive(Parser)]
#[command(
    name = "lexground",
    version,
    about = "Answer legal questions strictly from a pre-embedded statute corpus"
)]
struct Cli {
    /// JSON file with pipeline settings; flags below override it.
    #[arg(long, env = "LEXGROUND_CONFIG")]
    config: Option<PathBuf>,

    /// `(N, D)` embedding matrix (.npy or .parquet).
    #[arg(long, env = "LEXGROUND_EMBEDDINGS")]
    embeddings: Option<PathBuf>,

    /// JSON array of N provision records.
    #[arg(long, env = "LEXGROUND_RECORDS")]
    records: Option<PathBuf>,

    /// Directory with `model.onnx` and `tokenizer.json`.
    #[arg(long, env = "LEXGROUND_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Chat model name at the completion endpoint.
    #[arg(long, env = "LEXGROUND_LLM_MODEL")]
    llm_model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Corpus statistics.
    Stats,
    /// Show the provisions retrieved for a question, without generating an answer.
    Retrieve {
        question: String,
        /// Number of nearest neighbours to search.
        #[arg(short, value_parser = clap::value_parser!(u64).range(3..=10))]
        k: Option<u64>,
    },
    /// Retrieve provisions and answer strictly from them.
    Ask {
        question: String,
        #[arg(short, value_parser = clap::value_parser!(u64).range(3..=10))]
        k: Option<u64>,
        #[arg(long, env = API_KEY_VAR, hide_env_values = true)]
        api_key: Option<String>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(p) = &cli.embeddings {
        config.embeddings_path = p.clone();
    }
    if let Some(p) = &cli.records {
        config.records_path = p.clone();
    }
    if let Some(p) = &cli.model_dir {
        config.encoder_model_dir = p.clone();
    }
    if let Some(m) = &cli.llm_model {
        config.llm_model = m.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::info!("lexground v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let cache = CorpusCache::new(&config.embeddings_path, &config.records_path);

    match cli.command {
        Command::Stats => {
            let corpus = cache.get_or_load().context("loading corpus")?;
            display::print_stats(&corpus.stats(), &config);
        }
        Command::Retrieve { question, k } => {
            let corpus = cache.get_or_load().context("loading corpus")?;
            let encoder = Embedder::load(
                &config.encoder_model_dir,
                &config.encoder_model_name,
                config.max_seq_len,
            )
            .context("loading query encoder")?;
            let index = Arc::new(FlatIndex::build(corpus.embeddings()));
            let retriever = Retriever::new(corpus, index, Arc::new(encoder))?;
            let k = k.map_or(config.default_k, |k| k as usize);
            let result = retriever.retrieve(&question, k)?;
            display::print_hits(&result);
        }
        Command::Ask {
            question,
            k,
            api_key,
        } => {
            let pipeline = Pipeline::from_config(
                &config,
                PromptPolicy::default(),
                &cache,
                api_key.as_deref(),
            )?;
            let consult = pipeline
                .ask(&question, k.map(|k| k as usize))
                .await
                .context("answering question")?;
            display::print_hits(&consult.retrieval);
            display::print_answer(&consult.answer);
        }
    }

    Ok(())
}
