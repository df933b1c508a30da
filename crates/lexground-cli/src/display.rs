//! Plain-text rendering of retrieval results and answers.

use lexground_ai::{GroundedAnswer, RetrievalResult};
use lexground_core::{CorpusStats, PipelineConfig};

const PREVIEW_CHARS: usize = 300;

pub fn print_stats(stats: &CorpusStats, config: &PipelineConfig) {
    println!("=== Corpus ===");
    println!("  {:<26} {}", "provisions", stats.total_provisions);
    println!("  {:<26} {}", "chapters", stats.distinct_chapters);
    println!("  {:<26} {}", "embedding_model", config.encoder_model_name);
    println!("  {:<26} {}", "llm_model", config.llm_model);
}

/// One card per retained provision, closest first.
pub fn print_hits(result: &RetrievalResult) {
    println!("=== Retrieved provisions ({}) ===", result.hits.len());
    if result.is_empty() {
        println!("  (none)");
        return;
    }
    for hit in &result.hits {
        println!();
        println!("{}", hit.record.format_citation());
        if !hit.record.section_title.is_empty() {
            println!("  {}", hit.record.section_title);
        }
        println!("  {:<26} {:.4}", "distance", hit.distance);
        println!("  > {}", preview(&hit.record.text, PREVIEW_CHARS));
    }
    println!();
}

pub fn print_answer(answer: &GroundedAnswer) {
    if answer.is_refusal {
        println!("=== Refused ===");
    } else {
        println!("=== Answer ===");
    }
    println!("{}", answer.answer_text);
    if let Some(source) = answer.cited_source() {
        println!();
        println!("Source: {source}");
    }
}

/// First `max` characters, with `...` appended when truncated.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
