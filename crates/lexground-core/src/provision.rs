//! Statutory provision records and their citation labels.
//!
//! Records arrive as a JSON array whose `chapter`, `section` and `subsection`
//! fields are loosely typed: strings, integers, floats, `null`, or missing
//! entirely. Identifiers are normalised once at deserialisation time so the
//! rest of the pipeline only ever sees `Option<String>`:
//!
//! - `null`, a missing key, `""` (after trimming) and the literal `"null"`
//!   all become `None`
//! - integers and integral floats are rendered without a fractional part
//!   (`41` and `41.0` both become `"41"`)

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

/// Fallback shown when a provision carries no chapter, section or sub-section.
pub const CITATION_NOT_AVAILABLE: &str = "Citation not available";

/// One citable unit of statutory text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRecord {
    #[serde(default, deserialize_with = "deserialize_ident")]
    pub chapter: Option<String>,
    #[serde(default, deserialize_with = "deserialize_ident")]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "deserialize_ident")]
    pub subsection: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub section_title: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub text: String,
}

/// Identity of a provision for deduplication: `(section, subsection)`.
///
/// Chapter is deliberately not part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProvisionKey<'a> {
    pub section: Option<&'a str>,
    pub subsection: Option<&'a str>,
}

impl ProvisionRecord {
    /// Build a record, normalising the identifiers the same way deserialisation does.
    pub fn new(
        chapter: Option<&str>,
        section: Option<&str>,
        subsection: Option<&str>,
        section_title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chapter: chapter.and_then(normalize_ident),
            section: section.and_then(normalize_ident),
            subsection: subsection.and_then(normalize_ident),
            section_title: section_title.into(),
            text: text.into(),
        }
    }

    pub fn key(&self) -> ProvisionKey<'_> {
        ProvisionKey {
            section: self.section.as_deref(),
            subsection: self.subsection.as_deref(),
        }
    }

    /// Join the present parts as `Chapter {c}, Section {s}, Sub-section {ss}`.
    ///
    /// Absent parts are skipped. Returns an empty string when nothing is present;
    /// use [`format_citation`](Self::format_citation) for display.
    pub fn citation_label(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(chapter) = &self.chapter {
            parts.push(format!("Chapter {chapter}"));
        }
        if let Some(section) = &self.section {
            parts.push(format!("Section {section}"));
        }
        if let Some(subsection) = &self.subsection {
            parts.push(format!("Sub-section {subsection}"));
        }
        parts.join(", ")
    }

    /// Citation for display, falling back to [`CITATION_NOT_AVAILABLE`].
    pub fn format_citation(&self) -> String {
        let label = self.citation_label();
        if label.is_empty() {
            CITATION_NOT_AVAILABLE.to_string()
        } else {
            label
        }
    }
}

/// Read-only corpus figures for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub total_provisions: usize,
    /// Distinct present chapter identifiers. Records without a chapter are not counted.
    pub distinct_chapters: usize,
}

impl CorpusStats {
    pub fn from_records(records: &[ProvisionRecord]) -> Self {
        let chapters: HashSet<&str> = records.iter().filter_map(|r| r.chapter.as_deref()).collect();
        Self {
            total_provisions: records.len(),
            distinct_chapters: chapters.len(),
        }
    }
}

/// Collapse the absent spellings (`""`, whitespace, `"null"`) into `None`.
pub fn normalize_ident(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── Deserialisation helpers ──

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdent {
    Text(String),
    Int(i64),
    Float(f64),
}

fn deserialize_ident<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawIdent>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(RawIdent::Text(s)) => normalize_ident(&s),
        Some(RawIdent::Int(n)) => Some(n.to_string()),
        Some(RawIdent::Float(f)) if f.is_finite() && f.fract() == 0.0 => Some(format!("{f:.0}")),
        Some(RawIdent::Float(f)) => Some(f.to_string()),
    })
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
