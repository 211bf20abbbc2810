//! Newscube Core - Domain models, errors, and configuration
//!
//! This crate defines the shared types used throughout the newscube
//! pipeline:
//! - Input records and per-document enrichment results
//! - Tag taxonomy and company registry shapes
//! - Star-schema table rows (fact, dimensions, bridges)
//! - Common error types and the run summary
//! - Configuration management

pub mod config;

pub use config::{ConfigError, LoggingConfig, PipelineConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for pipeline operations
#[derive(Error, Debug)]
pub enum CubeError {
    /// A column the pipeline cannot run without is absent from the input
    #[error("Required column not found in input: {0}")]
    MissingColumn(String),

    /// Input dataset produced no usable rows
    #[error("Input produced no well-formed rows")]
    EmptyInput,

    /// Reading or decoding an input file failed
    #[error("Ingestion error: {0}")]
    Ingest(String),

    /// Tag taxonomy could not be loaded or resolved
    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    /// Company registry could not be loaded
    #[error("Registry error: {0}")]
    Registry(String),

    /// Star-schema assembly failed
    #[error("Schema assembly error: {0}")]
    Schema(String),

    /// Writing an output artifact failed
    #[error("Output error: {0}")]
    Output(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CubeError>;

// ============================================================================
// Surrogate Key Bases
// ============================================================================

/// First Tag_Key assigned to the tag dimension
pub const TAG_KEY_BASE: i64 = 10;

/// First Entity_Key assigned to the entity dimension
pub const ENTITY_KEY_BASE: i64 = 200;

/// Fact_ID of the first fact row; subsequent rows increment by one
pub const FACT_ID_BASE: i64 = 1000;

/// Date_Key used when a publication date is absent or unparseable
pub const SENTINEL_DATE_KEY: i32 = 19_000_101;

// ============================================================================
// Input Records
// ============================================================================

/// One cleaned news-article record from the input dataset.
///
/// Produced by ingestion and read-only afterwards. Field contents come
/// straight from the source columns; parsing (dates, sentiment) happens
/// downstream so that a bad value in one field never drops the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Unique document identifier from the source system
    pub document_id: String,

    /// Raw publication date as it appeared in the input (may be empty)
    pub date: String,

    /// Source/publication name
    pub source: String,

    pub headline: String,

    /// Body, abstract, or extract text
    pub body: String,

    /// Consolidated/tagged text view produced upstream
    pub consolidated_text: String,

    /// Pre-existing keyword hints, delimiter-separated
    pub keyword_hints: String,

    pub news_link: String,

    /// Cleaned text produced by the upstream lemmatization stage
    pub cleaned_text: String,

    /// Sentiment score produced upstream, when present and numeric
    pub sentiment_score: Option<f64>,

    pub qc_status: String,
}

/// Normalized text views of one article, recomputed per batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub headline: String,
    pub body: String,
    pub consolidated: String,
    /// headline + body + consolidated (consolidated skipped when it
    /// duplicates the body); the primary search surface
    pub combined: String,
}

// ============================================================================
// Enrichment Results
// ============================================================================

/// A taxonomy tag detected in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMatch {
    pub tag: String,
    /// Match confidence in [0, 1]; the maximum over all strategies that fired
    pub confidence: f64,
}

/// An organization name detected in a document, before dimension-key
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCandidate {
    /// Longest/most complete surface form seen for this identity
    pub name: String,
    pub entity_type: String,
    /// Extraction confidence in [0, 1]
    pub confidence: f64,
    /// Word-boundary mention count in the article text
    pub mentions: u32,
}

/// One article plus everything the extraction stages attached to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub record: ArticleRecord,
    pub tags: Vec<TagMatch>,
    pub entities: Vec<EntityCandidate>,
}

// ============================================================================
// Taxonomy and Registry
// ============================================================================

/// One resolved tag definition from the taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagDefinition {
    pub name: String,
    /// e.g. "Event", "Therapy", "Clinical"
    pub category: String,
    /// e.g. "Business", "Healthcare"
    pub domain: String,
    /// Lowercase keywords that indicate this tag
    pub keywords: Vec<String>,
    /// When set, the loader splits this definition into one tag per keyword
    pub individually: bool,
}

impl TagDefinition {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            domain: domain.into(),
            keywords: Vec::new(),
            individually: false,
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// One known-company entry from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub entity_type: String,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }
}

// ============================================================================
// Star Schema Rows
// ============================================================================

/// One row of Dim_Time, keyed by YYYYMMDD integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRow {
    pub date_key: i32,
    pub year: i32,
    /// "Q1".."Q4"
    pub quarter: String,
    /// English month name
    pub month: String,
    pub month_number: u32,
    pub day: u32,
    pub day_of_week: String,
    pub week_of_year: u32,
    /// ISO date string for easy filtering
    pub date_string: String,
}

/// One row of Dim_Source, keyed sequentially from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub source_key: i64,
    pub source_name: String,
    pub source_type: String,
}

/// One row of Dim_Tag, keyed sequentially from [`TAG_KEY_BASE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRow {
    pub tag_key: i64,
    pub tag_name: String,
    pub tag_category: String,
    pub tag_domain: String,
}

/// One row of Dim_Entity, keyed sequentially from [`ENTITY_KEY_BASE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub entity_key: i64,
    pub entity_name: String,
    pub entity_type: String,
    pub entity_domain: String,
}

/// One row of Fact_Document: one input document, with denormalized
/// time/source snapshot columns for analytic convenience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub fact_id: i64,
    pub document_id: String,

    // Foreign keys
    pub date_key: i32,
    pub source_key: i64,

    // Denormalized dimension snapshot
    pub year: Option<i32>,
    pub quarter: Option<String>,
    pub month: Option<String>,
    pub date_string: String,
    pub source_name: String,
    pub source_type: String,

    // Carried article content
    pub headline: String,
    pub body_text: String,
    pub news_link: String,
    pub cleaned_text: String,
    pub consolidated_text: String,
    pub matched_keywords: String,
    pub sentiment_score: Option<f64>,
    pub qc_status: String,

    // Measures
    pub document_count: u32,
    pub tag_count: u32,
    /// "Yes" iff tag_count > 0
    pub has_key_event: String,
}

/// One Fact↔Tag bridge row carrying the match confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagBridgeRow {
    pub fact_id: i64,
    pub tag_key: i64,
    pub confidence: f64,
}

/// One Fact↔Entity bridge row carrying the mention count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBridgeRow {
    pub fact_id: i64,
    pub entity_key: i64,
    pub mention_count: u32,
}

/// One row of the rejected-entity audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntityRow {
    pub rejected_entity: String,
    pub occurrence_count: u64,
    pub reason: String,
}

// ============================================================================
// Assembled Output
// ============================================================================

/// The complete star schema: one fact table, four dimensions, two bridges.
///
/// All tables are assembled in memory before anything is written, so a
/// failed run never leaves a partial schema on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StarSchema {
    pub fact_document: Vec<FactRow>,
    pub dim_time: Vec<TimeRow>,
    pub dim_source: Vec<SourceRow>,
    pub dim_tag: Vec<TagRow>,
    pub dim_entity: Vec<EntityRow>,
    pub bridge_fact_tag: Vec<TagBridgeRow>,
    pub bridge_fact_entity: Vec<EntityBridgeRow>,
}

impl StarSchema {
    /// Total rows across all tables
    pub fn total_rows(&self) -> usize {
        self.fact_document.len()
            + self.dim_time.len()
            + self.dim_source.len()
            + self.dim_tag.len()
            + self.dim_entity.len()
            + self.bridge_fact_tag.len()
            + self.bridge_fact_entity.len()
    }
}

/// Counts and diagnostics from one pipeline run, written alongside the
/// schema as a JSON side artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Well-formed rows processed
    pub total_rows: usize,
    /// Rows dropped for column-count mismatch
    pub skipped_rows: usize,
    pub batch_count: usize,

    pub facts: usize,
    pub time_periods: usize,
    pub sources: usize,
    pub tags: usize,
    pub entities: usize,
    pub tag_relationships: usize,
    pub entity_relationships: usize,

    /// Document-level entity names that failed all resolution tiers
    pub unresolved_entities: usize,
    /// Up to ten unresolved names, for audit
    pub unresolved_sample: Vec<String>,
    /// Candidate names rejected during extraction (unique)
    pub rejected_candidates: usize,

    pub elapsed_secs: f64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_definition_builder() {
        let def = TagDefinition::new("acquisition", "Event", "Business")
            .with_keywords(["acquisition", "acquire", "buy"]);

        assert_eq!(def.name, "acquisition");
        assert_eq!(def.keywords.len(), 3);
        assert!(!def.individually);
    }

    #[test]
    fn test_star_schema_total_rows() {
        let mut schema = StarSchema::default();
        assert_eq!(schema.total_rows(), 0);

        schema.dim_tag.push(TagRow {
            tag_key: TAG_KEY_BASE,
            tag_name: "merger".into(),
            tag_category: "Event".into(),
            tag_domain: "Business".into(),
        });
        schema.bridge_fact_tag.push(TagBridgeRow {
            fact_id: FACT_ID_BASE,
            tag_key: TAG_KEY_BASE,
            confidence: 0.9,
        });

        assert_eq!(schema.total_rows(), 2);
    }

    #[test]
    fn test_error_display() {
        let err = CubeError::MissingColumn("Body".to_string());
        assert!(err.to_string().contains("Body"));
    }
}
