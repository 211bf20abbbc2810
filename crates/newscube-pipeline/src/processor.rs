//! The batch processor
//!
//! State machine with two phases. Scanning: consume chunks, enrich
//! them, and merge dates/sources/entities into deduplicating
//! accumulators. Finalizing: build the dimension tables from the sorted
//! accumulators and hand them, pre-built, to the schema builder so
//! fact/bridge resolution sees exactly the membership the accumulators
//! observed.
//!
//! Per-batch errors abort the run; malformed-row skipping in the reader
//! is the only tolerated partial failure.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use newscube_core::{
    ArticleRecord, CubeError, EnrichedArticle, PipelineConfig, RegistryEntry, RejectedEntityRow,
    Result, RunSummary, StarSchema, TagDefinition,
};
use newscube_extract::entity::{dim_candidate_wins, normalize_entity_name};
use newscube_extract::{EntityDimCandidate, EntityExtractor, TagMatcher, TextNormalizer};
use newscube_ingest::ArticleReader;
use newscube_schema::{
    build_dim_entity, build_dim_source, build_dim_tag, build_dim_time, classify_source_type,
    is_valid_source, parse_article_date, PrebuiltDimensions, StarSchemaBuilder,
};

/// Everything one pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub schema: StarSchema,
    pub rejected: Vec<RejectedEntityRow>,
    pub summary: RunSummary,
}

/// Orchestrates scanning and finalization over a batched source.
pub struct BatchProcessor {
    config: PipelineConfig,

    normalizer: TextNormalizer,
    /// None when no taxonomy was supplied; tag matching degrades to a no-op
    matcher: Option<TagMatcher>,
    extractor: EntityExtractor,
    taxonomy: Vec<TagDefinition>,

    // Accumulators, deduplicated by their identity rules
    time_acc: BTreeSet<NaiveDate>,
    source_acc: BTreeSet<(String, String)>,
    /// normalized name -> best candidate seen so far
    entity_acc: HashMap<String, EntityDimCandidate>,
    rejected_acc: HashMap<String, u64>,

    batches: Vec<Vec<EnrichedArticle>>,
    total_rows: usize,
    skipped_rows: usize,
    batch_count: usize,
    started: Instant,
}

impl BatchProcessor {
    pub fn new(
        config: PipelineConfig,
        taxonomy: Vec<TagDefinition>,
        registry: Vec<RegistryEntry>,
    ) -> Self {
        let matcher = if taxonomy.is_empty() {
            warn!("no tag taxonomy supplied; tag matching disabled for this run");
            None
        } else {
            Some(TagMatcher::new(taxonomy.clone()))
        };

        if registry.is_empty() {
            warn!("no company registry supplied; registry-based entity strategies disabled");
        }
        let extractor = EntityExtractor::new().with_registry(&registry);

        info!(batch_size = config.batch_size, "initialized batch processor");

        Self {
            config,
            normalizer: TextNormalizer::new(),
            matcher,
            extractor,
            taxonomy,
            time_acc: BTreeSet::new(),
            source_acc: BTreeSet::new(),
            entity_acc: HashMap::new(),
            rejected_acc: HashMap::new(),
            batches: Vec::new(),
            total_rows: 0,
            skipped_rows: 0,
            batch_count: 0,
            started: Instant::now(),
        }
    }

    /// Run the whole pipeline over a CSV source file.
    pub fn run_file(mut self, path: impl AsRef<Path>) -> Result<PipelineOutput> {
        let mut reader = ArticleReader::open(path, self.config.batch_size)?;

        while let Some(batch) = reader.read_batch()? {
            self.process_batch(batch)?;
        }
        self.skipped_rows = reader.rows_skipped();

        self.finalize()
    }

    /// Scanning phase: enrich one chunk and merge it into the
    /// accumulators.
    pub fn process_batch(&mut self, records: Vec<ArticleRecord>) -> Result<()> {
        self.batch_count += 1;
        self.total_rows += records.len();

        let normalized = self.normalizer.normalize_batch(&records);

        let tags: Vec<_> = match &self.matcher {
            Some(matcher) => records
                .iter()
                .zip(&normalized)
                .map(|(record, norm)| matcher.match_article(record, norm))
                .collect(),
            None => records.iter().map(|_| Vec::new()).collect(),
        };

        let extraction = self.extractor.extract_batch(&records, &normalized);

        self.accumulate_dimensions(&records, extraction.dimension_candidates);
        for (name, count) in extraction.rejected {
            *self.rejected_acc.entry(name).or_default() += count;
        }

        let enriched: Vec<EnrichedArticle> = records
            .into_iter()
            .zip(tags)
            .zip(extraction.documents)
            .map(|((record, tags), entities)| EnrichedArticle {
                record,
                tags,
                entities,
            })
            .collect();

        info!(
            batch = self.batch_count,
            rows = enriched.len(),
            total = self.total_rows,
            "processed batch"
        );
        self.batches.push(enriched);

        Ok(())
    }

    /// Merge one chunk's dates, sources, and entity candidates into the
    /// global accumulators.
    fn accumulate_dimensions(
        &mut self,
        records: &[ArticleRecord],
        entity_candidates: Vec<EntityDimCandidate>,
    ) {
        for record in records {
            if let Some(date) = parse_article_date(&record.date) {
                self.time_acc.insert(date);
            }

            let source = record.source.trim();
            if is_valid_source(source) {
                self.source_acc
                    .insert((source.to_string(), classify_source_type(source).to_string()));
            }
        }

        for candidate in entity_candidates {
            let key = normalize_entity_name(&candidate.name);
            if key.is_empty() {
                continue;
            }
            match self.entity_acc.get_mut(&key) {
                Some(existing) => {
                    if dim_candidate_wins(&candidate.name, candidate.confidence, existing) {
                        *existing = candidate;
                    }
                }
                None => {
                    self.entity_acc.insert(key, candidate);
                }
            }
        }
    }

    /// Finalizing phase: derive the dimension tables and assemble the
    /// star schema. Runs exactly once, after the last batch.
    pub fn finalize(self) -> Result<PipelineOutput> {
        if self.batches.is_empty() {
            return Err(CubeError::EmptyInput);
        }

        let articles: Vec<EnrichedArticle> = self.batches.into_iter().flatten().collect();
        info!(
            batches = self.batch_count,
            articles = articles.len(),
            "combining processed batches"
        );

        let dim_time = build_dim_time(&self.time_acc);
        let dim_source = build_dim_source(&self.source_acc);
        let dim_tag = build_dim_tag(&self.taxonomy);

        let mut entity_candidates: Vec<(String, String)> = self
            .entity_acc
            .into_values()
            .map(|c| (c.name, c.entity_type))
            .collect();
        entity_candidates.sort();
        let dim_entity = build_dim_entity(&entity_candidates, &self.config.entity_domain);

        let dims = PrebuiltDimensions {
            dim_time,
            dim_source,
            dim_tag,
            dim_entity,
        };

        let builder = StarSchemaBuilder::new();
        let (schema, report) = builder.build_all(&articles, dims);

        let mut rejected: Vec<RejectedEntityRow> = self
            .rejected_acc
            .into_iter()
            .map(|(name, count)| RejectedEntityRow {
                rejected_entity: name,
                occurrence_count: count,
                reason: "Failed validation (not recognized as company name)".to_string(),
            })
            .collect();
        rejected.sort_by(|a, b| {
            b.occurrence_count
                .cmp(&a.occurrence_count)
                .then_with(|| a.rejected_entity.cmp(&b.rejected_entity))
        });

        let summary = RunSummary {
            total_rows: self.total_rows,
            skipped_rows: self.skipped_rows,
            batch_count: self.batch_count,
            facts: schema.fact_document.len(),
            time_periods: schema.dim_time.len(),
            sources: schema.dim_source.len(),
            tags: schema.dim_tag.len(),
            entities: schema.dim_entity.len(),
            tag_relationships: schema.bridge_fact_tag.len(),
            entity_relationships: schema.bridge_fact_entity.len(),
            unresolved_entities: report.unresolved_entities,
            unresolved_sample: report.unresolved_sample,
            rejected_candidates: rejected.len(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        };

        info!(
            facts = summary.facts,
            entities = summary.entities,
            unresolved = summary.unresolved_entities,
            elapsed_secs = summary.elapsed_secs,
            "pipeline run complete"
        );

        Ok(PipelineOutput {
            schema,
            rejected,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, date: &str, source: &str, headline: &str, body: &str, hints: &str) -> ArticleRecord {
        ArticleRecord {
            document_id: id.to_string(),
            date: date.to_string(),
            source: source.to_string(),
            headline: headline.to_string(),
            body: body.to_string(),
            keyword_hints: hints.to_string(),
            ..Default::default()
        }
    }

    fn taxonomy() -> Vec<TagDefinition> {
        vec![TagDefinition::new("acquisition", "Event", "Business").with_keywords([
            "acquisition",
            "acquire",
            "acquired",
            "buy",
        ])]
    }

    fn registry() -> Vec<RegistryEntry> {
        vec![
            RegistryEntry::new("Pfizer", "Company"),
            RegistryEntry::new("Reata Pharmaceuticals", "Company"),
        ]
    }

    fn sample_records() -> Vec<ArticleRecord> {
        vec![
            record(
                "d1",
                "2024-01-15",
                "BioSpace",
                "Pfizer announced acquisition of biotech",
                "Pfizer announced acquisition of a biotech company. The acquisition closed.",
                "Pfizer Inc; acquisition",
            ),
            record(
                "d2",
                "2024-02-20",
                "Fierce Pharma",
                "Reata results",
                "Reata Pharmaceuticals reported results.",
                "Reata Pharmaceuticals",
            ),
            record(
                "d3",
                "not-a-date",
                "BioSpace",
                "Quiet day",
                "Nothing notable happened.",
                "",
            ),
        ]
    }

    fn run_with_batch_size(batch_size: usize) -> PipelineOutput {
        let config = PipelineConfig::default().with_batch_size(batch_size);
        let mut processor = BatchProcessor::new(config, taxonomy(), registry());

        for chunk in sample_records().chunks(batch_size) {
            processor.process_batch(chunk.to_vec()).unwrap();
        }
        processor.finalize().unwrap()
    }

    #[test]
    fn test_fact_cardinality_matches_input() {
        let output = run_with_batch_size(2);
        assert_eq!(output.schema.fact_document.len(), 3);
        assert_eq!(output.summary.facts, 3);
    }

    #[test]
    fn test_determinism_across_batch_sizes() {
        let small = run_with_batch_size(1);
        let large = run_with_batch_size(100);

        assert_eq!(small.schema.dim_time, large.schema.dim_time);
        assert_eq!(small.schema.dim_source, large.schema.dim_source);
        assert_eq!(small.schema.dim_tag, large.schema.dim_tag);
        assert_eq!(small.schema.dim_entity, large.schema.dim_entity);
        assert_eq!(
            small.schema.fact_document.len(),
            large.schema.fact_document.len()
        );
        assert_eq!(small.schema.bridge_fact_tag, large.schema.bridge_fact_tag);
        assert_eq!(
            small.schema.bridge_fact_entity,
            large.schema.bridge_fact_entity
        );
    }

    #[test]
    fn test_sentinel_date_for_unparseable() {
        let output = run_with_batch_size(10);
        let fact = output
            .schema
            .fact_document
            .iter()
            .find(|f| f.document_id == "d3")
            .unwrap();

        assert_eq!(fact.date_key, newscube_core::SENTINEL_DATE_KEY);
        // Only the two parseable dates made it into the dimension
        assert_eq!(output.schema.dim_time.len(), 2);
    }

    #[test]
    fn test_source_accumulation_filters_invalid() {
        let config = PipelineConfig::default();
        let mut processor = BatchProcessor::new(config, taxonomy(), registry());

        processor
            .process_batch(vec![
                record("d1", "2024-01-01", "BioSpace", "h", "body text", ""),
                record("d2", "2024-01-02", "12345", "h", "body text", ""),
                record("d3", "2024-01-03", "x", "h", "body text", ""),
            ])
            .unwrap();
        let output = processor.finalize().unwrap();

        assert_eq!(output.schema.dim_source.len(), 1);
        assert_eq!(output.schema.dim_source[0].source_name, "BioSpace");
    }

    #[test]
    fn test_entity_dimension_deduplicates_aliases() {
        let config = PipelineConfig::default();
        let mut processor = BatchProcessor::new(config, taxonomy(), registry());

        // Same identity through two surface forms, in different batches
        processor
            .process_batch(vec![record(
                "d1",
                "2024-01-01",
                "BioSpace",
                "h",
                "Pfizer Inc announced something.",
                "Pfizer Inc",
            )])
            .unwrap();
        processor
            .process_batch(vec![record(
                "d2",
                "2024-01-02",
                "BioSpace",
                "h",
                "Pfizer announced more.",
                "Pfizer",
            )])
            .unwrap();
        let output = processor.finalize().unwrap();

        let pfizer_rows: Vec<_> = output
            .schema
            .dim_entity
            .iter()
            .filter(|e| normalize_entity_name(&e.entity_name) == "pfizer")
            .collect();
        assert_eq!(pfizer_rows.len(), 1);
        // Both documents bridge to the single canonical row
        let key = pfizer_rows[0].entity_key;
        assert_eq!(
            output
                .schema
                .bridge_fact_entity
                .iter()
                .filter(|b| b.entity_key == key)
                .count(),
            2
        );
    }

    #[test]
    fn test_bridge_referential_integrity() {
        let output = run_with_batch_size(2);

        let tag_keys: std::collections::BTreeSet<i64> =
            output.schema.dim_tag.iter().map(|r| r.tag_key).collect();
        let entity_keys: std::collections::BTreeSet<i64> =
            output.schema.dim_entity.iter().map(|r| r.entity_key).collect();

        assert!(!output.schema.bridge_fact_tag.is_empty());
        assert!(output
            .schema
            .bridge_fact_tag
            .iter()
            .all(|r| tag_keys.contains(&r.tag_key)));
        assert!(output
            .schema
            .bridge_fact_entity
            .iter()
            .all(|r| entity_keys.contains(&r.entity_key)));
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let processor = BatchProcessor::new(PipelineConfig::default(), taxonomy(), registry());
        assert!(matches!(processor.finalize(), Err(CubeError::EmptyInput)));
    }

    #[test]
    fn test_missing_taxonomy_degrades_tag_matching() {
        let mut processor =
            BatchProcessor::new(PipelineConfig::default(), Vec::new(), registry());
        processor.process_batch(sample_records()).unwrap();
        let output = processor.finalize().unwrap();

        assert!(output.schema.dim_tag.is_empty());
        assert!(output.schema.bridge_fact_tag.is_empty());
        // Facts still exist; only enrichment density dropped
        assert_eq!(output.schema.fact_document.len(), 3);
        assert!(output
            .schema
            .fact_document
            .iter()
            .all(|f| f.has_key_event == "No"));
    }

    #[test]
    fn test_rejected_candidates_reported() {
        let mut processor =
            BatchProcessor::new(PipelineConfig::default(), taxonomy(), registry());
        processor
            .process_batch(vec![record(
                "d1",
                "2024-01-01",
                "BioSpace",
                "h",
                "body",
                "Oncology; Pfizer Inc",
            )])
            .unwrap();
        let output = processor.finalize().unwrap();

        assert_eq!(output.rejected.len(), 1);
        assert_eq!(output.rejected[0].rejected_entity, "Oncology");
        assert_eq!(output.rejected[0].occurrence_count, 1);
        assert_eq!(output.summary.rejected_candidates, 1);
    }
}
