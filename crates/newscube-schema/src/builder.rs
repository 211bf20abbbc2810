//! Star-schema assembly
//!
//! Builds the fact table and both bridge tables from enriched articles
//! and pre-built dimension tables, then back-fills the fact-level
//! aggregates. The pre-built-dimension hand-off is the consistency
//! guarantee: fact/bridge resolution uses exactly the dimension
//! membership the accumulators observed.

use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use newscube_core::{
    EnrichedArticle, EntityBridgeRow, EntityRow, FactRow, SourceRow, StarSchema, TagBridgeRow,
    TagRow, TimeRow, FACT_ID_BASE, SENTINEL_DATE_KEY,
};

use crate::dimensions::{date_key, parse_article_date, time_row};
use crate::resolver::EntityResolver;

/// Dimension tables finished before fact/bridge construction starts.
#[derive(Debug, Clone, Default)]
pub struct PrebuiltDimensions {
    pub dim_time: Vec<TimeRow>,
    pub dim_source: Vec<SourceRow>,
    pub dim_tag: Vec<TagRow>,
    pub dim_entity: Vec<EntityRow>,
}

/// Entity names that failed every resolution tier, for the run summary.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub unresolved_entities: usize,
    pub unresolved_sample: Vec<String>,
}

/// Builds the star schema from enriched articles and finished dimensions.
#[derive(Debug, Clone, Default)]
pub struct StarSchemaBuilder;

impl StarSchemaBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the complete schema: fact table, bridges, aggregates.
    ///
    /// Fact rows preserve article order. Fails never; resolution misses
    /// degrade to omitted bridge rows reported in the returned
    /// [`ResolutionReport`].
    pub fn build_all(
        &self,
        articles: &[EnrichedArticle],
        dims: PrebuiltDimensions,
    ) -> (StarSchema, ResolutionReport) {
        let mut fact_document = self.build_fact_document(articles, &dims.dim_time, &dims.dim_source);
        let bridge_fact_tag = self.build_bridge_fact_tag(&fact_document, articles, &dims.dim_tag);
        let (bridge_fact_entity, report) =
            self.build_bridge_fact_entity(&fact_document, articles, &dims.dim_entity);

        self.update_fact_counts(&mut fact_document, &bridge_fact_tag);

        info!(
            facts = fact_document.len(),
            time_periods = dims.dim_time.len(),
            sources = dims.dim_source.len(),
            tags = dims.dim_tag.len(),
            entities = dims.dim_entity.len(),
            tag_relationships = bridge_fact_tag.len(),
            entity_relationships = bridge_fact_entity.len(),
            "built star schema"
        );

        let schema = StarSchema {
            fact_document,
            dim_time: dims.dim_time,
            dim_source: dims.dim_source,
            dim_tag: dims.dim_tag,
            dim_entity: dims.dim_entity,
            bridge_fact_tag,
            bridge_fact_entity,
        };

        (schema, report)
    }

    /// One fact row per document, in source order.
    pub fn build_fact_document(
        &self,
        articles: &[EnrichedArticle],
        dim_time: &[TimeRow],
        dim_source: &[SourceRow],
    ) -> Vec<FactRow> {
        let time_by_key: HashMap<i32, &TimeRow> =
            dim_time.iter().map(|r| (r.date_key, r)).collect();
        let source_by_name: HashMap<&str, &SourceRow> = dim_source
            .iter()
            .map(|r| (r.source_name.as_str(), r))
            .collect();

        articles
            .iter()
            .enumerate()
            .map(|(idx, enriched)| {
                let record = &enriched.record;
                let parsed_date = parse_article_date(&record.date);
                let fact_date_key = parsed_date.map(date_key).unwrap_or(SENTINEL_DATE_KEY);

                // Denormalized time snapshot: dimension row first, direct
                // computation as fallback for sentinel dates
                let (year, quarter, month, date_string) = match time_by_key.get(&fact_date_key) {
                    Some(row) => (
                        Some(row.year),
                        Some(row.quarter.clone()),
                        Some(row.month.clone()),
                        row.date_string.clone(),
                    ),
                    None => match parsed_date {
                        Some(date) => {
                            let row = time_row(date);
                            (
                                Some(row.year),
                                Some(row.quarter),
                                Some(row.month),
                                row.date_string,
                            )
                        }
                        None => (None, None, None, String::new()),
                    },
                };

                let raw_source = record.source.trim();
                let (source_key, source_name, source_type) = match source_by_name.get(raw_source) {
                    Some(row) => (row.source_key, row.source_name.clone(), row.source_type.clone()),
                    None => {
                        let name = if raw_source.is_empty() {
                            "Unknown".to_string()
                        } else {
                            raw_source.to_string()
                        };
                        (1, name, "Unknown".to_string())
                    }
                };

                let document_id = if record.document_id.trim().is_empty() {
                    format!("doc_{idx}")
                } else {
                    record.document_id.clone()
                };

                FactRow {
                    fact_id: FACT_ID_BASE + idx as i64,
                    document_id,
                    date_key: fact_date_key,
                    source_key,
                    year,
                    quarter,
                    month,
                    date_string,
                    source_name,
                    source_type,
                    headline: clean_value(&record.headline),
                    body_text: clean_value(&record.body),
                    news_link: clean_value(&record.news_link),
                    cleaned_text: clean_value(&record.cleaned_text),
                    consolidated_text: clean_value(&record.consolidated_text),
                    matched_keywords: clean_value(&record.keyword_hints),
                    sentiment_score: record.sentiment_score,
                    qc_status: clean_value(&record.qc_status),
                    document_count: 1,
                    tag_count: 0,
                    has_key_event: "No".to_string(),
                }
            })
            .collect()
    }

    /// One bridge row per (document, matched tag), resolved through an
    /// exact tag-name map.
    pub fn build_bridge_fact_tag(
        &self,
        facts: &[FactRow],
        articles: &[EnrichedArticle],
        dim_tag: &[TagRow],
    ) -> Vec<TagBridgeRow> {
        let tag_to_key: HashMap<&str, i64> = dim_tag
            .iter()
            .map(|r| (r.tag_name.as_str(), r.tag_key))
            .collect();

        let mut bridge = Vec::new();
        for (fact, enriched) in facts.iter().zip(articles) {
            for tag_match in &enriched.tags {
                if let Some(&tag_key) = tag_to_key.get(tag_match.tag.as_str()) {
                    bridge.push(TagBridgeRow {
                        fact_id: fact.fact_id,
                        tag_key,
                        confidence: tag_match.confidence,
                    });
                }
            }
        }
        bridge
    }

    /// One bridge row per (document, entity), resolved through the
    /// three-tier resolver. Unresolved names are reported, not fatal.
    pub fn build_bridge_fact_entity(
        &self,
        facts: &[FactRow],
        articles: &[EnrichedArticle],
        dim_entity: &[EntityRow],
    ) -> (Vec<EntityBridgeRow>, ResolutionReport) {
        let resolver = EntityResolver::new(dim_entity);

        let mut bridge = Vec::new();
        let mut unresolved: BTreeSet<String> = BTreeSet::new();

        for (fact, enriched) in facts.iter().zip(articles) {
            for candidate in &enriched.entities {
                let name = candidate.name.trim();
                if name.is_empty() {
                    continue;
                }

                match resolver.resolve(name) {
                    Some(entity_key) => bridge.push(EntityBridgeRow {
                        fact_id: fact.fact_id,
                        entity_key,
                        mention_count: candidate.mentions.max(1),
                    }),
                    None => {
                        unresolved.insert(name.to_string());
                    }
                }
            }
        }

        if !unresolved.is_empty() {
            warn!(
                count = unresolved.len(),
                sample = ?unresolved.iter().take(10).collect::<Vec<_>>(),
                "entity names not found in Dim_Entity"
            );
        }

        let report = ResolutionReport {
            unresolved_entities: unresolved.len(),
            unresolved_sample: unresolved.into_iter().take(10).collect(),
        };

        (bridge, report)
    }

    /// Recompute Tag_Count and Has_Key_Event from the finished tag bridge.
    pub fn update_fact_counts(&self, facts: &mut [FactRow], bridge_fact_tag: &[TagBridgeRow]) {
        let mut counts: HashMap<i64, u32> = HashMap::new();
        for row in bridge_fact_tag {
            *counts.entry(row.fact_id).or_default() += 1;
        }

        for fact in facts {
            fact.tag_count = counts.get(&fact.fact_id).copied().unwrap_or(0);
            fact.has_key_event = if fact.tag_count > 0 { "Yes" } else { "No" }.to_string();
        }
    }
}

/// Fold NaN-like placeholder strings to empty.
fn clean_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("none")
    {
        String::new()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::{build_dim_entity, build_dim_source, build_dim_tag, build_dim_time};
    use chrono::NaiveDate;
    use newscube_core::{ArticleRecord, EntityCandidate, TagDefinition, TagMatch};

    fn enriched(
        id: &str,
        date: &str,
        source: &str,
        tags: Vec<TagMatch>,
        entities: Vec<EntityCandidate>,
    ) -> EnrichedArticle {
        EnrichedArticle {
            record: ArticleRecord {
                document_id: id.to_string(),
                date: date.to_string(),
                source: source.to_string(),
                headline: "headline".to_string(),
                ..Default::default()
            },
            tags,
            entities,
        }
    }

    fn dims() -> PrebuiltDimensions {
        let mut dates = BTreeSet::new();
        dates.insert(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        dates.insert(NaiveDate::from_ymd_opt(2024, 2, 20).unwrap());

        let mut sources = BTreeSet::new();
        sources.insert(("BioSpace".to_string(), "Industry".to_string()));

        PrebuiltDimensions {
            dim_time: build_dim_time(&dates),
            dim_source: build_dim_source(&sources),
            dim_tag: build_dim_tag(&[TagDefinition::new("acquisition", "Event", "Business")]),
            dim_entity: build_dim_entity(
                &[("Reata Pharmaceuticals".to_string(), "Company".to_string())],
                "Healthcare",
            ),
        }
    }

    fn tag(name: &str, confidence: f64) -> TagMatch {
        TagMatch {
            tag: name.to_string(),
            confidence,
        }
    }

    fn candidate(name: &str, mentions: u32) -> EntityCandidate {
        EntityCandidate {
            name: name.to_string(),
            entity_type: "Company".to_string(),
            confidence: 0.9,
            mentions,
        }
    }

    #[test]
    fn test_fact_cardinality_and_order() {
        let builder = StarSchemaBuilder::new();
        let articles = vec![
            enriched("doc1", "2024-01-15", "BioSpace", vec![], vec![]),
            enriched("doc2", "2024-02-20", "BioSpace", vec![], vec![]),
        ];

        let (schema, _) = builder.build_all(&articles, dims());

        assert_eq!(schema.fact_document.len(), 2);
        assert_eq!(schema.fact_document[0].fact_id, FACT_ID_BASE);
        assert_eq!(schema.fact_document[0].document_id, "doc1");
        assert_eq!(schema.fact_document[1].fact_id, FACT_ID_BASE + 1);
        assert_eq!(schema.fact_document[0].document_count, 1);
    }

    #[test]
    fn test_unparseable_date_gets_sentinel() {
        let builder = StarSchemaBuilder::new();
        let articles = vec![enriched("doc1", "not-a-date", "BioSpace", vec![], vec![])];

        let (schema, _) = builder.build_all(&articles, dims());
        let fact = &schema.fact_document[0];

        assert_eq!(fact.date_key, SENTINEL_DATE_KEY);
        assert!(fact.year.is_none());
        assert!(fact.date_string.is_empty());
        // Row still present and counted
        assert_eq!(schema.fact_document.len(), 1);
    }

    #[test]
    fn test_denormalized_time_snapshot() {
        let builder = StarSchemaBuilder::new();
        let articles = vec![enriched("doc1", "2024-02-20", "BioSpace", vec![], vec![])];

        let (schema, _) = builder.build_all(&articles, dims());
        let fact = &schema.fact_document[0];

        assert_eq!(fact.date_key, 20240220);
        assert_eq!(fact.year, Some(2024));
        assert_eq!(fact.quarter.as_deref(), Some("Q1"));
        assert_eq!(fact.month.as_deref(), Some("February"));
        assert_eq!(fact.source_key, 1);
        assert_eq!(fact.source_type, "Industry");
    }

    #[test]
    fn test_unknown_source_defaults_to_key_one() {
        let builder = StarSchemaBuilder::new();
        let articles = vec![enriched("doc1", "2024-01-15", "Obscure Blog", vec![], vec![])];

        let (schema, _) = builder.build_all(&articles, dims());
        let fact = &schema.fact_document[0];

        assert_eq!(fact.source_key, 1);
        assert_eq!(fact.source_name, "Obscure Blog");
        assert_eq!(fact.source_type, "Unknown");
    }

    #[test]
    fn test_tag_bridge_and_aggregates() {
        let builder = StarSchemaBuilder::new();
        let articles = vec![
            enriched(
                "doc1",
                "2024-01-15",
                "BioSpace",
                vec![tag("acquisition", 0.9)],
                vec![],
            ),
            enriched("doc2", "2024-02-20", "BioSpace", vec![], vec![]),
        ];

        let (schema, _) = builder.build_all(&articles, dims());

        assert_eq!(schema.bridge_fact_tag.len(), 1);
        let bridge = &schema.bridge_fact_tag[0];
        assert_eq!(bridge.tag_key, schema.dim_tag[0].tag_key);
        assert!((bridge.confidence - 0.9).abs() < 1e-9);

        assert_eq!(schema.fact_document[0].tag_count, 1);
        assert_eq!(schema.fact_document[0].has_key_event, "Yes");
        assert_eq!(schema.fact_document[1].tag_count, 0);
        assert_eq!(schema.fact_document[1].has_key_event, "No");
    }

    #[test]
    fn test_entity_bridge_tiered_resolution() {
        let builder = StarSchemaBuilder::new();
        // Two documents refer to the same dimension entity through
        // different surface forms
        let articles = vec![
            enriched(
                "doc1",
                "2024-01-15",
                "BioSpace",
                vec![],
                vec![candidate("Reata", 2)],
            ),
            enriched(
                "doc2",
                "2024-02-20",
                "BioSpace",
                vec![],
                vec![candidate("Reata Pharmaceuticals", 1)],
            ),
        ];

        let (schema, report) = builder.build_all(&articles, dims());

        assert_eq!(schema.bridge_fact_entity.len(), 2);
        let key = schema.dim_entity[0].entity_key;
        assert!(schema.bridge_fact_entity.iter().all(|r| r.entity_key == key));
        assert_eq!(schema.bridge_fact_entity[0].mention_count, 2);
        assert_eq!(report.unresolved_entities, 0);
    }

    #[test]
    fn test_unresolved_entity_reported_not_fatal() {
        let builder = StarSchemaBuilder::new();
        let articles = vec![enriched(
            "doc1",
            "2024-01-15",
            "BioSpace",
            vec![],
            vec![candidate("Completely Unknown Gmbh", 1)],
        )];

        let (schema, report) = builder.build_all(&articles, dims());

        assert!(schema.bridge_fact_entity.is_empty());
        assert_eq!(report.unresolved_entities, 1);
        assert_eq!(report.unresolved_sample[0], "Completely Unknown Gmbh");
        // The fact row itself is unaffected
        assert_eq!(schema.fact_document.len(), 1);
    }

    #[test]
    fn test_bridge_referential_integrity() {
        let builder = StarSchemaBuilder::new();
        let articles = vec![enriched(
            "doc1",
            "2024-01-15",
            "BioSpace",
            vec![tag("acquisition", 0.8)],
            vec![candidate("Reata Pharmaceuticals", 3)],
        )];

        let (schema, _) = builder.build_all(&articles, dims());

        let tag_keys: BTreeSet<i64> = schema.dim_tag.iter().map(|r| r.tag_key).collect();
        let entity_keys: BTreeSet<i64> = schema.dim_entity.iter().map(|r| r.entity_key).collect();

        assert!(schema
            .bridge_fact_tag
            .iter()
            .all(|r| tag_keys.contains(&r.tag_key)));
        assert!(schema
            .bridge_fact_entity
            .iter()
            .all(|r| entity_keys.contains(&r.entity_key)));
    }
}
