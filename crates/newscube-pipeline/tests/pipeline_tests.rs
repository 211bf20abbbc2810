//! Pipeline Integration Tests
//!
//! Exercise the full scan-then-finalize flow from a real CSV file on
//! disk, including malformed-row tolerance and the determinism
//! guarantee across batch sizes.

use std::io::Write;

use newscube_core::{PipelineConfig, RegistryEntry, TagDefinition};
use newscube_pipeline::{BatchProcessor, PipelineOutput};

const SAMPLE_CSV: &str = "\
Document_ID,Date,Source,Headline,Body,Matched_Keywords
N0001,2024-01-15,BioSpace,Pfizer acquires biotech,Pfizer Inc. announced the acquisition of a biotech company. Pfizer Inc. expects the acquisition to close soon.,Pfizer Inc; acquisition
N0002,2024-02-20,Fierce Pharma,Reata milestone,Reata Pharmaceuticals reported a milestone today.,Reata Pharmaceuticals
N0003,not-a-date,BioSpace,Oncology overview,A broad overview of oncology research.,Oncology
N0004,2024-01-15,12345,Misaligned source row,Body text survives even when the source looks numeric.,
";

fn taxonomy() -> Vec<TagDefinition> {
    vec![
        TagDefinition::new("acquisition", "Event", "Business").with_keywords([
            "acquisition",
            "acquire",
            "acquired",
            "buy",
        ]),
        TagDefinition::new("merger", "Event", "Business").with_keywords(["merger", "merge"]),
    ]
}

fn registry() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new("Pfizer", "Company"),
        RegistryEntry::new("Reata Pharmaceuticals", "Company"),
    ]
}

fn write_sample(extra_rows: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_CSV.as_bytes()).unwrap();
    file.write_all(extra_rows.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn run(batch_size: usize, extra_rows: &str) -> PipelineOutput {
    let file = write_sample(extra_rows);
    let config = PipelineConfig::default().with_batch_size(batch_size);
    let processor = BatchProcessor::new(config, taxonomy(), registry());
    processor.run_file(file.path()).unwrap()
}

// =============================================================================
// End-to-end behavior
// =============================================================================

#[test]
fn test_fact_row_per_well_formed_input_row() {
    let output = run(2, "");
    assert_eq!(output.schema.fact_document.len(), 4);
    assert_eq!(output.summary.total_rows, 4);
    assert_eq!(output.summary.skipped_rows, 0);
}

#[test]
fn test_malformed_rows_are_skipped_and_counted() {
    let output = run(2, "this row has no commas at all\n");
    assert_eq!(output.schema.fact_document.len(), 4);
    assert_eq!(output.summary.skipped_rows, 1);
}

#[test]
fn test_identical_output_for_different_batch_sizes() {
    let one = run(1, "");
    let big = run(1000, "");

    assert_eq!(one.schema.dim_time, big.schema.dim_time);
    assert_eq!(one.schema.dim_source, big.schema.dim_source);
    assert_eq!(one.schema.dim_tag, big.schema.dim_tag);
    assert_eq!(one.schema.dim_entity, big.schema.dim_entity);
    assert_eq!(one.schema.bridge_fact_tag, big.schema.bridge_fact_tag);
    assert_eq!(one.schema.bridge_fact_entity, big.schema.bridge_fact_entity);
    assert_eq!(one.schema.fact_document.len(), big.schema.fact_document.len());
}

#[test]
fn test_unparseable_date_yields_sentinel_fact() {
    let output = run(2, "");
    let fact = output
        .schema
        .fact_document
        .iter()
        .find(|f| f.document_id == "N0003")
        .unwrap();

    assert_eq!(fact.date_key, newscube_core::SENTINEL_DATE_KEY);
    assert!(fact.year.is_none());
}

#[test]
fn test_alias_surface_forms_share_one_entity_key() {
    let output = run(2, "");

    // "Pfizer Inc" (hint) and "Pfizer" (registry canonical) are one entity
    let pfizer: Vec<_> = output
        .schema
        .dim_entity
        .iter()
        .filter(|e| e.entity_name.to_lowercase().contains("pfizer"))
        .collect();
    assert_eq!(pfizer.len(), 1);

    let key = pfizer[0].entity_key;
    let links = output
        .schema
        .bridge_fact_entity
        .iter()
        .filter(|b| b.entity_key == key)
        .count();
    assert!(links >= 1);
}

#[test]
fn test_rejected_entities_audited() {
    let output = run(2, "");
    assert!(output
        .rejected
        .iter()
        .any(|r| r.rejected_entity == "Oncology"));
}

#[test]
fn test_tag_confidences_within_bounds() {
    let output = run(2, "");
    assert!(output
        .schema
        .bridge_fact_tag
        .iter()
        .all(|b| b.confidence >= 0.0 && b.confidence <= 1.0));
}

#[test]
fn test_numeric_source_filtered_from_dimension() {
    let output = run(2, "");
    assert!(output
        .schema
        .dim_source
        .iter()
        .all(|s| s.source_name != "12345"));
    // The document itself still gets a fact row with the default key
    let fact = output
        .schema
        .fact_document
        .iter()
        .find(|f| f.document_id == "N0004")
        .unwrap();
    assert_eq!(fact.source_key, 1);
}

#[test]
fn test_has_key_event_reflects_tag_bridge() {
    let output = run(2, "");

    let tagged = output
        .schema
        .fact_document
        .iter()
        .find(|f| f.document_id == "N0001")
        .unwrap();
    assert!(tagged.tag_count > 0);
    assert_eq!(tagged.has_key_event, "Yes");

    let untagged = output
        .schema
        .fact_document
        .iter()
        .find(|f| f.document_id == "N0002")
        .unwrap();
    assert_eq!(untagged.tag_count, 0);
    assert_eq!(untagged.has_key_event, "No");
}
