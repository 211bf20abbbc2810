//! Dimension table construction and surrogate key assignment
//!
//! Dimension tables are built from accumulated candidate sets after all
//! batches have been scanned. Candidates are always sorted before key
//! assignment, so re-running on the same input reproduces identical
//! keys regardless of batch size.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use newscube_core::{
    EntityRow, SourceRow, TagDefinition, TagRow, TimeRow, ENTITY_KEY_BASE, TAG_KEY_BASE,
};

/// Date formats accepted for the publication-date field
const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y%m%d",
    "%B %d, %Y",
    "%d %B %Y",
];

/// Parse a raw date field. Accepts ISO-like dates with an optional time
/// component; returns None for anything unparseable.
pub fn parse_article_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("none") {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    // Datetime strings: retry with the time component cut off
    let date_part = raw
        .split_once('T')
        .map(|(d, _)| d)
        .or_else(|| raw.split_once(' ').map(|(d, _)| d))?;
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }
    None
}

/// YYYYMMDD integer key for a date
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Build the full time-dimension row for one date.
pub fn time_row(date: NaiveDate) -> TimeRow {
    TimeRow {
        date_key: date_key(date),
        year: date.year(),
        quarter: format!("Q{}", (date.month() - 1) / 3 + 1),
        month: date.format("%B").to_string(),
        month_number: date.month(),
        day: date.day(),
        day_of_week: date.format("%A").to_string(),
        week_of_year: date.iso_week().week(),
        date_string: date.format("%Y-%m-%d").to_string(),
    }
}

/// Classify a source by name patterns.
pub fn classify_source_type(source_name: &str) -> &'static str {
    let lower = source_name.to_lowercase();

    if ["news", "times", "post", "journal", "report"]
        .iter()
        .any(|t| lower.contains(t))
    {
        "News"
    } else if ["fda", "ema", "who", "nih", "gov"].iter().any(|t| lower.contains(t)) {
        "Government"
    } else if ["university", "college", "institute"]
        .iter()
        .any(|t| lower.contains(t))
    {
        "Academic"
    } else if ["biotech", "pharma", "medical", "health"]
        .iter()
        .any(|t| lower.contains(t))
    {
        "Industry"
    } else {
        "Other"
    }
}

/// Whether a value can be a valid source name. Purely numeric values are
/// assumed to be row-alignment corruption.
pub fn is_valid_source(source: &str) -> bool {
    let source = source.trim();
    if source.len() < 2 || source.len() > 100 {
        return false;
    }
    if source.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    source.chars().any(|c| c.is_alphanumeric())
}

/// Build Dim_Time from the accumulated date set (already deduplicated
/// and ordered by the BTreeSet).
pub fn build_dim_time(dates: &BTreeSet<NaiveDate>) -> Vec<TimeRow> {
    let rows: Vec<TimeRow> = dates.iter().map(|d| time_row(*d)).collect();
    debug!(periods = rows.len(), "built Dim_Time");
    rows
}

/// Build Dim_Source over the sorted (name, type) set; keys start at 1.
pub fn build_dim_source(sources: &BTreeSet<(String, String)>) -> Vec<SourceRow> {
    let rows: Vec<SourceRow> = sources
        .iter()
        .enumerate()
        .map(|(i, (name, source_type))| SourceRow {
            source_key: i as i64 + 1,
            source_name: name.clone(),
            source_type: source_type.clone(),
        })
        .collect();
    debug!(sources = rows.len(), "built Dim_Source");
    rows
}

/// Build Dim_Tag in taxonomy order; keys start at [`TAG_KEY_BASE`].
pub fn build_dim_tag(definitions: &[TagDefinition]) -> Vec<TagRow> {
    let rows: Vec<TagRow> = definitions
        .iter()
        .enumerate()
        .map(|(i, def)| TagRow {
            tag_key: TAG_KEY_BASE + i as i64,
            tag_name: def.name.clone(),
            tag_category: def.category.clone(),
            tag_domain: def.domain.clone(),
        })
        .collect();
    debug!(tags = rows.len(), "built Dim_Tag");
    rows
}

/// Build Dim_Entity over sorted (name, type) candidates; keys start at
/// [`ENTITY_KEY_BASE`].
pub fn build_dim_entity(candidates: &[(String, String)], domain: &str) -> Vec<EntityRow> {
    let rows: Vec<EntityRow> = candidates
        .iter()
        .enumerate()
        .map(|(i, (name, entity_type))| EntityRow {
            entity_key: ENTITY_KEY_BASE + i as i64,
            entity_name: name.clone(),
            entity_type: entity_type.clone(),
            entity_domain: domain.to_string(),
        })
        .collect();
    debug!(entities = rows.len(), "built Dim_Entity");
    rows
}
