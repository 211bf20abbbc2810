//! Entity extraction
//!
//! Extracts company and organization names from articles to populate
//! the entity dimension. This is identity resolution under aliasing,
//! not literal text search: "AstraZeneca", "Astra Zeneca", and
//! "AstraZeneca Inc" must all collapse to one canonical entity.
//!
//! Three strategies run in priority order:
//! 1. Keyword-hint tokens (confidence 0.9, strictly filtered)
//! 2. Known-company scan over the normalized text (confidence 0.7)
//! 3. Registry override of already-found entities (confidence 1.0)

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use newscube_core::{ArticleRecord, EntityCandidate, NormalizedText, RegistryEntry};

/// Confidence for entities sourced from the hint column
const HINT_CONFIDENCE: f64 = 0.9;

/// Confidence for entities recovered from a known-company text scan
const TEXT_SCAN_CONFIDENCE: f64 = 0.7;

/// Corporate suffixes stripped during normalization, longest first
const CORPORATE_SUFFIXES: [&str; 32] = [
    "biopharmaceuticals",
    "pharmaceuticals",
    "biotechnology",
    "international",
    "incorporated",
    "technologies",
    "laboratories",
    "corporation",
    "biosciences",
    "therapeutics",
    "solutions",
    "holdings",
    "limited",
    "company",
    "systems",
    "biotech",
    "global",
    "pharma",
    "group",
    "corp",
    "labs",
    "ltda",
    "gmbh",
    "llc",
    "llp",
    "ltd",
    "inc",
    "plc",
    "spa",
    "srl",
    "sas",
    "co",
];

/// Suffix alternation for mention counting and surface-form recovery
const SUFFIX_ALTERNATION: &str = "inc|incorporated|corp|corporation|ltd|limited|llc|\
     pharmaceuticals|pharma|biotech|biotechnology|therapeutics|biosciences";

/// Medical/clinical terms that disqualify a hint token as an entity name
const FILTER_TERMS: [&str; 25] = [
    "alzheimer",
    "oncology",
    "neurology",
    "immunology",
    "hematology",
    "diabetes",
    "cancer",
    "therapeutic",
    "drug",
    "treatment",
    "therapy",
    "patient",
    "clinical",
    "trial",
    "approval",
    "fda",
    "ema",
    "regulatory",
    "disease",
    "disorder",
    "syndrome",
    "condition",
    "biomarker",
    "dosing",
    "placebo",
];

/// Name fragments that mark an entity as an organization rather than a company
const ORGANIZATION_MARKERS: [&str; 8] = [
    "fda",
    "ema",
    "who",
    "nih",
    "university",
    "college",
    "institute",
    "hospital",
];

static AMPERSAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*&\s*").expect("static ampersand pattern"));
static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+and\s+").expect("static and pattern"));
static STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s\-.,;:+'"]+"#).expect("static strip pattern"));
static EDGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^a-z0-9]+|[^a-z0-9]+$").expect("static edge pattern"));

/// Fold an entity display name to its normalized identity.
///
/// Two names denote the same entity iff their normalized forms are
/// equal. Idempotent: re-normalizing a normalized form is a no-op.
pub fn normalize_entity_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return String::new();
    }

    let lower = name.to_lowercase();
    // "&" and "and" are the same conjunction
    let folded = AMPERSAND_RE.replace_all(&lower, " and ");
    let folded = AND_RE.replace_all(&folded, "and");

    let stripped = strip_corporate_suffix(&folded);
    let collapsed = STRIP_RE.replace_all(&stripped, "");
    EDGE_RE.replace_all(&collapsed, "").into_owned()
}

/// Strip trailing corporate suffixes ("Inc", "Pharmaceuticals", ...)
/// from an already-lowercased name, preserving interior spacing.
pub fn strip_corporate_suffix(lower: &str) -> String {
    let mut current = lower.trim_end_matches([' ', '.', ',', ';', ':']).to_string();

    loop {
        let mut stripped = false;
        for suffix in CORPORATE_SUFFIXES {
            if let Some(prefix) = current.strip_suffix(suffix) {
                // The suffix must be its own trailing word
                if prefix.ends_with(|c: char| c.is_whitespace()) {
                    current = prefix.trim_end().to_string();
                    current = current
                        .trim_end_matches([' ', '.', ',', ';', ':'])
                        .to_string();
                    stripped = true;
                    break;
                }
            }
        }
        if !stripped {
            break;
        }
    }

    current
}

/// One deduplicated entity-dimension candidate from a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDimCandidate {
    pub name: String,
    pub entity_type: String,
    pub confidence: f64,
}

/// Result of [`EntityExtractor::extract_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchExtraction {
    /// Per-document candidates, parallel to the input batch
    pub documents: Vec<Vec<EntityCandidate>>,
    /// Batch-level dimension candidates, deduplicated by normalized identity
    pub dimension_candidates: Vec<EntityDimCandidate>,
    /// Rejected candidate name -> occurrence count, for audit
    pub rejected: HashMap<String, u64>,
}

/// Extracts company/organization entities from articles.
pub struct EntityExtractor {
    /// Normalized forms and lowercase raw names of registry companies
    known_companies: HashSet<String>,
    /// normalized form -> canonical (display name, entity type)
    registry: HashMap<String, (String, String)>,
}

impl EntityExtractor {
    /// Create an extractor with no registry; strategies 2 and 3 become
    /// no-ops until one is supplied.
    pub fn new() -> Self {
        Self {
            known_companies: HashSet::new(),
            registry: HashMap::new(),
        }
    }

    /// Load the known-company registry, collapsing lexical variants.
    ///
    /// Rows whose names normalize identically merge into one canonical
    /// entry: the longer display name wins, ties preferring the variant
    /// containing a space (assumed more readable).
    pub fn with_registry(mut self, entries: &[RegistryEntry]) -> Self {
        let before = entries.len();

        for entry in entries {
            let name = entry.name.trim();
            if name.is_empty() || name.eq_ignore_ascii_case("nan") {
                continue;
            }
            let entity_type = if entry.entity_type.trim().is_empty() {
                "Company".to_string()
            } else {
                entry.entity_type.trim().to_string()
            };

            let normalized = normalize_entity_name(name);
            if normalized.is_empty() {
                continue;
            }

            match self.registry.get(&normalized) {
                Some((existing, _)) => {
                    let longer = name.len() > existing.len();
                    let tie_prefers_spaces = name.len() == existing.len()
                        && name.contains(' ')
                        && !existing.contains(' ');
                    if longer || tie_prefers_spaces {
                        self.registry
                            .insert(normalized.clone(), (name.to_string(), entity_type));
                    }
                }
                None => {
                    self.registry
                        .insert(normalized.clone(), (name.to_string(), entity_type));
                }
            }

            self.known_companies.insert(normalized);
            self.known_companies.insert(name.to_lowercase());
        }

        info!(
            loaded = self.registry.len(),
            merged = before.saturating_sub(self.registry.len()),
            "loaded company registry"
        );
        self
    }

    /// Number of canonical registry companies
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// Extract entities from one article, deduplicated by normalized
    /// identity. Rejected candidate names are pushed to `rejected`.
    pub fn extract(
        &self,
        article: &ArticleRecord,
        normalized: &NormalizedText,
        rejected: &mut Vec<String>,
    ) -> Vec<EntityCandidate> {
        // normalized form -> candidate
        let mut found: HashMap<String, EntityCandidate> = HashMap::new();

        let full_text = format!(
            "{} {}",
            article.headline.to_lowercase(),
            article.body.to_lowercase()
        );

        // Strategy 1: keyword hints (primary source)
        for (norm, display) in self.extract_from_hints(&article.keyword_hints, rejected) {
            let mentions = count_mentions(&display, &full_text);
            let candidate = EntityCandidate {
                entity_type: classify_entity_type(&display).to_string(),
                name: display,
                confidence: HINT_CONFIDENCE,
                mentions,
            };
            merge_candidate(&mut found, norm, candidate);
        }

        // Strategy 2: known companies present in the combined text
        if !normalized.combined.is_empty() {
            for (norm, display) in self.scan_known_companies(&normalized.combined) {
                let mentions = count_mentions(&display, &full_text);
                let candidate = EntityCandidate {
                    entity_type: classify_entity_type(&display).to_string(),
                    name: display,
                    confidence: TEXT_SCAN_CONFIDENCE,
                    mentions,
                };
                merge_candidate(&mut found, norm, candidate);
            }
        }

        // Strategy 3: registry override of anything already found
        for (norm, candidate) in found.iter_mut() {
            if let Some((canonical, entity_type)) = self.registry.get(norm) {
                candidate.name = canonical.clone();
                candidate.entity_type = entity_type.clone();
                candidate.confidence = 1.0;
            }
        }

        let mut result: Vec<EntityCandidate> = found.into_values().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }

    /// Extract entities for a whole batch, additionally building the
    /// deduplicated dimension candidate set and the rejected-candidate
    /// frequency table.
    pub fn extract_batch(
        &self,
        articles: &[ArticleRecord],
        normalized: &[NormalizedText],
    ) -> BatchExtraction {
        let mut documents = Vec::with_capacity(articles.len());
        let mut dimension: HashMap<String, EntityDimCandidate> = HashMap::new();
        let mut rejected_names = Vec::new();

        for (article, norm_text) in articles.iter().zip(normalized) {
            let candidates = self.extract(article, norm_text, &mut rejected_names);

            for candidate in &candidates {
                let key = normalize_entity_name(&candidate.name);
                if key.is_empty() {
                    continue;
                }
                match dimension.get_mut(&key) {
                    Some(existing) => {
                        if dim_candidate_wins(&candidate.name, candidate.confidence, existing) {
                            existing.name = candidate.name.clone();
                            existing.entity_type = candidate.entity_type.clone();
                            existing.confidence = candidate.confidence;
                        }
                    }
                    None => {
                        dimension.insert(
                            key,
                            EntityDimCandidate {
                                name: candidate.name.clone(),
                                entity_type: candidate.entity_type.clone(),
                                confidence: candidate.confidence,
                            },
                        );
                    }
                }
            }

            documents.push(candidates);
        }

        let mut rejected: HashMap<String, u64> = HashMap::new();
        for name in rejected_names {
            *rejected.entry(name.trim().to_string()).or_default() += 1;
        }

        let mut dimension_candidates: Vec<EntityDimCandidate> = dimension.into_values().collect();
        dimension_candidates.sort_by(|a, b| a.name.cmp(&b.name));

        BatchExtraction {
            documents,
            dimension_candidates,
            rejected,
        }
    }

    /// Strategy 1: tokenize the hint field and keep tokens that pass the
    /// company-name filters. Returns (normalized, display) pairs.
    fn extract_from_hints(
        &self,
        hints: &str,
        rejected: &mut Vec<String>,
    ) -> Vec<(String, String)> {
        let hints = hints.trim();
        if hints.is_empty() || hints.eq_ignore_ascii_case("nan") || hints.eq_ignore_ascii_case("none")
        {
            return Vec::new();
        }

        let mut entities = Vec::new();

        for token in hints.split([';', ',', '|']) {
            let token = token.trim();
            if token.is_empty() || token.len() < 2 {
                continue;
            }

            let token_lower = token.to_lowercase();
            if FILTER_TERMS.iter().any(|t| token_lower.contains(t)) {
                rejected.push(token.to_string());
                continue;
            }

            if !self.is_likely_company_name(token) {
                rejected.push(token.to_string());
                continue;
            }

            let normalized = normalize_entity_name(token);
            if normalized.len() > 1 {
                entities.push((normalized, token.to_string()));
            } else {
                rejected.push(token.to_string());
            }
        }

        entities
    }

    /// Strategy 2: for every registry name appearing in the text, recover
    /// the full surface form (with optional trailing corporate suffix).
    fn scan_known_companies(&self, text: &str) -> Vec<(String, String)> {
        let mut entities = Vec::new();

        for known in &self.known_companies {
            if !text.contains(known.as_str()) {
                continue;
            }

            let escaped = regex::escape(known);
            let Ok(pattern) =
                Regex::new(&format!(r"\b{escaped}(?:\s+(?:{SUFFIX_ALTERNATION}))?\b"))
            else {
                continue;
            };

            if let Some(m) = pattern.find(text) {
                let display = title_case(m.as_str());
                let normalized = normalize_entity_name(&display);
                if !normalized.is_empty() {
                    entities.push((normalized, display));
                }
            }
        }

        entities
    }

    /// Heuristic: does this hint token look like a company name?
    fn is_likely_company_name(&self, text: &str) -> bool {
        let text = text.trim();
        if text.len() < 2 || text.len() > 50 {
            return false;
        }

        let lower = text.to_lowercase();
        if FILTER_TERMS.iter().any(|t| lower.contains(t)) {
            return false;
        }

        // Registry names are definitely valid
        if self.known_companies.iter().any(|c| lower.contains(c.as_str())) {
            return true;
        }

        // Carries a corporate suffix
        for suffix in CORPORATE_SUFFIXES {
            if lower.ends_with(suffix) || lower.contains(&format!(" {suffix}")) {
                return true;
            }
        }

        let words: Vec<&str> = text.split_whitespace().collect();

        // Single short capitalized token: ticker or abbreviation
        if words.len() == 1 && text.len() <= 5 && text.starts_with(char::is_uppercase) {
            return true;
        }

        // Two to five words starting with a capital: likely a proper name
        if (2..=5).contains(&words.len()) && words[0].starts_with(char::is_uppercase) {
            return true;
        }

        false
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify an entity as "Organization" or "Company" from name markers.
pub fn classify_entity_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if ORGANIZATION_MARKERS.iter().any(|m| lower.contains(m)) {
        "Organization"
    } else {
        "Company"
    }
}

/// Word-boundary, case-insensitive count of an entity name (optionally
/// followed by a corporate suffix) in `text`, which must be lowercase.
pub fn count_mentions(entity_name: &str, text: &str) -> u32 {
    let entity = entity_name.trim().to_lowercase();
    if entity.is_empty() || text.is_empty() {
        return 0;
    }

    let escaped = regex::escape(&entity);
    match Regex::new(&format!(
        r"\b{escaped}(?:\s+(?:{SUFFIX_ALTERNATION}))?\b"
    )) {
        Ok(pattern) => pattern.find_iter(text).count() as u32,
        Err(e) => {
            warn!(entity = %entity_name, error = %e, "mention pattern failed to compile");
            0
        }
    }
}

/// Capitalize the first letter of each whitespace-separated word.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ordering for dimension-candidate collisions: higher confidence wins,
/// then the longer display name, then the lexicographically smaller one.
/// The total order keeps dimension membership independent of the order
/// candidates were encountered in (and therefore of batch size).
pub fn dim_candidate_wins(name: &str, confidence: f64, existing: &EntityDimCandidate) -> bool {
    confidence > existing.confidence
        || (confidence == existing.confidence
            && (name.len() > existing.name.len()
                || (name.len() == existing.name.len() && *name < *existing.name)))
}

/// Keep the higher-confidence tuple on collision; mention counts merge
/// by taking the max.
fn merge_candidate(
    found: &mut HashMap<String, EntityCandidate>,
    normalized: String,
    candidate: EntityCandidate,
) {
    match found.get_mut(&normalized) {
        Some(existing) => {
            if candidate.confidence > existing.confidence {
                let mentions = existing.mentions.max(candidate.mentions);
                *existing = candidate;
                existing.mentions = mentions;
            } else {
                existing.mentions = existing.mentions.max(candidate.mentions);
            }
        }
        None => {
            found.insert(normalized, candidate);
        }
    }
}
