//! Tiered entity key resolution
//!
//! Document-level entity display names do not always match the
//! canonical dimension display name verbatim ("Reata" vs "Reata
//! Pharmaceuticals"). Resolution runs through three tiers, first match
//! wins:
//!
//! 1. Exact match against dimension display names
//! 2. Normalized-form match (same folding as extraction)
//! 3. Core-name partial match on the first normalized word

use std::collections::HashMap;

use newscube_core::EntityRow;
use newscube_extract::entity::{normalize_entity_name, strip_corporate_suffix};

/// Lookup structure over one entity dimension.
pub struct EntityResolver {
    /// display name -> key
    exact: HashMap<String, i64>,
    /// normalized form -> key
    normalized: HashMap<String, i64>,
    /// first normalized word -> [(key, display name)] in dimension order
    core_words: HashMap<String, Vec<(i64, String)>>,
}

impl EntityResolver {
    /// Build the lookup maps from a finished entity dimension.
    pub fn new(dim_entity: &[EntityRow]) -> Self {
        let mut exact = HashMap::new();
        let mut normalized = HashMap::new();
        let mut core_words: HashMap<String, Vec<(i64, String)>> = HashMap::new();

        for row in dim_entity {
            let name = row.entity_name.trim();
            exact.insert(name.to_string(), row.entity_key);

            let norm = normalize_entity_name(name);
            if !norm.is_empty() {
                normalized.insert(norm, row.entity_key);
            }

            if let Some(core) = core_word(name) {
                core_words
                    .entry(core)
                    .or_default()
                    .push((row.entity_key, name.to_string()));
            }
        }

        Self {
            exact,
            normalized,
            core_words,
        }
    }

    /// Resolve a document-level entity name to a dimension key.
    pub fn resolve(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        // Tier 1: exact display name
        if let Some(&key) = self.exact.get(name) {
            return Some(key);
        }

        // Tier 2: normalized identity
        let norm = normalize_entity_name(name);
        if !norm.is_empty() {
            if let Some(&key) = self.normalized.get(&norm) {
                return Some(key);
            }
        }

        // Tier 3: core-name partial match
        let words = suffix_stripped_words(name);
        let core = words.first()?;
        let candidates = self.core_words.get(core)?;

        if candidates.len() == 1 {
            return Some(candidates[0].0);
        }

        if words.len() == 1 {
            // Single-word query against several dimension entities sharing
            // the core word: the shortest full name is the most generic.
            return candidates
                .iter()
                .min_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.1.cmp(&b.1)))
                .map(|(key, _)| *key);
        }

        // Multi-word ties are best-effort: take the first dimension entry
        candidates.first().map(|(key, _)| *key)
    }
}

/// First word of a name after case folding, edge punctuation removal,
/// and corporate-suffix stripping.
fn core_word(name: &str) -> Option<String> {
    suffix_stripped_words(name).into_iter().next()
}

fn suffix_stripped_words(name: &str) -> Vec<String> {
    let lower = name
        .to_lowercase()
        .trim()
        .trim_matches(['\'', '"', '.', ',', ';', ':', ' '])
        .to_string();
    strip_corporate_suffix(&lower)
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}
