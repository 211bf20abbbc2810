//! Tag matching
//!
//! Keyword-driven tag detection using a dual strategy: an existing
//! keyword-hint column and independent whole-word search over the
//! normalized article text. The maximum confidence across strategies
//! wins per tag.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::info;

use newscube_core::{ArticleRecord, NormalizedText, TagDefinition, TagMatch};

/// Confidence assigned to tags found through the hint column
const HINT_CONFIDENCE: f64 = 0.9;

/// Number of leading tokens treated as the headline proxy
const HEADLINE_TOKEN_WINDOW: usize = 20;

/// Generic medical context terms that boost "Therapy" category tags
const MEDICAL_CONTEXT_TERMS: [&str; 5] = ["cancer", "therapy", "treatment", "drug", "clinical"];

/// Matches articles to taxonomy tags.
///
/// Construction compiles one whole-word, case-insensitive pattern per
/// tag over its keyword list and builds an inverted keyword index for
/// O(1) hint lookups. Holds no per-document state between calls.
pub struct TagMatcher {
    definitions: Vec<TagDefinition>,
    /// (definition index, compiled keyword alternation)
    patterns: Vec<(usize, Regex)>,
    /// lowercase keyword -> indices of owning definitions
    keyword_index: HashMap<String, Vec<usize>>,
}

impl TagMatcher {
    pub fn new(definitions: Vec<TagDefinition>) -> Self {
        let mut patterns = Vec::with_capacity(definitions.len());
        let mut keyword_index: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, def) in definitions.iter().enumerate() {
            if !def.keywords.is_empty() {
                let alternation = def
                    .keywords
                    .iter()
                    .map(|kw| regex::escape(kw))
                    .collect::<Vec<_>>()
                    .join("|");
                if let Ok(pattern) = Regex::new(&format!(r"(?i)\b(?:{alternation})\b")) {
                    patterns.push((idx, pattern));
                }

                for kw in &def.keywords {
                    keyword_index.entry(kw.to_lowercase()).or_default().push(idx);
                }
            }

            // The tag's own name is always a valid hint
            keyword_index
                .entry(def.name.to_lowercase())
                .or_default()
                .push(idx);
        }

        info!(tags = patterns.len(), "initialized tag matcher");

        Self {
            definitions,
            patterns,
            keyword_index,
        }
    }

    /// Number of tags with a compiled search pattern
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Match one article to tags, sorted by descending confidence
    /// (ties broken by tag name for determinism).
    pub fn match_article(
        &self,
        article: &ArticleRecord,
        normalized: &NormalizedText,
    ) -> Vec<TagMatch> {
        let mut matched: HashMap<usize, f64> = HashMap::new();

        for idx in self.match_hints(&article.keyword_hints) {
            matched.insert(idx, HINT_CONFIDENCE);
        }

        for (idx, confidence) in self.search_text(&normalized.combined) {
            matched
                .entry(idx)
                .and_modify(|c| *c = c.max(confidence))
                .or_insert(confidence);
        }

        let mut result: Vec<TagMatch> = matched
            .into_iter()
            .map(|(idx, confidence)| TagMatch {
                tag: self.definitions[idx].name.clone(),
                confidence,
            })
            .collect();

        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        result
    }

    /// Strategy 1: look hint tokens up in the inverted keyword index.
    fn match_hints(&self, hints: &str) -> HashSet<usize> {
        let hints = hints.trim();
        let mut matched = HashSet::new();

        if hints.is_empty() || hints.eq_ignore_ascii_case("nan") {
            return matched;
        }

        for token in hints.split([';', ',', '|']) {
            let token = token.trim().to_lowercase();
            if token.is_empty() {
                continue;
            }
            if let Some(indices) = self.keyword_index.get(&token) {
                matched.extend(indices.iter().copied());
            }
        }

        matched
    }

    /// Strategy 2: run every tag's pattern over the combined text.
    fn search_text(&self, combined: &str) -> Vec<(usize, f64)> {
        if combined.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        for (idx, pattern) in &self.patterns {
            let matches: Vec<&str> = pattern.find_iter(combined).map(|m| m.as_str()).collect();
            if !matches.is_empty() {
                let confidence = self.score_matches(*idx, &matches, combined);
                results.push((*idx, confidence));
            }
        }
        results
    }

    /// Score a set of keyword matches for one tag.
    ///
    /// Base confidence grows with unique keyword count (diminishing,
    /// capped at 0.8), boosted for headline-proxy hits and for
    /// category-specific context.
    fn score_matches(&self, idx: usize, matches: &[&str], combined: &str) -> f64 {
        let unique: HashSet<String> = matches.iter().map(|m| m.to_lowercase()).collect();
        let mut confidence = (0.4 + unique.len() as f64 * 0.1).min(0.8);

        let tokens: Vec<&str> = combined.split_whitespace().collect();
        if tokens.len() > 10 {
            let window = tokens
                .iter()
                .take(HEADLINE_TOKEN_WINDOW)
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            let padded = format!(" {window} ");
            if unique.iter().any(|kw| padded.contains(&format!(" {kw} "))) {
                confidence = (confidence + 0.2).min(1.0);
            }
        }

        let def = &self.definitions[idx];
        if def.category == "Event" && unique.len() > 1 {
            confidence = (confidence + 0.1).min(1.0);
        }
        if def.category == "Therapy"
            && MEDICAL_CONTEXT_TERMS.iter().any(|t| combined.contains(t))
        {
            confidence = (confidence + 0.1).min(1.0);
        }

        (confidence * 100.0).round() / 100.0
    }

    /// Tag frequencies over a batch of match results, most frequent first.
    pub fn tag_statistics(matches: &[Vec<TagMatch>]) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for article_matches in matches {
            for m in article_matches {
                *counts.entry(m.tag.as_str()).or_default() += 1;
            }
        }

        let mut stats: Vec<(String, usize)> =
            counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats
    }
}
