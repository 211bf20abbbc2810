//! Text normalization
//!
//! Produces a matching-ready lowercase view of each article's text
//! fields. Boilerplate (subscription prompts, newsletter signups,
//! correction-request footers) is stripped before case folding so the
//! downstream matchers operate on a stable surface form.

use once_cell::sync::Lazy;
use regex::Regex;

use newscube_core::{ArticleRecord, NormalizedText};

/// Boilerplate phrase patterns removed from every field
static BOILERPLATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Subscription prompts
        r"(?i)to read the rest of this story subscribe to[^.]*\.",
        r"(?i)to read the full (?:article|story)[^.]*subscribe[^.]*\.",
        r"(?i)to read the full (?:article|story)[^.]*sign (?:up|in)[^.]*\.",
        r"(?i)subscribe to[^.]*stat\+[^.]*\.",
        r"(?i)subscribe to[^.]*stat[^.]*\.",
        r"(?i)subscribe to[^.]*premium[^.]*\.",
        // Newsletter/signup prompts
        r"(?i)sign up for[^.]*newsletter[^.]*\.",
        r"(?i)subscribe to[^.]*newsletter[^.]*\.",
        // Correction requests
        r"(?i)to submit a correction request[^.]*\.",
        r"(?i)to submit a correction[^.]*\.",
        // Generic prompts
        r"(?i)for more information[^.]*\.",
        r"(?i)read more at[^.]*\.",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static boilerplate pattern"))
    .collect()
});

/// Once one of these markers appears, everything after it is footer text
static ENDING_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)\.\s*to read the rest.*$",
        r"(?is)\.\s*to read the full.*$",
        r"(?is)\.\s*subscribe.*$",
        r"(?is)\.\s*to submit a correction.*$",
        r"(?is)\.\s*contact us.*$",
        r"(?is)\.\s*for more information.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static ending marker"))
    .collect()
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("static url pattern"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+").expect("static email pattern"));
static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s'\-]").expect("static non-word pattern"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static ws pattern"));
static SINGLE_CHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\b").expect("static single-char pattern"));
static MULTI_PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{2,}").expect("static period pattern"));
static WIDE_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{3,}").expect("static wide-space pattern"));

/// Normalizes article text fields for keyword matching.
///
/// Pure: the same record always yields the same views, and absent or
/// empty fields normalize to the empty string.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Produce the four normalized views for one article.
    pub fn normalize(&self, article: &ArticleRecord) -> NormalizedText {
        let headline = self.normalize_field(&article.headline);
        let body = self.normalize_field(&article.body);
        let consolidated = self.normalize_field(&article.consolidated_text);

        let mut combined_parts: Vec<&str> = Vec::with_capacity(3);
        if !headline.is_empty() {
            combined_parts.push(&headline);
        }
        if !body.is_empty() {
            combined_parts.push(&body);
        }
        // The consolidated view often duplicates the body verbatim
        if !consolidated.is_empty() && consolidated != body {
            combined_parts.push(&consolidated);
        }
        let combined = combined_parts.join(" ");

        NormalizedText {
            headline,
            body,
            consolidated,
            combined,
        }
    }

    /// Normalize a batch of articles, preserving input order.
    pub fn normalize_batch(&self, articles: &[ArticleRecord]) -> Vec<NormalizedText> {
        articles.iter().map(|a| self.normalize(a)).collect()
    }

    fn normalize_field(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return String::new();
        }

        let text = self.strip_boilerplate(text);
        let text = text.to_lowercase();
        let text = URL_RE.replace_all(&text, "");
        let text = EMAIL_RE.replace_all(&text, "");
        let text = NON_WORD_RE.replace_all(&text, " ");
        let text = WHITESPACE_RE.replace_all(&text, " ");
        // Isolated single characters are almost always OCR/cleanup artifacts
        let text = SINGLE_CHAR_RE.replace_all(&text, "");
        let text = WHITESPACE_RE.replace_all(text.trim(), " ");
        text.into_owned()
    }

    fn strip_boilerplate(&self, text: &str) -> String {
        let mut out = text.to_string();

        for pattern in BOILERPLATE_PATTERNS.iter() {
            out = pattern.replace_all(&out, "").into_owned();
        }
        for marker in ENDING_MARKERS.iter() {
            out = marker.replace_all(&out, ".").into_owned();
        }

        out = MULTI_PERIOD_RE.replace_all(&out, ".").into_owned();
        out = WIDE_SPACE_RE.replace_all(&out, " ").into_owned();
        out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(headline: &str, body: &str, consolidated: &str) -> ArticleRecord {
        ArticleRecord {
            headline: headline.to_string(),
            body: body.to_string(),
            consolidated_text: consolidated.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_lowercase_and_punctuation() {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize(&article(
            "Pfizer Acquires Biotech Firm for $2B Deal!",
            "",
            "",
        ));

        assert_eq!(normalized.headline, "pfizer acquires biotech firm for 2b deal");
        assert!(normalized.body.is_empty());
    }

    #[test]
    fn test_boilerplate_removed() {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize(&article(
            "",
            "The deal closed today. To read the full story, subscribe to our premium service.",
            "",
        ));

        assert!(normalized.body.contains("the deal closed today"));
        assert!(!normalized.body.contains("subscribe"));
        assert!(!normalized.body.contains("premium"));
    }

    #[test]
    fn test_urls_and_emails_stripped() {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize(&article(
            "",
            "Details at https://example.com/story or contact press@example.com today",
            "",
        ));

        assert!(!normalized.body.contains("example"));
        assert!(normalized.body.contains("details"));
        assert!(normalized.body.contains("today"));
    }

    #[test]
    fn test_single_char_tokens_dropped() {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize(&article("", "a deal worth b millions", ""));
        assert_eq!(normalized.body, "deal worth millions");
    }

    #[test]
    fn test_combined_skips_duplicate_consolidated() {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize(&article(
            "Merck Update",
            "Merck announced results",
            "Merck announced results",
        ));

        // Consolidated equals body, so it must not appear twice
        assert_eq!(normalized.combined, "merck update merck announced results");
    }

    #[test]
    fn test_empty_fields_yield_empty_views() {
        let normalizer = TextNormalizer::new();
        let normalized = normalizer.normalize(&ArticleRecord::default());

        assert!(normalized.headline.is_empty());
        assert!(normalized.body.is_empty());
        assert!(normalized.consolidated.is_empty());
        assert!(normalized.combined.is_empty());
    }
}
