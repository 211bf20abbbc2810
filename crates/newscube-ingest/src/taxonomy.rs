//! Tag taxonomy loading
//!
//! Loads tag definitions from the search-tags workbook and resolves
//! them into the shape the matcher consumes: (name, category, domain,
//! keyword list). The workbook layout puts the tag name in column 3 and
//! related keywords in columns 4-9; rows carrying keywords but no tag
//! name contribute a shared keyword pool appended to therapy-related
//! tags. Definitions flagged "individually" split into one tag per
//! keyword.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, info};

use newscube_core::{CubeError, Result, TagDefinition};

/// Column holding the "individually" flag
const FLAG_COLUMN: usize = 2;
/// Column holding the tag name
const TAG_NAME_COLUMN: usize = 3;
/// Keyword columns
const KEYWORD_COLUMNS: std::ops::Range<usize> = 4..10;

/// Tag-name fragments that receive the shared general-keyword pool
const THERAPY_MARKERS: [&str; 7] = [
    "therapy",
    "cancer",
    "oncology",
    "tumor",
    "immunotherapy",
    "car-t",
    "adc",
];

/// Loads and resolves tag definitions from an Excel workbook.
pub struct TaxonomyLoader {
    path: PathBuf,
}

impl TaxonomyLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the workbook and resolve all tag definitions.
    pub fn load(&self) -> Result<Vec<TagDefinition>> {
        let mut workbook = open_workbook_auto(&self.path)
            .map_err(|e| CubeError::Taxonomy(format!("{}: {e}", self.path.display())))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let sheet = sheet_names
            .iter()
            .find(|n| n.as_str() == "Sheet1")
            .or_else(|| sheet_names.first())
            .ok_or_else(|| CubeError::Taxonomy("workbook has no sheets".to_string()))?
            .clone();

        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| CubeError::Taxonomy(format!("sheet {sheet}: {e}")))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .skip(1) // header row
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        // Pass 1: keyword-only rows feed the shared pool
        let mut general_keywords: Vec<String> = Vec::new();
        for row in &rows {
            if cell(row, TAG_NAME_COLUMN).is_empty() {
                for col in KEYWORD_COLUMNS {
                    let keyword = cell(row, col);
                    if !keyword.is_empty() {
                        general_keywords.push(keyword.to_lowercase());
                    }
                }
            }
        }
        if !general_keywords.is_empty() {
            debug!(count = general_keywords.len(), "collected general keywords");
        }

        // Pass 2: tag rows become definitions
        let mut definitions = Vec::new();
        for row in &rows {
            let tag_name = cell(row, TAG_NAME_COLUMN);
            if tag_name.is_empty() {
                continue;
            }

            let mut keywords: Vec<String> = vec![tag_name.to_lowercase()];
            for col in KEYWORD_COLUMNS {
                let keyword = cell(row, col);
                if !keyword.is_empty() {
                    keywords.push(keyword.to_lowercase());
                }
            }

            let tag_lower = tag_name.to_lowercase();
            if THERAPY_MARKERS.iter().any(|m| tag_lower.contains(m)) {
                keywords.extend(general_keywords.iter().cloned());
            }

            keywords.extend(keyword_variations(&tag_lower));
            dedup_preserving_order(&mut keywords);

            let individually = cell(row, FLAG_COLUMN).eq_ignore_ascii_case("individually");
            let (category, domain) = derive_category_and_domain(&tag_lower, &keywords);

            definitions.push(TagDefinition {
                name: tag_name,
                category: category.to_string(),
                domain: domain.to_string(),
                keywords,
                individually,
            });
        }

        let definitions = split_individual_definitions(definitions);

        info!(
            path = %self.path.display(),
            tags = definitions.len(),
            "loaded tag taxonomy"
        );

        Ok(definitions)
    }
}

/// Try to load a taxonomy, degrading to an empty one (with a warning at
/// the call site) when the path is absent.
pub fn load_or_empty(path: Option<&Path>) -> Result<Vec<TagDefinition>> {
    match path {
        Some(path) if path.exists() => TaxonomyLoader::new(path).load(),
        _ => Ok(Vec::new()),
    }
}

fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn cell_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => format!("{i}"),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#ERROR: {e:?}"),
        Data::DateTime(dt) => format!("{dt}"),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
    .trim()
    .to_string()
}

/// Deterministic inflections/synonyms for common tag names.
fn keyword_variations(tag_lower: &str) -> Vec<String> {
    let variations: &[&str] = match tag_lower {
        "acquisition" => &["acquire", "acquired", "acquires", "buy", "purchase", "purchased"],
        "merger" => &["merge", "merged", "merges", "combine", "combined"],
        "partnership" => &["partner", "partnered", "partners", "alliance", "collaborate"],
        "collaboration" => &["collaborate", "collaborated", "collaborates", "cooperation"],
        "licensing" => &["license", "licensed", "licenses", "licence", "licenced"],
        "buyout" => &["buy out", "bought out"],
        "takeover" => &["take over", "took over"],
        "alliance" => &["strategic alliance", "partnership"],
        "option agreement" => &["option", "option deal"],
        "co-development" => &["co development", "joint development"],
        "in-license" => &["in license", "in-licensing"],
        "out-license" => &["out license", "out-licensing"],
        "clinical stage" => &["clinical", "clinical-stage"],
        "clinical-stage" => &["clinical stage"],
        "phase 2" => &["phase ii", "phase-2"],
        "phase 3" => &["phase iii", "phase-3"],
        "fda approval" => &["fda", "approved", "approval"],
        "funding" => &["fund", "funded", "funds", "capital"],
        "financing" => &["finance", "financed"],
        "investment" => &["invest", "invested", "investor"],
        "raises" => &["raise", "raised", "raising"],
        "venture capital" => &["vc", "venture", "venture capitalist"],
        "ipo" => &["initial public offering", "public offering", "go public"],
        "private placement" => &["private", "placement"],
        "seed funding" => &["seed", "seed round"],
        "crossover round" => &["crossover"],
        "oversubscribed" => &["over-subscribed", "over subscribed"],
        "pipe" => &["private investment in public equity"],
        "led by" => &["lead investor", "leading"],
        "participated" => &["participant", "participating"],
        "syndicate" => &["syndicated", "syndication"],
        "preclinical" => &["pre-clinical"],
        "platform company" => &["platform"],
        "therapeutic" => &["therapy"],
        _ if tag_lower.contains("deal") => &["agreement", "transaction", "contract"],
        _ => &[],
    };
    variations.iter().map(|s| s.to_string()).collect()
}

/// Derive (category, domain) from tag name and keyword membership.
fn derive_category_and_domain(tag_lower: &str, keywords: &[String]) -> (&'static str, &'static str) {
    let mut all_text = tag_lower.to_string();
    for kw in keywords {
        all_text.push(' ');
        all_text.push_str(kw);
    }

    const EVENT_TERMS: [&str; 24] = [
        "acquisition",
        "merger",
        "partnership",
        "collaboration",
        "licensing",
        "buyout",
        "takeover",
        "biotech deal",
        "pharma deal",
        "m&a",
        "alliance",
        "option agreement",
        "co-development",
        "funding",
        "financing",
        "investment",
        "raises",
        "venture capital",
        "ipo",
        "private placement",
        "oversubscribed",
        "seed funding",
        "crossover round",
        "syndicate",
    ];
    const CLINICAL_TERMS: [&str; 4] = ["clinical stage", "phase 2", "phase 3", "fda approval"];
    const MANUFACTURING_TERMS: [&str; 4] = [
        "in-house manufacturing",
        "contract manufacturing",
        "capacity shortage",
        "manufacturing",
    ];
    const THERAPY_TERMS: [&str; 6] = ["oncology", "cancer", "tumor", "immunotherapy", "car-t", "adc"];
    const ENTITY_TERMS: [&str; 4] = [
        "preclinical",
        "clinical-stage",
        "platform company",
        "therapeutic",
    ];

    if EVENT_TERMS.iter().any(|t| all_text.contains(t)) {
        ("Event", "Business")
    } else if CLINICAL_TERMS.iter().any(|t| all_text.contains(t)) {
        ("Clinical", "Healthcare")
    } else if MANUFACTURING_TERMS.iter().any(|t| all_text.contains(t)) {
        ("Manufacturing", "Operations")
    } else if THERAPY_TERMS.iter().any(|t| all_text.contains(t)) {
        ("Therapy", "Healthcare")
    } else if ENTITY_TERMS.iter().any(|t| all_text.contains(t)) {
        ("Entity", "Healthcare")
    } else {
        ("Other", "General")
    }
}

fn dedup_preserving_order(keywords: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    let deduped: Vec<String> = keywords
        .iter()
        .map(|kw| kw.trim().to_string())
        .filter(|kw| !kw.is_empty() && seen.insert(kw.clone()))
        .collect();
    *keywords = deduped;
}

/// Split "individually" flagged definitions into one tag per keyword.
fn split_individual_definitions(definitions: Vec<TagDefinition>) -> Vec<TagDefinition> {
    let mut result = Vec::with_capacity(definitions.len());

    for def in definitions {
        if def.individually && def.keywords.len() > 1 {
            for keyword in &def.keywords {
                result.push(TagDefinition {
                    name: keyword.clone(),
                    category: def.category.clone(),
                    domain: def.domain.clone(),
                    keywords: vec![keyword.clone()],
                    individually: false,
                });
            }
        } else {
            result.push(def);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_derivation() {
        let (category, domain) = derive_category_and_domain("acquisition", &[]);
        assert_eq!(category, "Event");
        assert_eq!(domain, "Business");

        let (category, domain) = derive_category_and_domain("oncology", &[]);
        assert_eq!(category, "Therapy");
        assert_eq!(domain, "Healthcare");

        let (category, domain) = derive_category_and_domain("something obscure", &[]);
        assert_eq!(category, "Other");
        assert_eq!(domain, "General");
    }

    #[test]
    fn test_keyword_variations() {
        let vars = keyword_variations("acquisition");
        assert!(vars.contains(&"acquired".to_string()));
        assert!(vars.contains(&"buy".to_string()));

        assert!(keyword_variations("unheard-of tag").is_empty());
    }

    #[test]
    fn test_dedup_preserves_order() {
        let mut keywords = vec![
            "acquisition".to_string(),
            "buy".to_string(),
            "acquisition".to_string(),
            " ".to_string(),
            "merge".to_string(),
        ];
        dedup_preserving_order(&mut keywords);
        assert_eq!(keywords, vec!["acquisition", "buy", "merge"]);
    }

    #[test]
    fn test_individual_split() {
        let defs = vec![TagDefinition {
            name: "regions".to_string(),
            category: "Other".to_string(),
            domain: "General".to_string(),
            keywords: vec!["europe".to_string(), "asia".to_string()],
            individually: true,
        }];

        let split = split_individual_definitions(defs);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].name, "europe");
        assert_eq!(split[0].keywords, vec!["europe"]);
        assert!(!split[0].individually);
        assert_eq!(split[1].name, "asia");
    }

    #[test]
    fn test_load_or_empty_with_missing_path() {
        let defs = load_or_empty(Some(Path::new("/nonexistent/tags.xlsx"))).unwrap();
        assert!(defs.is_empty());

        let defs = load_or_empty(None).unwrap();
        assert!(defs.is_empty());
    }
}
