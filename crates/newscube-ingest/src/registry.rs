//! Company registry loading
//!
//! The registry is a two-column CSV (Company_Name, optional
//! Entity_Type). Variant deduplication happens in the extractor, which
//! owns the normalization rules; the loader just yields clean rows.

use std::path::{Path, PathBuf};

use tracing::info;

use newscube_core::{CubeError, RegistryEntry, Result};

const NAME_HEADERS: [&str; 3] = ["company_name", "name", "company"];
const TYPE_HEADERS: [&str; 2] = ["entity_type", "type"];

/// Loads known-company entries from a CSV file.
pub struct RegistryLoader {
    path: PathBuf,
}

impl RegistryLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<RegistryEntry>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| CubeError::Registry(format!("{}: {e}", self.path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| CubeError::Registry(e.to_string()))?
            .clone();

        let find = |candidates: &[&str]| -> Option<usize> {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase();
                candidates.iter().any(|c| h == *c)
            })
        };

        let name_idx = find(&NAME_HEADERS)
            .ok_or_else(|| CubeError::Registry("no company-name column".to_string()))?;
        let type_idx = find(&TYPE_HEADERS);

        let mut entries = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| CubeError::Registry(e.to_string()))?;

            let name = row.get(name_idx).unwrap_or("").trim();
            if name.is_empty() || name.eq_ignore_ascii_case("nan") || name.eq_ignore_ascii_case("none")
            {
                continue;
            }

            let entity_type = type_idx
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or("Company");

            entries.push(RegistryEntry::new(name, entity_type));
        }

        info!(path = %self.path.display(), companies = entries.len(), "loaded company registry");
        Ok(entries)
    }
}

/// Try to load a registry, degrading to an empty one (with a warning at
/// the call site) when the path is absent.
pub fn load_or_empty(path: Option<&Path>) -> Result<Vec<RegistryEntry>> {
    match path {
        Some(path) if path.exists() => RegistryLoader::new(path).load(),
        _ => Ok(Vec::new()),
    }
}
