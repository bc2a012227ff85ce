use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One downloadable artifact in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Legacy field still present in older catalog files.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub dest_dir: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub info: Option<String>,
}

impl CatalogEntry {
    /// Primary URL, falling back to the legacy field.
    pub fn resolved_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.download_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// A cloneable custom-node repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub info: Option<String>,
}

/// An ordered group of downloadable artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub label: String,
    pub entries: Vec<CatalogEntry>,
}

/// The full download library: artifact categories plus custom-node repos.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub custom_nodes: Vec<RepoEntry>,
}

impl Catalog {
    /// Loads a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {path:?}"))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid catalog {path:?}"))
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }
}

/// Category id under which custom-node repositories are toggled.
pub const CUSTOM_NODES_CATEGORY: &str = "custom_nodes";

/// Immutable snapshot of the user's selection, captured once at
/// orchestration start so a run never observes concurrent edits.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    enabled: HashMap<String, HashSet<usize>>,
}

impl Selection {
    pub fn enable(&mut self, category: &str, index: usize) {
        self.enabled.entry(category.to_string()).or_default().insert(index);
    }

    pub fn is_enabled(&self, category: &str, index: usize) -> bool {
        self.enabled
            .get(category)
            .is_some_and(|set| set.contains(&index))
    }

    /// Selects every entry in the catalog, custom nodes included.
    pub fn all_of(catalog: &Catalog) -> Self {
        let mut selection = Self::default();
        for category in &catalog.categories {
            for index in 0..category.entries.len() {
                selection.enable(&category.id, index);
            }
        }
        for index in 0..catalog.custom_nodes.len() {
            selection.enable(CUSTOM_NODES_CATEGORY, index);
        }
        selection
    }
}
