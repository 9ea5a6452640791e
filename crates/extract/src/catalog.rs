use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::ExtractError;
use crate::normalizer::canonical_test_name;
use crate::schema::MappedTest;
use crate::service::TestMatchingService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Lab test catalog indexed by canonical name and alias.
#[derive(Debug, Clone)]
pub struct TestCatalog {
    entries: Vec<CatalogEntry>,
    /// canonical name or alias -> index into `entries`
    index: HashMap<String, usize>,
}

impl TestCatalog {
    /// Earlier entries win when two entries share a name or alias.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let mut index = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            for key in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let key = canonical_test_name(key);
                if !key.is_empty() {
                    index.entry(key).or_insert(i);
                }
            }
        }
        Self { entries, index }
    }

    /// Load a JSON array of entries.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read test catalog: {}", path.display()))?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse test catalog: {}", path.display()))?;
        Ok(Self::new(entries))
    }

    pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
        let key = canonical_test_name(name);
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TestCatalog {
    fn default() -> Self {
        let entry = |name: &str, code: &str, aliases: &[&str]| CatalogEntry {
            name: name.to_string(),
            code: code.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        };
        Self::new(vec![
            entry("Complete Blood Count", "CBC001", &["CBC", "Hemogram"]),
            entry("LFT", "LFT001", &["Liver Function Test"]),
            entry("HbA1c", "HbA1c001", &["Glycated Hemoglobin"]),
        ])
    }
}

/// Exact catalog lookup after canonicalization. Unknown names map to the
/// `NA` sentinel; duplicates and order are kept as given.
#[derive(Clone)]
pub struct CatalogMatcher {
    catalog: Arc<TestCatalog>,
}

impl CatalogMatcher {
    pub fn new(catalog: TestCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    fn map_one(&self, name: &str) -> MappedTest {
        match self.catalog.lookup(name) {
            Some(entry) => MappedTest {
                input_test_name: name.to_string(),
                matched_test_name: entry.name.clone(),
                matched_test_code: entry.code.clone(),
            },
            None => {
                debug!(test = name, "no catalog entry for test name");
                MappedTest::unmatched(name)
            }
        }
    }
}

#[async_trait]
impl TestMatchingService for CatalogMatcher {
    async fn match_tests(&self, names: &[String]) -> Result<Vec<MappedTest>, ExtractError> {
        Ok(names.iter().map(|name| self.map_one(name)).collect())
    }
}
