//! In-memory catalog provider.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use trove_core::{CategorySummary, ProviderError, Resource, ResourceProvider};

/// Serves search, browse, and filter operations over an immutable list
/// of resources. The catalog is fixed at construction; consumers that
/// need fresh data restart the process with a new file.
#[derive(Debug)]
pub struct CatalogProvider {
    resources: Vec<Resource>,
}

impl CatalogProvider {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    /// A provider with nothing in it. Every tool call still succeeds and
    /// returns empty results (or not-found for category filters).
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Parse a catalog from a JSON array of resource objects.
    pub fn from_json(data: &str) -> Result<Self, ProviderError> {
        let resources: Vec<Resource> = serde_json::from_str(data)
            .map_err(|e| ProviderError::Catalog(format!("invalid catalog JSON: {e}")))?;
        Ok(Self::new(resources))
    }

    /// Load a catalog file from disk.
    pub fn from_path(path: &Path) -> Result<Self, ProviderError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Catalog(format!("read {}: {e}", path.display())))?;
        let provider = Self::from_json(&data)?;
        info!(
            path = %path.display(),
            resources = provider.len(),
            "catalog loaded"
        );
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ResourceProvider for CatalogProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Resource>, ProviderError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ProviderError::InvalidArguments(
                "query must not be empty".into(),
            ));
        }

        // Name hits rank ahead of description-only hits.
        let mut name_hits = Vec::new();
        let mut description_hits = Vec::new();
        for resource in &self.resources {
            if resource.name.to_lowercase().contains(&needle) {
                name_hits.push(resource.clone());
            } else if resource.description.to_lowercase().contains(&needle) {
                description_hits.push(resource.clone());
            }
        }
        name_hits.extend(description_hits);
        name_hits.truncate(limit);
        Ok(name_hits)
    }

    async fn categories(&self) -> Result<Vec<CategorySummary>, ProviderError> {
        let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.category.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, count)| CategorySummary {
                name: name.to_owned(),
                count,
            })
            .collect())
    }

    async fn by_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Resource>, ProviderError> {
        let wanted = category.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(ProviderError::InvalidArguments(
                "category must not be empty".into(),
            ));
        }

        let mut matches: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| r.category.to_lowercase() == wanted)
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "no such category: {category}"
            )));
        }
        matches.truncate(limit);
        Ok(matches)
    }
}
