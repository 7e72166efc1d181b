//! Resource data model served by the catalog provider.

use serde::{Deserialize, Serialize};

/// A single curated resource entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub url: String,
    pub description: String,
    pub category: String,
}

/// A category with the number of resources filed under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub count: usize,
}
