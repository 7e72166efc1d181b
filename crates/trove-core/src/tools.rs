//! The published tool catalog.
//!
//! Tool names form a closed set resolved through [`ToolKind`]; the
//! descriptors returned by [`catalog`] are immutable for the lifetime of
//! the process.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default cap on the number of resources returned by a tool call.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Tool definition published to clients via `catalog/list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The closed set of tools this server exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    /// Full-text search over resource names and descriptions.
    SearchResources,
    /// List every category with its resource count.
    BrowseCategories,
    /// List the resources filed under one category.
    FilterResources,
}

impl ToolKind {
    /// Every published tool, in catalog order.
    pub const ALL: [ToolKind; 3] = [
        ToolKind::SearchResources,
        ToolKind::BrowseCategories,
        ToolKind::FilterResources,
    ];

    /// The wire name of this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchResources => "search_resources",
            Self::BrowseCategories => "browse_categories",
            Self::FilterResources => "filter_resources",
        }
    }

    /// Resolve a wire name back to a tool, if it is published.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The descriptor published for this tool.
    pub fn descriptor(&self) -> ToolDescriptor {
        match self {
            Self::SearchResources => ToolDescriptor {
                name: self.name().to_owned(),
                description: "Search the resource catalog by keyword; matches names and descriptions".to_owned(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Keyword to search for"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results",
                            "default": DEFAULT_RESULT_LIMIT
                        }
                    },
                    "required": ["query"]
                }),
            },
            Self::BrowseCategories => ToolDescriptor {
                name: self.name().to_owned(),
                description: "List all resource categories with their resource counts".to_owned(),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
            Self::FilterResources => ToolDescriptor {
                name: self.name().to_owned(),
                description: "List the resources in a single category".to_owned(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "description": "Category name, matched case-insensitively"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results",
                            "default": DEFAULT_RESULT_LIMIT
                        }
                    },
                    "required": ["category"]
                }),
            },
        }
    }
}

/// The full published tool catalog.
pub fn catalog() -> Vec<ToolDescriptor> {
    ToolKind::ALL.iter().map(ToolKind::descriptor).collect()
}
