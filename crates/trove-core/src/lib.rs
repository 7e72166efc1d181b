//! Core types shared across the trove workspace.

pub mod ids;
pub mod provider;
pub mod resources;
pub mod tools;

pub use ids::SessionId;
pub use provider::{ProviderError, ResourceProvider};
pub use resources::{CategorySummary, Resource};
pub use tools::{catalog, ToolDescriptor, ToolKind, DEFAULT_RESULT_LIMIT};
