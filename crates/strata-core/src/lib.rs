//! Trait composition: dependency graph, ordering, merge strategies and collision resolution.

mod collision;
mod compositor;
mod config;
mod dependency_validator;
pub mod graph;
pub mod merge;
mod topo;

pub use collision::{CollisionInfo, CollisionResolution, CollisionResolver, ResolvedSchema};
pub use compositor::{
    CompositionError, CompositionOptions, CompositionResult, CompositionWarning,
    CompositionWarningKind, TraitCompositor,
};
pub use config::{
    config_schema_json, load_config, CompositionConfig, StrataConfig, ValidationConfig,
    DEFAULT_PERFORMANCE_BUDGET_MS, DEFAULT_REGIONS,
};
pub use dependency_validator::{
    DependencyErrorKind, DependencyIssue, DependencyReport, DependencyValidationOptions,
    DependencyValidator,
};
pub use graph::{canonicalize_cycle, DependencyGraph, GraphCheck, GraphError, GraphNode};
pub use topo::{topological_sort, TopologicalError};

/// Escape one JSON Pointer reference token (RFC 6901).
pub fn pointer_segment(raw: &str) -> String {
    raw.replace('~', "~0").replace('/', "~1")
}
