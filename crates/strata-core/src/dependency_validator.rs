use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use strata_protocol::{Issue, IssueDomain, Severity, TraitDefinition, ValidationResult};
use tracing::{debug, warn};

use crate::graph::{DependencyGraph, GraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyErrorKind {
    CircularDependency,
    MissingDependency,
    Conflict,
    InvalidGraph,
    OptionalDependencyMissing,
    /// Only one trait of a present pair lists the other; advisory.
    OneSidedConflict,
}

impl DependencyErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            DependencyErrorKind::CircularDependency => "circular_dependency",
            DependencyErrorKind::MissingDependency => "missing_dependency",
            DependencyErrorKind::Conflict => "conflict",
            DependencyErrorKind::InvalidGraph => "invalid_graph",
            DependencyErrorKind::OptionalDependencyMissing => "optional_dependency_missing",
            DependencyErrorKind::OneSidedConflict => "one_sided_conflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyIssue {
    pub kind: DependencyErrorKind,
    pub message: String,
    /// Traits involved, in report order (a cycle lists its closed path).
    pub traits: Vec<String>,
}

impl DependencyIssue {
    fn new(kind: DependencyErrorKind, message: impl Into<String>, traits: Vec<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            traits,
        }
    }

    fn pointer(&self) -> String {
        match self.traits.first() {
            Some(name) => format!("/traits/{}", crate::pointer_segment(name)),
            None => String::new(),
        }
    }

    fn to_issue(&self, severity: Severity) -> Issue {
        Issue::new(severity, self.kind.code(), self.message.clone())
            .at(self.pointer())
            .in_domain(IssueDomain::Dependency)
            .from_source("dependency-validator")
    }
}

impl fmt::Display for DependencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DependencyValidationOptions {
    /// Report trait conflicts as warnings instead of errors.
    pub conflicts_as_warnings: bool,
}

#[derive(Debug, Clone)]
pub struct DependencyReport {
    pub valid: bool,
    pub errors: Vec<DependencyIssue>,
    pub warnings: Vec<DependencyIssue>,
    pub graph: DependencyGraph,
}

impl DependencyReport {
    pub fn has_error(&self, kind: DependencyErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn to_validation_result(&self) -> ValidationResult {
        let issues = self
            .errors
            .iter()
            .map(|e| e.to_issue(Severity::Error))
            .chain(
                self.warnings
                    .iter()
                    .map(|w| w.to_issue(Severity::Warning)),
            )
            .collect();
        ValidationResult::from_issues(issues)
    }
}

/// Builds the dependency graph for a trait set and runs every graph-level check in one pass.
#[derive(Debug, Clone, Default)]
pub struct DependencyValidator {
    options: DependencyValidationOptions,
}

impl DependencyValidator {
    pub fn new(options: DependencyValidationOptions) -> Self {
        Self { options }
    }

    pub fn validate(&self, traits: &[TraitDefinition]) -> DependencyReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut graph = DependencyGraph::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        for def in traits {
            if def.name.trim().is_empty() {
                errors.push(DependencyIssue::new(
                    DependencyErrorKind::InvalidGraph,
                    "trait with an empty name",
                    Vec::new(),
                ));
                continue;
            }
            if !seen.insert(def.name.as_str()) {
                errors.push(DependencyIssue::new(
                    DependencyErrorKind::InvalidGraph,
                    format!("trait `{}` is supplied more than once", def.name),
                    vec![def.name.clone()],
                ));
                continue;
            }
            for dep in &def.dependencies {
                if def.conflicts_with.iter().any(|c| c == dep.name()) {
                    errors.push(DependencyIssue::new(
                        DependencyErrorKind::InvalidGraph,
                        format!(
                            "trait `{}` both depends on and conflicts with `{}`",
                            def.name,
                            dep.name()
                        ),
                        vec![def.name.clone(), dep.name().to_string()],
                    ));
                }
            }
            graph.add_trait(def.clone());
        }

        for err in graph.detect_circular_dependencies().errors {
            if let GraphError::Cycle(cycle) = &err {
                errors.push(DependencyIssue::new(
                    DependencyErrorKind::CircularDependency,
                    err.to_string(),
                    cycle.clone(),
                ));
            }
        }

        for err in graph.validate_dependencies_exist().errors {
            if let GraphError::MissingDependency {
                trait_name,
                dependency,
            } = &err
            {
                errors.push(DependencyIssue::new(
                    DependencyErrorKind::MissingDependency,
                    err.to_string(),
                    vec![trait_name.clone(), dependency.clone()],
                ));
            }
        }

        for node in graph.nodes().filter(|n| !n.is_placeholder()) {
            for dep in &node.optional_dependencies {
                if graph.is_placeholder(dep) {
                    warnings.push(DependencyIssue::new(
                        DependencyErrorKind::OptionalDependencyMissing,
                        format!(
                            "optional dependency `{dep}` of `{}` is not in the trait set",
                            node.name
                        ),
                        vec![node.name.clone(), dep.clone()],
                    ));
                }
            }
        }

        let mut reported_pairs: BTreeSet<(String, String)> = BTreeSet::new();
        for node in graph.nodes().filter(|n| !n.is_placeholder()) {
            for other in &node.conflicts {
                let Some(other_node) = graph.node(other).filter(|n| !n.is_placeholder()) else {
                    continue;
                };
                if !other_node.conflicts.contains(&node.name) {
                    warnings.push(DependencyIssue::new(
                        DependencyErrorKind::OneSidedConflict,
                        format!(
                            "`{}` lists `{other}` in conflicts_with but `{other}` does not list `{}`",
                            node.name, node.name
                        ),
                        vec![node.name.clone(), other.clone()],
                    ));
                    continue;
                }
                let pair = if node.name <= *other {
                    (node.name.clone(), other.clone())
                } else {
                    (other.clone(), node.name.clone())
                };
                if !reported_pairs.insert(pair.clone()) {
                    continue;
                }
                let issue = DependencyIssue::new(
                    DependencyErrorKind::Conflict,
                    format!("traits `{}` and `{}` conflict", pair.0, pair.1),
                    vec![pair.0, pair.1],
                );
                if self.options.conflicts_as_warnings {
                    warnings.push(issue);
                } else {
                    errors.push(issue);
                }
            }
        }

        for issue in &errors {
            warn!(code = issue.kind.code(), traits = ?issue.traits, "{}", issue.message);
        }
        debug!(
            traits = traits.len(),
            nodes = graph.len(),
            errors = errors.len(),
            warnings = warnings.len(),
            "dependency validation finished"
        );

        DependencyReport {
            valid: errors.is_empty(),
            errors,
            warnings,
            graph,
        }
    }
}
