use std::collections::BTreeMap;

use serde::Serialize;
use strata_protocol::{
    ComposedObject, CompositionMetadata, Issue, IssueDomain, Severity, TraitDefinition,
    ValidationResult,
};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::collision::{CollisionInfo, CollisionResolver};
use crate::dependency_validator::{
    DependencyErrorKind, DependencyIssue, DependencyValidationOptions, DependencyValidator,
};
use crate::merge::{
    merge_multiple_actions, merge_multiple_state_machines, merge_multiple_tokens,
    merge_multiple_view_extensions, MachineMap,
};
use crate::pointer_segment;
use crate::topo::{topological_sort, TopologicalError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositionOptions {
    /// Downgrade trait conflicts to warnings.
    pub conflicts_as_warnings: bool,
    /// Fail composition when any schema field collision occurs.
    pub collisions_fatal: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    #[error("{0}")]
    Dependency(DependencyIssue),
    #[error(transparent)]
    Ordering(#[from] TopologicalError),
    #[error("{}", .0.message)]
    Collision(CollisionInfo),
}

impl CompositionError {
    pub fn code(&self) -> &'static str {
        match self {
            CompositionError::Dependency(issue) => issue.kind.code(),
            CompositionError::Ordering(TopologicalError::CycleDetected(_)) => {
                DependencyErrorKind::CircularDependency.code()
            }
            CompositionError::Ordering(TopologicalError::UnresolvedDependency { .. }) => {
                DependencyErrorKind::MissingDependency.code()
            }
            CompositionError::Collision(_) => "field_collision",
        }
    }

    fn path(&self) -> String {
        match self {
            CompositionError::Dependency(issue) => issue
                .traits
                .first()
                .map(|t| format!("/traits/{}", pointer_segment(t)))
                .unwrap_or_default(),
            CompositionError::Ordering(_) => String::new(),
            CompositionError::Collision(info) => schema_pointer(&info.field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionWarningKind {
    OptionalDependencyMissing,
    Conflict,
    OneSidedConflict,
    FieldCollision,
    ActionOverride,
    TokenOverride,
    StateMachineMerge,
}

impl CompositionWarningKind {
    pub fn code(self) -> &'static str {
        match self {
            CompositionWarningKind::OptionalDependencyMissing => "optional_dependency_missing",
            CompositionWarningKind::Conflict => "conflict",
            CompositionWarningKind::OneSidedConflict => "one_sided_conflict",
            CompositionWarningKind::FieldCollision => "field_collision",
            CompositionWarningKind::ActionOverride => "action_override",
            CompositionWarningKind::TokenOverride => "token_override",
            CompositionWarningKind::StateMachineMerge => "state_machine_merge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositionWarning {
    pub kind: CompositionWarningKind,
    pub message: String,
    pub path: String,
}

impl CompositionWarning {
    fn new(kind: CompositionWarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: String::new(),
        }
    }

    fn at(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// Outcome of one composition. `composed` is `None` whenever `errors` is non-empty.
#[derive(Debug, Clone, Default)]
pub struct CompositionResult {
    pub composed: Option<ComposedObject>,
    pub order: Vec<String>,
    pub warnings: Vec<CompositionWarning>,
    pub errors: Vec<CompositionError>,
    pub collisions: Vec<CollisionInfo>,
}

impl CompositionResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.composed.is_some()
    }

    fn failed(errors: Vec<CompositionError>, warnings: Vec<CompositionWarning>) -> Self {
        Self {
            errors,
            warnings,
            ..Self::default()
        }
    }

    pub fn to_validation_result(&self) -> ValidationResult {
        let errors = self.errors.iter().map(|e| {
            let domain = match e {
                CompositionError::Collision(_) => IssueDomain::Composition,
                _ => IssueDomain::Dependency,
            };
            Issue::new(Severity::Error, e.code(), e.to_string())
                .at(e.path())
                .in_domain(domain)
                .from_source("compositor")
        });
        let warnings = self.warnings.iter().map(|w| {
            let domain = match w.kind {
                CompositionWarningKind::OptionalDependencyMissing
                | CompositionWarningKind::Conflict
                | CompositionWarningKind::OneSidedConflict => IssueDomain::Dependency,
                _ => IssueDomain::Composition,
            };
            Issue::new(Severity::Warning, w.kind.code(), w.message.clone())
                .at(w.path.clone())
                .in_domain(domain)
                .from_source("compositor")
        });
        ValidationResult::from_issues(errors.chain(warnings).collect())
    }
}

/// Composes an explicit trait set into one object. Holds no registry; every call is independent.
#[derive(Debug, Clone, Default)]
pub struct TraitCompositor {
    options: CompositionOptions,
}

impl TraitCompositor {
    pub fn new(options: CompositionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CompositionOptions {
        self.options
    }

    pub fn compose(&self, name: &str, traits: &[TraitDefinition]) -> CompositionResult {
        let span = info_span!("compose", object = name, traits = traits.len());
        let _enter = span.enter();

        let report = DependencyValidator::new(DependencyValidationOptions {
            conflicts_as_warnings: self.options.conflicts_as_warnings,
        })
        .validate(traits);

        let mut warnings: Vec<CompositionWarning> = report
            .warnings
            .iter()
            .map(|w| {
                let kind = match w.kind {
                    DependencyErrorKind::Conflict => CompositionWarningKind::Conflict,
                    DependencyErrorKind::OneSidedConflict => CompositionWarningKind::OneSidedConflict,
                    _ => CompositionWarningKind::OptionalDependencyMissing,
                };
                let path = w
                    .traits
                    .first()
                    .map(|t| format!("/traits/{}", pointer_segment(t)))
                    .unwrap_or_default();
                CompositionWarning::new(kind, w.message.clone()).at(path)
            })
            .collect();

        if !report.valid {
            warn!(errors = report.errors.len(), "dependency validation failed");
            let errors = report
                .errors
                .into_iter()
                .map(CompositionError::Dependency)
                .collect();
            return CompositionResult::failed(errors, warnings);
        }

        let order = match topological_sort(&report.graph) {
            Ok(order) => order,
            Err(err) => {
                warn!(%err, "ordering failed");
                return CompositionResult::failed(vec![err.into()], warnings);
            }
        };
        debug!(order = ?order, "composition order");

        let by_name: BTreeMap<&str, &TraitDefinition> =
            traits.iter().map(|t| (t.name.as_str(), t)).collect();
        let ordered: Vec<&TraitDefinition> = order
            .iter()
            .filter_map(|n| by_name.get(n.as_str()).copied())
            .collect();

        let mut resolver = CollisionResolver::new();
        for def in &ordered {
            let collisions = resolver.apply_trait(&def.name, &def.schema_fields);
            debug!(
                trait_name = %def.name,
                fields = def.schema_fields.len(),
                collisions = collisions.len(),
                "merged trait schema"
            );
        }
        let resolved = resolver.finish();

        for info in &resolved.collisions {
            info!(field = %info.field, winner = %info.winner, shadowed = %info.shadowed, "field collision");
            warnings.push(
                CompositionWarning::new(CompositionWarningKind::FieldCollision, info.message.clone())
                    .at(schema_pointer(&info.field)),
            );
        }
        if self.options.collisions_fatal && !resolved.collisions.is_empty() {
            let errors = resolved
                .collisions
                .iter()
                .cloned()
                .map(CompositionError::Collision)
                .collect();
            return CompositionResult {
                order,
                collisions: resolved.collisions,
                ..CompositionResult::failed(errors, warnings)
            };
        }

        let actions = merge_multiple_actions(
            &ordered.iter().map(|t| &t.actions).collect::<Vec<_>>(),
        );
        let regions = merge_multiple_view_extensions(
            &ordered.iter().map(|t| &t.view_extensions).collect::<Vec<_>>(),
        );
        let tokens = merge_multiple_tokens(
            &ordered
                .iter()
                .map(|t| &t.token_definitions)
                .collect::<Vec<_>>(),
        );
        let machine_maps: Vec<MachineMap> = ordered
            .iter()
            .filter_map(|t| {
                let machine = t.state_machine.as_ref()?;
                let key = t.state_machine_key()?;
                Some(MachineMap::from([(key, machine.clone())]))
            })
            .collect();
        let machines = merge_multiple_state_machines(&machine_maps.iter().collect::<Vec<_>>());

        for (kind, messages) in [
            (CompositionWarningKind::ActionOverride, &actions.warnings),
            (CompositionWarningKind::TokenOverride, &tokens.warnings),
            (CompositionWarningKind::StateMachineMerge, &machines.warnings),
        ] {
            warnings.extend(
                messages
                    .iter()
                    .map(|m| CompositionWarning::new(kind, m.clone())),
            );
        }

        let composed = ComposedObject {
            name: name.to_string(),
            schema: resolved.fields,
            view_extensions: regions.merged,
            actions: actions.merged,
            state_machines: machines.merged,
            tokens: tokens.merged,
            metadata: CompositionMetadata {
                trait_order: order.clone(),
                provenance: resolved.provenance,
            },
        };
        info!(
            fields = composed.schema.len(),
            actions = composed.actions.len(),
            warnings = warnings.len(),
            "composition complete"
        );

        CompositionResult {
            composed: Some(composed),
            order,
            warnings,
            errors: Vec::new(),
            collisions: resolved.collisions,
        }
    }
}

fn schema_pointer(field: &str) -> String {
    format!("/schema/{}", pointer_segment(field))
}
