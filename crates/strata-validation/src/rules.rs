//! Semantic rules evaluated against a composed object.
//!
//! Each rule looks at one concern and returns issues; rules never mutate the object and
//! never depend on each other's output.

use std::collections::BTreeSet;

use strata_core::pointer_segment;
use strata_protocol::{ComposedObject, Issue, IssueDomain};

pub const SOURCE: &str = "composition";

/// Field types the renderer understands.
pub const KNOWN_FIELD_TYPES: &[&str] = &[
    "string", "text", "number", "integer", "boolean", "date", "datetime", "uuid", "email",
    "url", "enum", "object", "array", "json", "reference", "currency",
];

/// Inputs shared by all rules for one run.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub known_regions: BTreeSet<String>,
}

impl RuleContext {
    pub fn new<I, S>(known_regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_regions: known_regions.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for RuleContext {
    fn default() -> Self {
        Self::new(strata_core::DEFAULT_REGIONS.iter().copied())
    }
}

pub trait CompositionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, composed: &ComposedObject, ctx: &RuleContext) -> Vec<Issue>;
}

fn issue(rule: &dyn CompositionRule, issue: Issue) -> Issue {
    issue
        .in_domain(IssueDomain::Composition)
        .from_source(format!("{SOURCE}:{}", rule.name()))
}

pub struct InitialStateDeclared;

impl CompositionRule for InitialStateDeclared {
    fn name(&self) -> &'static str {
        "initial_state_declared"
    }

    fn check(&self, composed: &ComposedObject, _ctx: &RuleContext) -> Vec<Issue> {
        composed
            .state_machines
            .iter()
            .filter(|(_, sm)| !sm.states.contains(&sm.initial))
            .map(|(key, sm)| {
                issue(
                    self,
                    Issue::error(
                        "invalid_initial_state",
                        format!(
                            "state machine `{key}` starts in `{}`, which is not a declared state",
                            sm.initial
                        ),
                    )
                    .at(format!("/stateMachines/{}/initial", pointer_segment(key))),
                )
            })
            .collect()
    }
}

pub struct TransitionsReferenceStates;

impl CompositionRule for TransitionsReferenceStates {
    fn name(&self) -> &'static str {
        "transitions_reference_states"
    }

    fn check(&self, composed: &ComposedObject, _ctx: &RuleContext) -> Vec<Issue> {
        let mut out = Vec::new();
        for (key, sm) in &composed.state_machines {
            for (idx, t) in sm.transitions.iter().enumerate() {
                for (end, state) in [("from", &t.from), ("to", &t.to)] {
                    if !sm.states.contains(state) {
                        out.push(issue(
                            self,
                            Issue::error(
                                "invalid_transition",
                                format!(
                                    "transition `{}` in `{key}` references unknown state `{state}`",
                                    t.event
                                ),
                            )
                            .at(format!(
                                "/stateMachines/{}/transitions/{idx}/{end}",
                                pointer_segment(key)
                            )),
                        ));
                    }
                }
            }
        }
        out
    }
}

pub struct RegionsRecognized;

impl CompositionRule for RegionsRecognized {
    fn name(&self) -> &'static str {
        "regions_recognized"
    }

    fn check(&self, composed: &ComposedObject, ctx: &RuleContext) -> Vec<Issue> {
        composed
            .view_extensions
            .keys()
            .filter(|region| !ctx.known_regions.contains(*region))
            .map(|region| {
                issue(
                    self,
                    Issue::error("unknown_region", format!("region `{region}` is not rendered by the host"))
                        .at(format!("/viewExtensions/{}", pointer_segment(region)))
                        .with_hint(format!(
                            "known regions: {}",
                            ctx.known_regions.iter().cloned().collect::<Vec<_>>().join(", ")
                        )),
                )
            })
            .collect()
    }
}

pub struct UniqueExtensionIds;

impl CompositionRule for UniqueExtensionIds {
    fn name(&self) -> &'static str {
        "unique_extension_ids"
    }

    fn check(&self, composed: &ComposedObject, _ctx: &RuleContext) -> Vec<Issue> {
        let mut out = Vec::new();
        for (region, exts) in &composed.view_extensions {
            let mut seen = BTreeSet::new();
            for (idx, ext) in exts.iter().enumerate() {
                if !seen.insert(ext.id.as_str()) {
                    out.push(issue(
                        self,
                        Issue::warning(
                            "duplicate_extension_id",
                            format!("extension id `{}` appears more than once in `{region}`", ext.id),
                        )
                        .at(format!("/viewExtensions/{}/{idx}", pointer_segment(region))),
                    ));
                }
            }
        }
        out
    }
}

pub struct ProvenanceComplete;

impl CompositionRule for ProvenanceComplete {
    fn name(&self) -> &'static str {
        "provenance_complete"
    }

    fn check(&self, composed: &ComposedObject, _ctx: &RuleContext) -> Vec<Issue> {
        let order: BTreeSet<&str> = composed.trait_order().iter().map(String::as_str).collect();
        let mut out = Vec::new();
        for path in composed.schema.keys() {
            if !composed.metadata.provenance.contains_key(path) {
                out.push(issue(
                    self,
                    Issue::error("missing_provenance", format!("field `{path}` has no provenance"))
                        .at(format!("/schema/{}", pointer_segment(path))),
                ));
            }
        }
        for (path, prov) in &composed.metadata.provenance {
            let pointer = format!("/metadata/provenance/{}", pointer_segment(path));
            if !composed.schema.contains_key(path) {
                out.push(issue(
                    self,
                    Issue::error(
                        "orphan_provenance",
                        format!("provenance recorded for `{path}`, which is not in the schema"),
                    )
                    .at(pointer.clone()),
                ));
            }
            if !order.contains(prov.source_trait.as_str()) {
                out.push(issue(
                    self,
                    Issue::error(
                        "unknown_source_trait",
                        format!(
                            "field `{path}` is attributed to `{}`, which was not composed",
                            prov.source_trait
                        ),
                    )
                    .at(pointer),
                ));
            }
        }
        out
    }
}

pub struct ActionKeysMatch;

impl CompositionRule for ActionKeysMatch {
    fn name(&self) -> &'static str {
        "action_keys_match"
    }

    fn check(&self, composed: &ComposedObject, _ctx: &RuleContext) -> Vec<Issue> {
        composed
            .actions
            .iter()
            .filter(|(key, action)| **key != action.name)
            .map(|(key, action)| {
                issue(
                    self,
                    Issue::error(
                        "action_key_mismatch",
                        format!("action stored under `{key}` is named `{}`", action.name),
                    )
                    .at(format!("/actions/{}", pointer_segment(key))),
                )
            })
            .collect()
    }
}

pub struct FieldTypesRecognized;

impl CompositionRule for FieldTypesRecognized {
    fn name(&self) -> &'static str {
        "field_types_recognized"
    }

    fn check(&self, composed: &ComposedObject, _ctx: &RuleContext) -> Vec<Issue> {
        composed
            .schema
            .iter()
            .filter(|(_, field)| !KNOWN_FIELD_TYPES.contains(&field.field_type.as_str()))
            .map(|(path, field)| {
                issue(
                    self,
                    Issue::warning(
                        "unknown_field_type",
                        format!("field `{path}` has unrecognised type `{}`", field.field_type),
                    )
                    .at(format!("/schema/{}/type", pointer_segment(path))),
                )
            })
            .collect()
    }
}

pub struct EmptyComposition;

impl CompositionRule for EmptyComposition {
    fn name(&self) -> &'static str {
        "empty_composition"
    }

    fn check(&self, composed: &ComposedObject, _ctx: &RuleContext) -> Vec<Issue> {
        let empty = composed.schema.is_empty()
            && composed.actions.is_empty()
            && composed.view_extensions.values().all(Vec::is_empty)
            && composed.state_machines.is_empty();
        if !empty {
            return Vec::new();
        }
        vec![issue(
            self,
            Issue::info(
                "empty_composition",
                format!("`{}` has no fields, actions, extensions or state machines", composed.name),
            ),
        )]
    }
}

pub fn builtin_rules() -> Vec<Box<dyn CompositionRule>> {
    vec![
        Box::new(InitialStateDeclared),
        Box::new(TransitionsReferenceStates),
        Box::new(RegionsRecognized),
        Box::new(UniqueExtensionIds),
        Box::new(ProvenanceComplete),
        Box::new(ActionKeysMatch),
        Box::new(FieldTypesRecognized),
        Box::new(EmptyComposition),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_protocol::{
        ActionDefinition, FieldProvenance, SchemaField, StateMachineDefinition, ViewExtension,
    };

    fn run(rule: &dyn CompositionRule, composed: &ComposedObject) -> Vec<Issue> {
        rule.check(composed, &RuleContext::default())
    }

    fn object() -> ComposedObject {
        let mut composed = ComposedObject::new("Order");
        composed.metadata.trait_order = vec!["Base".into()];
        composed
            .schema
            .insert("id".into(), SchemaField::new("uuid"));
        composed
            .metadata
            .provenance
            .insert("id".into(), FieldProvenance::new("Base"));
        composed
    }

    #[test]
    fn undeclared_initial_state_is_an_error() {
        let mut composed = object();
        composed.state_machines.insert(
            "status".into(),
            StateMachineDefinition::new("draft", &["open", "closed"]),
        );
        let issues = run(&InitialStateDeclared, &composed);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "/stateMachines/status/initial");
    }

    #[test]
    fn transitions_must_use_declared_states() {
        let mut composed = object();
        composed.state_machines.insert(
            "status".into(),
            StateMachineDefinition::new("open", &["open"]).with_transition("open", "close", "closed"),
        );
        let issues = run(&TransitionsReferenceStates, &composed);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "/stateMachines/status/transitions/0/to");
    }

    #[test]
    fn unknown_regions_are_flagged() {
        let mut composed = object();
        composed
            .view_extensions
            .insert("sidebar".into(), vec![ViewExtension::new("x")]);
        composed
            .view_extensions
            .insert("main".into(), vec![ViewExtension::new("y")]);
        let issues = run(&RegionsRecognized, &composed);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "unknown_region");
    }

    #[test]
    fn duplicate_ids_warn() {
        let mut composed = object();
        composed.view_extensions.insert(
            "main".into(),
            vec![
                ViewExtension::new("x").with_key("one"),
                ViewExtension::new("x").with_key("two"),
            ],
        );
        let issues = run(&UniqueExtensionIds, &composed);
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn provenance_must_cover_schema_and_composed_traits() {
        let mut composed = object();
        composed
            .schema
            .insert("total".into(), SchemaField::new("number"));
        composed
            .metadata
            .provenance
            .insert("ghost".into(), FieldProvenance::new("Elsewhere"));
        let codes: Vec<_> = run(&ProvenanceComplete, &composed)
            .into_iter()
            .map(|i| i.code)
            .collect();
        assert_eq!(
            codes,
            vec!["missing_provenance", "orphan_provenance", "unknown_source_trait"]
        );
    }

    #[test]
    fn action_keys_match_names() {
        let mut composed = object();
        composed
            .actions
            .insert("approve".into(), ActionDefinition::new("reject"));
        assert_eq!(run(&ActionKeysMatch, &composed).len(), 1);
    }

    #[test]
    fn unknown_field_type_is_a_warning() {
        let mut composed = object();
        composed
            .schema
            .insert("blob".into(), SchemaField::new("binary"));
        composed
            .metadata
            .provenance
            .insert("blob".into(), FieldProvenance::new("Base"));
        let issues = run(&FieldTypesRecognized, &composed);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "/schema/blob/type");
    }

    #[test]
    fn empty_object_is_informational() {
        let composed = ComposedObject::new("Nothing");
        let issues = run(&EmptyComposition, &composed);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, strata_protocol::Severity::Info);
        assert!(run(&EmptyComposition, &object()).is_empty());
    }

    #[test]
    fn sources_name_the_rule() {
        let composed = ComposedObject::new("Nothing");
        let issues = run(&EmptyComposition, &composed);
        assert_eq!(issues[0].source, "composition:empty_composition");
    }
}
