use strata_core::{
    DependencyErrorKind, DependencyGraph, DependencyValidator, TraitCompositor,
};
use strata_protocol::{SchemaField, TraitDefinition, ViewExtension};

fn billing_set() -> Vec<TraitDefinition> {
    vec![
        TraitDefinition::new("Reporting")
            .depends_on("Audit")
            .depends_on("Billing")
            .with_field("reportPeriod", SchemaField::new("string")),
        TraitDefinition::new("Billing")
            .depends_on("Audit")
            .with_field("amount", SchemaField::new("number").required()),
        TraitDefinition::new("Audit").with_field("auditedAt", SchemaField::new("date")),
    ]
}

#[test]
fn audit_billing_reporting_compose_cleanly() {
    strata_otel::init();
    let result = TraitCompositor::default().compose("Invoice", &billing_set());
    assert!(result.is_success());
    assert_eq!(result.order, vec!["Audit", "Billing", "Reporting"]);
    assert!(result.warnings.is_empty());

    let composed = result.composed.unwrap();
    assert_eq!(composed.metadata.provenance.len(), 3);
    assert_eq!(composed.provenance("auditedAt").unwrap().source_trait, "Audit");
    assert_eq!(composed.provenance("amount").unwrap().source_trait, "Billing");
    assert_eq!(
        composed.provenance("reportPeriod").unwrap().source_trait,
        "Reporting"
    );
    assert!(composed
        .metadata
        .provenance
        .values()
        .all(|p| p.overridden_traits.is_empty()));
}

#[test]
fn mutual_dependency_is_a_fatal_cycle() {
    let traits = vec![
        TraitDefinition::new("X").depends_on("Y"),
        TraitDefinition::new("Y").depends_on("X"),
    ];

    let graph = DependencyGraph::from_traits(traits.clone());
    let check = graph.detect_circular_dependencies();
    assert!(!check.success);
    assert_eq!(graph.cycles(), vec![vec!["X", "Y", "X"]]);

    let report = DependencyValidator::default().validate(&traits);
    assert!(!report.valid);
    assert!(report.has_error(DependencyErrorKind::CircularDependency));

    let result = TraitCompositor::default().compose("Loop", &traits);
    assert!(result.composed.is_none());
    assert_eq!(result.errors[0].code(), "circular_dependency");
}

#[test]
fn single_trait_region_is_priority_sorted() {
    let feature = TraitDefinition::new("Feature")
        .with_view_extension("main", ViewExtension::new("a").with_priority(10))
        .with_view_extension("main", ViewExtension::new("b").with_priority(5));
    let result = TraitCompositor::default().compose("Screen", &[feature]);
    let composed = result.composed.unwrap();
    let ids: Vec<_> = composed.region("main").iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn canonical_json_is_stable_across_input_orders() {
    let forward = billing_set();
    let mut reversed = billing_set();
    reversed.reverse();
    let compositor = TraitCompositor::default();
    let a = compositor.compose("Invoice", &forward).composed.unwrap();
    let b = compositor.compose("Invoice", &reversed).composed.unwrap();
    assert_eq!(a.to_canonical_json().unwrap(), b.to_canonical_json().unwrap());
}

#[test]
fn composition_issues_feed_ci_exit_codes() {
    let traits = vec![TraitDefinition::new("Orphan").optionally_depends_on("Missing")];
    let result = TraitCompositor::default().compose("Thing", &traits);
    assert!(result.is_success());
    let validation = result.to_validation_result();
    assert!(validation.valid);
    assert!(validation.has_code("optional_dependency_missing"));
    assert_eq!(validation.exit_code(), 2);
}
