use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use strata_core::{StrataConfig, TraitCompositor};
use strata_protocol::{
    ActionDefinition, Issue, SchemaField, StateMachineDefinition, TraitDefinition,
    ValidationResult, ViewExtension,
};
use strata_validation::{get_exit_code, AsyncValidator, FanOut, ValidationPipeline};

struct SlowLookup {
    name: &'static str,
    delay_ms: u64,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl AsyncValidator for SlowLookup {
    fn name(&self) -> &str {
        self.name
    }

    async fn validate(&self, _value: &Value) -> ValidationResult {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            ValidationResult::single(Issue::error("remote_rejected", self.name))
        } else {
            ValidationResult::ok()
        }
    }
}

fn order_traits() -> Vec<TraitDefinition> {
    vec![
        TraitDefinition::new("Identified").with_field("id", SchemaField::new("uuid").required()),
        TraitDefinition::new("Workflow")
            .depends_on("Identified")
            .with_state_machine(
                StateMachineDefinition::new("draft", &["draft", "submitted"])
                    .named("status")
                    .with_transition("draft", "submit", "submitted"),
            )
            .with_action(ActionDefinition::new("submit").with_label("Submit"))
            .with_view_extension("viewToolbar", ViewExtension::new("submit-button")),
    ]
}

#[test]
fn composed_object_passes_both_layers() {
    strata_otel::init();
    let cfg = StrataConfig::default();
    let result = TraitCompositor::new(cfg.composition_options()).compose("Order", &order_traits());
    let composed = result.composed.expect("composes");

    let mut pipeline = ValidationPipeline::with_builtin_schemas(&cfg.validation).unwrap();
    pipeline
        .register_schema(
            "order_params",
            json!({
                "type": "object",
                "required": ["id"],
                "properties": {"id": {"type": "string", "format": "uuid"}}
            }),
        )
        .unwrap();

    let validation = pipeline.validate_all(
        "order_params",
        &json!({"id": "4b8e5f0c-8c1e-4f4e-9a57-0d3c2b1a9e77"}),
        &composed,
    );
    assert!(validation.valid, "{:?}", validation.issues);
    assert_eq!(get_exit_code(&validation), 0);
    assert!(pipeline.is_within_performance_budget());
}

#[test]
fn unregistered_schema_fails_without_panicking() {
    let pipeline = ValidationPipeline::default();
    let composed = TraitCompositor::default()
        .compose("Order", &order_traits())
        .composed
        .unwrap();
    let result = pipeline.validate_all("missing", &json!({}), &composed);
    assert!(result.has_code("schema_not_found"));
    assert_eq!(result.exit_code(), 1);
}

#[test]
fn composition_diagnostics_and_validation_aggregate() {
    let traits = vec![
        TraitDefinition::new("Panel")
            .with_view_extension("sidebar", ViewExtension::new("summary"))
            .with_field("notes", SchemaField::new("markdown")),
    ];
    let composition = TraitCompositor::default().compose("Dashboard", &traits);
    let pipeline = ValidationPipeline::default();
    let composed = composition.composed.as_ref().unwrap();
    let combined = ValidationResult::aggregate([
        composition.to_validation_result(),
        pipeline.validate_composition(composed),
    ]);
    assert!(combined.has_code("unknown_region"));
    assert!(combined.has_code("unknown_field_type"));
    assert_eq!(combined.summary.errors, 1);
    assert_eq!(combined.summary.warnings, 1);
}

fn lookups(calls: &Arc<AtomicUsize>) -> Vec<Arc<dyn AsyncValidator>> {
    vec![
        Arc::new(SlowLookup {
            name: "registry",
            delay_ms: 20,
            calls: calls.clone(),
            fail: false,
        }),
        Arc::new(SlowLookup {
            name: "catalog",
            delay_ms: 5,
            calls: calls.clone(),
            fail: true,
        }),
    ]
}

#[tokio::test]
async fn async_validators_run_sequentially() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = ValidationPipeline::default();
    for v in lookups(&calls) {
        pipeline.register_async_validator(v);
    }
    let result = pipeline
        .run_async_validators(&json!({}), FanOut::Sequential)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.summary.errors, 1);
    assert_eq!(result.issues[0].message, "catalog");
}

#[tokio::test]
async fn async_validators_fan_out_and_keep_registration_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = ValidationPipeline::default();
    for v in lookups(&calls) {
        pipeline.register_async_validator(v);
    }
    let result = pipeline
        .run_async_validators(&json!({}), FanOut::Parallel)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!result.valid);
    assert_eq!(result.exit_code(), 1);
}
