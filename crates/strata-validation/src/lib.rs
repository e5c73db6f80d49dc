//! Two-layer validation for composed trait objects.
//!
//! The structural layer checks JSON payloads against registered JSON schemas; the
//! composition layer runs semantic rules over a `ComposedObject`. Both report the same
//! `Issue` shape so results can be aggregated and mapped to a CI exit code.

pub mod composition;
pub mod pipeline;
pub mod rules;
pub mod structural;

pub use composition::CompositionValidator;
pub use pipeline::{
    get_exit_code, trait_definition_schema, AsyncValidator, FanOut, ValidationPipeline,
    ValidatorFn, TRAIT_DEFINITION_SCHEMA,
};
pub use rules::{builtin_rules, CompositionRule, RuleContext};
pub use structural::{StructuralOptions, StructuralOutcome, StructuralValidator};

/// Configuration mistakes made while assembling a pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineSetupError {
    #[error("schema `{name}` does not compile: {reason}")]
    SchemaInvalid { name: String, reason: String },
}

impl PipelineSetupError {
    /// Report the setup failure in the same shape as validation issues.
    pub fn to_issue(&self) -> strata_protocol::Issue {
        strata_protocol::Issue::error("schema_invalid", self.to_string())
            .in_domain(strata_protocol::IssueDomain::Infrastructure)
            .from_source("pipeline")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn setup_errors_surface_as_infrastructure_issues() {
        let mut pipeline = ValidationPipeline::default();
        let err = pipeline
            .register_schema("broken", json!({"type": 12}))
            .unwrap_err();
        let issue = err.to_issue();
        assert_eq!(issue.code, "schema_invalid");
        assert_eq!(issue.domain, strata_protocol::IssueDomain::Infrastructure);
        assert!(!pipeline.structural().has_schema("broken"));
    }
}
