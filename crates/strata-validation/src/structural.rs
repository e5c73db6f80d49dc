use std::collections::BTreeMap;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, ValidationError, Validator};
use serde_json::{Map, Value};
use strata_core::ValidationConfig;
use strata_protocol::{Issue, IssueDomain, ValidationResult};
use tracing::debug;

use crate::PipelineSetupError;

pub const SOURCE: &str = "structural";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralOptions {
    pub collect_all_errors: bool,
    pub strip_unknown: bool,
    pub coerce_types: bool,
}

impl Default for StructuralOptions {
    fn default() -> Self {
        Self {
            collect_all_errors: true,
            strip_unknown: false,
            coerce_types: false,
        }
    }
}

impl From<&ValidationConfig> for StructuralOptions {
    fn from(cfg: &ValidationConfig) -> Self {
        Self {
            collect_all_errors: cfg.collect_all_errors,
            strip_unknown: cfg.strip_unknown,
            coerce_types: cfg.coerce_types,
        }
    }
}

/// Result of checking one instance: the issues plus the instance after stripping/coercion.
#[derive(Debug, Clone)]
pub struct StructuralOutcome {
    pub result: ValidationResult,
    /// `None` when the schema name was not registered.
    pub value: Option<Value>,
}

struct RegisteredSchema {
    raw: Value,
    validator: Validator,
}

/// Named JSON schemas compiled once at registration.
#[derive(Default)]
pub struct StructuralValidator {
    options: StructuralOptions,
    schemas: BTreeMap<String, RegisteredSchema>,
}

impl std::fmt::Debug for StructuralValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralValidator")
            .field("options", &self.options)
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StructuralValidator {
    pub fn new(options: StructuralOptions) -> Self {
        Self {
            options,
            schemas: BTreeMap::new(),
        }
    }

    pub fn options(&self) -> StructuralOptions {
        self.options
    }

    pub fn register(&mut self, name: impl Into<String>, schema: Value) -> Result<(), PipelineSetupError> {
        let name = name.into();
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|err| PipelineSetupError::SchemaInvalid {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        debug!(schema = %name, "registered schema");
        self.schemas.insert(name, RegisteredSchema { raw: schema, validator });
        Ok(())
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn validate(&self, name: &str, instance: &Value) -> StructuralOutcome {
        let Some(schema) = self.schemas.get(name) else {
            return StructuralOutcome {
                result: ValidationResult::single(
                    Issue::error("schema_not_found", format!("schema `{name}` is not registered"))
                        .in_domain(IssueDomain::Infrastructure)
                        .from_source(SOURCE)
                        .with_hint("register the schema on the pipeline before validating"),
                ),
                value: None,
            };
        };

        let mut value = instance.clone();
        if self.options.coerce_types {
            coerce(&schema.raw, &schema.raw, &mut value);
        }
        if self.options.strip_unknown {
            strip(&schema.raw, &schema.raw, &mut value);
        }

        let issues: Vec<Issue> = if self.options.collect_all_errors {
            schema.validator.iter_errors(&value).map(to_issue).collect()
        } else {
            schema
                .validator
                .validate(&value)
                .err()
                .map(to_issue)
                .into_iter()
                .collect()
        };
        debug!(schema = name, issues = issues.len(), "structural validation");
        StructuralOutcome {
            result: ValidationResult::from_issues(issues),
            value: Some(value),
        }
    }
}

fn error_code(kind: &ValidationErrorKind) -> &'static str {
    match kind {
        ValidationErrorKind::Required { .. } => "required",
        ValidationErrorKind::Type { .. } => "type",
        ValidationErrorKind::Enum { .. } => "enum",
        ValidationErrorKind::Format { .. } => "format",
        ValidationErrorKind::AdditionalProperties { .. } => "additional_properties",
        _ => "schema",
    }
}

fn to_issue(err: ValidationError<'_>) -> Issue {
    Issue::error(error_code(&err.kind), err.to_string())
        .at(err.instance_path.to_string())
        .in_domain(IssueDomain::Structural)
        .from_source(SOURCE)
}

/// Follow a local `$ref` into `definitions`/`$defs`; other schemas are returned as-is.
fn resolve<'a>(root: &'a Value, schema: &'a Value) -> &'a Value {
    let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
        return schema;
    };
    let Some(pointer) = reference.strip_prefix('#') else {
        return schema;
    };
    root.pointer(pointer).unwrap_or(schema)
}

fn properties<'a>(root: &'a Value, schema: &'a Value) -> Option<&'a Map<String, Value>> {
    resolve(root, schema).get("properties").and_then(Value::as_object)
}

/// Declared scalar type, ignoring `null` in a nullable type list.
fn declared_scalar(root: &Value, schema: &Value) -> Option<String> {
    let schema = resolve(root, schema);
    match schema.get("type")? {
        Value::String(ty) => Some(ty.clone()),
        Value::Array(types) => {
            let mut non_null = types.iter().filter_map(Value::as_str).filter(|t| *t != "null");
            let first = non_null.next()?;
            non_null.next().is_none().then(|| first.to_string())
        }
        _ => None,
    }
}

fn coerce(root: &Value, schema: &Value, value: &mut Value) {
    match value {
        Value::Object(map) => {
            let Some(props) = properties(root, schema) else {
                return;
            };
            for (key, child) in map.iter_mut() {
                if let Some(child_schema) = props.get(key) {
                    coerce(root, child_schema, child);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = resolve(root, schema).get("items") {
                for item in items {
                    coerce(root, item_schema, item);
                }
            }
        }
        Value::String(raw) => {
            let Some(ty) = declared_scalar(root, schema) else {
                return;
            };
            let trimmed = raw.trim();
            let coerced = match ty.as_str() {
                "integer" => trimmed.parse::<i64>().ok().map(Value::from),
                "number" => trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number),
                "boolean" => match trimmed {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            };
            if let Some(coerced) = coerced {
                *value = coerced;
            }
        }
        _ => {}
    }
}

fn strip(root: &Value, schema: &Value, value: &mut Value) {
    match value {
        Value::Object(map) => {
            let Some(props) = properties(root, schema) else {
                return;
            };
            map.retain(|key, _| props.contains_key(key));
            for (key, child) in map.iter_mut() {
                if let Some(child_schema) = props.get(key) {
                    strip(root, child_schema, child);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = resolve(root, schema).get("items") {
                for item in items {
                    strip(root, item_schema, item);
                }
            }
        }
        _ => {}
    }
}
