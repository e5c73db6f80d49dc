use crate::{ProtocolError, Validate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

/// Priority assumed for view extensions that do not declare one.
pub const DEFAULT_VIEW_PRIORITY: i64 = 50;

/// A dependency on another trait, either a bare name or `{ "trait": .., "optional": .. }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum DependencySpec {
    Name(String),
    Detailed {
        #[serde(rename = "trait")]
        trait_name: String,
        #[serde(default)]
        optional: bool,
    },
}

impl DependencySpec {
    pub fn required(name: impl Into<String>) -> Self {
        DependencySpec::Name(name.into())
    }

    pub fn optional(name: impl Into<String>) -> Self {
        DependencySpec::Detailed {
            trait_name: name.into(),
            optional: true,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DependencySpec::Name(name) => name,
            DependencySpec::Detailed { trait_name, .. } => trait_name,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, DependencySpec::Detailed { optional: true, .. })
    }
}

/// One schema field contributed by a trait.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default)]
    pub format: Option<String>,
    /// A locked field cannot be overridden by traits composed later.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
}

impl SchemaField {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            required: false,
            description: None,
            default: None,
            enum_values: None,
            format: None,
            locked: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Compare the declared shape, ignoring the lock flag.
    pub fn same_shape(&self, other: &SchemaField) -> bool {
        self.field_type == other.field_type
            && self.required == other.required
            && self.description == other.description
            && self.default == other.default
            && self.enum_values == other.enum_values
            && self.format == other.format
    }
}

/// A contribution to a named rendering region.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ViewExtension {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub props: Option<Value>,
}

impl ViewExtension {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: None,
            component: None,
            priority: None,
            props: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn effective_priority(&self) -> i64 {
        self.priority.unwrap_or(DEFAULT_VIEW_PRIORITY)
    }

    /// Identity used for deduplication: the explicit `key`, falling back to `id`.
    pub fn dedup_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.id)
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            icon: None,
            intent: None,
            params: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub struct StateTransition {
    pub from: String,
    pub to: String,
    pub event: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct StateMachineDefinition {
    /// Machine name; composition keys the machine by the contributing trait when absent.
    #[serde(default)]
    pub name: Option<String>,
    pub initial: String,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
}

impl StateMachineDefinition {
    pub fn new(initial: impl Into<String>, states: &[&str]) -> Self {
        Self {
            name: None,
            initial: initial.into(),
            states: states.iter().map(|s| s.to_string()).collect(),
            transitions: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transition(
        mut self,
        from: impl Into<String>,
        event: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.transitions.push(StateTransition {
            from: from.into(),
            to: to.into(),
            event: event.into(),
        });
        self
    }
}

/// Immutable description of everything one trait contributes to a composed object.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TraitDefinition {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default, rename = "conflicts_with", alias = "conflictsWith")]
    pub conflicts_with: Vec<String>,
    #[serde(default)]
    pub schema_fields: BTreeMap<String, SchemaField>,
    #[serde(default)]
    pub view_extensions: BTreeMap<String, Vec<ViewExtension>>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDefinition>,
    #[serde(default)]
    pub state_machine: Option<StateMachineDefinition>,
    #[serde(default)]
    pub token_definitions: BTreeMap<String, Value>,
}

impl TraitDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: None,
            dependencies: Vec::new(),
            conflicts_with: Vec::new(),
            schema_fields: BTreeMap::new(),
            view_extensions: BTreeMap::new(),
            actions: BTreeMap::new(),
            state_machine: None,
            token_definitions: BTreeMap::new(),
        }
    }

    /// Parse a trait definition from JSON and run load-time checks.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let def: TraitDefinition = serde_json::from_value(value)?;
        def.validate()?;
        Ok(def)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ProtocolError> {
        let def: TraitDefinition = serde_json::from_str(raw)?;
        def.validate()?;
        Ok(def)
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(DependencySpec::required(name));
        self
    }

    pub fn optionally_depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(DependencySpec::optional(name));
        self
    }

    pub fn conflicts_with(mut self, name: impl Into<String>) -> Self {
        self.conflicts_with.push(name.into());
        self
    }

    pub fn with_field(mut self, path: impl Into<String>, field: SchemaField) -> Self {
        self.schema_fields.insert(path.into(), field);
        self
    }

    pub fn with_view_extension(mut self, region: impl Into<String>, ext: ViewExtension) -> Self {
        self.view_extensions.entry(region.into()).or_default().push(ext);
        self
    }

    pub fn with_action(mut self, action: ActionDefinition) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn with_state_machine(mut self, machine: StateMachineDefinition) -> Self {
        self.state_machine = Some(machine);
        self
    }

    pub fn with_token(mut self, path: impl Into<String>, value: Value) -> Self {
        self.token_definitions.insert(path.into(), value);
        self
    }

    pub fn required_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|d| !d.is_optional())
            .map(DependencySpec::name)
    }

    pub fn optional_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|d| d.is_optional())
            .map(DependencySpec::name)
    }

    /// Key under which this trait's state machine is composed.
    pub fn state_machine_key(&self) -> Option<String> {
        self.state_machine
            .as_ref()
            .map(|sm| sm.name.clone().unwrap_or_else(|| self.name.clone()))
    }

    fn invalid(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::InvalidTrait {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl Validate for TraitDefinition {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.name.trim().is_empty() {
            return Err(ProtocolError::AssertionFailed("trait name must not be empty"));
        }
        for dep in &self.dependencies {
            if dep.name().trim().is_empty() {
                return Err(self.invalid("dependency names must not be empty"));
            }
            if dep.name() == self.name {
                return Err(self.invalid("a trait cannot depend on itself"));
            }
        }
        if self.conflicts_with.iter().any(|c| c == &self.name) {
            return Err(self.invalid("a trait cannot conflict with itself"));
        }
        for (key, action) in &self.actions {
            if key != &action.name {
                return Err(self.invalid(format!(
                    "action key `{key}` does not match action name `{}`",
                    action.name
                )));
            }
        }
        for (region, extensions) in &self.view_extensions {
            if extensions.iter().any(|ext| ext.id.trim().is_empty()) {
                return Err(self.invalid(format!("view extension in `{region}` has an empty id")));
            }
        }
        if let Some(machine) = &self.state_machine {
            if machine.initial.trim().is_empty() {
                return Err(self.invalid("state machine initial state must not be empty"));
            }
        }
        Ok(())
    }
}
