use crate::{ActionDefinition, SchemaField, StateMachineDefinition, ViewExtension};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which trait's value was kept for a field, and which traits were shadowed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldProvenance {
    pub source_trait: String,
    #[serde(default)]
    pub overridden_traits: Vec<String>,
}

impl FieldProvenance {
    pub fn new(source_trait: impl Into<String>) -> Self {
        Self {
            source_trait: source_trait.into(),
            overridden_traits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompositionMetadata {
    /// Trait names in the order they were merged.
    pub trait_order: Vec<String>,
    pub provenance: BTreeMap<String, FieldProvenance>,
}

/// Output of a composition run. All maps are ordered so serialization is stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComposedObject {
    pub name: String,
    pub schema: BTreeMap<String, SchemaField>,
    /// Extensions per region, already sorted by ascending priority.
    pub view_extensions: BTreeMap<String, Vec<ViewExtension>>,
    pub actions: BTreeMap<String, ActionDefinition>,
    pub state_machines: BTreeMap<String, StateMachineDefinition>,
    pub tokens: BTreeMap<String, Value>,
    pub metadata: CompositionMetadata,
}

impl ComposedObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(&self, path: &str) -> Option<&SchemaField> {
        self.schema.get(path)
    }

    pub fn provenance(&self, path: &str) -> Option<&FieldProvenance> {
        self.metadata.provenance.get(path)
    }

    /// Extensions for a region in render order; empty when the region has none.
    pub fn region(&self, region: &str) -> &[ViewExtension] {
        self.view_extensions
            .get(region)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn trait_order(&self) -> &[String] {
        &self.metadata.trait_order
    }

    /// Stable JSON rendering used for byte-level comparisons between runs.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
