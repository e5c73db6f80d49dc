use std::collections::BTreeMap;

use serde::Serialize;
use strata_protocol::{FieldProvenance, SchemaField};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionResolution {
    /// The trait later in composition order replaced the earlier value.
    LaterWins,
    /// An earlier trait locked the field; the later value was discarded.
    Locked,
}

/// Diagnostic for one field path claimed by two traits with different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionInfo {
    pub field: String,
    pub winner: String,
    pub shadowed: String,
    pub resolution: CollisionResolution,
    pub message: String,
}

/// Schema fields and provenance after every trait has been applied.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSchema {
    pub fields: BTreeMap<String, SchemaField>,
    pub provenance: BTreeMap<String, FieldProvenance>,
    pub collisions: Vec<CollisionInfo>,
}

/// Applies traits' schema fields in composition order and decides one owner per field path.
#[derive(Debug, Default)]
pub struct CollisionResolver {
    state: ResolvedSchema,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every field of one trait; returns the collisions this trait caused.
    pub fn apply_trait(
        &mut self,
        trait_name: &str,
        fields: &BTreeMap<String, SchemaField>,
    ) -> Vec<CollisionInfo> {
        fields
            .iter()
            .filter_map(|(path, field)| self.resolve_field(trait_name, path, field))
            .collect()
    }

    pub fn resolve_field(
        &mut self,
        trait_name: &str,
        path: &str,
        field: &SchemaField,
    ) -> Option<CollisionInfo> {
        let Some(current) = self.state.fields.get(path) else {
            self.state.fields.insert(path.to_string(), field.clone());
            self.state
                .provenance
                .insert(path.to_string(), FieldProvenance::new(trait_name));
            return None;
        };
        let identical = current.same_shape(field);
        let locked = current.locked;
        let provenance = self
            .state
            .provenance
            .entry(path.to_string())
            .or_insert_with(|| FieldProvenance::new(trait_name));

        if locked {
            provenance.overridden_traits.push(trait_name.to_string());
            if identical {
                return None;
            }
            let info = CollisionInfo {
                field: path.to_string(),
                winner: provenance.source_trait.clone(),
                shadowed: trait_name.to_string(),
                resolution: CollisionResolution::Locked,
                message: format!(
                    "field `{path}` is locked by `{}`; value from `{trait_name}` ignored",
                    provenance.source_trait
                ),
            };
            self.state.collisions.push(info.clone());
            return Some(info);
        }

        let previous = std::mem::replace(&mut provenance.source_trait, trait_name.to_string());
        provenance.overridden_traits.push(previous.clone());
        self.state.fields.insert(path.to_string(), field.clone());
        if identical {
            debug!(field = path, winner = trait_name, "identical redeclaration");
            return None;
        }
        let info = CollisionInfo {
            field: path.to_string(),
            winner: trait_name.to_string(),
            shadowed: previous.clone(),
            resolution: CollisionResolution::LaterWins,
            message: format!("field `{path}` from `{previous}` overridden by `{trait_name}`"),
        };
        self.state.collisions.push(info.clone());
        Some(info)
    }

    pub fn finish(self) -> ResolvedSchema {
        self.state
    }
}
