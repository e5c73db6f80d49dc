//! Per-aspect merge strategies for list- and map-shaped trait contributions.
//!
//! Every strategy is a pure pairwise function `(base, overlay) -> Merged` plus a
//! `merge_multiple_*` fold over traits in composition order. Schema fields are not
//! merged here: a field has a single owner, which the collision resolver decides.

mod actions;
mod state_machines;
mod tokens;
mod view_extensions;

use std::collections::BTreeMap;

use serde_json::Value;
use strata_protocol::{ActionDefinition, StateMachineDefinition, ViewExtension};

pub use actions::{merge_actions, merge_multiple_actions};
pub use state_machines::{merge_multiple_state_machines, merge_state_machines};
pub use tokens::{merge_multiple_tokens, merge_tokens};
pub use view_extensions::{
    merge_multiple_view_extensions, merge_view_extensions, normalize_region,
};

pub type ActionMap = BTreeMap<String, ActionDefinition>;
pub type RegionMap = BTreeMap<String, Vec<ViewExtension>>;
pub type TokenMap = BTreeMap<String, Value>;
pub type MachineMap = BTreeMap<String, StateMachineDefinition>;

/// Output of a merge step: the combined aspect and any override warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<T> {
    pub merged: T,
    pub warnings: Vec<String>,
}

impl<T> Merged<T> {
    pub fn clean(merged: T) -> Self {
        Self {
            merged,
            warnings: Vec::new(),
        }
    }
}

/// Left-to-right fold of `merge` over `items`, accumulating warnings.
/// `single` handles the zero/one input cases without calling `merge`.
fn fold_pairwise<T, M, S>(items: &[&T], merge: M, single: S) -> Merged<T>
where
    T: Default,
    M: Fn(&T, &T) -> Merged<T>,
    S: Fn(&T) -> T,
{
    match items {
        [] => Merged::clean(T::default()),
        [only] => Merged::clean(single(*only)),
        [first, second, rest @ ..] => {
            let mut acc = merge(*first, *second);
            for next in rest {
                let step = merge(&acc.merged, *next);
                acc.merged = step.merged;
                acc.warnings.extend(step.warnings);
            }
            acc
        }
    }
}
