use super::{fold_pairwise, ActionMap, Merged};

/// Overlay actions replace base actions with the same name; each replacement is reported.
pub fn merge_actions(base: &ActionMap, overlay: &ActionMap) -> Merged<ActionMap> {
    let mut merged = base.clone();
    let mut warnings = Vec::new();
    for (name, action) in overlay {
        if merged.insert(name.clone(), action.clone()).is_some() {
            warnings.push(format!("action `{name}` overridden by a later trait"));
        }
    }
    Merged { merged, warnings }
}

pub fn merge_multiple_actions(maps: &[&ActionMap]) -> Merged<ActionMap> {
    fold_pairwise(maps, merge_actions, ActionMap::clone)
}
