use serde_json::Value;

use super::{fold_pairwise, Merged, TokenMap};

/// Nested token groups deep-merge; differing leaf values are replaced by the overlay.
pub fn merge_tokens(base: &TokenMap, overlay: &TokenMap) -> Merged<TokenMap> {
    let mut merged = base.clone();
    let mut warnings = Vec::new();
    for (path, value) in overlay {
        match merged.get_mut(path) {
            Some(existing) => deep_merge(existing, value, path, &mut warnings),
            None => {
                merged.insert(path.clone(), value.clone());
            }
        }
    }
    Merged { merged, warnings }
}

pub fn merge_multiple_tokens(maps: &[&TokenMap]) -> Merged<TokenMap> {
    fold_pairwise(maps, merge_tokens, TokenMap::clone)
}

fn deep_merge(target: &mut Value, overlay: &Value, path: &str, warnings: &mut Vec<String>) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(key) {
                    Some(existing) => {
                        deep_merge(existing, value, &format!("{path}.{key}"), warnings)
                    }
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => {
            if *target != *overlay {
                warnings.push(format!("token `{path}` overridden by a later trait"));
                *target = overlay.clone();
            }
        }
    }
}
