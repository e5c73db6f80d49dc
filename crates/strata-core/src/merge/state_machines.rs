use super::{fold_pairwise, MachineMap, Merged};

/// Machines with the same key are unioned: states keep first-seen order, transitions are
/// deduplicated, and the base initial state is kept.
pub fn merge_state_machines(base: &MachineMap, overlay: &MachineMap) -> Merged<MachineMap> {
    let mut merged = base.clone();
    let mut warnings = Vec::new();
    for (key, machine) in overlay {
        let Some(existing) = merged.get_mut(key) else {
            merged.insert(key.clone(), machine.clone());
            continue;
        };
        if existing.initial != machine.initial {
            warnings.push(format!(
                "state machine `{key}` keeps initial state `{}`; ignoring `{}` from a later trait",
                existing.initial, machine.initial
            ));
        }
        for state in &machine.states {
            if !existing.states.contains(state) {
                existing.states.push(state.clone());
            }
        }
        for transition in &machine.transitions {
            if !existing.transitions.contains(transition) {
                existing.transitions.push(transition.clone());
            }
        }
    }
    Merged { merged, warnings }
}

pub fn merge_multiple_state_machines(maps: &[&MachineMap]) -> Merged<MachineMap> {
    fold_pairwise(maps, merge_state_machines, MachineMap::clone)
}
