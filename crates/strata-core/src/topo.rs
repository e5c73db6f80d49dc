use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologicalError {
    #[error("dependency cycle prevents ordering; unresolved traits: {}", .0.join(", "))]
    CycleDetected(Vec<String>),
    #[error("trait `{trait_name}` requires `{dependency}`, which was not supplied")]
    UnresolvedDependency {
        trait_name: String,
        dependency: String,
    },
}

/// Order supplied traits so each one follows all of its dependencies.
///
/// Ties between traits that are ready at the same step are broken by name, so a
/// given graph always yields the same order. Absent optional dependencies are
/// ignored; an absent required dependency or a remaining cycle is an error.
pub fn topological_sort(graph: &DependencyGraph) -> Result<Vec<String>, TopologicalError> {
    let mut waiting: BTreeMap<&str, usize> = BTreeMap::new();
    for node in graph.nodes().filter(|n| !n.is_placeholder()) {
        let mut count = 0;
        for dep in &node.dependencies {
            if graph.is_placeholder(dep) {
                if node.optional_dependencies.contains(dep) {
                    continue;
                }
                return Err(TopologicalError::UnresolvedDependency {
                    trait_name: node.name.clone(),
                    dependency: dep.clone(),
                });
            }
            count += 1;
        }
        waiting.insert(node.name.as_str(), count);
    }

    let mut ready: BTreeSet<&str> = waiting
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(waiting.len());

    while let Some(next) = ready.pop_first() {
        order.push(next.to_string());
        for dependent in graph.dependents_of(next) {
            if let Some(count) = waiting.get_mut(dependent.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    if order.len() < waiting.len() {
        let unresolved = waiting
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        return Err(TopologicalError::CycleDetected(unresolved));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_protocol::TraitDefinition;

    fn def(name: &str, deps: &[&str]) -> TraitDefinition {
        deps.iter()
            .fold(TraitDefinition::new(name), |d, dep| d.depends_on(*dep))
    }

    #[test]
    fn dependencies_come_first() {
        let graph = DependencyGraph::from_traits([
            def("Reporting", &["Audit", "Billing"]),
            def("Billing", &["Audit"]),
            def("Audit", &[]),
        ]);
        assert_eq!(
            topological_sort(&graph).unwrap(),
            vec!["Audit", "Billing", "Reporting"]
        );
    }

    #[test]
    fn ties_break_lexicographically() {
        let graph = DependencyGraph::from_traits([
            def("Zeta", &[]),
            def("Alpha", &[]),
            def("Mid", &["Zeta"]),
            def("Beta", &["Zeta"]),
        ]);
        assert_eq!(
            topological_sort(&graph).unwrap(),
            vec!["Alpha", "Zeta", "Beta", "Mid"]
        );
    }

    #[test]
    fn cycle_fails_instead_of_dropping_nodes() {
        let graph = DependencyGraph::from_traits([
            def("Root", &[]),
            def("X", &["Y", "Root"]),
            def("Y", &["X"]),
        ]);
        assert_eq!(
            topological_sort(&graph),
            Err(TopologicalError::CycleDetected(vec!["X".into(), "Y".into()]))
        );
    }

    #[test]
    fn missing_required_dependency_fails() {
        let graph = DependencyGraph::from_traits([def("Billing", &["Audit"])]);
        assert!(matches!(
            topological_sort(&graph),
            Err(TopologicalError::UnresolvedDependency { .. })
        ));
    }

    #[test]
    fn absent_optional_dependency_is_skipped() {
        let graph = DependencyGraph::from_traits([
            TraitDefinition::new("Billing").optionally_depends_on("Tax"),
        ]);
        assert_eq!(topological_sort(&graph).unwrap(), vec!["Billing"]);
    }
}
