use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use strata_protocol::TraitDefinition;

static NO_EDGES: BTreeSet<String> = BTreeSet::new();

/// Per-trait node. All edge sets hold trait names and iterate in sorted order.
#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    pub name: String,
    /// Every trait this one depends on, optional or not.
    pub dependencies: BTreeSet<String>,
    /// Subset of `dependencies` that may be absent.
    pub optional_dependencies: BTreeSet<String>,
    /// Reverse edges: traits that depend on this one.
    pub dependents: BTreeSet<String>,
    pub conflicts: BTreeSet<String>,
    definition: Option<Arc<TraitDefinition>>,
}

impl GraphNode {
    fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Referenced as a dependency but never supplied.
    pub fn is_placeholder(&self) -> bool {
        self.definition.is_none()
    }

    pub fn definition(&self) -> Option<&Arc<TraitDefinition>> {
        self.definition.as_ref()
    }

    pub fn required_dependencies(&self) -> impl Iterator<Item = &String> {
        self.dependencies
            .iter()
            .filter(|dep| !self.optional_dependencies.contains(*dep))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Canonical cycle: starts at its smallest name and repeats it at the end.
    Cycle(Vec<String>),
    MissingDependency {
        trait_name: String,
        dependency: String,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::Cycle(cycle) => write!(f, "circular dependency: {}", cycle.join(" -> ")),
            GraphError::MissingDependency {
                trait_name,
                dependency,
            } => write!(
                f,
                "trait `{trait_name}` depends on `{dependency}`, which is not in the trait set"
            ),
        }
    }
}

/// Result-style outcome of a graph check; callers decide whether to abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphCheck {
    pub success: bool,
    pub errors: Vec<GraphError>,
}

impl GraphCheck {
    fn from_errors(errors: Vec<GraphError>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, GraphNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_traits<I, T>(traits: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Arc<TraitDefinition>>,
    {
        let mut graph = Self::new();
        for def in traits {
            graph.add_trait(def);
        }
        graph
    }

    /// Insert or replace a trait. Dependencies that are not known yet get placeholder nodes.
    pub fn add_trait(&mut self, def: impl Into<Arc<TraitDefinition>>) {
        let def = def.into();
        let name = def.name.clone();

        let stale: Vec<String> = self
            .nodes
            .get(&name)
            .map(|node| node.dependencies.iter().cloned().collect())
            .unwrap_or_default();
        for dep in stale {
            if let Some(dep_node) = self.nodes.get_mut(&dep) {
                dep_node.dependents.remove(&name);
            }
        }

        let required: BTreeSet<String> =
            def.required_dependencies().map(str::to_string).collect();
        let node = self
            .nodes
            .entry(name.clone())
            .or_insert_with(|| GraphNode::placeholder(&name));
        node.dependencies = def
            .dependencies
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        node.optional_dependencies = def
            .optional_dependencies()
            .filter(|dep| !required.contains(*dep))
            .map(str::to_string)
            .collect();
        node.conflicts = def.conflicts_with.iter().cloned().collect();
        let deps: Vec<String> = node.dependencies.iter().cloned().collect();
        node.definition = Some(def);

        for dep in deps {
            self.nodes
                .entry(dep.clone())
                .or_insert_with(|| GraphNode::placeholder(&dep))
                .dependents
                .insert(name.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// Nodes in name order, placeholders included.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn is_placeholder(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(GraphNode::is_placeholder)
    }

    pub fn dependencies_of(&self, name: &str) -> &BTreeSet<String> {
        self.nodes
            .get(name)
            .map(|n| &n.dependencies)
            .unwrap_or(&NO_EDGES)
    }

    pub fn dependents_of(&self, name: &str) -> &BTreeSet<String> {
        self.nodes
            .get(name)
            .map(|n| &n.dependents)
            .unwrap_or(&NO_EDGES)
    }

    /// Number of dependencies each trait waits on before it can be ordered.
    pub fn in_degrees(&self) -> BTreeMap<String, usize> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.dependencies.len()))
            .collect()
    }

    /// Every trait `name` requires directly or indirectly, excluding itself unless it is on a cycle.
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<&str> = self.dependencies_of(name).iter().map(String::as_str).collect();
        while let Some(next) = stack.pop() {
            if out.insert(next.to_string()) {
                stack.extend(self.dependencies_of(next).iter().map(String::as_str));
            }
        }
        out
    }

    /// Distinct dependency cycles, each rotated to start at its smallest name and closed.
    ///
    /// Every node starts its own traversal; `finished` only prunes within that traversal so
    /// cycles sharing nodes are still found from another start. Rotation dedupes repeats.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut reported: HashSet<Vec<String>> = HashSet::new();

        for start in self.nodes.keys() {
            let start = start.as_str();
            let mut finished: HashSet<&str> = HashSet::new();
            let mut path: Vec<&str> = vec![start];
            let mut on_path: HashSet<&str> = HashSet::from([start]);
            let mut frames = vec![(start, self.dependencies_of(start).iter())];

            while let Some((node, remaining)) = frames.last_mut() {
                match remaining.next() {
                    Some(next) => {
                        let next = next.as_str();
                        if on_path.contains(next) {
                            if let Some(pos) = path.iter().position(|n| *n == next) {
                                let cycle = canonicalize_cycle(&path[pos..]);
                                if reported.insert(cycle.clone()) {
                                    cycles.push(cycle);
                                }
                            }
                        } else if !finished.contains(next) {
                            path.push(next);
                            on_path.insert(next);
                            frames.push((next, self.dependencies_of(next).iter()));
                        }
                    }
                    None => {
                        let node = *node;
                        frames.pop();
                        path.pop();
                        on_path.remove(node);
                        finished.insert(node);
                    }
                }
            }
        }
        cycles
    }

    pub fn detect_circular_dependencies(&self) -> GraphCheck {
        GraphCheck::from_errors(self.cycles().into_iter().map(GraphError::Cycle).collect())
    }

    /// Report required dependencies that only exist as placeholders.
    pub fn validate_dependencies_exist(&self) -> GraphCheck {
        let mut errors = Vec::new();
        for node in self.nodes.values().filter(|n| !n.is_placeholder()) {
            for dep in node.required_dependencies() {
                if self.is_placeholder(dep) {
                    errors.push(GraphError::MissingDependency {
                        trait_name: node.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        GraphCheck::from_errors(errors)
    }
}

/// Rotate a cycle slice to begin at its smallest name, then close the loop.
pub fn canonicalize_cycle(slice: &[&str]) -> Vec<String> {
    let Some(min_pos) = slice
        .iter()
        .enumerate()
        .min_by_key(|(_, name)| **name)
        .map(|(pos, _)| pos)
    else {
        return Vec::new();
    };
    let mut cycle: Vec<String> = slice[min_pos..]
        .iter()
        .chain(&slice[..min_pos])
        .map(|s| s.to_string())
        .collect();
    cycle.push(cycle[0].clone());
    cycle
}
