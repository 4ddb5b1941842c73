//! Type-level dependency graph and write ordering.

use mirrordb_schema::Schema;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Directed graph over entity types.
///
/// An edge `A -> B` means instances of `A` hold an embedded object or a
/// link of type `B`. Backlinks contribute no edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    vertices: Vec<String>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Builds the graph of `schema`. Vertices keep schema order.
    #[must_use]
    pub fn build(schema: &Schema) -> Self {
        let mut graph = Self::default();
        for entity_type in schema.types() {
            let targets = entity_type
                .properties()
                .iter()
                .filter(|p| !p.is_backlink())
                .filter_map(|p| p.object_type())
                .filter(|target| schema.contains(target))
                .map(str::to_string)
                .collect();
            graph.vertices.push(entity_type.name().to_string());
            graph.edges.insert(entity_type.name().to_string(), targets);
        }
        graph
    }

    /// Every type, in schema order.
    pub fn vertices(&self) -> impl Iterator<Item = &str> {
        self.vertices.iter().map(String::as_str)
    }

    /// Types referenced by `type_name`.
    pub fn dependencies_of(&self, type_name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(type_name)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Types that reference `type_name`, in schema order.
    pub fn dependents_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a str> {
        self.vertices()
            .filter(move |v| self.edges.get(*v).is_some_and(|t| t.contains(type_name)))
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Whether some type reaches itself through forward references.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let mut done = HashSet::new();
        let mut on_path = HashSet::new();
        self.vertices
            .iter()
            .any(|v| self.reaches_path(v, &mut on_path, &mut done))
    }

    fn reaches_path<'a>(
        &'a self,
        vertex: &'a str,
        on_path: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> bool {
        if done.contains(vertex) {
            return false;
        }
        if !on_path.insert(vertex) {
            return true;
        }
        for next in self.dependencies_of(vertex) {
            if self.reaches_path(next, on_path, done) {
                return true;
            }
        }
        on_path.remove(vertex);
        done.insert(vertex);
        false
    }

    /// Breadth-first order covering every vertex exactly once.
    ///
    /// A traversal starts at each not yet visited vertex in schema order;
    /// neighbours are visited in name order.
    #[must_use]
    pub fn visitation_order(&self) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.vertices.len());
        let mut queue = VecDeque::new();

        for start in &self.vertices {
            if !visited.insert(start) {
                continue;
            }
            queue.push_back(start.as_str());
            while let Some(vertex) = queue.pop_front() {
                order.push(vertex.to_string());
                for next in self.dependencies_of(vertex) {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        order
    }

    /// The reversed visitation order, used to process types.
    ///
    /// On an acyclic graph reachable from earlier vertices this places
    /// referenced types before the types referencing them. With cycles it
    /// is merely a complete order.
    #[must_use]
    pub fn write_order(&self) -> Vec<String> {
        let mut order = self.visitation_order();
        order.reverse();
        order
    }
}
