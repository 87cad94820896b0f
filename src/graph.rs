//! Module import graph
//!
//! Edges only connect modules inside the project: imports of dependencies or of unknown
//! modules are not part of the schedule.

use crate::engine::StructuralError;
use crate::project::Project;
use crate::syntax::ModuleName;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Directed graph with an edge `M -> N` when M imports N
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    imports: BTreeMap<ModuleName, BTreeSet<ModuleName>>,
    importers: BTreeMap<ModuleName, BTreeSet<ModuleName>>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a project's modules
    pub fn from_project(project: &Project) -> Self {
        let mut graph = Self::new();
        for name in project.module_names() {
            graph.add_module(name.clone());
        }
        for module in project.modules() {
            for imported in module.imported_modules() {
                if project.contains(imported) {
                    graph.add_import(module.name().clone(), imported.clone());
                }
            }
        }
        graph
    }

    pub fn add_module(&mut self, name: ModuleName) {
        self.importers.entry(name.clone()).or_default();
        self.imports.entry(name).or_default();
    }

    /// Add the edge `from -> to`, registering both modules
    pub fn add_import(&mut self, from: ModuleName, to: ModuleName) {
        self.add_module(from.clone());
        self.add_module(to.clone());
        self.importers.entry(to.clone()).or_default().insert(from.clone());
        self.imports.entry(from).or_default().insert(to);
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    /// All modules, by name
    pub fn modules(&self) -> impl Iterator<Item = &ModuleName> {
        self.imports.keys()
    }

    /// Direct imports of `name`, by name
    pub fn imports_of(&self, name: &ModuleName) -> impl Iterator<Item = &ModuleName> {
        self.imports.get(name).into_iter().flatten()
    }

    /// Modules directly importing `name`, by name
    pub fn importers_of(&self, name: &ModuleName) -> impl Iterator<Item = &ModuleName> {
        self.importers.get(name).into_iter().flatten()
    }

    /// Every module `name` depends on, directly or not
    pub fn transitive_imports(&self, name: &ModuleName) -> BTreeSet<ModuleName> {
        Self::reachable(&self.imports, name)
    }

    /// Every module affected by a change to `name`
    pub fn transitive_importers(&self, name: &ModuleName) -> BTreeSet<ModuleName> {
        Self::reachable(&self.importers, name)
    }

    fn reachable(
        edges: &BTreeMap<ModuleName, BTreeSet<ModuleName>>,
        start: &ModuleName,
    ) -> BTreeSet<ModuleName> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&ModuleName> = edges.get(start).into_iter().flatten().collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                queue.extend(edges.get(next).into_iter().flatten());
            }
        }
        seen
    }

    /// Find an import cycle, returned as a path whose last element repeats its first
    pub fn find_cycle(&self) -> Option<Vec<ModuleName>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn visit<'g>(
            graph: &'g ImportGraph,
            node: &'g ModuleName,
            marks: &mut BTreeMap<&'g ModuleName, Mark>,
            path: &mut Vec<&'g ModuleName>,
        ) -> Option<Vec<ModuleName>> {
            marks.insert(node, Mark::InProgress);
            path.push(node);
            for next in graph.imports_of(node) {
                match marks.get(next) {
                    Some(Mark::InProgress) => {
                        let start = path.iter().position(|n| *n == next).unwrap_or(0);
                        let mut cycle: Vec<ModuleName> =
                            path[start..].iter().map(|n| (*n).clone()).collect();
                        cycle.push(next.clone());
                        return Some(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        if let Some(cycle) = visit(graph, next, marks, path) {
                            return Some(cycle);
                        }
                    }
                }
            }
            path.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        for node in self.modules() {
            if !marks.contains_key(node) {
                let mut path = Vec::new();
                if let Some(cycle) = visit(self, node, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Modules ordered so every module comes after its imports, ties broken by name
    pub fn topological_order(&self) -> Result<Vec<ModuleName>, StructuralError> {
        let mut remaining: BTreeMap<&ModuleName, usize> = self
            .imports
            .iter()
            .map(|(name, imports)| (name, imports.len()))
            .collect();
        let mut ready: BTreeSet<&ModuleName> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.imports.len());
        while let Some(next) = ready.pop_first() {
            order.push(next.clone());
            for importer in self.importers_of(next) {
                if let Some(count) = remaining.get_mut(importer) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(importer);
                    }
                }
            }
        }

        if order.len() < self.imports.len() {
            let cycle = self.find_cycle().unwrap_or_default();
            return Err(StructuralError::Cycle(cycle));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ModuleName {
        ModuleName::from(s)
    }

    fn graph(edges: &[(&str, &str)], extra: &[&str]) -> ImportGraph {
        let mut graph = ImportGraph::new();
        for module in extra {
            graph.add_module(name(module));
        }
        for (from, to) in edges {
            graph.add_import(name(from), name(to));
        }
        graph
    }

    #[test]
    fn test_topological_order_breaks_ties_by_name() {
        let g = graph(&[("Main", "B"), ("Main", "A"), ("B", "Util"), ("A", "Util")], &["Zed"]);
        let order: Vec<String> = g
            .topological_order()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(order, vec!["Util", "A", "B", "Main", "Zed"]);
    }

    #[test]
    fn test_cycle_is_detected_and_named() {
        let g = graph(&[("A", "B"), ("B", "C"), ("C", "A"), ("Main", "A")], &[]);
        let cycle = g.find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);

        match g.topological_order() {
            Err(StructuralError::Cycle(path)) => assert_eq!(path.len(), 4),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let g = graph(&[("A", "A")], &[]);
        assert_eq!(g.find_cycle(), Some(vec![name("A"), name("A")]));
    }

    #[test]
    fn test_transitive_closures() {
        let g = graph(&[("Main", "Page"), ("Page", "Util"), ("Other", "Util")], &[]);
        assert_eq!(
            g.transitive_imports(&name("Main")),
            BTreeSet::from([name("Page"), name("Util")])
        );
        assert_eq!(
            g.transitive_importers(&name("Util")),
            BTreeSet::from([name("Main"), name("Other"), name("Page")])
        );
    }
}
