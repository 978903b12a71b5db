use indexmap::{IndexMap, IndexSet};
use url::Url;

use crate::error::{LoaderError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphNode {
    pub dependencies: IndexSet<Url>,
    pub dependents: IndexSet<Url>,
    /// Dependencies reached only through `import()`.
    pub lazy: IndexSet<Url>,
}

/// Module dependency graph keyed by absolute URL.
///
/// Edges are always recorded in both directions: if `a` lists `b` as a
/// dependency, `b` exists as a node and lists `a` as a dependent. Node order
/// is insertion order, which keeps sorts and cycle reports deterministic.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<Url, GraphNode>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or augments the node for `url` and records an edge to each of `deps`.
    pub fn add_node<I>(&mut self, url: &Url, deps: I)
    where
        I: IntoIterator<Item = Url>,
    {
        self.nodes.entry(url.clone()).or_default();

        for dep in deps {
            self.nodes
                .entry(dep.clone())
                .or_default()
                .dependents
                .insert(url.clone());

            if let Some(node) = self.nodes.get_mut(url) {
                node.dependencies.insert(dep);
            }
        }
    }

    /// Marks the existing edge `from -> to` as dynamic-import only.
    pub fn mark_lazy(&mut self, from: &Url, to: &Url) {
        if let Some(node) = self.nodes.get_mut(from) {
            if node.dependencies.contains(to) {
                node.lazy.insert(to.clone());
            }
        }
    }

    pub fn get_dependencies(&self, url: &Url) -> Option<&IndexSet<Url>> {
        self.nodes.get(url).map(|n| &n.dependencies)
    }

    pub fn get_dependents(&self, url: &Url) -> Option<&IndexSet<Url>> {
        self.nodes.get(url).map(|n| &n.dependents)
    }

    pub fn get_all_nodes(&self) -> impl Iterator<Item = &Url> + '_ {
        self.nodes.keys()
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.nodes.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node, dependencies before dependents.
    ///
    /// Fails on the first cycle found, naming the URL that closed it and the
    /// path around the cycle.
    pub fn topological_sort(&self) -> Result<Vec<Url>> {
        let mut marks: IndexMap<&Url, Mark> = IndexMap::with_capacity(self.nodes.len());
        let mut stack: Vec<&Url> = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for url in self.nodes.keys() {
            self.visit(url, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'g>(
        &'g self,
        url: &'g Url,
        marks: &mut IndexMap<&'g Url, Mark>,
        stack: &mut Vec<&'g Url>,
        order: &mut Vec<Url>,
    ) -> Result<()> {
        match marks.get(url) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(LoaderError::CircularDependency {
                    url: url.clone(),
                    path: cycle_path(stack, url),
                });
            }
            None => {}
        }

        marks.insert(url, Mark::Visiting);
        stack.push(url);
        if let Some(node) = self.nodes.get(url) {
            for dep in &node.dependencies {
                self.visit(dep, marks, stack, order)?;
            }
        }
        stack.pop();
        marks.insert(url, Mark::Done);
        order.push(url.clone());
        Ok(())
    }

    /// Every cycle reachable in the graph, each as a closed path
    /// (`[a, b, a]`). Diagnostic only; never fails.
    pub fn detect_cycles(&self) -> Vec<Vec<Url>> {
        let mut marks: IndexMap<&Url, Mark> = IndexMap::with_capacity(self.nodes.len());
        let mut stack: Vec<&Url> = Vec::new();
        let mut cycles = Vec::new();

        for url in self.nodes.keys() {
            if !marks.contains_key(url) {
                self.collect_cycles(url, &mut marks, &mut stack, &mut cycles);
            }
        }
        cycles
    }

    fn collect_cycles<'g>(
        &'g self,
        url: &'g Url,
        marks: &mut IndexMap<&'g Url, Mark>,
        stack: &mut Vec<&'g Url>,
        cycles: &mut Vec<Vec<Url>>,
    ) {
        marks.insert(url, Mark::Visiting);
        stack.push(url);

        if let Some(node) = self.nodes.get(url) {
            for dep in &node.dependencies {
                match marks.get(dep) {
                    Some(Mark::Visiting) => cycles.push(cycle_path(stack, dep)),
                    Some(Mark::Done) => {}
                    None => self.collect_cycles(dep, marks, stack, cycles),
                }
            }
        }

        stack.pop();
        marks.insert(url, Mark::Done);
    }

    /// Everything evaluated when `url` is imported: the modules reached
    /// through static edges, excluding `url` itself unless it sits on a cycle.
    pub fn eager_dependencies(&self, url: &Url) -> Vec<Url> {
        let mut seen: IndexSet<&Url> = IndexSet::new();
        let mut queue: Vec<&Url> = self.eager_edges(url).collect();

        while let Some(next) = queue.pop() {
            if !seen.insert(next) {
                continue;
            }
            queue.extend(self.eager_edges(next).filter(|d| !seen.contains(*d)));
        }
        seen.into_iter().cloned().collect()
    }

    fn eager_edges<'g>(&'g self, url: &Url) -> impl Iterator<Item = &'g Url> + 'g {
        self.nodes
            .get(url)
            .into_iter()
            .flat_map(|node| node.dependencies.iter().filter(|d| !node.lazy.contains(*d)))
    }
}

fn cycle_path(stack: &[&Url], closing: &Url) -> Vec<Url> {
    let start = stack.iter().position(|u| *u == closing).unwrap_or(0);
    stack[start..]
        .iter()
        .map(|u| (*u).clone())
        .chain(std::iter::once(closing.clone()))
        .collect()
}
