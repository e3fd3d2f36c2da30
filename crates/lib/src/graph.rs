//! Cross-package dependency graph.
//!
//! Nodes are registered packages; an edge runs from a dependency to each of
//! its dependents. Dependencies are resolved against the whole registry, so a
//! manifest may name a package that is loaded after it.
//!
//! Node indices coincide with registration indices, which is how ties in the
//! topological order are broken.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("package '{package}' depends on unknown package '{dependency}'")]
  MissingDependency { package: String, dependency: String },

  #[error("cyclic dependency: {}", CyclePath(.cycle))]
  Cycle { cycle: Vec<String> },
}

struct CyclePath<'a>(&'a [String]);

impl fmt::Display for CyclePath<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for name in self.0 {
      write!(f, "{} -> ", name)?;
    }
    match self.0.first() {
      Some(first) => f.write_str(first),
      None => Ok(()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  OnStack,
  Done,
}

#[derive(Debug)]
pub struct DependencyGraph {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
  /// Per node, its distinct dependencies in declared order.
  depends_on: Vec<Vec<usize>>,
}

impl DependencyGraph {
  /// Build the graph over every registered package and reject cycles.
  pub fn build(registry: &Registry) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for package in registry.packages() {
      let idx = graph.add_node(package.name.clone());
      nodes.insert(package.name.clone(), idx);
    }

    let mut depends_on = Vec::with_capacity(registry.len());
    for package in registry.packages() {
      let dependent = nodes[&package.name];
      let mut seen = HashSet::new();
      let mut deps = Vec::new();

      for dependency in &package.dependencies {
        let Some(&dep_idx) = nodes.get(dependency) else {
          return Err(GraphError::MissingDependency {
            package: package.name.clone(),
            dependency: dependency.clone(),
          });
        };
        if seen.insert(dep_idx) {
          graph.update_edge(dep_idx, dependent, ());
          deps.push(dep_idx.index());
        }
      }
      depends_on.push(deps);
    }

    let dag = Self {
      graph,
      nodes,
      depends_on,
    };

    if let Some(cycle) = dag.find_cycle() {
      return Err(GraphError::Cycle { cycle });
    }

    debug!(
      packages = dag.graph.node_count(),
      edges = dag.graph.edge_count(),
      "built dependency graph"
    );
    Ok(dag)
  }

  fn name(&self, index: usize) -> &str {
    &self.graph[NodeIndex::new(index)]
  }

  /// Depth-first search along "depends on" edges with recursion-stack marks.
  ///
  /// Roots are tried in registration order, so the reported cycle starts at
  /// its earliest-registered member reachable first.
  fn find_cycle(&self) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; self.depends_on.len()];

    for root in 0..self.depends_on.len() {
      if marks[root] != Mark::Unvisited {
        continue;
      }

      marks[root] = Mark::OnStack;
      let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

      while let Some(frame) = stack.last_mut() {
        let node = frame.0;
        let Some(&child) = self.depends_on[node].get(frame.1) else {
          marks[node] = Mark::Done;
          stack.pop();
          continue;
        };
        frame.1 += 1;

        match marks[child] {
          Mark::OnStack => {
            let start = stack.iter().position(|&(n, _)| n == child).unwrap_or(0);
            return Some(stack[start..].iter().map(|&(n, _)| self.name(n).to_string()).collect());
          }
          Mark::Unvisited => {
            marks[child] = Mark::OnStack;
            stack.push((child, 0));
          }
          Mark::Done => {}
        }
      }
    }

    None
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Packages in dependency order. Among packages that are ready at the same
  /// time, the earlier-registered one comes first.
  pub fn topological_order(&self) -> Vec<String> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
      .iter()
      .enumerate()
      .filter(|(_, deg)| **deg == 0)
      .map(|(i, _)| Reverse(i))
      .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(Reverse(i)) = ready.pop() {
      let idx = NodeIndex::new(i);
      order.push(self.graph[idx].clone());
      for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        let deg = &mut in_degree[dependent.index()];
        *deg -= 1;
        if *deg == 0 {
          ready.push(Reverse(dependent.index()));
        }
      }
    }

    order
  }

  /// Independence layers: a package sits one layer after its deepest
  /// dependency. Each layer is sorted by registration order.
  pub fn layers(&self) -> Vec<Vec<String>> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();

    let mut current: Vec<usize> = (0..in_degree.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut layers = Vec::new();

    while !current.is_empty() {
      let mut next = Vec::new();
      for &i in &current {
        for dependent in self.graph.neighbors_directed(NodeIndex::new(i), Direction::Outgoing) {
          let deg = &mut in_degree[dependent.index()];
          *deg -= 1;
          if *deg == 0 {
            next.push(dependent.index());
          }
        }
      }

      layers.push(current.iter().map(|&i| self.name(i).to_string()).collect());
      next.sort_unstable();
      current = next;
    }

    layers
  }

  /// Distinct direct dependencies of `name`, in declared order.
  pub fn dependencies_of(&self, name: &str) -> Vec<String> {
    self
      .nodes
      .get(name)
      .map(|idx| {
        self.depends_on[idx.index()]
          .iter()
          .map(|&i| self.name(i).to_string())
          .collect()
      })
      .unwrap_or_default()
  }

  /// Whether `from` is a (transitive) dependency of `to`.
  pub fn depends_transitively(&self, to: &str, from: &str) -> bool {
    match (self.nodes.get(from), self.nodes.get(to)) {
      (Some(&a), Some(&b)) if a != b => petgraph::algo::has_path_connecting(&self.graph, a, b, None),
      _ => false,
    }
  }

  pub fn edge_count(&self) -> usize {
    self.graph.edge_count()
  }
}
