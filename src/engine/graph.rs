//! Stream dependency graph
//!
//! Edges run parent → child. Scheduling uses Kahn's algorithm; among streams
//! that are ready at the same time, catalog order wins, so the result is
//! deterministic.

use crate::error::{Error, Result};
use crate::streams::Catalog;
use std::collections::{BTreeSet, HashMap};

/// Parent/child relations between streams
#[derive(Debug, Clone)]
pub struct StreamGraph {
    /// Names in catalog order
    names: Vec<String>,
    /// Parent index per stream
    parents: Vec<Option<usize>>,
    /// Child indices per stream, in catalog order
    children: Vec<Vec<usize>>,
    /// Topological order
    order: Vec<usize>,
}

impl StreamGraph {
    /// Build from `(name, parent)` pairs in catalog order
    pub fn new<'a>(edges: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> Result<Self> {
        let edges: Vec<(&str, Option<&str>)> = edges.into_iter().collect();

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(edges.len());
        for (i, (name, _)) in edges.iter().enumerate() {
            if index.insert(*name, i).is_some() {
                return Err(Error::graph(format!("Duplicate stream '{name}'")));
            }
        }

        let mut parents = vec![None; edges.len()];
        let mut children = vec![Vec::new(); edges.len()];
        for (i, (name, parent)) in edges.iter().enumerate() {
            if let Some(parent) = parent {
                let p = *index.get(parent).ok_or_else(|| {
                    Error::graph(format!("Stream '{name}' depends on unknown stream '{parent}'"))
                })?;
                parents[i] = Some(p);
                children[p].push(i);
            }
        }

        let order = topological_order(&parents, &children).ok_or_else(|| {
            Error::graph("Stream dependencies contain a cycle")
        })?;

        Ok(Self {
            names: edges.iter().map(|(n, _)| (*n).to_string()).collect(),
            parents,
            children,
            order,
        })
    }

    /// Build from a catalog's parent links
    pub fn from_catalog(catalog: &Catalog) -> Result<Self> {
        Self::new(catalog.streams().iter().map(|s| (s.name, s.parent_name())))
    }

    /// Streams in dependency order, parents first
    pub fn order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.names[i].as_str()).collect()
    }

    pub fn parent(&self, name: &str) -> Option<&str> {
        let i = self.position(name)?;
        self.parents[i].map(|p| self.names[p].as_str())
    }

    /// Direct children, in catalog order
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.position(name)
            .map(|i| {
                self.children[i]
                    .iter()
                    .map(|&c| self.names[c].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Streams without a parent, in dependency order
    pub fn roots(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|&&i| self.parents[i].is_none())
            .map(|&i| self.names[i].as_str())
            .collect()
    }

    /// Parent chain from the nearest parent up to the root
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.position(name).and_then(|i| self.parents[i]);
        while let Some(p) = current {
            chain.push(self.names[p].as_str());
            current = self.parents[p];
        }
        chain
    }

    /// A stream plus every stream below it, in dependency order
    pub fn subtree(&self, name: &str) -> Vec<&str> {
        let Some(root) = self.position(name) else {
            return Vec::new();
        };
        self.order
            .iter()
            .filter(|&&i| i == root || self.is_below(i, root))
            .map(|&i| self.names[i].as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn is_below(&self, node: usize, ancestor: usize) -> bool {
        let mut current = self.parents[node];
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parents[p];
        }
        false
    }
}

/// Kahn's algorithm, lowest index first among ready nodes
fn topological_order(parents: &[Option<usize>], children: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut in_degree: Vec<usize> = parents.iter().map(|p| usize::from(p.is_some())).collect();
    let mut ready: BTreeSet<usize> = (0..parents.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(parents.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &child in &children[node] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    (order.len() == parents.len()).then_some(order)
}
