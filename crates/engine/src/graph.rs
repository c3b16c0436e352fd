// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directed dependency graph with strongly connected components.
//!
//! An edge `a -> b` means `a` needs `b` built first. Node order is
//! insertion order and every query that returns nodes preserves it, so
//! scheduling decisions never depend on hash order.

use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Edges<N> {
    children: IndexSet<N>,
    parents: IndexSet<N>,
}

impl<N> Default for Edges<N> {
    fn default() -> Self {
        Self {
            children: IndexSet::new(),
            parents: IndexSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    nodes: IndexMap<N, Edges<N>>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }
}

const UNVISITED: usize = usize::MAX;

impl<N: Clone + Eq + Hash> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: N) {
        self.nodes.entry(node).or_default();
    }

    /// Add `from -> to`. Both nodes must already exist.
    pub fn add_edge(&mut self, from: &N, to: &N) -> bool {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return false;
        }
        let added = self
            .nodes
            .get_mut(from)
            .is_some_and(|e| e.children.insert(to.clone()));
        if let Some(e) = self.nodes.get_mut(to) {
            e.parents.insert(from.clone());
        }
        added
    }

    /// Remove a node and every edge touching it. Returns its former parents.
    pub fn remove_node(&mut self, node: &N) -> Vec<N> {
        let Some(edges) = self.nodes.shift_remove(node) else {
            return Vec::new();
        };
        for child in &edges.children {
            if let Some(e) = self.nodes.get_mut(child) {
                e.parents.shift_remove(node);
            }
        }
        for parent in &edges.parents {
            if let Some(e) = self.nodes.get_mut(parent) {
                e.children.shift_remove(node);
            }
        }
        edges
            .parents
            .into_iter()
            .filter(|p| p != node)
            .collect()
    }

    /// Drop every outgoing edge of `node`.
    pub fn delete_edges(&mut self, node: &N) {
        let children = match self.nodes.get_mut(node) {
            Some(e) => std::mem::take(&mut e.children),
            None => return,
        };
        for child in &children {
            if let Some(e) = self.nodes.get_mut(child) {
                e.parents.shift_remove(node);
            }
        }
    }

    pub fn contains(&self, node: &N) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.keys()
    }

    pub fn children(&self, node: &N) -> impl Iterator<Item = &N> {
        self.nodes.get(node).into_iter().flat_map(|e| e.children.iter())
    }

    pub fn parents(&self, node: &N) -> impl Iterator<Item = &N> {
        self.nodes.get(node).into_iter().flat_map(|e| e.parents.iter())
    }

    pub fn out_degree(&self, node: &N) -> usize {
        self.nodes.get(node).map_or(0, |e| e.children.len())
    }

    pub fn in_degree(&self, node: &N) -> usize {
        self.nodes.get(node).map_or(0, |e| e.parents.len())
    }

    pub fn has_edge(&self, from: &N, to: &N) -> bool {
        self.nodes.get(from).is_some_and(|e| e.children.contains(to))
    }

    /// Nodes with no outgoing edges.
    pub fn leaves(&self) -> Vec<N> {
        self.nodes
            .iter()
            .filter(|(_, e)| e.children.is_empty())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Strongly connected components (Tarjan, iterative).
    ///
    /// Components come out in reverse topological order: a component is
    /// listed before any component that depends on it. Members keep
    /// insertion order.
    pub fn strongly_connected_components(&self) -> Vec<Vec<N>> {
        let n = self.nodes.len();
        let successors: Vec<Vec<usize>> = self
            .nodes
            .values()
            .map(|e| {
                e.children
                    .iter()
                    .filter_map(|c| self.nodes.get_index_of(c))
                    .collect()
            })
            .collect();

        let mut index = vec![UNVISITED; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut next = 0;
        let mut components = Vec::new();

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next;
            low[root] = next;
            next += 1;
            stack.push(root);
            on_stack[root] = true;
            let mut work = vec![(root, 0usize)];

            while let Some((v, pos)) = work.last().copied() {
                if let Some(&w) = successors[v].get(pos) {
                    if let Some(top) = work.last_mut() {
                        top.1 += 1;
                    }
                    if index[w] == UNVISITED {
                        index[w] = next;
                        low[w] = next;
                        next += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        work.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                    continue;
                }

                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut members = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        members.push(w);
                        if w == v {
                            break;
                        }
                    }
                    members.sort_unstable();
                    components.push(
                        members
                            .into_iter()
                            .filter_map(|i| self.nodes.get_index(i).map(|(k, _)| k.clone()))
                            .collect(),
                    );
                }
            }
        }
        components
    }

    /// Whether `members` form a cycle: more than one node, or a self-loop.
    fn is_cycle(&self, members: &[N]) -> bool {
        match members {
            [single] => self.has_edge(single, single),
            _ => members.len() > 1,
        }
    }

    /// Cycles with no edge leaving the component.
    ///
    /// Only these can be broken: anything else still waits on work outside
    /// the cycle.
    pub fn leaf_cycles(&self) -> Vec<Vec<N>> {
        self.strongly_connected_components()
            .into_iter()
            .filter(|members| self.is_cycle(members))
            .filter(|members| {
                members
                    .iter()
                    .flat_map(|m| self.children(m))
                    .all(|c| members.contains(c))
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
