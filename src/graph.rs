// src/graph.rs

//! Orders the groups being built so every group is finalized before any
//! group that depends on it: sub-group inclusion, difference against a
//! new group, and component moves all create ordering edges.
//!
//! Cycles are detected through strongly-connected components; any
//! component with more than one member is fatal and every cycle is
//! reported. Ties in the final order are broken by group name, so the
//! order is fully deterministic.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use petgraph::algo::condensation;
use petgraph::graph::DiGraph;
use tracing::debug;

use crate::error::{Error, Result};
use crate::group::SingleGroup;

/// Edges `child -> parent`: the child must be finalized first.
fn ordering_edges(groups: &IndexMap<String, SingleGroup>) -> Vec<(String, String)> {
    let mut edges = Vec::new();
    for (name, group) in groups {
        for (child_name, _) in group.iter_new_groups() {
            edges.push((child_name.to_string(), name.clone()));
        }
        for child_name in group.new_group_differences() {
            edges.push((child_name.clone(), name.clone()));
        }
        for mv in group.component_moves() {
            // this group must be done before everything it copies into
            for to_group in &mv.to_groups {
                edges.push((name.clone(), to_group.clone()));
            }
        }
    }
    edges
        .into_iter()
        .filter(|(a, b)| groups.contains_key(a) && groups.contains_key(b))
        .collect()
}

/// Produce a total build order for the groups, or report every inclusion
/// cycle.
pub fn sort_groups(groups: &IndexMap<String, SingleGroup>) -> Result<Vec<String>> {
    let edges = ordering_edges(groups);

    // SCC pass for complete cycle reporting
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices = BTreeMap::new();
    for name in groups.keys() {
        indices.insert(name.clone(), graph.add_node(name.clone()));
    }
    for (from, to) in &edges {
        graph.add_edge(indices[from], indices[to], ());
    }
    let condensed = condensation(graph, true);
    let mut cycles: Vec<Vec<String>> = condensed
        .node_weights()
        .filter(|members| members.len() > 1)
        .map(|members| {
            let mut cycle = members.clone();
            cycle.sort();
            cycle
        })
        .collect();
    if !cycles.is_empty() {
        cycles.sort();
        return Err(Error::GroupCycles { cycles });
    }

    // Kahn's algorithm with a name-sorted ready set
    let mut in_degree: BTreeMap<&str, usize> =
        groups.keys().map(|n| (n.as_str(), 0)).collect();
    let mut successors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (from, to) in &edges {
        *in_degree.get_mut(to.as_str()).unwrap() += 1;
        successors.entry(from.as_str()).or_default().push(to.as_str());
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut order = Vec::with_capacity(groups.len());
    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for succ in successors.get(name).into_iter().flatten() {
            let degree = in_degree.get_mut(succ).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.insert(succ);
            }
        }
    }
    debug!(order = ?order, "group build order");
    Ok(order)
}
