use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::framegraph::{edges::Edge, node::NodeId};

/// Nodes that could not be layered because they sit on or behind a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CycleError {
    pub remaining: Vec<NodeId>,
}

/// Partitions `nodes` into execution layers.
///
/// Works backwards from the sinks: every round peels the nodes that no
/// remaining edge starts from, then the peeled rounds are reversed into
/// forward order. Each node lands in the latest layer its consumers allow.
/// Within a layer nodes are ordered by id.
pub(crate) fn layer_nodes(
    nodes: impl IntoIterator<Item = NodeId>,
    edges: &BTreeSet<Edge>,
) -> Result<Vec<Vec<NodeId>>, CycleError> {
    let mut out_degree: BTreeMap<NodeId, usize> = nodes.into_iter().map(|id| (id, 0)).collect();
    let mut producers: BTreeMap<NodeId, SmallVec<[NodeId; 4]>> = BTreeMap::new();

    for edge in edges {
        if !out_degree.contains_key(&edge.to) {
            continue;
        }
        if let Some(degree) = out_degree.get_mut(&edge.from) {
            *degree += 1;
            producers.entry(edge.to).or_default().push(edge.from);
        }
    }

    let mut sinks: Vec<NodeId> = out_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut remaining = out_degree.len();
    let mut peeled: Vec<Vec<NodeId>> = Vec::new();

    while !sinks.is_empty() {
        let mut next = Vec::new();

        for sink in &sinks {
            let Some(sources) = producers.get(sink) else {
                continue;
            };
            for source in sources {
                if let Some(degree) = out_degree.get_mut(source) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*source);
                    }
                }
            }
        }

        remaining -= sinks.len();
        next.sort_unstable();
        peeled.push(std::mem::replace(&mut sinks, next));
    }

    if remaining > 0 {
        return Err(CycleError {
            remaining: out_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id)
                .collect(),
        });
    }

    peeled.reverse();
    Ok(peeled)
}
