use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::framegraph::{
    collect::ActiveNode,
    node::{NodeId, Usage},
    resource::ResourceId,
};

/// Producer -> consumer ordering constraint.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

type NodeList = SmallVec<[NodeId; 4]>;

#[derive(Clone, Debug, Default)]
pub(crate) struct ResourceUsers {
    pub openers: NodeList,
    pub writers: NodeList,
    pub readers: NodeList,
    pub closers: NodeList,
}

impl ResourceUsers {
    fn users_mut(&mut self, usage: Usage) -> &mut NodeList {
        match usage {
            Usage::Open => &mut self.openers,
            Usage::Write => &mut self.writers,
            Usage::Read => &mut self.readers,
            Usage::Close => &mut self.closers,
        }
    }
}

/// Inverts the per-node lists into resource -> users by category.
pub(crate) fn user_index(
    active: &BTreeMap<NodeId, ActiveNode>,
) -> BTreeMap<ResourceId, ResourceUsers> {
    let mut index: BTreeMap<ResourceId, ResourceUsers> = BTreeMap::new();

    for (id, node) in active {
        for usage in Usage::ALL {
            for resource in node.resources(usage) {
                index.entry(*resource).or_default().users_mut(usage).push(*id);
            }
        }
    }

    index
}

/// Derives edges from the user index:
/// Open -> Write, Open|Write -> Read and Open|Write|Read -> Close.
///
/// Multiple users in one category produce edges to all of them, which can
/// over-constrain the schedule but never misorder it. Self edges are dropped.
pub(crate) fn build_edges(index: &BTreeMap<ResourceId, ResourceUsers>) -> BTreeSet<Edge> {
    let mut edges = BTreeSet::new();

    let mut connect = |from: &[NodeId], to: &[NodeId]| {
        for &src in from {
            for &dst in to {
                if src != dst {
                    edges.insert(Edge { from: src, to: dst });
                }
            }
        }
    };

    for users in index.values() {
        connect(&users.openers, &users.writers);

        connect(&users.openers, &users.readers);
        connect(&users.writers, &users.readers);

        connect(&users.openers, &users.closers);
        connect(&users.writers, &users.closers);
        connect(&users.readers, &users.closers);
    }

    edges
}
