use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::framegraph::{
    ImageState,
    graph::NodeSlot,
    node::{NodeId, Usage},
    resource::ResourceId,
};

pub(crate) type ResourceList = SmallVec<[ResourceId; 8]>;

/// Runtime descriptor of a node that takes part in the next schedule.
#[derive(Clone, Debug, Default)]
pub(crate) struct ActiveNode {
    pub open: ResourceList,
    pub write: ResourceList,
    pub read: ResourceList,
    pub close: ResourceList,
    /// Declared (resource, required state) pairs across all categories.
    pub states: SmallVec<[(ResourceId, ImageState); 4]>,
}

impl ActiveNode {
    pub fn resources(&self, usage: Usage) -> &[ResourceId] {
        match usage {
            Usage::Open => &self.open,
            Usage::Write => &self.write,
            Usage::Read => &self.read,
            Usage::Close => &self.close,
        }
    }
}

/// Extracts the descriptors of every constructed and enabled node.
///
/// Every node opens its own marker. Resource lists are sorted and
/// deduplicated so the following phases group deterministically.
pub(crate) fn collect_active(slots: &[NodeSlot]) -> BTreeMap<NodeId, ActiveNode> {
    slots
        .iter()
        .filter(|slot| slot.is_active())
        .map(|slot| {
            let desc = &slot.desc;
            let mut active = ActiveNode::default();

            active.open.push(desc.marker);

            for usage in Usage::ALL {
                let list = match usage {
                    Usage::Open => &mut active.open,
                    Usage::Write => &mut active.write,
                    Usage::Read => &mut active.read,
                    Usage::Close => &mut active.close,
                };

                for resource_use in desc.uses(usage) {
                    list.push(resource_use.resource);
                    if let Some(state) = resource_use.state {
                        active.states.push((resource_use.resource, state));
                    }
                }

                list.sort_unstable();
                list.dedup();
            }

            (desc.id, active)
        })
        .collect()
}
