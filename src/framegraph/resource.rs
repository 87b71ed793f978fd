use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

use ash::vk;

use crate::framegraph::FrameGraphError;

/// Registration-order index of a resource type (or of a node's marker).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// The native object a barrier is recorded against.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NativeHandle {
    Image(vk::Image),
    Buffer(vk::Buffer),
}

/// A typed, per-frame slot that nodes consume or produce.
///
/// Plain values keep the default `native_handle`. Tracked GPU resources
/// return the handle that scheduled barriers are patched with at run time.
pub trait Resource: Any {
    const NAME: &'static str;

    fn native_handle(&self) -> Option<NativeHandle> {
        None
    }
}

/// Object-safe view of a bound [`Resource`].
trait BoundResource: Any {
    fn native_handle(&self) -> Option<NativeHandle>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<R: Resource> BoundResource for R {
    fn native_handle(&self) -> Option<NativeHandle> {
        Resource::native_handle(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResourceKind {
    Value,
    /// Implicitly opened by its node, read by nodes ordered after it.
    NodeMarker,
}

#[derive(Clone, Debug)]
struct ResourceEntry {
    name: &'static str,
    kind: ResourceKind,
}

/// Assigns dense ids to resource types and node markers in the order they
/// are first seen.
#[derive(Default)]
pub struct ResourceRegistry {
    entries: Vec<ResourceEntry>,
    by_type: HashMap<TypeId, ResourceId>,
}

impl ResourceRegistry {
    pub fn resource_id<R: Resource>(&mut self) -> ResourceId {
        self.register(TypeId::of::<R>(), R::NAME, ResourceKind::Value)
    }

    pub fn marker_id<N: Any>(&mut self) -> ResourceId {
        self.register(TypeId::of::<N>(), short_type_name::<N>(), ResourceKind::NodeMarker)
    }

    pub fn lookup<R: Resource>(&self) -> Option<ResourceId> {
        self.by_type.get(&TypeId::of::<R>()).copied()
    }

    pub fn name(&self, id: ResourceId) -> &'static str {
        self.entries
            .get(id.index())
            .map(|e| e.name)
            .unwrap_or("<unregistered>")
    }

    pub fn kind(&self, id: ResourceId) -> Option<ResourceKind> {
        self.entries.get(id.index()).map(|e| e.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register(&mut self, type_id: TypeId, name: &'static str, kind: ResourceKind) -> ResourceId {
        if let Some(id) = self.by_type.get(&type_id) {
            return *id;
        }

        let id = ResourceId(self.entries.len() as u32);
        self.entries.push(ResourceEntry { name, kind });
        self.by_type.insert(type_id, id);
        id
    }
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Per-frame resource bindings. Independent of the schedule: binding or
/// clearing never marks the graph dirty.
#[derive(Default)]
pub struct Resources {
    registry: ResourceRegistry,
    slots: Vec<Option<Box<dyn BoundResource>>>,
}

impl Resources {
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    pub fn set<R: Resource>(&mut self, value: R) {
        let id = self.registry.resource_id::<R>();
        if self.slots.len() <= id.index() {
            self.slots.resize_with(id.index() + 1, || None);
        }
        self.slots[id.index()] = Some(Box::new(value));
    }

    pub fn get<R: Resource>(&self) -> anyhow::Result<&R> {
        match self.try_get::<R>() {
            Some(value) => Ok(value),
            None => anyhow::bail!(FrameGraphError::MissingResource { resource: R::NAME }),
        }
    }

    pub fn get_mut<R: Resource>(&mut self) -> anyhow::Result<&mut R> {
        let slot = self
            .registry
            .lookup::<R>()
            .and_then(|id| self.slots.get_mut(id.index()))
            .and_then(|slot| slot.as_mut())
            .and_then(|bound| bound.as_any_mut().downcast_mut::<R>());

        match slot {
            Some(value) => Ok(value),
            None => anyhow::bail!(FrameGraphError::MissingResource { resource: R::NAME }),
        }
    }

    /// For optional inputs whose producer may be disabled.
    pub fn try_get<R: Resource>(&self) -> Option<&R> {
        self.registry
            .lookup::<R>()
            .and_then(|id| self.slots.get(id.index()))
            .and_then(|slot| slot.as_ref())
            .and_then(|bound| bound.as_any().downcast_ref::<R>())
    }

    /// Unbinds `R`. Returns whether it was bound.
    pub fn unset<R: Resource>(&mut self) -> bool {
        self.registry
            .lookup::<R>()
            .and_then(|id| self.slots.get_mut(id.index()))
            .and_then(Option::take)
            .is_some()
    }

    pub fn is_bound(&self, id: ResourceId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    pub fn native_handle(&self, id: ResourceId) -> Option<NativeHandle> {
        self.slots
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .and_then(|bound| bound.native_handle())
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}
