//! Contains the [World](struct.World.html) entity collection and its
//! operations.

use crate::entity::{EntityRecord, Member};
use crate::handle::{ComponentHandle, EntityHandle, HandleAllocator};
use crate::hash::HandleHasher;
use crate::query::{Match, Requirement, Signature};
use crate::registry::{component_id, registry, Component, ComponentId};
use crate::storage::{Arena, ArenaIndex, Slot};
use fnv::FnvHashMap;
use itertools::Itertools;
use smallvec::{smallvec, SmallVec};
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::marker::PhantomData;
use std::ptr::NonNull;
use thiserror::Error;
use tracing::{debug, trace};

type HandleMap<K, V> = HashMap<K, V, BuildHasherDefault<HandleHasher>>;

/// Error type for failed world operations.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The entity does not exist in this world.
    #[error("no such entity {0}")]
    NoSuchEntity(EntityHandle),
    /// The component ID names no registered type.
    #[error("component type {0:?} is not registered")]
    UnknownComponentType(ComponentId),
}

/// Where a live component is stored; the value type of the reverse handle
/// index.
#[derive(Debug, Copy, Clone)]
struct Location {
    entity: EntityHandle,
    id: ComponentId,
    index: ArenaIndex,
}

/// A set of components which can populate a new entity.
///
/// Implemented for tuples of up to eight components; the unit type builds an
/// empty entity.
pub trait EntityTemplate {
    /// Attaches every component in this template to `entity`.
    fn attach(self, world: &mut World, entity: EntityHandle);
}

impl EntityTemplate for () {
    fn attach(self, _: &mut World, _: EntityHandle) {}
}

macro_rules! entity_template_tuple {
    ($head_ty:ident) => {
        impl_entity_template!($head_ty);
    };
    ($head_ty:ident, $( $tail_ty:ident ),*) => (
        impl_entity_template!($head_ty, $( $tail_ty ),*);
        entity_template_tuple!($( $tail_ty ),*);
    );
}

macro_rules! impl_entity_template {
    ($($ty: ident),*) => {
        #[allow(non_snake_case)]
        impl<$( $ty: Component, )*> EntityTemplate for ($( $ty, )*) {
            fn attach(self, world: &mut World, entity: EntityHandle) {
                let ($($ty,)*) = self;
                $( let _ = world.add_component(entity, $ty); )*
            }
        }
    };
}

entity_template_tuple!(A, B, C, D, E, F, G, H);

/// A collection of entities and their components.
///
/// Component data is stored tightly packed in one arena per component type;
/// entities are identity records pointing at their slots, and a reverse
/// index resolves component handles in constant time. Worlds are independent
/// of one another and cannot be cloned.
///
/// Every failing operation returns before mutating anything, so the world is
/// always left consistent.
pub struct World {
    arenas: FnvHashMap<ComponentId, Arena>,
    entities: HandleMap<EntityHandle, EntityRecord>,
    locations: HandleMap<ComponentHandle, Location>,
    allocator: HandleAllocator,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Constructs an empty world with a freshly seeded handle generator.
    pub fn new() -> Self {
        Self {
            arenas: FnvHashMap::default(),
            entities: HandleMap::default(),
            locations: HandleMap::default(),
            allocator: HandleAllocator::new(),
        }
    }

    /// Returns the number of entities in the world.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the world contains no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if the world contains an entity with the given handle.
    pub fn contains(&self, entity: EntityHandle) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Appends a new entity built from a tuple of components and returns its
    /// handle.
    ///
    /// The components are moved into the world's arenas; `push(())` creates
    /// an entity with no components.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cohort::World;
    /// # #[derive(Clone, Default)] struct Position(f32, f32);
    /// # #[derive(Clone, Default)] struct Velocity(f32, f32);
    /// let mut world = World::new();
    /// let entity = world.push((Position(0.0, 0.0), Velocity(1.0, 0.5)));
    /// assert!(world.contains(entity));
    /// ```
    pub fn push<T: EntityTemplate>(&mut self, components: T) -> EntityHandle {
        let entity = self.allocator.entity_handle();
        let previous = self.entities.insert(entity, EntityRecord::new(entity));
        debug_assert!(previous.is_none(), "duplicate entity handle generated");
        debug!(entity = %entity, "push entity");
        components.attach(self, entity);
        entity
    }

    /// Attaches a component to an entity, moving it into the component's
    /// arena, and returns the new component's handle.
    ///
    /// Adding a type the entity already has is a no-op returning the
    /// existing handle; the passed value is dropped.
    pub fn add_component<T: Component>(
        &mut self,
        entity: EntityHandle,
        component: T,
    ) -> Result<ComponentHandle, WorldError> {
        let template = NonNull::from(&component).cast();
        self.attach_erased(entity, component_id::<T>(), Some(template))
    }

    /// Attaches a default-constructed component of type `T` to an entity.
    pub fn add_default<T: Component>(
        &mut self,
        entity: EntityHandle,
    ) -> Result<ComponentHandle, WorldError> {
        self.attach_erased(entity, component_id::<T>(), None)
    }

    /// Attaches a default-constructed component of the given runtime type.
    ///
    /// Unlike the typed methods this can fail with
    /// [UnknownComponentType](enum.WorldError.html#variant.UnknownComponentType)
    /// when `id` names no registered type.
    pub fn add_default_by_id(
        &mut self,
        entity: EntityHandle,
        id: ComponentId,
    ) -> Result<ComponentHandle, WorldError> {
        self.attach_erased(entity, id, None)
    }

    fn attach_erased(
        &mut self,
        entity: EntityHandle,
        id: ComponentId,
        template: Option<NonNull<u8>>,
    ) -> Result<ComponentHandle, WorldError> {
        match self.entities.get(&entity) {
            None => return Err(WorldError::NoSuchEntity(entity)),
            Some(record) => {
                if let Some(existing) = record.component_handle(id) {
                    trace!(entity = %entity, "component type already attached");
                    return Ok(existing);
                }
            }
        }
        let descriptor = registry()
            .descriptor(id)
            .ok_or(WorldError::UnknownComponentType(id))?;

        let handle = self.allocator.component_handle();
        let arena = self
            .arenas
            .entry(id)
            .or_insert_with(|| Arena::new(&descriptor));
        let (index, dst) = arena.alloc_slot();
        // The slot is fully written before the member triple and the reverse
        // index can observe it.
        unsafe { descriptor.create(dst, handle, entity, template) };

        if let Some(record) = self.entities.get_mut(&entity) {
            record.push_member(Member { id, index, handle });
        }
        let previous = self.locations.insert(handle, Location { entity, id, index });
        debug_assert!(previous.is_none(), "duplicate component handle generated");
        trace!(entity = %entity, component = %handle, "attach component");
        Ok(handle)
    }

    /// Removes an entity, destroying every component attached to it.
    ///
    /// Returns `false` if the entity does not exist. The order in which the
    /// entity's components are destroyed is unspecified.
    pub fn remove_entity(&mut self, entity: EntityHandle) -> bool {
        let record = match self.entities.remove(&entity) {
            Some(record) => record,
            None => return false,
        };
        debug!(entity = %entity, components = record.len(), "remove entity");
        for member in record.members {
            self.locations.remove(&member.handle);
            self.detach_slot(member.id, member.index);
        }
        true
    }

    /// Removes the component identified by `handle` from its entity.
    ///
    /// Returns `false` if no entity owns such a component.
    pub fn remove_component(&mut self, component: ComponentHandle) -> bool {
        let location = match self.locations.remove(&component) {
            Some(location) => location,
            None => return false,
        };
        trace!(component = %component, "remove component");
        if let Some(record) = self.entities.get_mut(&location.entity) {
            record.remove_member(location.id);
        }
        self.detach_slot(location.id, location.index);
        true
    }

    /// Removes the component of the given type from `entity`.
    ///
    /// Returns `false` if the entity does not exist or has no component of
    /// that type.
    pub fn remove_entity_component(&mut self, entity: EntityHandle, id: ComponentId) -> bool {
        let member = match self
            .entities
            .get_mut(&entity)
            .and_then(|record| record.remove_member(id))
        {
            Some(member) => member,
            None => return false,
        };
        trace!(entity = %entity, component = %member.handle, "remove component");
        self.locations.remove(&member.handle);
        self.detach_slot(id, member.index);
        true
    }

    /// Swap-removes the slot at `index` in the arena for `id`, repairing the
    /// relocated slot's member triple and reverse index entry.
    fn detach_slot(&mut self, id: ComponentId, index: ArenaIndex) {
        let arena = match self.arenas.get_mut(&id) {
            Some(arena) => arena,
            None => return,
        };
        let old_last = ArenaIndex(arena.len() - arena.stride());
        if let Some(moved) = arena.swap_remove(index) {
            // The slot previously at the arena tail now lives at `index`;
            // exactly one member triple referenced the old offset.
            if let Some(record) = self.entities.get_mut(&moved.entity()) {
                record.relocate_member(id, old_last, index);
            } else {
                debug_assert!(false, "relocated slot has no owning entity");
            }
            if let Some(location) = self.locations.get_mut(&moved.handle()) {
                location.index = index;
            }
        }
    }

    /// Returns the entity record for `handle`.
    pub fn entity(&self, handle: EntityHandle) -> Option<&EntityRecord> {
        if !handle.is_valid() {
            return None;
        }
        self.entities.get(&handle)
    }

    /// Returns the records for each handle in `handles`, omitting handles
    /// which resolve to nothing.
    pub fn entities(&self, handles: &[EntityHandle]) -> Vec<&EntityRecord> {
        handles
            .iter()
            .filter_map(|&handle| self.entity(handle))
            .collect()
    }

    /// Returns a reference to the `T` attached to `entity`.
    pub fn get_component<T: Component>(&self, entity: EntityHandle) -> Option<&T> {
        let ptr = self.component_slot::<T>(self.entity(entity)?.member(component_id::<T>())?)?;
        // Member triples always reference live, initialized slots of the
        // member's type.
        Some(unsafe { &(*ptr.as_ptr()).data })
    }

    /// Returns a mutable reference to the `T` attached to `entity`.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityHandle) -> Option<&mut T> {
        let ptr = self.component_slot::<T>(self.entity(entity)?.member(component_id::<T>())?)?;
        Some(unsafe { &mut (*ptr.as_ptr()).data })
    }

    /// Resolves a component handle to a reference, in constant time.
    ///
    /// Returns `None` when the handle resolves to nothing or the component
    /// is not a `T`.
    pub fn component<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        let ptr = self.located_slot::<T>(handle)?;
        Some(unsafe { &(*ptr.as_ptr()).data })
    }

    /// Resolves a component handle to a mutable reference, in constant time.
    pub fn component_mut<T: Component>(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        let ptr = self.located_slot::<T>(handle)?;
        Some(unsafe { &mut (*ptr.as_ptr()).data })
    }

    fn component_slot<T: Component>(&self, member: &Member) -> Option<NonNull<Slot<T>>> {
        let arena = self.arenas.get(&member.id)?;
        Some(arena.slot_ptr(member.index).cast())
    }

    fn located_slot<T: Component>(&self, handle: ComponentHandle) -> Option<NonNull<Slot<T>>> {
        let location = self.locations.get(&handle)?;
        if location.id != component_id::<T>() {
            return None;
        }
        let arena = self.arenas.get(&location.id)?;
        Some(arena.slot_ptr(location.index).cast())
    }

    /// Returns the number of live components of the given type.
    pub fn count_components(&self, id: ComponentId) -> usize {
        self.arenas
            .get(&id)
            .map_or(0, |arena| arena.slot_count())
    }

    /// Removes every entity and destroys every component in the world.
    pub fn clear(&mut self) {
        debug!(entities = self.len(), "clear world");
        for arena in self.arenas.values_mut() {
            arena.clear();
        }
        self.arenas.clear();
        self.entities.clear();
        self.locations.clear();
    }

    /// Collects, for each entity owning every required component of
    /// `signature`, one match holding a component pointer per signature
    /// position.
    ///
    /// Tuple order is unspecified but stable for a fixed world state. The
    /// matches borrow the world, so the world cannot be mutated while they
    /// are alive.
    pub fn relevant(&mut self, signature: &Signature) -> Vec<Match<'_>> {
        let entries = signature.entries();
        if entries.is_empty() {
            return Vec::new();
        }

        if entries.len() == 1 {
            return self.relevant_single(entries[0].0);
        }
        if !signature.has_required() {
            return Vec::new();
        }

        // Pivot on the rarest required type: the outer scan is then bounded
        // by the smallest population. Ties go to the earliest entry.
        let pivot = match entries.iter().position_min_by_key(|&&(id, requirement)| {
            (
                requirement == Requirement::Optional,
                self.count_components(id),
            )
        }) {
            Some(position) => position,
            None => return Vec::new(),
        };

        let pivot_arena = match self.arenas.get(&entries[pivot].0) {
            Some(arena) => arena,
            None => return Vec::new(),
        };

        let mut matches = Vec::with_capacity(pivot_arena.slot_count());
        'slots: for (index, pivot_ptr) in pivot_arena.iter_slots() {
            let owner = pivot_arena.header(index).entity();
            let record = match self.entities.get(&owner) {
                Some(record) => record,
                None => {
                    debug_assert!(false, "live slot without owning entity");
                    continue;
                }
            };

            let mut slots: SmallVec<[Option<(ComponentId, NonNull<u8>)>; 8]> =
                SmallVec::with_capacity(entries.len());
            for (position, &(id, requirement)) in entries.iter().enumerate() {
                if position == pivot {
                    slots.push(Some((id, pivot_ptr)));
                    continue;
                }
                let slot = record
                    .member(id)
                    .and_then(|member| self.arenas.get(&id).map(|arena| arena.slot_ptr(member.index)));
                match slot {
                    Some(ptr) => slots.push(Some((id, ptr))),
                    None if requirement == Requirement::Required => continue 'slots,
                    None => slots.push(None),
                }
            }
            matches.push(Match {
                entity: owner,
                slots,
                _world: PhantomData,
            });
        }
        trace!(matched = matches.len(), "query");
        matches
    }

    fn relevant_single(&mut self, id: ComponentId) -> Vec<Match<'_>> {
        let arena = match self.arenas.get(&id) {
            Some(arena) => arena,
            None => return Vec::new(),
        };
        arena
            .iter_slots()
            .map(|(index, ptr)| Match {
                entity: arena.header(index).entity(),
                slots: smallvec![Some((id, ptr))],
                _world: PhantomData,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Marker;

    #[test]
    fn unregistered_component_id_is_rejected() {
        let mut world = World::new();
        let entity = world.push(());

        let bogus = ComponentId(u32::MAX - 1);
        assert_eq!(
            world.add_default_by_id(entity, bogus),
            Err(WorldError::UnknownComponentType(bogus))
        );
        // The failed call left the world untouched.
        assert!(world.entity(entity).unwrap().is_empty());
        assert!(world.arenas.is_empty());
    }

    #[test]
    fn add_default_by_id_round_trips() {
        let mut world = World::new();
        let entity = world.push(());

        let id = component_id::<Marker>();
        let handle = world.add_default_by_id(entity, id).unwrap();

        assert_eq!(
            world.entity(entity).unwrap().component_handle(id),
            Some(handle)
        );
        assert_eq!(world.count_components(id), 1);
    }
}
