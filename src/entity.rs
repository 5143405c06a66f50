//! Contains the entity record type.

use crate::handle::{ComponentHandle, EntityHandle};
use crate::registry::ComponentId;
use crate::storage::ArenaIndex;
use smallvec::SmallVec;

/// One component attached to an entity: its type, its current slot offset,
/// and its handle.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Member {
    pub id: ComponentId,
    pub index: ArenaIndex,
    pub handle: ComponentHandle,
}

/// An entity: an identity plus the set of components attached to it.
///
/// Records carry no data of their own; component data lives in the world's
/// per-type arenas. An entity holds at most one component per type.
#[derive(Debug)]
pub struct EntityRecord {
    pub(crate) handle: EntityHandle,
    pub(crate) members: SmallVec<[Member; 4]>,
}

impl EntityRecord {
    pub(crate) fn new(handle: EntityHandle) -> Self {
        Self {
            handle,
            members: SmallVec::new(),
        }
    }

    /// Returns this entity's handle.
    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    /// Returns the number of components attached to this entity.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the entity has no components.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `true` if a component of the given type is attached.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.member(id).is_some()
    }

    /// Returns the handle of the attached component of the given type.
    pub fn component_handle(&self, id: ComponentId) -> Option<ComponentHandle> {
        self.member(id).map(|member| member.handle)
    }

    /// Iterates the IDs of every attached component type. Order is
    /// insertion-biased and carries no meaning.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.members.iter().map(|member| member.id)
    }

    pub(crate) fn member(&self, id: ComponentId) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    pub(crate) fn push_member(&mut self, member: Member) {
        debug_assert!(!self.contains(member.id));
        self.members.push(member);
    }

    /// Removes the member for `id` by swapping with the last entry.
    pub(crate) fn remove_member(&mut self, id: ComponentId) -> Option<Member> {
        let position = self.members.iter().position(|member| member.id == id)?;
        Some(self.members.swap_remove(position))
    }

    /// Repairs the one member whose slot was relocated from `from` to `to`.
    pub(crate) fn relocate_member(&mut self, id: ComponentId, from: ArenaIndex, to: ArenaIndex) {
        for member in self.members.iter_mut() {
            if member.id == id && member.index == from {
                member.index = to;
                return;
            }
        }
        debug_assert!(false, "no member referenced the relocated slot");
    }
}
