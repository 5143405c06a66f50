//! Contains types for describing and consuming component queries.

use crate::handle::{ComponentHandle, EntityHandle};
use crate::registry::{component_id, Component, ComponentId};
use crate::storage::{ComponentHeader, Slot};
use smallvec::SmallVec;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Whether a signature entry must be present for an entity to match.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// The entity must own a component of this type.
    Required,
    /// The component is passed along when present and left out otherwise.
    Optional,
}

/// An ordered list of component types consumed by a system.
///
/// # Examples
///
/// ```
/// # use cohort::Signature;
/// # #[derive(Clone, Default)] struct Position(f32);
/// # #[derive(Clone, Default)] struct Velocity(f32);
/// let signature = Signature::new().require::<Position>().optional::<Velocity>();
/// assert_eq!(signature.len(), 2);
/// assert!(signature.has_required());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Signature {
    entries: SmallVec<[(ComponentId, Requirement); 8]>,
}

impl Signature {
    /// Constructs an empty signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a required component type.
    pub fn require<T: Component>(self) -> Self {
        self.with_id(component_id::<T>(), Requirement::Required)
    }

    /// Appends an optional component type.
    pub fn optional<T: Component>(self) -> Self {
        self.with_id(component_id::<T>(), Requirement::Optional)
    }

    /// Appends an entry by runtime ID.
    pub fn with_id(mut self, id: ComponentId, requirement: Requirement) -> Self {
        self.entries.push((id, requirement));
        self
    }

    /// Returns the signature entries in order.
    pub fn entries(&self) -> &[(ComponentId, Requirement)] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the signature has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if at least one entry is required.
    pub fn has_required(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, requirement)| *requirement == Requirement::Required)
    }
}

/// One matched entity: a component pointer per signature position.
///
/// A match borrows the world it came from, so no world mutation can happen
/// while matches are alive and the pointers stay valid for the whole borrow.
/// Required positions are always present; optional positions may be absent.
pub struct Match<'w> {
    pub(crate) entity: EntityHandle,
    pub(crate) slots: SmallVec<[Option<(ComponentId, NonNull<u8>)>; 8]>,
    pub(crate) _world: PhantomData<&'w mut ()>,
}

impl<'w> Match<'w> {
    /// Returns the handle of the matched entity.
    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    /// Returns the number of signature positions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the match has no positions.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if the given position matched a component.
    pub fn is_present(&self, position: usize) -> bool {
        matches!(self.slots.get(position), Some(Some(_)))
    }

    /// Returns the component at `position` if it is present and of type `T`.
    pub fn get<T: Component>(&self, position: usize) -> Option<&T> {
        let (id, ptr) = self.slots.get(position).copied().flatten()?;
        if id != component_id::<T>() {
            return None;
        }
        // The slot stays valid and unaliased for the world borrow held by
        // this match.
        Some(unsafe { &(*ptr.cast::<Slot<T>>().as_ptr()).data })
    }

    /// Returns the component at `position` mutably, if it is present and of
    /// type `T`.
    pub fn get_mut<T: Component>(&mut self, position: usize) -> Option<&mut T> {
        let (id, ptr) = self.slots.get(position).copied().flatten()?;
        if id != component_id::<T>() {
            return None;
        }
        // Distinct positions and distinct matches never share a slot, so a
        // mutable borrow of one cannot alias another.
        Some(unsafe { &mut (*ptr.cast::<Slot<T>>().as_ptr()).data })
    }

    /// Returns the handle of the component at `position`.
    pub fn component_handle(&self, position: usize) -> Option<ComponentHandle> {
        let (_, ptr) = self.slots.get(position).copied().flatten()?;
        let header = unsafe { ptr.cast::<ComponentHeader>().as_ptr().read_unaligned() };
        Some(header.handle())
    }
}
