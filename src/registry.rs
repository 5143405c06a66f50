//! Contains types related to runtime registration of component types.

use crate::handle::{ComponentHandle, EntityHandle};
use crate::hash::ComponentTypeIdHasher;
use crate::storage::{ComponentHeader, Slot};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::ptr::NonNull;

/// A unique ID for a registered component type.
///
/// IDs are dense and assigned in registration order, starting at zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    /// Returns the ID as an index into the registry.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A marker trait for all types which can be attached to an entity.
///
/// This trait has a blanket impl for all applicable types. `Clone` provides
/// copies from a template value and `Default` covers construction without
/// one.
pub trait Component: 'static + Send + Sync + Clone + Default {}

impl<T: 'static + Send + Sync + Clone + Default> Component for T {}

type CreateFn = unsafe fn(*mut u8, ComponentHandle, EntityHandle, Option<NonNull<u8>>);
type DropFn = unsafe fn(*mut u8);

/// Describes how to create and destroy storage slots of one component type.
#[derive(Copy, Clone)]
pub struct ComponentDescriptor {
    size: usize,
    align: usize,
    create_fn: CreateFn,
    drop_fn: Option<DropFn>,
    #[cfg(debug_assertions)]
    name: &'static str,
}

impl ComponentDescriptor {
    /// Returns the descriptor of component type `T`.
    pub fn of<T: Component>() -> Self {
        ComponentDescriptor {
            size: std::mem::size_of::<Slot<T>>(),
            align: std::mem::align_of::<Slot<T>>(),
            create_fn: create_slot::<T>,
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(drop_slot::<T>)
            } else {
                None
            },
            #[cfg(debug_assertions)]
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the byte size of one storage slot, header included.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the alignment of one storage slot.
    pub fn align(&self) -> usize {
        self.align
    }

    /// Writes a fully initialized slot to `dst`, copied from `template` or
    /// default-constructed when `template` is `None`.
    ///
    /// # Safety
    /// `dst` must be valid for writes of `size()` bytes, aligned to
    /// `align()`, and must not hold a live slot. `template`, when present,
    /// must point to a value of the described component type.
    pub(crate) unsafe fn create(
        &self,
        dst: *mut u8,
        handle: ComponentHandle,
        entity: EntityHandle,
        template: Option<NonNull<u8>>,
    ) {
        (self.create_fn)(dst, handle, entity, template)
    }

    pub(crate) fn drop_fn(&self) -> Option<DropFn> {
        self.drop_fn
    }
}

impl std::fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("ComponentDescriptor");
        debug.field("size", &self.size).field("align", &self.align);
        #[cfg(debug_assertions)]
        debug.field("name", &self.name);
        debug.finish()
    }
}

unsafe fn create_slot<T: Component>(
    dst: *mut u8,
    handle: ComponentHandle,
    entity: EntityHandle,
    template: Option<NonNull<u8>>,
) {
    let data = match template {
        Some(src) => (&*src.cast::<T>().as_ptr()).clone(),
        None => T::default(),
    };
    dst.cast::<Slot<T>>().write(Slot {
        header: ComponentHeader { handle, entity },
        data,
    });
}

unsafe fn drop_slot<T: Component>(slot: *mut u8) {
    std::ptr::drop_in_place(slot.cast::<Slot<T>>());
}

#[derive(Default)]
struct Registrations {
    descriptors: Vec<ComponentDescriptor>,
    ids: HashMap<TypeId, ComponentId, BuildHasherDefault<ComponentTypeIdHasher>>,
}

/// The process-wide table of registered component types.
///
/// The table is append-only: descriptors are never removed or reordered, so
/// a `ComponentId` stays valid for the life of the process. All worlds share
/// one registry.
pub struct ComponentRegistry {
    inner: RwLock<Registrations>,
}

impl ComponentRegistry {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Registrations::default()),
        }
    }

    /// Registers component type `T`, returning its runtime ID.
    ///
    /// The first call for a given type appends a descriptor; later calls
    /// return the existing ID.
    pub fn register<T: Component>(&self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.inner.read().ids.get(&type_id) {
            return id;
        }

        let mut inner = self.inner.write();
        // Another thread may have registered while we waited on the lock.
        if let Some(&id) = inner.ids.get(&type_id) {
            return id;
        }
        let id = ComponentId(inner.descriptors.len() as u32);
        inner.descriptors.push(ComponentDescriptor::of::<T>());
        inner.ids.insert(type_id, id);
        id
    }

    /// Returns the descriptor registered under `id`.
    pub fn descriptor(&self, id: ComponentId) -> Option<ComponentDescriptor> {
        self.inner.read().descriptors.get(id.index()).copied()
    }

    /// Returns `true` if `id` names a registered component type.
    pub fn is_valid(&self, id: ComponentId) -> bool {
        id.index() < self.len()
    }

    /// Returns the number of registered component types.
    pub fn len(&self) -> usize {
        self.inner.read().descriptors.len()
    }

    /// Returns `true` if no component type has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static REGISTRY: Lazy<ComponentRegistry> = Lazy::new(ComponentRegistry::new);

/// Returns the process-wide component registry.
pub fn registry() -> &'static ComponentRegistry {
    &REGISTRY
}

/// Returns the runtime ID of component type `T`, registering it on first
/// use.
pub fn component_id<T: Component>() -> ComponentId {
    REGISTRY.register::<T>()
}
