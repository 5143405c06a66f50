//! Packed per-type component storage.

use crate::handle::{ComponentHandle, EntityHandle};
use crate::registry::ComponentDescriptor;
use std::alloc::{self, Layout};
use std::fmt::{self, Debug, Formatter};
use std::ptr::NonNull;

/// A byte offset addressing one slot within an arena.
///
/// Offsets are not stable across removals in the same arena: deleting a slot
/// relocates the tail slot into its place.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ArenaIndex(pub(crate) usize);

impl ArenaIndex {
    /// Returns the raw byte offset.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// Bookkeeping stored at the front of every component slot: the component's
/// own handle and the handle of the entity owning it.
#[derive(Debug, Copy, Clone)]
#[repr(C)]
pub struct ComponentHeader {
    pub(crate) handle: ComponentHandle,
    pub(crate) entity: EntityHandle,
}

impl ComponentHeader {
    /// Returns the component's handle.
    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    /// Returns the handle of the owning entity.
    pub fn entity(&self) -> EntityHandle {
        self.entity
    }
}

/// The in-arena layout of one component of type `T`. The header sits at
/// offset zero so it can be read without knowing `T`.
#[repr(C)]
pub(crate) struct Slot<T> {
    pub(crate) header: ComponentHeader,
    pub(crate) data: T,
}

/// A contiguous buffer holding every live component of one type, tightly
/// packed at a fixed stride.
///
/// The buffer length is always a multiple of the stride. Slots are
/// initialized by the registered create function and destroyed in place;
/// removal is swap-remove, so the arena never fragments.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    capacity: usize,
    len: usize,
    stride: usize,
    align: usize,
    drop_fn: Option<unsafe fn(*mut u8)>,
}

// The arena owns raw memory holding `Send + Sync` component values.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new(descriptor: &ComponentDescriptor) -> Self {
        Self {
            ptr: NonNull::dangling(),
            capacity: 0,
            len: 0,
            stride: descriptor.size(),
            align: descriptor.align(),
            drop_fn: descriptor.drop_fn(),
        }
    }

    /// Returns the buffer length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the slot size in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the number of live slots.
    pub fn slot_count(&self) -> usize {
        self.len / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn layout(&self) -> Layout {
        Layout::from_size_align(self.capacity, self.align).unwrap()
    }

    fn grow(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity > self.capacity);

        unsafe {
            let dst = if self.capacity == 0 {
                alloc::alloc(Layout::from_size_align(new_capacity, self.align).unwrap())
            } else {
                alloc::realloc(self.ptr.as_ptr(), self.layout(), new_capacity)
            };
            if let Some(ptr) = NonNull::new(dst) {
                self.ptr = ptr;
                self.capacity = new_capacity;
            } else {
                alloc::handle_alloc_error(Layout::from_size_align_unchecked(
                    new_capacity,
                    self.align,
                ));
            }
        }
    }

    /// Extends the arena by one slot, returning its offset and pointer.
    ///
    /// The returned slot is uninitialized; the caller must write it before
    /// any other arena operation.
    pub fn alloc_slot(&mut self) -> (ArenaIndex, *mut u8) {
        if self.capacity - self.len < self.stride {
            let doubled = self.capacity.max(self.stride) * 2;
            self.grow(doubled.max(self.len + self.stride));
        }
        let index = ArenaIndex(self.len);
        self.len += self.stride;
        (index, unsafe { self.ptr.as_ptr().add(index.0) })
    }

    /// Returns `true` if `index` addresses a live slot boundary.
    pub fn contains(&self, index: ArenaIndex) -> bool {
        index.0 < self.len && index.0 % self.stride == 0
    }

    /// Returns a pointer to the slot at `index`.
    pub fn slot_ptr(&self, index: ArenaIndex) -> NonNull<u8> {
        debug_assert!(self.contains(index));
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(index.0)) }
    }

    /// Reads the bookkeeping header of the slot at `index`.
    pub fn header(&self, index: ArenaIndex) -> ComponentHeader {
        // The header is at slot offset zero and has alignment one.
        unsafe {
            self.slot_ptr(index)
                .as_ptr()
                .cast::<ComponentHeader>()
                .read_unaligned()
        }
    }

    /// Destroys the slot at `index` and relocates the tail slot into its
    /// place.
    ///
    /// Returns the header of the relocated slot, or `None` when the removed
    /// slot was the tail. A relocated slot keeps its bytes unchanged; only
    /// its offset moves to `index`.
    pub fn swap_remove(&mut self, index: ArenaIndex) -> Option<ComponentHeader> {
        debug_assert!(self.contains(index));
        let last = self.len - self.stride;

        unsafe {
            let dst = self.ptr.as_ptr().add(index.0);
            if let Some(drop_fn) = self.drop_fn {
                drop_fn(dst);
            }
            self.len = last;
            if index.0 == last {
                return None;
            }
            let src = self.ptr.as_ptr().add(last);
            std::ptr::copy_nonoverlapping(src, dst, self.stride);
            Some(dst.cast::<ComponentHeader>().read_unaligned())
        }
    }

    /// Iterates `(offset, slot pointer)` pairs in slot order.
    pub fn iter_slots(&self) -> impl Iterator<Item = (ArenaIndex, NonNull<u8>)> + '_ {
        let base = self.ptr.as_ptr();
        (0..self.len).step_by(self.stride).map(move |offset| {
            (ArenaIndex(offset), unsafe {
                NonNull::new_unchecked(base.add(offset))
            })
        })
    }

    /// Destroys every live slot and resets the length to zero. Capacity is
    /// retained.
    pub fn clear(&mut self) {
        if let Some(drop_fn) = self.drop_fn {
            let mut offset = 0;
            while offset < self.len {
                unsafe { drop_fn(self.ptr.as_ptr().add(offset)) };
                offset += self.stride;
            }
        }
        self.len = 0;
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.clear();
        if self.capacity > 0 {
            unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout()) };
        }
    }
}

impl Debug for Arena {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("stride", &self.stride)
            .field("slots", &self.slot_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleAllocator;
    use crate::registry::ComponentDescriptor;
    use std::ptr::NonNull;
    use std::sync::atomic::{AtomicIsize, Ordering};

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Payload(u64);

    fn push(
        arena: &mut Arena,
        descriptor: &ComponentDescriptor,
        allocator: &mut HandleAllocator,
        entity: EntityHandle,
        template: Option<&Payload>,
    ) -> (ArenaIndex, ComponentHandle) {
        let handle = allocator.component_handle();
        let (index, dst) = arena.alloc_slot();
        unsafe {
            descriptor.create(
                dst,
                handle,
                entity,
                template.map(|t| NonNull::from(t).cast()),
            )
        };
        (index, handle)
    }

    unsafe fn payload_at(arena: &Arena, index: ArenaIndex) -> Payload {
        (*arena.slot_ptr(index).as_ptr().cast::<Slot<Payload>>()).data
    }

    #[test]
    fn slots_are_created_at_increasing_offsets() {
        let descriptor = ComponentDescriptor::of::<Payload>();
        let mut arena = Arena::new(&descriptor);
        let mut allocator = HandleAllocator::new();
        let entity = allocator.entity_handle();

        let (first, handle) = push(
            &mut arena,
            &descriptor,
            &mut allocator,
            entity,
            Some(&Payload(7)),
        );
        let (second, _) = push(&mut arena, &descriptor, &mut allocator, entity, None);

        assert_eq!(first.offset(), 0);
        assert_eq!(second.offset(), descriptor.size());
        assert_eq!(arena.len(), descriptor.size() * 2);
        assert_eq!(arena.slot_count(), 2);

        let header = arena.header(first);
        assert_eq!(header.handle(), handle);
        assert_eq!(header.entity(), entity);
        unsafe {
            assert_eq!(payload_at(&arena, first), Payload(7));
            assert_eq!(payload_at(&arena, second), Payload::default());
        }
    }

    #[test]
    fn swap_remove_of_the_tail_reports_no_relocation() {
        let descriptor = ComponentDescriptor::of::<Payload>();
        let mut arena = Arena::new(&descriptor);
        let mut allocator = HandleAllocator::new();
        let entity = allocator.entity_handle();

        push(&mut arena, &descriptor, &mut allocator, entity, None);
        let (tail, _) = push(&mut arena, &descriptor, &mut allocator, entity, None);

        assert!(arena.swap_remove(tail).is_none());
        assert_eq!(arena.slot_count(), 1);
    }

    #[test]
    fn swap_remove_relocates_the_tail_slot() {
        let descriptor = ComponentDescriptor::of::<Payload>();
        let mut arena = Arena::new(&descriptor);
        let mut allocator = HandleAllocator::new();
        let entity = allocator.entity_handle();

        let (first, _) = push(
            &mut arena,
            &descriptor,
            &mut allocator,
            entity,
            Some(&Payload(1)),
        );
        push(
            &mut arena,
            &descriptor,
            &mut allocator,
            entity,
            Some(&Payload(2)),
        );
        let (_, tail_handle) = push(
            &mut arena,
            &descriptor,
            &mut allocator,
            entity,
            Some(&Payload(3)),
        );

        let moved = arena.swap_remove(first).expect("tail must relocate");
        assert_eq!(moved.handle(), tail_handle);
        assert_eq!(arena.slot_count(), 2);
        unsafe { assert_eq!(payload_at(&arena, first), Payload(3)) };
    }

    #[test]
    fn drops_run_exactly_once() {
        static LIVE: AtomicIsize = AtomicIsize::new(0);

        struct Tracked;

        impl Default for Tracked {
            fn default() -> Self {
                LIVE.fetch_add(1, Ordering::SeqCst);
                Tracked
            }
        }

        impl Clone for Tracked {
            fn clone(&self) -> Self {
                LIVE.fetch_add(1, Ordering::SeqCst);
                Tracked
            }
        }

        impl Drop for Tracked {
            fn drop(&mut self) {
                LIVE.fetch_sub(1, Ordering::SeqCst);
            }
        }

        let descriptor = ComponentDescriptor::of::<Tracked>();
        let mut arena = Arena::new(&descriptor);
        let mut allocator = HandleAllocator::new();
        let entity = allocator.entity_handle();

        let mut first = ArenaIndex(0);
        for i in 0..3 {
            let handle = allocator.component_handle();
            let (index, dst) = arena.alloc_slot();
            unsafe { descriptor.create(dst, handle, entity, None) };
            if i == 0 {
                first = index;
            }
        }
        assert_eq!(LIVE.load(Ordering::SeqCst), 3);

        arena.swap_remove(first);
        assert_eq!(LIVE.load(Ordering::SeqCst), 2);

        arena.clear();
        assert_eq!(LIVE.load(Ordering::SeqCst), 0);
        assert!(arena.is_empty());
    }
}
