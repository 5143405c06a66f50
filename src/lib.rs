//! Cohort is a compact entity component system (ECS) built around stable
//! opaque handles and per-type packed component storage.
//!
//! A [World](world/struct.World.html) owns one arena per component type;
//! every live component of a type sits tightly packed in its arena, and each
//! entity is an identity record pointing at its slots. Removal is
//! swap-remove, so arenas never fragment; the displaced slot's
//! back-references are repaired in the same operation. Component types are
//! registered at runtime in a process-wide
//! [registry](registry/struct.ComponentRegistry.html) holding their sizes
//! and create/destroy functions.
//!
//! Systems declare a [Signature](query/struct.Signature.html) of required
//! and optional component types; the world's matcher hands them one
//! [Match](query/struct.Match.html) per entity owning the full required set.
//!
//! # Examples
//!
//! ```
//! use cohort::{Signature, World};
//!
//! #[derive(Clone, Copy, Debug, Default, PartialEq)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(Clone, Copy, Debug, Default, PartialEq)]
//! struct Velocity {
//!     x: f32,
//!     y: f32,
//! }
//!
//! let mut world = World::new();
//! let entity = world.push((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 2.0 }));
//!
//! let signature = Signature::new().require::<Position>().require::<Velocity>();
//! for entity_match in world.relevant(&signature).iter_mut() {
//!     let velocity = *entity_match.get::<Velocity>(1).unwrap();
//!     let position = entity_match.get_mut::<Position>(0).unwrap();
//!     position.x += velocity.x;
//!     position.y += velocity.y;
//! }
//!
//! assert_eq!(
//!     world.get_component::<Position>(entity),
//!     Some(&Position { x: 1.0, y: 2.0 })
//! );
//! ```

pub mod entity;
pub mod handle;
mod hash;
pub mod query;
pub mod registry;
pub mod storage;
pub mod system;
pub mod world;

pub use crate::entity::EntityRecord;
pub use crate::handle::{ComponentHandle, EntityHandle, HANDLE_LEN};
pub use crate::query::{Match, Requirement, Signature};
pub use crate::registry::{
    component_id, registry, Component, ComponentDescriptor, ComponentId, ComponentRegistry,
};
pub use crate::storage::{ArenaIndex, ComponentHeader};
pub use crate::system::{system, FnSystem, Schedule, System};
pub use crate::world::{EntityTemplate, World, WorldError};
