//! Contains types related to defining and running systems.

use crate::query::{Match, Signature};
use crate::world::World;
use tracing::trace;

/// A stateless transformation over the components matched by its signature.
///
/// Systems do not touch the world directly: each tick they receive the
/// matches produced by the world's matcher and mutate component data through
/// them.
pub trait System: 'static {
    /// The component types this system consumes.
    fn signature(&self) -> &Signature;

    /// A diagnostic name for the system.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Ticks the system over every matched entity.
    fn run(&mut self, delta_time: f64, matches: &mut [Match<'_>]);
}

/// A [System](trait.System.html) backed by a closure.
pub struct FnSystem<F> {
    signature: Signature,
    run_fn: F,
}

impl<F> System for FnSystem<F>
where
    F: for<'w> FnMut(f64, &mut [Match<'w>]) + 'static,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn run(&mut self, delta_time: f64, matches: &mut [Match<'_>]) {
        (self.run_fn)(delta_time, matches)
    }
}

/// Wraps a closure into a system with the given signature.
///
/// # Examples
///
/// ```
/// # use cohort::{system, Match, Schedule, Signature};
/// # #[derive(Clone, Default)] struct Lifetime(f64);
/// let mut schedule = Schedule::new();
/// let added = schedule.add_system(Box::new(system(
///     Signature::new().require::<Lifetime>(),
///     |delta_time, matches: &mut [Match<'_>]| {
///         for entity_match in matches.iter_mut() {
///             if let Some(lifetime) = entity_match.get_mut::<Lifetime>(0) {
///                 lifetime.0 -= delta_time;
///             }
///         }
///     },
/// )));
/// assert!(added);
/// ```
pub fn system<F>(signature: Signature, run_fn: F) -> FnSystem<F>
where
    F: for<'w> FnMut(f64, &mut [Match<'w>]) + 'static,
{
    FnSystem { signature, run_fn }
}

struct ScheduleEntry {
    signature: Signature,
    system: Box<dyn System>,
}

/// An ordered list of systems executed against a world.
#[derive(Default)]
pub struct Schedule {
    systems: Vec<ScheduleEntry>,
}

impl Schedule {
    /// Constructs an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system to the schedule.
    ///
    /// Returns `false` (and drops the system) when its signature has no
    /// required component.
    pub fn add_system(&mut self, system: Box<dyn System>) -> bool {
        let signature = system.signature().clone();
        if !signature.has_required() {
            return false;
        }
        self.systems.push(ScheduleEntry { signature, system });
        true
    }

    /// Removes and returns the system at `index`, shifting later systems
    /// forward.
    pub fn remove_system(&mut self, index: usize) -> Option<Box<dyn System>> {
        if index < self.systems.len() {
            Some(self.systems.remove(index).system)
        } else {
            None
        }
    }

    /// Returns the number of systems scheduled.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is scheduled.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Runs every system in order against `world`.
    ///
    /// A system whose signature currently matches no entity is skipped
    /// without being invoked.
    pub fn execute(&mut self, world: &mut World, delta_time: f64) {
        for entry in self.systems.iter_mut() {
            let mut matches = world.relevant(&entry.signature);
            if matches.is_empty() {
                continue;
            }
            trace!(
                system = entry.system.name().unwrap_or("unnamed"),
                matched = matches.len(),
                "run system"
            );
            entry.system.run(delta_time, &mut matches);
        }
    }
}
