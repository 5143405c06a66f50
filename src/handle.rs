//! Contains the opaque identifiers which name entities and components.

use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::fmt::{self, Debug, Display, Formatter, Write};

/// The width of a handle in bytes.
pub const HANDLE_LEN: usize = 32;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

macro_rules! handle_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        ///
        /// Equality and ordering are lexicographic over the raw bytes. The
        /// all-zero handle is the invalid sentinel; generated handles are
        /// always valid.
        #[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub(crate) [u8; HANDLE_LEN]);

        impl $name {
            /// The all-zero invalid handle.
            pub const INVALID: Self = Self([0; HANDLE_LEN]);

            /// Returns `true` unless every byte of the handle is zero.
            pub fn is_valid(&self) -> bool {
                self.0.iter().any(|&byte| byte != 0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                if !self.is_valid() {
                    return f.write_str("invalid");
                }
                for &byte in self.0.iter() {
                    f.write_char(if byte.is_ascii_graphic() {
                        byte as char
                    } else {
                        '?'
                    })?;
                }
                Ok(())
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }
    };
}

handle_type! {
    /// An opaque identifier naming one entity within a world.
    EntityHandle
}

handle_type! {
    /// An opaque identifier naming one component within a world.
    ComponentHandle
}

/// Yields fresh handles for a single world.
///
/// The generator is seeded once at construction; handles are 16 random bytes
/// hex-encoded into 32 lowercase ASCII characters. Hex digits are never zero
/// bytes, so a generated handle can never collide with the invalid sentinel.
pub(crate) struct HandleAllocator {
    rng: SmallRng,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    fn allocate(&mut self) -> [u8; HANDLE_LEN] {
        let mut raw = [0u8; HANDLE_LEN / 2];
        self.rng.fill(&mut raw[..]);

        let mut hex = [0u8; HANDLE_LEN];
        for (i, byte) in raw.iter().enumerate() {
            hex[i * 2] = HEX_DIGITS[(byte >> 4) as usize];
            hex[i * 2 + 1] = HEX_DIGITS[(byte & 0x0f) as usize];
        }
        hex
    }

    pub fn entity_handle(&mut self) -> EntityHandle {
        EntityHandle(self.allocate())
    }

    pub fn component_handle(&mut self) -> ComponentHandle {
        ComponentHandle(self.allocate())
    }
}
