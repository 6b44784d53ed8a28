//! Generational handles and their allocator.
//!
//! Every object the semantic layer refers to without owning it (actors,
//! individuals, components) is addressed through a 64-bit handle that packs a
//! *generation* counter in the high 32 bits and a slot *index* in the low 32
//! bits. Destroying an object bumps the generation of its slot, so any handle
//! still pointing at it is detected as stale instead of aliasing a newer
//! object that reuses the slot.

use std::collections::VecDeque;
use std::marker::PhantomData;

/// Operations shared by every handle type produced by [`define_handle!`].
pub trait GenerationalHandle: Copy + Eq + std::hash::Hash + std::fmt::Debug {
    /// Build a handle from its slot index and generation.
    fn from_parts(index: u32, generation: u32) -> Self;
    /// Slot index (low 32 bits).
    fn index(self) -> u32;
    /// Generation (high 32 bits).
    fn generation(self) -> u32;
}

/// Declare a generational handle newtype.
///
/// Layout: `[generation: u32 | index: u32]`. The generated type prints as
/// `Name(3v1)` in `Debug` and `3v1` in `Display`.
///
/// ```
/// semlog_scene::define_handle!(
///     /// Handle to a widget.
///     WidgetId
/// );
/// let id = WidgetId::new(3, 1);
/// assert_eq!(id.to_string(), "3v1");
/// assert_eq!(format!("{id:?}"), "WidgetId(3v1)");
/// ```
#[macro_export]
macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            /// Construct a handle from an index and generation.
            #[inline]
            pub fn new(index: u32, generation: u32) -> Self {
                Self((generation as u64) << 32 | index as u64)
            }

            /// The index portion (low 32 bits).
            #[inline]
            pub fn index(self) -> u32 {
                self.0 as u32
            }

            /// The generation portion (high 32 bits).
            #[inline]
            pub fn generation(self) -> u32 {
                (self.0 >> 32) as u32
            }

            /// Raw `u64` representation.
            #[inline]
            pub fn to_raw(self) -> u64 {
                self.0
            }

            /// Reconstruct from a raw `u64`.
            #[inline]
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl $crate::handle::GenerationalHandle for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self::new(index, generation)
            }

            #[inline]
            fn index(self) -> u32 {
                $name::index(self)
            }

            #[inline]
            fn generation(self) -> u32 {
                $name::generation(self)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({}v{})", stringify!($name), self.index(), self.generation())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}v{}", self.index(), self.generation())
            }
        }
    };
}

define_handle!(
    /// Handle to an actor placed in a [`Scene`](crate::scene::Scene).
    ActorId
);

// ---------------------------------------------------------------------------
// HandleAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles generational handles.
///
/// Free indices are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot index.
#[derive(Debug)]
pub struct HandleAllocator<H> {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
    _marker: PhantomData<H>,
}

impl<H: GenerationalHandle> HandleAllocator<H> {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
            _marker: PhantomData,
        }
    }

    /// Allocate a fresh handle, reusing a recycled slot when one is free.
    pub fn allocate(&mut self) -> H {
        if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            H::from_parts(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            H::from_parts(index, 0)
        }
    }

    /// Release a handle and bump its slot generation.
    ///
    /// Returns `false` if the handle was already dead or stale.
    pub fn deallocate(&mut self, handle: H) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        let idx = handle.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(handle.index());
        true
    }

    /// Returns `true` if `handle` refers to a live slot with a matching
    /// generation.
    pub fn is_alive(&self, handle: H) -> bool {
        let idx = handle.index() as usize;
        idx < self.generations.len()
            && self.alive[idx]
            && self.generations[idx] == handle.generation()
    }

    /// The live handle occupying slot `index`, if any.
    pub fn handle_at(&self, index: u32) -> Option<H> {
        let idx = index as usize;
        (idx < self.alive.len() && self.alive[idx]).then(|| H::from_parts(index, self.generations[idx]))
    }

    /// Number of live handles.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Number of slots ever allocated (live or free).
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Capture `(generations, alive, free_indices)` for snapshots.
    pub fn snapshot_state(&self) -> (Vec<u32>, Vec<bool>, Vec<u32>) {
        let free: Vec<u32> = self.free_indices.iter().copied().collect();
        (self.generations.clone(), self.alive.clone(), free)
    }

    /// Rebuild an allocator from a captured state.
    pub fn restore_from_snapshot(
        generations: Vec<u32>,
        alive: Vec<bool>,
        free_indices: Vec<u32>,
    ) -> Self {
        Self {
            generations,
            alive,
            free_indices: VecDeque::from(free_indices),
            _marker: PhantomData,
        }
    }
}

impl<H: GenerationalHandle> Default for HandleAllocator<H> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
