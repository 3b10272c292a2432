//! Two-phase subsystem bring-up over arena memory.
//!
//! Every subsystem is booted with the same protocol: the bootstrapper first
//! asks for the state's size, then carves that many bytes out of the
//! [`LinearAllocator`] and commits the state into the block. The
//! [`SystemSlot`] state machine makes the two phases explicit:
//!
//! `Unsized` -> `Sized` -> `Initialized` -> `ShutDown`
//!
//! Using a subsystem outside its `Initialized` window is an ordering bug in
//! the bootstrapper, not a runtime condition, and panics loudly.

use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use thiserror::Error;

use super::arena::LinearAllocator;

/// Failure raised while committing a subsystem into its block.
#[derive(Debug, Error)]
#[error("{system}: {reason}")]
pub struct SubsystemError {
    /// The failing subsystem's [`Subsystem::NAME`].
    pub system: &'static str,
    /// Human-readable cause.
    pub reason: String,
}

impl SubsystemError {
    /// Builds an error for `system` with the given cause.
    pub fn new(system: &'static str, reason: impl Into<String>) -> Self {
        Self {
            system,
            reason: reason.into(),
        }
    }
}

/// State that participates in the two-phase boot protocol.
pub trait Subsystem: Sized {
    /// Name used in diagnostics and panic messages.
    const NAME: &'static str;

    /// Arguments consumed when the state is committed into its block.
    type Args<'a>;

    /// Bytes the bootstrapper must carve for this subsystem.
    ///
    /// The arena only guarantees byte alignment, so the default pads the
    /// request with alignment headroom and the commit aligns within the
    /// block. The value must be identical on the sizing call and the commit
    /// call of one boot.
    fn memory_requirement() -> usize {
        mem::size_of::<Self>() + mem::align_of::<Self>() - 1
    }

    /// Builds the subsystem state. Runs exactly once per boot.
    fn initialize(args: Self::Args<'_>) -> Result<Self, SubsystemError>;

    /// Releases resources ahead of the state being dropped in place.
    fn shutdown(&mut self) {}
}

/// Owning typed pointer to a value constructed inside an arena block.
///
/// Dropping the box drops the value in place; the arena memory itself is
/// never freed individually. The owning [`LinearAllocator`] must outlive
/// every `ArenaBox` carved from it.
#[derive(Debug)]
pub struct ArenaBox<T> {
    ptr: NonNull<T>,
}

impl<T> Deref for ArenaBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Unique owner of a live value; see `SystemSlot::commit`.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for ArenaBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for ArenaBox<T> {
    fn drop(&mut self) {
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
    }
}

/// Boot-lifecycle slot for one subsystem.
#[derive(Debug)]
pub enum SystemSlot<S: Subsystem> {
    /// No size has been queried yet.
    Unsized,
    /// Phase one done: the recorded requirement awaits its block.
    Sized {
        /// Bytes recorded by [`SystemSlot::query_size`].
        requirement: usize,
    },
    /// Phase two done: the state is live inside the arena.
    Initialized(ArenaBox<S>),
    /// The state has been shut down and dropped; its block stays reserved.
    ShutDown,
}

impl<S: Subsystem> SystemSlot<S> {
    /// A slot that has not started the protocol.
    pub fn new() -> Self {
        Self::Unsized
    }

    /// Phase one: records and returns the subsystem's memory requirement.
    ///
    /// # Panics
    ///
    /// Panics when called after the slot has been committed; sizing an
    /// already-live subsystem is a bootstrapper bug.
    pub fn query_size(&mut self) -> usize {
        match self {
            Self::Unsized => {
                let requirement = S::memory_requirement();
                *self = Self::Sized { requirement };
                requirement
            }
            Self::Sized { requirement } => *requirement,
            Self::Initialized(_) | Self::ShutDown => {
                panic!("{} sized after it was already committed", S::NAME)
            }
        }
    }

    /// Phase two: carves the recorded requirement out of `arena` and
    /// constructs the state in place.
    pub fn commit(
        &mut self,
        arena: &mut LinearAllocator,
        args: S::Args<'_>,
    ) -> Result<(), SubsystemError> {
        let requirement = match self {
            Self::Sized { requirement } => *requirement,
            _ => {
                return Err(SubsystemError::new(
                    S::NAME,
                    "committed before its size was queried",
                ))
            }
        };
        let current = S::memory_requirement();
        if current != requirement {
            return Err(SubsystemError::new(
                S::NAME,
                format!(
                    "memory requirement changed between sizing and commit ({} B, then {} B)",
                    requirement, current
                ),
            ));
        }

        let block = arena.allocate(requirement);
        let state = S::initialize(args)?;

        let base = block.as_ptr() as usize;
        let align = mem::align_of::<S>();
        let aligned = (base + align - 1) & !(align - 1);
        debug_assert!(aligned + mem::size_of::<S>() <= base + block.len());

        let ptr = aligned as *mut S;
        // The block is uniquely ours and large enough after alignment.
        let boxed = unsafe {
            ptr::write(ptr, state);
            ArenaBox {
                ptr: NonNull::new_unchecked(ptr),
            }
        };
        *self = Self::Initialized(boxed);
        log::trace!("{} committed into a {} B arena block", S::NAME, requirement);
        Ok(())
    }

    /// The live state, or a panic naming the subsystem.
    ///
    /// # Panics
    ///
    /// Panics when the subsystem is not in its initialized window; that is
    /// an ordering bug in the caller.
    pub fn state(&self) -> &S {
        match self {
            Self::Initialized(boxed) => boxed,
            _ => panic!("{} used outside its initialized lifetime", S::NAME),
        }
    }

    /// Mutable access to the live state; same contract as [`Self::state`].
    pub fn state_mut(&mut self) -> &mut S {
        match self {
            Self::Initialized(boxed) => boxed,
            _ => panic!("{} used outside its initialized lifetime", S::NAME),
        }
    }

    /// The live state, or `None` outside the initialized window.
    pub fn get(&self) -> Option<&S> {
        match self {
            Self::Initialized(boxed) => Some(boxed),
            _ => None,
        }
    }

    /// Mutable variant of [`Self::get`].
    pub fn get_mut(&mut self) -> Option<&mut S> {
        match self {
            Self::Initialized(boxed) => Some(boxed),
            _ => None,
        }
    }

    /// True while the state is live.
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized(_))
    }

    /// Shuts the subsystem down and drops its state in place.
    ///
    /// A no-op on slots that are not initialized, so calling it twice (or on
    /// a subsystem whose boot never got this far) is safe.
    pub fn shut_down(&mut self) {
        if let Self::Initialized(_) = self {
            if let Self::Initialized(mut boxed) = mem::replace(self, Self::ShutDown) {
                boxed.shutdown();
                log::trace!("{} shut down", S::NAME);
            }
        }
    }
}

impl<S: Subsystem> Default for SystemSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}
