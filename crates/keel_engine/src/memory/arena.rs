//! Linear allocation over one fixed block.
//!
//! The bootstrapper reserves a single zeroed block up front and carves every
//! subsystem's state out of it in boot order. Allocation is a bump of one
//! offset; there is no individual free. The whole region is released when the
//! allocator is dropped, which must happen only after every subsystem living
//! inside it has been shut down and dropped in place.

use std::ptr::{self, NonNull};

/// Bump allocator over one fixed, zeroed block of memory.
///
/// Running out of space is a configuration bug (the block was sized too
/// small for the subsystems booted out of it), not a runtime condition, so
/// [`LinearAllocator::allocate`] panics on exhaustion rather than returning
/// an error.
#[derive(Debug)]
pub struct LinearAllocator {
    storage: NonNull<u8>,
    total_size: usize,
    allocated: usize,
}

/// A span carved out of a [`LinearAllocator`].
///
/// The span stays valid for as long as the allocator that produced it is
/// alive; it is never freed individually.
#[derive(Debug)]
pub struct ArenaBlock {
    ptr: NonNull<u8>,
    len: usize,
}

impl LinearAllocator {
    /// Reserves a zeroed block of `total_size` bytes.
    pub fn new(total_size: usize) -> Self {
        let block = vec![0u8; total_size].into_boxed_slice();
        let raw = Box::into_raw(block).cast::<u8>();
        log::trace!("linear allocator created with {} bytes", total_size);
        Self {
            // Box never hands out null.
            storage: unsafe { NonNull::new_unchecked(raw) },
            total_size,
            allocated: 0,
        }
    }

    /// Carves `size` bytes off the front of the remaining space.
    ///
    /// The offset advances by exactly `size`; alignment beyond natural byte
    /// alignment is the caller's job (pad the request and align within the
    /// returned block).
    ///
    /// # Panics
    ///
    /// Panics when the remaining space cannot satisfy the request.
    pub fn allocate(&mut self, size: usize) -> ArenaBlock {
        let remaining = self.total_size - self.allocated;
        if size > remaining {
            panic!(
                "linear allocator out of space: tried to allocate {} B, only {} B of {} B remaining",
                size, remaining, self.total_size
            );
        }
        // In bounds per the check above; the resulting span is disjoint from
        // every previously returned span because the offset only grows.
        let ptr = unsafe { NonNull::new_unchecked(self.storage.as_ptr().add(self.allocated)) };
        self.allocated += size;
        ArenaBlock { ptr, len: size }
    }

    /// Size of the whole block in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Bytes handed out so far; equals the sum of all requested sizes.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

impl Drop for LinearAllocator {
    fn drop(&mut self) {
        let slice = ptr::slice_from_raw_parts_mut(self.storage.as_ptr(), self.total_size);
        // Rebuilds the box produced in `new`; every ArenaBlock and ArenaBox
        // into this storage is gone by the time the allocator drops.
        unsafe { drop(Box::from_raw(slice)) };
        log::trace!("linear allocator released ({} bytes)", self.total_size);
    }
}

impl ArenaBlock {
    /// Base pointer of the span. Valid while the owning allocator lives.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for zero-sized spans.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
