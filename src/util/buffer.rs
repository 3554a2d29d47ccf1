//! Aligned read buffers for direct IO
//!
//! O_DIRECT reads fail with EINVAL unless the destination address and length
//! are multiples of the device's block size. Each actor allocates one
//! [`AlignedBuffer`] up front and reuses it for every probe.

use crate::error::BenchError;
use std::alloc::{alloc_zeroed, dealloc, Layout};

/// Memory-aligned buffer suitable for O_DIRECT operations
///
/// Owned exclusively by the actor that allocated it and released on drop.
pub struct AlignedBuffer {
    ptr: *mut u8,
    size: usize,
    alignment: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate a zeroed buffer of `size` bytes aligned to `alignment`
    ///
    /// `alignment` must be a power of two and `size` a non-zero multiple of it.
    pub fn new(size: usize, alignment: usize) -> Result<Self, BenchError> {
        if !alignment.is_power_of_two() {
            return Err(BenchError::InvalidConfig(format!(
                "buffer alignment must be a power of 2, got {}",
                alignment
            )));
        }
        if size == 0 || size % alignment != 0 {
            return Err(BenchError::InvalidConfig(format!(
                "buffer size {} is not a non-zero multiple of {}",
                size, alignment
            )));
        }

        let layout = Layout::from_size_align(size, alignment)
            .map_err(|_| BenchError::Alloc { size, alignment })?;

        // SAFETY: layout has a non-zero size (checked above).
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(BenchError::Alloc { size, alignment });
        }

        Ok(AlignedBuffer {
            ptr,
            size,
            alignment,
            layout,
        })
    }

    /// Get a mutable raw pointer to the buffer
    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// Get the buffer as a slice
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// Get the size of the buffer in bytes
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the alignment of the buffer
    #[inline(always)]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Verify that the buffer is properly aligned
    #[inline(always)]
    pub fn is_aligned(&self) -> bool {
        (self.ptr as usize) % self.alignment == 0
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

// AlignedBuffer is Send because it owns its memory
unsafe impl Send for AlignedBuffer {}
