//! `quartz-binparse` --- bounds-checked reads of plain-old-data structures
//! from byte slices.
//!
//! Binary formats parsed in this workspace (DTB headers, reservation
//! entries) are sequences of fixed-layout records at arbitrary, possibly
//! unaligned offsets. [`FromBytes`] gives such records a safe, checked
//! constructor from a `&[u8]` without intermediate copies of the slice.

#![no_std]

use core::mem::size_of;

/// Types that can be materialized from raw bytes at any alignment.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` or `#[repr(transparent)]`, contain no
/// padding that the format does not also contain, and be valid for every
/// possible bit pattern (no `bool`, no enums with holes, no references).
pub unsafe trait FromBytes: Sized + Copy {
    /// Reads a value from the start of `data`.
    ///
    /// Returns `None` if `data` is shorter than `size_of::<Self>()`.
    #[must_use]
    fn read_from(data: &[u8]) -> Option<Self> {
        Self::read_at(data, 0)
    }

    /// Reads a value from `data` starting at byte `offset`.
    ///
    /// Returns `None` if the slice does not contain `size_of::<Self>()`
    /// bytes at `offset`.
    #[must_use]
    fn read_at(data: &[u8], offset: usize) -> Option<Self> {
        let end = offset.checked_add(size_of::<Self>())?;
        let bytes = data.get(offset..end)?;
        // SAFETY: `bytes` holds exactly `size_of::<Self>()` bytes and the
        // trait contract guarantees every bit pattern is a valid `Self`.
        // `read_unaligned` handles the arbitrary alignment of `offset`.
        Some(unsafe { core::ptr::read_unaligned(bytes.as_ptr().cast::<Self>()) })
    }
}

// SAFETY: primitive integers are valid for all bit patterns.
unsafe impl FromBytes for u8 {}
// SAFETY: as above.
unsafe impl FromBytes for u16 {}
// SAFETY: as above.
unsafe impl FromBytes for u32 {}
// SAFETY: as above.
unsafe impl FromBytes for u64 {}

/// Big-endian 32-bit integer as stored in DTB blobs.
#[derive(Clone, Copy, Debug)]
#[repr(transparent)]
pub struct Be32(u32);

// SAFETY: `repr(transparent)` over `u32`, all bit patterns are valid.
unsafe impl FromBytes for Be32 {}

impl Be32 {
    /// Converts to native-endian `u32`.
    #[must_use]
    pub fn get(self) -> u32 {
        u32::from_be(self.0)
    }
}

/// Big-endian 64-bit integer as stored in DTB blobs.
#[derive(Clone, Copy, Debug)]
#[repr(transparent)]
pub struct Be64(u64);

// SAFETY: `repr(transparent)` over `u64`, all bit patterns are valid.
unsafe impl FromBytes for Be64 {}

impl Be64 {
    /// Converts to native-endian `u64`.
    #[must_use]
    pub fn get(self) -> u64 {
        u64::from_be(self.0)
    }
}
