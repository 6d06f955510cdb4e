//! The caller-supplied object sink.

use crate::error::Result;
use crate::object::HwObject;

/// Opaque identifier a sink assigns to a stored object.
///
/// Tokens let later objects express "this object references that one"
/// without pointers. The parser never interprets token values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectToken(u32);

impl ObjectToken {
    /// Wraps a raw token value.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Receiver for produced hardware-info objects.
///
/// Invoked once per object (or per array of map entries). The sink owns
/// storage, deduplication, and token assignment. The passed object borrows
/// parser working buffers: implementations must copy what they retain and
/// must not alias the borrow beyond the call.
///
/// ID-mapping entries carry phandle-derived output references
/// ([`crate::object::IdMappingEntry::output_reference`]); resolving those
/// to sink tokens is likewise the sink's job.
pub trait HwInfoSink {
    /// Stores one object, returning the token under which it was filed.
    ///
    /// # Errors
    ///
    /// A sink may fail (e.g. out of storage); the error aborts the whole
    /// parse.
    fn add(&mut self, object: HwObject<'_>) -> Result<ObjectToken>;
}
