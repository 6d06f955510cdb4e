//! Structure-block tokens and the node cursor type.

// ---- Token constants --------------------------------------------------------

pub(crate) const FDT_BEGIN_NODE: u32 = 0x0000_0001;
pub(crate) const FDT_END_NODE: u32 = 0x0000_0002;
pub(crate) const FDT_PROP: u32 = 0x0000_0003;
pub(crate) const FDT_NOP: u32 = 0x0000_0004;
pub(crate) const FDT_END: u32 = 0x0000_0009;

// ---- Helpers ----------------------------------------------------------------

/// Reads a big-endian `u32` at `offset` in `data`.
pub(crate) fn read_be32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Reads the 4-byte token tag at `offset`.
pub(crate) fn read_token_tag(struct_block: &[u8], offset: usize) -> Option<u32> {
    read_be32_at(struct_block, offset)
}

/// Rounds `offset` up to the next 4-byte boundary.
pub(crate) fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

/// Extracts a null-terminated UTF-8 string starting at `offset` in `data`.
pub(crate) fn str_from_offset(data: &[u8], offset: usize) -> Option<&str> {
    let bytes = data.get(offset..)?;
    let end = bytes.iter().position(|&b| b == 0)?;
    core::str::from_utf8(&bytes[..end]).ok()
}

// ---- NodeOffset -------------------------------------------------------------

/// Cursor identifying a node by the byte offset of its `FDT_BEGIN_NODE`
/// token within the structure block.
///
/// A `NodeOffset` is not an owning reference: it is only meaningful against
/// the [`Fdt`](crate::Fdt) it was obtained from, and only for that blob's
/// lifetime. Offsets increase monotonically in depth-first pre-order, so
/// `Ord` gives document order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeOffset(pub(crate) usize);

impl NodeOffset {
    /// Returns the raw byte offset into the structure block.
    ///
    /// Useful for diagnostics; do not interpret the value otherwise.
    #[must_use]
    pub fn raw(self) -> usize {
        self.0
    }
}
