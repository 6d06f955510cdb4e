//! `quartz-dtb-builder` --- DTB blob construction for tests.
//!
//! The parse crates in this workspace consume Flattened Device Tree blobs;
//! their tests need to construct such blobs from scratch. This crate
//! assembles a structurally valid DTB (header, reservation block, structure
//! block, deduplicated strings block) from a sequence of node and property
//! emissions.
//!
//! Test support only --- it performs no validation beyond what is needed to
//! produce well-formed output, and it panics on misuse (unbalanced
//! `begin_node`/`end_node`).

#![no_std]

extern crate alloc;

use alloc::vec::Vec;

const FDT_BEGIN_NODE: u32 = 0x0000_0001;
const FDT_END_NODE: u32 = 0x0000_0002;
const FDT_PROP: u32 = 0x0000_0003;
const FDT_END: u32 = 0x0000_0009;

const HEADER_SIZE: usize = 40; // 10 x 4 bytes
const VERSION: u32 = 17;
const LAST_COMP_VERSION: u32 = 16;

/// Incrementally builds a DTB blob.
///
/// ```
/// use quartz_dtb_builder::DtbBuilder;
///
/// let mut b = DtbBuilder::new();
/// b.begin_node("");
/// b.prop_str("model", "test-board");
/// b.begin_node("cpus");
/// b.end_node();
/// b.end_node();
/// let dtb = b.finish();
/// assert!(!dtb.is_empty());
/// ```
#[derive(Default)]
pub struct DtbBuilder {
    struct_block: Vec<u8>,
    strings_block: Vec<u8>,
    reservations: Vec<(u64, u64)>,
    boot_cpuid: u32,
    open_nodes: usize,
}

impl DtbBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `boot_cpuid_phys` header field.
    pub fn set_boot_cpuid(&mut self, id: u32) {
        self.boot_cpuid = id;
    }

    /// Adds a memory reservation entry.
    pub fn reserve(&mut self, address: u64, size: u64) {
        self.reservations.push((address, size));
    }

    /// Opens a node. The root node uses the empty name.
    pub fn begin_node(&mut self, name: &str) {
        self.push_u32(FDT_BEGIN_NODE);
        self.struct_block.extend_from_slice(name.as_bytes());
        self.struct_block.push(0);
        self.pad4();
        self.open_nodes += 1;
    }

    /// Closes the most recently opened node.
    ///
    /// # Panics
    ///
    /// Panics if no node is open.
    pub fn end_node(&mut self) {
        assert!(self.open_nodes > 0, "end_node without begin_node");
        self.open_nodes -= 1;
        self.push_u32(FDT_END_NODE);
    }

    /// Emits a property with raw byte data.
    pub fn prop_bytes(&mut self, name: &str, data: &[u8]) {
        let nameoff = self.string_offset(name);
        self.push_u32(FDT_PROP);
        self.push_u32(u32::try_from(data.len()).unwrap());
        self.push_u32(nameoff);
        self.struct_block.extend_from_slice(data);
        self.pad4();
    }

    /// Emits an empty (marker) property, e.g. `interrupt-controller;`.
    pub fn prop_empty(&mut self, name: &str) {
        self.prop_bytes(name, &[]);
    }

    /// Emits a single-cell property.
    pub fn prop_u32(&mut self, name: &str, value: u32) {
        self.prop_bytes(name, &value.to_be_bytes());
    }

    /// Emits a two-cell property holding a 64-bit value.
    pub fn prop_u64(&mut self, name: &str, value: u64) {
        self.prop_bytes(name, &value.to_be_bytes());
    }

    /// Emits a property from a list of 32-bit cells.
    pub fn prop_cells(&mut self, name: &str, cells: &[u32]) {
        let mut data = Vec::with_capacity(cells.len() * 4);
        for cell in cells {
            data.extend_from_slice(&cell.to_be_bytes());
        }
        self.prop_bytes(name, &data);
    }

    /// Emits a null-terminated string property.
    pub fn prop_str(&mut self, name: &str, value: &str) {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.prop_bytes(name, &data);
    }

    /// Emits a string-list property (each entry null-terminated).
    pub fn prop_str_list(&mut self, name: &str, values: &[&str]) {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.prop_bytes(name, &data);
    }

    /// Assembles the final blob.
    ///
    /// # Panics
    ///
    /// Panics if any node is still open.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        assert_eq!(self.open_nodes, 0, "finish with unclosed nodes");
        self.push_u32(FDT_END);

        let mem_rsv_off = HEADER_SIZE;
        // Reservation entries: each 16 bytes, plus the all-zero terminator.
        let rsv_size = (self.reservations.len() + 1) * 16;
        let struct_off = mem_rsv_off + rsv_size;
        let strings_off = struct_off + self.struct_block.len();
        let total_size = strings_off + self.strings_block.len();

        let mut dtb = Vec::with_capacity(total_size);
        let be = u32::to_be_bytes;
        dtb.extend_from_slice(&be(0xd00d_feed));
        dtb.extend_from_slice(&be(u32::try_from(total_size).unwrap()));
        dtb.extend_from_slice(&be(u32::try_from(struct_off).unwrap()));
        dtb.extend_from_slice(&be(u32::try_from(strings_off).unwrap()));
        dtb.extend_from_slice(&be(u32::try_from(mem_rsv_off).unwrap()));
        dtb.extend_from_slice(&be(VERSION));
        dtb.extend_from_slice(&be(LAST_COMP_VERSION));
        dtb.extend_from_slice(&be(self.boot_cpuid));
        dtb.extend_from_slice(&be(u32::try_from(self.strings_block.len()).unwrap()));
        dtb.extend_from_slice(&be(u32::try_from(self.struct_block.len()).unwrap()));

        for &(address, size) in &self.reservations {
            dtb.extend_from_slice(&address.to_be_bytes());
            dtb.extend_from_slice(&size.to_be_bytes());
        }
        dtb.extend_from_slice(&[0u8; 16]);

        dtb.extend_from_slice(&self.struct_block);
        dtb.extend_from_slice(&self.strings_block);

        assert_eq!(dtb.len(), total_size);
        dtb
    }

    /// Returns the strings-block offset for `name`, interning it on first use.
    fn string_offset(&mut self, name: &str) -> u32 {
        let bytes = name.as_bytes();
        // Reuse an existing occurrence if present.
        let mut offset = 0;
        while offset + bytes.len() < self.strings_block.len() {
            let end = offset + bytes.len();
            if &self.strings_block[offset..end] == bytes && self.strings_block[end] == 0 {
                return u32::try_from(offset).unwrap();
            }
            // Advance to the byte after the next null terminator.
            match self.strings_block[offset..].iter().position(|&b| b == 0) {
                Some(pos) => offset += pos + 1,
                None => break,
            }
        }
        let new_offset = self.strings_block.len();
        self.strings_block.extend_from_slice(bytes);
        self.strings_block.push(0);
        u32::try_from(new_offset).unwrap()
    }

    fn push_u32(&mut self, value: u32) {
        self.struct_block.extend_from_slice(&value.to_be_bytes());
    }

    fn pad4(&mut self) {
        while self.struct_block.len() % 4 != 0 {
            self.struct_block.push(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_layout() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.end_node();
        let dtb = b.finish();

        assert_eq!(&dtb[0..4], &0xd00d_feedu32.to_be_bytes());
        // totalsize matches the buffer length.
        let total = u32::from_be_bytes(dtb[4..8].try_into().unwrap()) as usize;
        assert_eq!(total, dtb.len());
    }

    #[test]
    fn strings_are_deduplicated() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.prop_u32("reg", 1);
        b.begin_node("child");
        b.prop_u32("reg", 2);
        b.end_node();
        b.end_node();
        let dtb = b.finish();

        let strings_off = u32::from_be_bytes(dtb[12..16].try_into().unwrap()) as usize;
        let strings_len = u32::from_be_bytes(dtb[32..36].try_into().unwrap()) as usize;
        assert_eq!(&dtb[strings_off..strings_off + strings_len], b"reg\0");
    }

    #[test]
    #[should_panic(expected = "unclosed")]
    fn unbalanced_nodes_panic() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        let _ = b.finish();
    }
}
