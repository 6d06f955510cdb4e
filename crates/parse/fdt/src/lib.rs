//! `quartz-fdt` --- a standalone, `no_std` Flattened Device Tree (DTB) parser.
//!
//! This crate parses DTB blobs as defined by the Devicetree Specification
//! and provides zero-copy, offset-based access to nodes and properties from
//! a `&[u8]` slice containing the raw DTB data.
//!
//! Nodes are identified by [`NodeOffset`] cursors rather than owning
//! handles, and traversal is exposed as a depth-tracking pre-order
//! primitive ([`Fdt::next_node`]), so callers can run resumable searches
//! restricted to a subtree. That is the access pattern hardware-discovery
//! code needs: "find the next compatible node strictly below this branch".
//!
//! # Usage
//!
//! ```ignore
//! let fdt = Fdt::parse(dtb_bytes)?;
//! let mut depth = 0;
//! let mut node = fdt.root();
//! while let Some(next) = fdt.next_node(node, &mut depth)? {
//!     if depth <= 0 {
//!         break; // left the branch
//!     }
//!     // inspect fdt.node_name(next), fdt.property(next, "reg"), ...
//!     node = next;
//! }
//! ```

#![no_std]

pub mod header;
pub mod node;
pub mod property;
pub mod reservation;

pub use node::NodeOffset;
pub use property::{CellIter, FdtProperty, PropertyIter, StrListIter};
pub use reservation::{MemReservation, MemReservationIter};

use header::{FDT_MAGIC, FDT_MIN_COMPAT_VERSION, RawFdtHeader};
use quartz_binparse::FromBytes;

/// Errors that can occur during FDT parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtError {
    /// The magic number was not `0xd00dfeed`.
    InvalidMagic,
    /// The `last_comp_version` field is below the minimum we support (16).
    UnsupportedVersion,
    /// The DTB data is shorter than the header or declared block offsets.
    TruncatedData,
    /// A structural invariant was violated (e.g. an unknown token or a
    /// structure block without a root node).
    InvalidStructure,
}

/// Parsed Flattened Device Tree.
///
/// Borrows the raw DTB `&[u8]` for the lifetime of all [`NodeOffset`]
/// cursors handed out. The blob is never written to.
pub struct Fdt<'a> {
    data: &'a [u8],
    struct_block: &'a [u8],
    strings_block: &'a [u8],
    boot_cpuid: u32,
    mem_rsv_data: &'a [u8],
    root: NodeOffset,
}

impl<'a> Fdt<'a> {
    /// Parses a DTB blob from raw bytes.
    ///
    /// Validates the header magic, version, bounds-checks all block offsets
    /// against the data length, and locates the root node. This is the one
    /// structural header check; all later node and property accesses are
    /// offset-bounded reads into the validated blocks.
    ///
    /// # Errors
    ///
    /// Returns an [`FdtError`] if the blob is malformed.
    pub fn parse(data: &'a [u8]) -> Result<Self, FdtError> {
        let hdr = RawFdtHeader::read_from(data).ok_or(FdtError::TruncatedData)?;

        if hdr.magic.get() != FDT_MAGIC {
            return Err(FdtError::InvalidMagic);
        }

        if hdr.last_comp_version.get() < FDT_MIN_COMPAT_VERSION {
            return Err(FdtError::UnsupportedVersion);
        }

        let total_size = hdr.totalsize.get() as usize;
        if data.len() < total_size {
            return Err(FdtError::TruncatedData);
        }

        let struct_off = hdr.off_dt_struct.get() as usize;
        let struct_len = hdr.size_dt_struct.get() as usize;
        let strings_off = hdr.off_dt_strings.get() as usize;
        let strings_len = hdr.size_dt_strings.get() as usize;
        let mem_rsv_off = hdr.off_mem_rsvmap.get() as usize;

        // Bounds-check all block regions.
        let struct_end = struct_off
            .checked_add(struct_len)
            .ok_or(FdtError::InvalidStructure)?;
        let strings_end = strings_off
            .checked_add(strings_len)
            .ok_or(FdtError::InvalidStructure)?;

        if struct_end > total_size || strings_end > total_size || mem_rsv_off > total_size {
            return Err(FdtError::TruncatedData);
        }

        let struct_block = &data[struct_off..struct_end];
        let strings_block = &data[strings_off..strings_end];
        // Reservation block extends from its offset to the start of the struct block.
        let mem_rsv_end = struct_off.min(total_size);
        let mem_rsv_data = if mem_rsv_off <= mem_rsv_end {
            &data[mem_rsv_off..mem_rsv_end]
        } else {
            &data[mem_rsv_off..mem_rsv_off]
        };

        // Locate the root node, skipping any leading NOPs.
        let mut offset = 0;
        let root = loop {
            match node::read_token_tag(struct_block, offset) {
                Some(node::FDT_NOP) => offset += 4,
                Some(node::FDT_BEGIN_NODE) => break NodeOffset(offset),
                _ => return Err(FdtError::InvalidStructure),
            }
        };

        Ok(Self {
            data,
            struct_block,
            strings_block,
            boot_cpuid: hdr.boot_cpuid_phys.get(),
            mem_rsv_data,
            root,
        })
    }

    /// Returns the cursor for the root node of the device tree.
    #[must_use]
    pub fn root(&self) -> NodeOffset {
        self.root
    }

    /// Returns the node name (e.g. `"memory@80000000"`, or `""` for root).
    ///
    /// Returns `None` if `node` does not point at a valid node token.
    #[must_use]
    pub fn node_name(&self, node: NodeOffset) -> Option<&'a str> {
        if node::read_token_tag(self.struct_block, node.0)? != node::FDT_BEGIN_NODE {
            return None;
        }
        node::str_from_offset(self.struct_block, node.0 + 4)
    }

    /// Offset of the node's content (properties, then children), right
    /// after its name.
    fn content_offset(&self, node: NodeOffset) -> Option<usize> {
        let name = self.node_name(node)?;
        Some(node::align4(node.0 + 4 + name.len() + 1))
    }

    /// Advances to the next node in depth-first pre-order, updating the
    /// caller-held `depth` counter.
    ///
    /// `depth` is incremented when the successor is a child of `node` and
    /// decremented for every node boundary crossed on the way out, so a
    /// caller that starts at a branch root with `depth = 0` has left the
    /// branch exactly when `depth <= 0`.
    ///
    /// Returns `Ok(None)` at the end of the tree.
    ///
    /// # Errors
    ///
    /// Returns [`FdtError::TruncatedData`] if the structure block ends
    /// without an `FDT_END` token, or [`FdtError::InvalidStructure`] on an
    /// unknown token.
    pub fn next_node(
        &self,
        node: NodeOffset,
        depth: &mut i32,
    ) -> Result<Option<NodeOffset>, FdtError> {
        let mut offset = self
            .content_offset(node)
            .ok_or(FdtError::InvalidStructure)?;

        loop {
            let tag =
                node::read_token_tag(self.struct_block, offset).ok_or(FdtError::TruncatedData)?;

            match tag {
                node::FDT_BEGIN_NODE => {
                    *depth += 1;
                    return Ok(Some(NodeOffset(offset)));
                }
                node::FDT_END_NODE => {
                    *depth -= 1;
                    offset += 4;
                }
                node::FDT_PROP => {
                    let len = node::read_be32_at(self.struct_block, offset + 4)
                        .ok_or(FdtError::TruncatedData)? as usize;
                    // Skip token(4) + len(4) + nameoff(4) + data + padding.
                    offset = node::align4(
                        offset
                            .checked_add(12 + len)
                            .ok_or(FdtError::InvalidStructure)?,
                    );
                }
                node::FDT_NOP => {
                    offset += 4;
                }
                node::FDT_END => return Ok(None),
                _ => return Err(FdtError::InvalidStructure),
            }
        }
    }

    /// Returns an iterator over the node's properties.
    ///
    /// An invalid cursor yields an empty iterator.
    #[must_use]
    pub fn properties(&self, node: NodeOffset) -> PropertyIter<'a> {
        let offset = self.content_offset(node).unwrap_or(usize::MAX);
        PropertyIter::new(self.struct_block, self.strings_block, offset)
    }

    /// Looks up a property by name within a node.
    #[must_use]
    pub fn property(&self, node: NodeOffset, name: &str) -> Option<FdtProperty<'a>> {
        self.properties(node).find(|p| p.name() == name)
    }

    /// Finds a direct child of `node` by its full name (including any unit
    /// address, e.g. `"cpu@0"`).
    #[must_use]
    pub fn find_child(&self, node: NodeOffset, name: &str) -> Option<NodeOffset> {
        let mut depth = 0;
        let mut current = node;
        loop {
            match self.next_node(current, &mut depth) {
                Ok(Some(next)) => {
                    if depth <= 0 {
                        return None;
                    }
                    if depth == 1 && self.node_name(next) == Some(name) {
                        return Some(next);
                    }
                    current = next;
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Finds a node by its full path (e.g. `"/cpus/cpu@0"`).
    ///
    /// Returns `None` if any component along the path is not found.
    #[must_use]
    pub fn find_node(&self, path: &str) -> Option<NodeOffset> {
        let mut current = self.root();

        for component in path.split('/') {
            if component.is_empty() {
                continue;
            }
            current = self.find_child(current, component)?;
        }

        Some(current)
    }

    /// Depth of `node` below the root (root itself is depth 0).
    fn depth_of(&self, target: NodeOffset) -> Result<i32, FdtError> {
        if target == self.root {
            return Ok(0);
        }
        let mut depth = 0;
        let mut current = self.root;
        loop {
            match self.next_node(current, &mut depth)? {
                Some(next) if next == target => return Ok(depth),
                Some(next) => current = next,
                // A cursor not reachable from the root is a caller bug or
                // a corrupted offset.
                None => return Err(FdtError::InvalidStructure),
            }
        }
    }

    /// Returns the structural parent of `node`, or `Ok(None)` for the root.
    ///
    /// The structure block stores no parent links, so this rescans the tree
    /// from the root tracking the most recent ancestor candidate.
    ///
    /// # Errors
    ///
    /// Returns an error if `node` is not a valid cursor into this tree.
    pub fn parent_of(&self, target: NodeOffset) -> Result<Option<NodeOffset>, FdtError> {
        if target == self.root {
            return Ok(None);
        }
        let parent_depth = self.depth_of(target)? - 1;

        let mut depth = 0;
        let mut current = self.root;
        let mut candidate = self.root;
        loop {
            if current == target {
                return Ok(Some(candidate));
            }
            match self.next_node(current, &mut depth)? {
                Some(next) => {
                    if next == target {
                        return Ok(Some(candidate));
                    }
                    if depth == parent_depth {
                        candidate = next;
                    }
                    current = next;
                }
                None => return Err(FdtError::InvalidStructure),
            }
        }
    }

    /// Finds the node carrying the given phandle value.
    ///
    /// Both the `phandle` and legacy `linux,phandle` spellings are honored.
    ///
    /// # Errors
    ///
    /// Propagates traversal errors from a malformed structure block.
    pub fn node_with_phandle(&self, phandle: u32) -> Result<Option<NodeOffset>, FdtError> {
        let mut depth = 0;
        let mut current = self.root;
        loop {
            let handle = self
                .property(current, "phandle")
                .or_else(|| self.property(current, "linux,phandle"))
                .and_then(|p| p.as_u32());
            if handle == Some(phandle) {
                return Ok(Some(current));
            }
            match self.next_node(current, &mut depth)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
    }

    /// Returns an iterator over the memory reservation entries.
    #[must_use]
    pub fn memory_reservations(&self) -> MemReservationIter<'a> {
        MemReservationIter::new(self.mem_rsv_data)
    }

    /// Returns the physical boot CPU ID.
    #[must_use]
    pub fn boot_cpuid(&self) -> u32 {
        self.boot_cpuid
    }

    /// Returns the total size of the DTB blob in bytes.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
extern crate alloc;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use quartz_dtb_builder::DtbBuilder;

    /// Builds a small tree:
    ///
    /// ```text
    /// / {
    ///     model = "test-board";
    ///     cpus {
    ///         #address-cells = <1>;
    ///         cpu@0 {
    ///             compatible = "arm,cortex-a53\0arm,armv8";
    ///             phandle = <7>;
    ///         };
    ///     };
    ///     soc {
    ///         uart@9000000 { };
    ///     };
    /// };
    /// ```
    fn build_test_dtb() -> Vec<u8> {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.prop_str("model", "test-board");
        b.begin_node("cpus");
        b.prop_u32("#address-cells", 1);
        b.begin_node("cpu@0");
        b.prop_str_list("compatible", &["arm,cortex-a53", "arm,armv8"]);
        b.prop_u32("phandle", 7);
        b.end_node();
        b.end_node();
        b.begin_node("soc");
        b.begin_node("uart@9000000");
        b.end_node();
        b.end_node();
        b.end_node();
        b.finish()
    }

    // ---- Header validation tests --------------------------------------------

    #[test]
    fn parse_valid_dtb() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        assert_eq!(fdt.boot_cpuid(), 0);
        assert_eq!(fdt.total_size(), dtb.len());
    }

    #[test]
    fn parse_bad_magic() {
        let mut dtb = build_test_dtb();
        dtb[0] = 0;
        assert!(matches!(Fdt::parse(&dtb), Err(FdtError::InvalidMagic)));
    }

    #[test]
    fn parse_bad_version() {
        let mut dtb = build_test_dtb();
        // Set last_comp_version to 15 (below minimum 16).
        dtb[24..28].copy_from_slice(&15u32.to_be_bytes());
        assert!(matches!(
            Fdt::parse(&dtb),
            Err(FdtError::UnsupportedVersion)
        ));
    }

    #[test]
    fn parse_truncated() {
        let dtb = build_test_dtb();
        assert!(matches!(
            Fdt::parse(&dtb[..20]),
            Err(FdtError::TruncatedData)
        ));
    }

    // ---- Traversal tests ----------------------------------------------------

    #[test]
    fn root_name_is_empty() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        assert_eq!(fdt.node_name(fdt.root()), Some(""));
    }

    #[test]
    fn preorder_walk_with_depths() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();

        let mut depth = 0;
        let mut current = fdt.root();
        let mut seen = Vec::new();
        while let Some(next) = fdt.next_node(current, &mut depth).unwrap() {
            seen.push((fdt.node_name(next).unwrap(), depth));
            current = next;
        }

        assert_eq!(
            seen,
            &[
                ("cpus", 1),
                ("cpu@0", 2),
                ("soc", 1),
                ("uart@9000000", 2)
            ]
        );
        // The walk ends having stepped out of the root node itself.
        assert_eq!(depth, -1);
    }

    #[test]
    fn next_node_depth_relative_to_branch() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let cpus = fdt.find_node("/cpus").unwrap();

        // Starting at /cpus with depth 0: cpu@0 is at depth 1, then the walk
        // leaves the branch (soc is at depth 0).
        let mut depth = 0;
        let cpu0 = fdt.next_node(cpus, &mut depth).unwrap().unwrap();
        assert_eq!(fdt.node_name(cpu0), Some("cpu@0"));
        assert_eq!(depth, 1);

        let soc = fdt.next_node(cpu0, &mut depth).unwrap().unwrap();
        assert_eq!(fdt.node_name(soc), Some("soc"));
        assert_eq!(depth, 0);
    }

    // ---- Property access tests ----------------------------------------------

    #[test]
    fn property_as_str() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let model = fdt.property(fdt.root(), "model").unwrap();
        assert_eq!(model.as_str(), Some("test-board"));
    }

    #[test]
    fn property_as_u32() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let cpus = fdt.find_node("/cpus").unwrap();
        let cells = fdt.property(cpus, "#address-cells").unwrap();
        assert_eq!(cells.as_u32(), Some(1));
    }

    #[test]
    fn property_as_str_list() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let cpu = fdt.find_node("/cpus/cpu@0").unwrap();
        let compat = fdt.property(cpu, "compatible").unwrap();
        let list: Vec<&str> = compat.as_str_list().collect();
        assert_eq!(list, &["arm,cortex-a53", "arm,armv8"]);
    }

    #[test]
    fn missing_property_returns_none() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        assert!(fdt.property(fdt.root(), "nonexistent").is_none());
    }

    #[test]
    fn property_cells() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.prop_cells("reg", &[0x4000_0000, 0x0, 0x1, 0x2345_6789]);
        b.end_node();
        let dtb = b.finish();

        let fdt = Fdt::parse(&dtb).unwrap();
        let reg = fdt.property(fdt.root(), "reg").unwrap();
        assert_eq!(reg.cell_count(), 4);
        assert_eq!(reg.cell(0), Some(0x4000_0000));
        assert_eq!(reg.cells_as_u64(0, 2), Some(0x4000_0000_0000_0000));
        assert_eq!(reg.cells_as_u64(2, 2), Some(0x1_2345_6789));
        assert_eq!(reg.cells_as_u64(3, 1), Some(0x2345_6789));
        assert_eq!(reg.cells_as_u64(0, 3), None);
        assert_eq!(reg.cells().count(), 4);
    }

    // ---- Path lookup tests --------------------------------------------------

    #[test]
    fn find_node_paths() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        assert_eq!(fdt.find_node("/"), Some(fdt.root()));
        assert_eq!(
            fdt.node_name(fdt.find_node("/cpus/cpu@0").unwrap()),
            Some("cpu@0")
        );
        assert!(fdt.find_node("/nonexistent").is_none());
        assert!(fdt.find_node("/cpus/cpu@1").is_none());
    }

    #[test]
    fn find_child_skips_grandchildren() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        // uart@9000000 is a grandchild of root, not a child.
        assert!(fdt.find_child(fdt.root(), "uart@9000000").is_none());
    }

    // ---- Parent and phandle tests -------------------------------------------

    #[test]
    fn parent_of_nested_node() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let cpu = fdt.find_node("/cpus/cpu@0").unwrap();
        let parent = fdt.parent_of(cpu).unwrap().unwrap();
        assert_eq!(fdt.node_name(parent), Some("cpus"));
        let grandparent = fdt.parent_of(parent).unwrap().unwrap();
        assert_eq!(grandparent, fdt.root());
        assert_eq!(fdt.parent_of(fdt.root()).unwrap(), None);
    }

    #[test]
    fn phandle_lookup() {
        let dtb = build_test_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let node = fdt.node_with_phandle(7).unwrap().unwrap();
        assert_eq!(fdt.node_name(node), Some("cpu@0"));
        assert_eq!(fdt.node_with_phandle(8).unwrap(), None);
    }

    // ---- Memory reservation tests -------------------------------------------

    #[test]
    fn memory_reservations() {
        let mut b = DtbBuilder::new();
        b.reserve(0x8000_0000, 0x1000);
        b.begin_node("");
        b.end_node();
        let dtb = b.finish();

        let fdt = Fdt::parse(&dtb).unwrap();
        let rsv: Vec<MemReservation> = fdt.memory_reservations().collect();
        assert_eq!(
            rsv,
            &[MemReservation {
                address: 0x8000_0000,
                size: 0x1000
            }]
        );
    }

    #[test]
    fn no_reservations() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.end_node();
        let dtb = b.finish();

        let fdt = Fdt::parse(&dtb).unwrap();
        assert_eq!(fdt.memory_reservations().count(), 0);
    }

    // ---- Boot CPU ID test ---------------------------------------------------

    #[test]
    fn boot_cpuid_nonzero() {
        let mut b = DtbBuilder::new();
        b.set_boot_cpuid(3);
        b.begin_node("");
        b.end_node();
        let dtb = b.finish();

        let fdt = Fdt::parse(&dtb).unwrap();
        assert_eq!(fdt.boot_cpuid(), 3);
    }
}
