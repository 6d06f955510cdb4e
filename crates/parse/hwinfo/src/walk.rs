//! Branch-restricted tree search and cell-geometry resolution.
//!
//! Everything here operates on raw [`NodeOffset`] cursors from
//! [`quartz_fdt`]. Searches are resumable: `find_next` takes the last
//! match and yields the next one in depth-first pre-order, confined to a
//! branch. Leaving the branch is "not found", never an error; only
//! structural blob failures abort.

use alloc::vec::Vec;

use quartz_fdt::{Fdt, FdtProperty, NodeOffset};

use crate::compat::CompatibilityTable;
use crate::error::{HwInfoError, Result};

/// Devicetree-specification default for `#address-cells`.
pub const DEFAULT_ADDRESS_CELLS: u32 = 2;
/// Devicetree-specification default for `#size-cells`.
pub const DEFAULT_SIZE_CELLS: u32 = 1;

/// Node predicate for the search utilities.
#[derive(Clone, Copy)]
pub enum SearchSpec<'t> {
    /// Match by node name, ignoring any unit address (`"cpu"` matches
    /// `"cpu@100"`).
    Name(&'t str),
    /// Match nodes whose `compatible` list intersects the table.
    Compatible(&'t CompatibilityTable),
    /// Match nodes carrying the named property.
    Property(&'t str),
}

/// Node name with the unit address stripped.
#[must_use]
pub fn base_name(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

/// Whether `node` carries a property named `name`.
#[must_use]
pub fn has_property(fdt: &Fdt<'_>, node: NodeOffset, name: &str) -> bool {
    fdt.property(node, name).is_some()
}

/// Whether `node`'s `compatible` string list contains any table entry.
#[must_use]
pub fn node_is_compatible(fdt: &Fdt<'_>, node: NodeOffset, table: &CompatibilityTable) -> bool {
    fdt.property(node, "compatible")
        .is_some_and(|prop| prop.as_str_list().any(|s| table.contains(&s)))
}

/// Whether `node` satisfies `spec`.
#[must_use]
pub fn node_matches(fdt: &Fdt<'_>, node: NodeOffset, spec: SearchSpec<'_>) -> bool {
    match spec {
        SearchSpec::Name(name) => fdt.node_name(node).map(base_name) == Some(name),
        SearchSpec::Compatible(table) => node_is_compatible(fdt, node, table),
        SearchSpec::Property(name) => has_property(fdt, node, name),
    }
}

/// Finds the next node satisfying `spec`, strictly after `after` in
/// depth-first pre-order and strictly inside the subtree rooted at
/// `branch`.
///
/// The branch root itself is never yielded. `Ok(None)` means the search
/// left the branch or reached the end of the tree.
///
/// # Errors
///
/// `Aborted` on a structural blob error.
pub fn find_next(
    fdt: &Fdt<'_>,
    branch: NodeOffset,
    after: NodeOffset,
    spec: SearchSpec<'_>,
) -> Result<Option<NodeOffset>> {
    let mut depth = 0;
    let mut node = branch;
    loop {
        match fdt.next_node(node, &mut depth)? {
            None => return Ok(None),
            Some(next) => {
                if depth <= 0 {
                    // Out of branch.
                    return Ok(None);
                }
                if next > after && node_matches(fdt, next, spec) {
                    return Ok(Some(next));
                }
                node = next;
            }
        }
    }
}

/// Finds the first node satisfying `spec` inside the branch.
///
/// # Errors
///
/// `Aborted` on a structural blob error.
pub fn find_first(
    fdt: &Fdt<'_>,
    branch: NodeOffset,
    spec: SearchSpec<'_>,
) -> Result<Option<NodeOffset>> {
    find_next(fdt, branch, branch, spec)
}

/// Counts the nodes satisfying `spec` inside the branch. Zero is a valid
/// result.
///
/// # Errors
///
/// `Aborted` on a structural blob error.
pub fn count_matching(fdt: &Fdt<'_>, branch: NodeOffset, spec: SearchSpec<'_>) -> Result<u32> {
    let mut count = 0;
    let mut cursor = branch;
    while let Some(found) = find_next(fdt, branch, cursor, spec)? {
        count += 1;
        cursor = found;
    }
    Ok(count)
}

/// Resolves the interrupt controller a node's interrupts route to.
///
/// Checks for an `interrupt-controller` marker on the node itself, then an
/// `interrupt-parent` phandle, then recurses to the structural parent.
/// `Ok(None)` only at the tree root with neither found.
///
/// # Errors
///
/// `Aborted` if an `interrupt-parent` phandle does not resolve or the
/// phandle chain cycles, or on a structural blob error.
pub fn intc_parent_node(fdt: &Fdt<'_>, node: NodeOffset) -> Result<Option<NodeOffset>> {
    let mut current = node;
    // Every node occupies at least two tokens, so a chain longer than
    // this must revisit a node.
    let mut remaining = fdt.total_size() / 8;
    loop {
        if has_property(fdt, current, "interrupt-controller") {
            return Ok(Some(current));
        }
        remaining = remaining.checked_sub(1).ok_or(HwInfoError::Aborted)?;
        if let Some(phandle) = fdt
            .property(current, "interrupt-parent")
            .and_then(|p| p.as_u32())
        {
            current = fdt
                .node_with_phandle(phandle)?
                .ok_or(HwInfoError::Aborted)?;
            continue;
        }
        match fdt.parent_of(current)? {
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
}

/// `#address-cells` of `node`, with the specification default.
#[must_use]
pub fn address_cells(fdt: &Fdt<'_>, node: NodeOffset) -> u32 {
    fdt.property(node, "#address-cells")
        .and_then(|p| p.as_u32())
        .unwrap_or(DEFAULT_ADDRESS_CELLS)
}

/// `#size-cells` of `node`, with the specification default.
#[must_use]
pub fn size_cells(fdt: &Fdt<'_>, node: NodeOffset) -> u32 {
    fdt.property(node, "#size-cells")
        .and_then(|p| p.as_u32())
        .unwrap_or(DEFAULT_SIZE_CELLS)
}

/// Address/size cell counts governing a node's `reg` and `ranges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGeometry {
    /// Number of cells per address.
    pub address_cells: u32,
    /// Number of cells per size.
    pub size_cells: u32,
}

/// Cell geometry of `node`'s structural parent (which governs `node`'s own
/// `reg`), with specification defaults. The root gets the defaults.
///
/// # Errors
///
/// `Aborted` on a structural blob error.
pub fn parent_cell_geometry(fdt: &Fdt<'_>, node: NodeOffset) -> Result<CellGeometry> {
    match fdt.parent_of(node)? {
        Some(parent) => Ok(CellGeometry {
            address_cells: address_cells(fdt, parent),
            size_cells: size_cells(fdt, parent),
        }),
        None => Ok(CellGeometry {
            address_cells: DEFAULT_ADDRESS_CELLS,
            size_cells: DEFAULT_SIZE_CELLS,
        }),
    }
}

/// `#interrupt-cells` of a designated interrupt-controller node.
///
/// # Errors
///
/// Mandatory property: `Aborted` if missing or malformed.
pub fn interrupt_cells(fdt: &Fdt<'_>, intc: NodeOffset) -> Result<u32> {
    let cells = fdt
        .property(intc, "#interrupt-cells")
        .and_then(|p| p.as_u32())
        .ok_or(HwInfoError::Aborted)?;
    if cells == 0 || cells > 8 {
        return Err(HwInfoError::Aborted);
    }
    Ok(cells)
}

/// Architecture-specific resolution of an interrupt controller's
/// `#address-cells`, as used in `interrupt-map` parent units.
pub trait AddressCellPolicy {
    /// Address cell count of the interrupt controller node.
    fn intc_address_cells(&self, fdt: &Fdt<'_>, intc: NodeOffset) -> u32;
}

/// Arm convention: the property with the specification default.
pub struct ArmCellPolicy;

impl AddressCellPolicy for ArmCellPolicy {
    fn intc_address_cells(&self, fdt: &Fdt<'_>, intc: NodeOffset) -> u32 {
        address_cells(fdt, intc)
    }
}

/// RISC-V convention: interrupt controllers have no address cells,
/// regardless of what the property says.
///
/// The built-in RISC-V dispatch table routes interrupts through
/// `interrupts-extended` phandle pairs, which carry no parent address
/// units, so no bundled parser consults this policy; it is provided for
/// sinks assembling their own tables around an `interrupt-map` consumer.
pub struct RiscVCellPolicy;

impl AddressCellPolicy for RiscVCellPolicy {
    fn intc_address_cells(&self, _fdt: &Fdt<'_>, _intc: NodeOffset) -> u32 {
        0
    }
}

/// Reads entry `index` of a node's `reg` property as an (address, size)
/// pair under the given geometry.
///
/// # Errors
///
/// `NotFound` if the node has no `reg` property, `Unsupported` for cell
/// counts outside 1..=2, `Aborted` if the property is too short for the
/// requested entry.
pub fn read_reg(
    fdt: &Fdt<'_>,
    node: NodeOffset,
    geometry: CellGeometry,
    index: usize,
) -> Result<(u64, u64)> {
    if !(1..=2).contains(&geometry.address_cells) || !(1..=2).contains(&geometry.size_cells) {
        return Err(HwInfoError::Unsupported);
    }
    let reg = fdt.property(node, "reg").ok_or(HwInfoError::NotFound)?;
    let stride = (geometry.address_cells + geometry.size_cells) as usize;
    let base = index * stride;
    let address = reg
        .cells_as_u64(base, geometry.address_cells as usize)
        .ok_or(HwInfoError::Aborted)?;
    let size = reg
        .cells_as_u64(
            base + geometry.address_cells as usize,
            geometry.size_cells as usize,
        )
        .ok_or(HwInfoError::Aborted)?;
    Ok((address, size))
}

/// Like [`read_reg`], for nodes where `reg` is mandatory: a missing
/// property is a structural violation, not an absence.
///
/// # Errors
///
/// `Aborted` if the property is missing or too short, `Unsupported` for
/// cell counts outside 1..=2.
pub fn read_reg_required(
    fdt: &Fdt<'_>,
    node: NodeOffset,
    geometry: CellGeometry,
    index: usize,
) -> Result<(u64, u64)> {
    match read_reg(fdt, node, geometry, index) {
        Err(HwInfoError::NotFound) => Err(HwInfoError::Aborted),
        other => other,
    }
}

/// Collects `count` consecutive cells of a property starting at `start`.
///
/// # Errors
///
/// `Aborted` if the property is too short.
pub fn cell_run(prop: &FdtProperty<'_>, start: usize, count: usize) -> Result<Vec<u32>> {
    let mut cells = Vec::with_capacity(count);
    for i in 0..count {
        cells.push(prop.cell(start + i).ok_or(HwInfoError::Aborted)?);
    }
    Ok(cells)
}

/// Whether a node's `status` property marks it usable. Absent, `"okay"`
/// and `"ok"` all mean enabled.
#[must_use]
pub fn status_enabled(fdt: &Fdt<'_>, node: NodeOffset) -> bool {
    match fdt.property(node, "status") {
        None => true,
        Some(p) => matches!(p.as_str(), Some("okay" | "ok")),
    }
}
