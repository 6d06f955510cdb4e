//! GIC complex discovery: CPU interfaces, distributor, redistributors,
//! ITS blocks and GICv2m MSI frames.
//!
//! The whole complex is parsed into working buffers before anything is
//! handed to the sink, so a failure anywhere never leaves partial GIC
//! objects behind.

use alloc::vec::Vec;

use quartz_fdt::{Fdt, NodeOffset};

use crate::compat;
use crate::decode::{ArmGicDecoder, InterruptDecoder, InterruptFlags};
use crate::error::{HwInfoError, Result};
use crate::object::HwObject;
use crate::object::arm::{
    GICC_FLAG_ENABLED, GICC_FLAG_VGIC_EDGE_TRIGGERED, GicCInfo, GicDInfo, GicItsInfo,
    GicMsiFrameInfo, GicRedistributorInfo,
};
use crate::sink::HwInfoSink;
use crate::walk::{self, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// The one PMU overflow interrupt the base system architecture allows.
const BSA_PMU_IRQ: u32 = 23;

/// MSI frame flag: `spi_base`/`spi_count` override the frame registers.
const MSI_FRAME_FLAG_SPI_SELECT: u32 = 1 << 0;

/// MPIDR bits a cpu `reg` value may carry with one address cell
/// (affinity levels 0-2).
const MPIDR_VALID_MASK_1_CELL: u64 = 0x00FF_FFFF;
/// MPIDR bits with two address cells (affinity level 3 in bits 39:32).
const MPIDR_VALID_MASK_2_CELLS: u64 = 0xFF_0000_0000 | MPIDR_VALID_MASK_1_CELL;

/// Discovers the GIC complex hanging off the branch's `cpus` node.
pub struct GicDispatcher;

impl HwInfoParser for GicDispatcher {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        _context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let cpus = walk::find_first(fdt, branch, SearchSpec::Name("cpus"))?
            .ok_or(HwInfoError::NotFound)?;
        let intc = walk::intc_parent_node(fdt, cpus)?.ok_or(HwInfoError::NotFound)?;

        let version = if walk::node_is_compatible(fdt, intc, compat::GICV3_COMPATIBLE) {
            3
        } else if walk::node_is_compatible(fdt, intc, compat::GICV2_COMPATIBLE) {
            2
        } else {
            return Err(HwInfoError::Unsupported);
        };

        let mut cpu_interfaces = parse_cpu_interfaces(fdt, cpus, version)?;
        // A GIC without CPU interfaces cannot describe a usable system.
        if cpu_interfaces.is_empty() {
            return Err(HwInfoError::Aborted);
        }

        let pmu_gsiv = pmu_interrupt(fdt)?;
        let maintenance = vgic_maintenance(fdt, intc)?;
        let layout = reg_layout(fdt, intc, version)?;

        for gicc in &mut cpu_interfaces {
            gicc.performance_interrupt_gsiv = pmu_gsiv;
            gicc.physical_base_address = layout.cpu_interface;
            gicc.gich_base_address = layout.hypervisor_interface;
            gicc.gicv_base_address = layout.virtual_interface;
            if let Some((gsiv, edge)) = maintenance {
                gicc.vgic_maintenance_interrupt = gsiv;
                if edge {
                    gicc.flags |= GICC_FLAG_VGIC_EDGE_TRIGGERED;
                }
            }
        }

        let its_blocks = if version == 3 {
            its_nodes(fdt, intc)?
        } else {
            Vec::new()
        };
        let msi_frames = if version == 2 {
            msi_frame_nodes(fdt, intc)?
        } else {
            Vec::new()
        };

        for gicc in &cpu_interfaces {
            sink.add(HwObject::GicC(gicc))?;
        }
        sink.add(HwObject::GicD(&GicDInfo {
            physical_base_address: layout.distributor,
            gic_version: version,
        }))?;
        for &(base, length) in &layout.redistributors {
            sink.add(HwObject::GicRedistributor(&GicRedistributorInfo {
                discovery_range_base_address: base,
                discovery_range_length: length,
            }))?;
        }
        for its in &its_blocks {
            sink.add(HwObject::GicIts(its))?;
        }
        for frame in &msi_frames {
            sink.add(HwObject::GicMsiFrame(frame))?;
        }
        Ok(())
    }
}

/// Folds affinity level 3 into bits 31:24 of a 32-bit processor UID.
fn fold_affinity(mpidr: u64) -> u32 {
    let aff3 = ((mpidr >> 32) & 0xFF) as u32;
    (aff3 << 24) | (mpidr as u32 & 0x00FF_FFFF)
}

fn parse_cpu_interfaces(fdt: &Fdt<'_>, cpus: NodeOffset, version: u8) -> Result<Vec<GicCInfo>> {
    let address_cells = walk::address_cells(fdt, cpus);
    if !(1..=2).contains(&address_cells) {
        return Err(HwInfoError::Unsupported);
    }
    let valid_mask = if address_cells == 2 {
        MPIDR_VALID_MASK_2_CELLS
    } else {
        MPIDR_VALID_MASK_1_CELL
    };

    let mut out = Vec::new();
    let mut cursor = cpus;
    while let Some(cpu) = walk::find_next(fdt, cpus, cursor, SearchSpec::Name("cpu"))? {
        cursor = cpu;
        let reg = fdt.property(cpu, "reg").ok_or(HwInfoError::Aborted)?;
        let mpidr = reg
            .cells_as_u64(0, address_cells as usize)
            .ok_or(HwInfoError::Aborted)?;
        if mpidr & !valid_mask != 0 {
            return Err(HwInfoError::InvalidParameter);
        }
        let uid = fold_affinity(mpidr);
        out.push(GicCInfo {
            // GICv3 dropped the v2 compatibility interface numbering.
            cpu_interface_number: if version == 2 { uid } else { 0 },
            acpi_processor_uid: uid,
            flags: GICC_FLAG_ENABLED,
            performance_interrupt_gsiv: 0,
            physical_base_address: 0,
            gicv_base_address: 0,
            gich_base_address: 0,
            vgic_maintenance_interrupt: 0,
            mpidr,
        });
    }
    Ok(out)
}

/// PMU overflow interrupt, or 0 when no PMU node exists.
///
/// The PMU search is deliberately tree-wide rather than branch-restricted:
/// a single PMU node describes all cores.
fn pmu_interrupt(fdt: &Fdt<'_>) -> Result<u32> {
    let spec = SearchSpec::Compatible(compat::PMU_COMPATIBLE);
    let Some(pmu) = walk::find_first(fdt, fdt.root(), spec)? else {
        return Ok(0);
    };
    let intc = walk::intc_parent_node(fdt, pmu)?.ok_or(HwInfoError::Aborted)?;
    let cells = walk::interrupt_cells(fdt, intc)? as usize;
    let interrupts = fdt
        .property(pmu, "interrupts")
        .ok_or(HwInfoError::Aborted)?;
    let entry = walk::cell_run(&interrupts, 0, cells)?;
    let gsiv = ArmGicDecoder.interrupt_id(&entry)?;
    if gsiv != BSA_PMU_IRQ {
        // Non-BSA PMU wiring is not modeled.
        return Err(HwInfoError::Unsupported);
    }
    Ok(gsiv)
}

/// VGIC maintenance interrupt from the controller's own `interrupts`
/// property: `(gsiv, edge_triggered)`, or `None` when not wired.
fn vgic_maintenance(fdt: &Fdt<'_>, intc: NodeOffset) -> Result<Option<(u32, bool)>> {
    let Some(interrupts) = fdt.property(intc, "interrupts") else {
        return Ok(None);
    };
    let cells = walk::interrupt_cells(fdt, intc)? as usize;
    let entry = walk::cell_run(&interrupts, 0, cells)?;
    let gsiv = ArmGicDecoder.interrupt_id(&entry)?;
    let edge = ArmGicDecoder
        .interrupt_flags(&entry)?
        .contains(InterruptFlags::EDGE_TRIGGERED);
    Ok(Some((gsiv, edge)))
}

struct RegLayout {
    distributor: u64,
    cpu_interface: u64,
    hypervisor_interface: u64,
    virtual_interface: u64,
    redistributors: Vec<(u64, u32)>,
}

fn reg_layout(fdt: &Fdt<'_>, intc: NodeOffset, version: u8) -> Result<RegLayout> {
    let geometry = walk::parent_cell_geometry(fdt, intc)?;
    if !(1..=2).contains(&geometry.address_cells) || !(1..=2).contains(&geometry.size_cells) {
        return Err(HwInfoError::Unsupported);
    }
    let reg = fdt.property(intc, "reg").ok_or(HwInfoError::Aborted)?;
    let stride = (geometry.address_cells + geometry.size_cells) as usize;
    let count = reg.cell_count() / stride;
    let entry = |i| walk::read_reg_required(fdt, intc, geometry, i);

    if version == 2 {
        // Distributor, CPU interface, then optional hypervisor/virtual.
        if count < 2 {
            return Err(HwInfoError::Aborted);
        }
        Ok(RegLayout {
            distributor: entry(0)?.0,
            cpu_interface: entry(1)?.0,
            hypervisor_interface: if count > 2 { entry(2)?.0 } else { 0 },
            virtual_interface: if count > 3 { entry(3)?.0 } else { 0 },
            redistributors: Vec::new(),
        })
    } else {
        // Distributor, N redistributor regions, then optional
        // CPU/hypervisor/virtual interfaces.
        let regions = fdt
            .property(intc, "#redistributor-regions")
            .and_then(|p| p.as_u32())
            .unwrap_or(1) as usize;
        if regions == 0 || count < 1 + regions {
            return Err(HwInfoError::Aborted);
        }
        let mut redistributors = Vec::with_capacity(regions);
        for i in 0..regions {
            let (base, length) = entry(1 + i)?;
            redistributors.push((
                base,
                u32::try_from(length).map_err(|_| HwInfoError::Aborted)?,
            ));
        }
        Ok(RegLayout {
            distributor: entry(0)?.0,
            cpu_interface: if count > 1 + regions {
                entry(1 + regions)?.0
            } else {
                0
            },
            hypervisor_interface: if count > 2 + regions {
                entry(2 + regions)?.0
            } else {
                0
            },
            virtual_interface: if count > 3 + regions {
                entry(3 + regions)?.0
            } else {
                0
            },
            redistributors,
        })
    }
}

/// ITS blocks under the controller, IDs assigned in encounter order.
fn its_nodes(fdt: &Fdt<'_>, intc: NodeOffset) -> Result<Vec<GicItsInfo>> {
    let mut out = Vec::new();
    let mut cursor = intc;
    let spec = SearchSpec::Property("msi-controller");
    while let Some(node) = walk::find_next(fdt, intc, cursor, spec)? {
        cursor = node;
        let geometry = walk::parent_cell_geometry(fdt, node)?;
        let (base, _) = walk::read_reg_required(fdt, node, geometry, 0)?;
        out.push(GicItsInfo {
            its_id: out.len() as u32,
            physical_base_address: base,
        });
    }
    Ok(out)
}

/// GICv2m MSI frames under the controller.
fn msi_frame_nodes(fdt: &Fdt<'_>, intc: NodeOffset) -> Result<Vec<GicMsiFrameInfo>> {
    let mut out = Vec::new();
    let mut cursor = intc;
    let spec = SearchSpec::Property("msi-controller");
    while let Some(node) = walk::find_next(fdt, intc, cursor, spec)? {
        cursor = node;
        if !walk::node_is_compatible(fdt, node, compat::GICV2M_COMPATIBLE) {
            return Err(HwInfoError::Unsupported);
        }
        let geometry = walk::parent_cell_geometry(fdt, node)?;
        let (base, _) = walk::read_reg_required(fdt, node, geometry, 0)?;

        let spi_base = fdt.property(node, "arm,msi-base-spi").and_then(|p| p.as_u32());
        let spi_count = fdt.property(node, "arm,msi-num-spis").and_then(|p| p.as_u32());
        let (flags, spi_base, spi_count) = match (spi_base, spi_count) {
            (Some(base), Some(count)) => (
                MSI_FRAME_FLAG_SPI_SELECT,
                u16::try_from(base).map_err(|_| HwInfoError::Aborted)?,
                u16::try_from(count).map_err(|_| HwInfoError::Aborted)?,
            ),
            (None, None) => (0, 0, 0),
            // An override needs both halves.
            _ => return Err(HwInfoError::Aborted),
        };

        out.push(GicMsiFrameInfo {
            msi_frame_id: out.len() as u32,
            physical_base_address: base,
            flags,
            spi_count,
            spi_base,
        });
    }
    Ok(out)
}
