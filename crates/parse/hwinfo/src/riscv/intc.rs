//! RISC-V interrupt topology: per-hart RINTC records plus PLIC, APLIC and
//! IMSIC controllers.
//!
//! Runs as a two-phase pipeline. Phase 1 builds an in-memory RINTC table
//! keyed by each hart's `cpu-intc` phandle. Phase 2 discovers the external
//! controllers and back-patches the composite controller ID and the IMSIC
//! interrupt-file address into that table. Only the finished table is
//! handed to the sink.

use alloc::vec::Vec;

use quartz_fdt::{Fdt, NodeOffset};

use crate::compat;
use crate::error::{HwInfoError, Result};
use crate::object::HwObject;
use crate::object::riscv::{AplicInfo, ImsicInfo, PlicInfo, RINTC_FLAG_ENABLED, RintcInfo};
use crate::sink::HwInfoSink;
use crate::walk::{self, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// Supervisor-mode external interrupt number. Contexts wired to any other
/// IRQ (machine mode is 11) belong to firmware, not to us.
const S_MODE_IRQ: u32 = 9;

/// Size of one IMSIC interrupt file before guest-index scaling.
const IMSIC_MMIO_PAGE: u64 = 4096;

struct HartEntry {
    /// Phandle of the hart's `cpu-intc` child, when it has one. Controllers
    /// reference harts through these.
    intc_phandle: Option<u32>,
    info: RintcInfo,
}

/// Builds and patches the per-hart RINTC table, then emits it together
/// with the discovered PLIC/APLIC/IMSIC records.
pub struct RiscVIntcDispatcher;

impl HwInfoParser for RiscVIntcDispatcher {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        _context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let cpus = walk::find_first(fdt, branch, SearchSpec::Name("cpus"))?
            .ok_or(HwInfoError::NotFound)?;
        let mut harts = hart_table(fdt, cpus)?;
        if harts.is_empty() {
            return Err(HwInfoError::NotFound);
        }

        let mut plics = Vec::new();
        let mut aplics = Vec::new();
        let mut gsi_base = 0u32;

        // Controllers may live anywhere, not just under the branch.
        let root = fdt.root();
        let mut cursor = root;
        let spec = SearchSpec::Compatible(compat::PLIC_COMPATIBLE);
        while let Some(node) = walk::find_next(fdt, root, cursor, spec)? {
            cursor = node;
            let contexts = s_mode_contexts(fdt, node)?;
            if contexts.is_empty() {
                // Machine-mode-only controller.
                continue;
            }
            let geometry = walk::parent_cell_geometry(fdt, node)?;
            let (base_address, size) = walk::read_reg_required(fdt, node, geometry, 0)?;
            let num_sources = fdt
                .property(node, "riscv,ndev")
                .and_then(|p| p.as_u32())
                .ok_or(HwInfoError::Aborted)?;
            let id = u8::try_from(plics.len()).map_err(|_| HwInfoError::Aborted)?;
            patch_contexts(&mut harts, &contexts, id);
            plics.push(PlicInfo {
                plic_id: id,
                base_address,
                size: u32::try_from(size).map_err(|_| HwInfoError::Aborted)?,
                num_sources: u16::try_from(num_sources).map_err(|_| HwInfoError::Aborted)?,
                gsi_base,
            });
            gsi_base += num_sources;
        }

        let mut cursor = root;
        let spec = SearchSpec::Compatible(compat::APLIC_COMPATIBLE);
        while let Some(node) = walk::find_next(fdt, root, cursor, spec)? {
            cursor = node;
            let contexts = s_mode_contexts(fdt, node)?;
            // An MSI-mode APLIC has no direct hart wiring; it is S-mode if
            // its msi-parent points at an S-mode IMSIC.
            if contexts.is_empty() && !msi_parent_is_s_mode(fdt, node)? {
                continue;
            }
            let geometry = walk::parent_cell_geometry(fdt, node)?;
            let (base_address, size) = walk::read_reg_required(fdt, node, geometry, 0)?;
            let num_sources = fdt
                .property(node, "riscv,num-sources")
                .and_then(|p| p.as_u32())
                .ok_or(HwInfoError::Aborted)?;
            let id = u8::try_from(aplics.len()).map_err(|_| HwInfoError::Aborted)?;
            patch_contexts(&mut harts, &contexts, id);
            aplics.push(AplicInfo {
                aplic_id: id,
                base_address,
                size: u32::try_from(size).map_err(|_| HwInfoError::Aborted)?,
                num_idcs: u16::try_from(contexts.len()).map_err(|_| HwInfoError::Aborted)?,
                num_sources: u16::try_from(num_sources).map_err(|_| HwInfoError::Aborted)?,
                gsi_base,
            });
            gsi_base += num_sources;
        }

        let imsic = parse_imsic(fdt, &mut harts)?;

        for hart in &harts {
            sink.add(HwObject::Rintc(&hart.info))?;
        }
        if let Some(imsic) = &imsic {
            sink.add(HwObject::Imsic(imsic))?;
        }
        for plic in &plics {
            sink.add(HwObject::Plic(plic))?;
        }
        for aplic in &aplics {
            sink.add(HwObject::Aplic(aplic))?;
        }
        Ok(())
    }
}

/// Phase 1: one RINTC record per `cpu` node, in tree order.
fn hart_table(fdt: &Fdt<'_>, cpus: NodeOffset) -> Result<Vec<HartEntry>> {
    let address_cells = walk::address_cells(fdt, cpus);
    if !(1..=2).contains(&address_cells) {
        return Err(HwInfoError::Unsupported);
    }

    let mut harts = Vec::new();
    let mut cursor = cpus;
    while let Some(cpu) = walk::find_next(fdt, cpus, cursor, SearchSpec::Name("cpu"))? {
        cursor = cpu;
        let reg = fdt.property(cpu, "reg").ok_or(HwInfoError::Aborted)?;
        let hart_id = reg
            .cells_as_u64(0, address_cells as usize)
            .ok_or(HwInfoError::Aborted)?;
        let uid = super::hart_uid(fdt.node_name(cpu).ok_or(HwInfoError::Aborted)?)?;
        let flags = if walk::status_enabled(fdt, cpu) {
            RINTC_FLAG_ENABLED
        } else {
            0
        };
        let intc_phandle = walk::find_first(
            fdt,
            cpu,
            SearchSpec::Compatible(compat::RISCV_CPU_INTC_COMPATIBLE),
        )?
        .and_then(|n| fdt.property(n, "phandle").and_then(|p| p.as_u32()));

        harts.push(HartEntry {
            intc_phandle,
            info: RintcInfo {
                flags,
                hart_id,
                acpi_processor_uid: uid,
                ext_intc_id: 0,
                imsic_base_address: 0,
                imsic_size: 0,
            },
        });
    }
    Ok(harts)
}

/// Supervisor-mode contexts of a controller's `interrupts-extended`
/// property: `(context index, cpu-intc phandle)` pairs.
fn s_mode_contexts(fdt: &Fdt<'_>, node: NodeOffset) -> Result<Vec<(u32, u32)>> {
    let Some(ext) = fdt.property(node, "interrupts-extended") else {
        return Ok(Vec::new());
    };
    if ext.cell_count() == 0 || ext.cell_count() % 2 != 0 {
        return Err(HwInfoError::Aborted);
    }
    let mut out = Vec::new();
    for i in 0..ext.cell_count() / 2 {
        let phandle = ext.cell(2 * i).ok_or(HwInfoError::Aborted)?;
        let irq = ext.cell(2 * i + 1).ok_or(HwInfoError::Aborted)?;
        if irq == S_MODE_IRQ {
            out.push((i as u32, phandle));
        }
    }
    Ok(out)
}

/// Writes `(controller_id << 24) | context_id` into each referenced hart.
fn patch_contexts(harts: &mut [HartEntry], contexts: &[(u32, u32)], controller_id: u8) {
    for &(context_id, phandle) in contexts {
        let ext_intc_id = (u32::from(controller_id) << 24) | context_id;
        for hart in harts.iter_mut() {
            if hart.intc_phandle == Some(phandle) {
                hart.info.ext_intc_id = ext_intc_id;
            }
        }
    }
}

fn msi_parent_is_s_mode(fdt: &Fdt<'_>, node: NodeOffset) -> Result<bool> {
    let Some(phandle) = fdt.property(node, "msi-parent").and_then(|p| p.cell(0)) else {
        return Ok(false);
    };
    let Some(imsic) = fdt.node_with_phandle(phandle)? else {
        return Ok(false);
    };
    Ok(walk::node_is_compatible(fdt, imsic, compat::IMSIC_COMPATIBLE)
        && !s_mode_contexts(fdt, imsic)?.is_empty())
}

/// Smallest bit count addressing `n` values.
fn ceil_log2(n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as u8
    }
}

/// Finds the S-mode IMSIC, maps successive interrupt-file chunks of its
/// `reg` regions onto the harts its `interrupts-extended` references, and
/// returns its geometry record.
fn parse_imsic(fdt: &Fdt<'_>, harts: &mut [HartEntry]) -> Result<Option<ImsicInfo>> {
    let root = fdt.root();
    let mut cursor = root;
    let spec = SearchSpec::Compatible(compat::IMSIC_COMPATIBLE);
    while let Some(node) = walk::find_next(fdt, root, cursor, spec)? {
        cursor = node;
        let contexts = s_mode_contexts(fdt, node)?;
        if contexts.is_empty() {
            // Machine-mode IMSIC.
            continue;
        }

        let read_u32 = |name: &str| fdt.property(node, name).and_then(|p| p.as_u32());
        let num_ids = read_u32("riscv,num-ids").ok_or(HwInfoError::Aborted)?;
        let num_ids = u16::try_from(num_ids).map_err(|_| HwInfoError::Aborted)?;
        let num_guest_ids = match read_u32("riscv,num-guest-ids") {
            Some(v) => u16::try_from(v).map_err(|_| HwInfoError::Aborted)?,
            None => num_ids,
        };
        let guest_index_bits = read_u32("riscv,guest-index-bits").unwrap_or(0) as u8;
        let hart_index_bits = match read_u32("riscv,hart-index-bits") {
            Some(v) => v as u8,
            None => ceil_log2(contexts.len()),
        };
        let group_index_bits = read_u32("riscv,group-index-bits").unwrap_or(0) as u8;
        let group_index_shift = read_u32("riscv,group-index-shift").unwrap_or(24) as u8;

        let chunk = IMSIC_MMIO_PAGE << guest_index_bits;
        let chunk_size = u32::try_from(chunk).map_err(|_| HwInfoError::Aborted)?;

        let geometry = walk::parent_cell_geometry(fdt, node)?;
        let reg = fdt.property(node, "reg").ok_or(HwInfoError::Aborted)?;
        let stride = (geometry.address_cells + geometry.size_cells) as usize;
        let regions = reg.cell_count() / stride;

        let mut slot = 0;
        'regions: for region in 0..regions {
            let (base, size) = walk::read_reg_required(fdt, node, geometry, region)?;
            let mut offset = 0;
            while offset + chunk <= size {
                let Some(&(_, phandle)) = contexts.get(slot) else {
                    break 'regions;
                };
                for hart in harts.iter_mut() {
                    if hart.intc_phandle == Some(phandle) {
                        hart.info.imsic_base_address = base + offset;
                        hart.info.imsic_size = chunk_size;
                    }
                }
                slot += 1;
                offset += chunk;
            }
        }

        return Ok(Some(ImsicInfo {
            num_ids,
            num_guest_ids,
            guest_index_bits,
            hart_index_bits,
            group_index_bits,
            group_index_shift,
        }));
    }
    Ok(None)
}
