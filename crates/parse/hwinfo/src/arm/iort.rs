//! IORT topology discovery: PCI root complexes and SMMUv3 instances,
//! linked through ID-mapping arrays.

use alloc::vec::Vec;

use quartz_fdt::{Fdt, FdtProperty, NodeOffset};

use crate::compat;
use crate::decode::{ArmGicDecoder, InterruptDecoder};
use crate::error::{HwInfoError, Result};
use crate::object::HwObject;
use crate::object::arm::{IdMappingEntry, RootComplexInfo, SmmuV3Info, SmmuV3Model};
use crate::sink::HwInfoSink;
use crate::walk::{self, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// Cells per `iommu-map`/`msi-map` entry:
/// `(input-base, phandle, output-base, num-ids)`.
const ID_MAP_STRIDE: usize = 4;

/// DMA address width reported when a root complex has no `dma-ranges`.
const DEFAULT_DMA_ADDRESS_BITS: u8 = 32;

/// SMMUv3 wired-interrupt names, in output slot order.
const SMMU_IRQ_NAMES: [&str; 4] = ["eventq", "priq", "gerror", "cmdq-sync"];

/// Decodes a stride-4 ID map property into mapping entries.
fn id_mappings(prop: &FdtProperty<'_>) -> Result<Vec<IdMappingEntry>> {
    if prop.cell_count() == 0 || prop.cell_count() % ID_MAP_STRIDE != 0 {
        return Err(HwInfoError::Aborted);
    }
    let mut out = Vec::with_capacity(prop.cell_count() / ID_MAP_STRIDE);
    for i in 0..prop.cell_count() / ID_MAP_STRIDE {
        let base = i * ID_MAP_STRIDE;
        out.push(IdMappingEntry {
            input_base: prop.cell(base).ok_or(HwInfoError::Aborted)?,
            output_reference: prop.cell(base + 1).ok_or(HwInfoError::Aborted)?,
            output_base: prop.cell(base + 2).ok_or(HwInfoError::Aborted)?,
            num_ids: prop.cell(base + 3).ok_or(HwInfoError::Aborted)?,
        });
    }
    Ok(out)
}

// ---- Root complex -----------------------------------------------------------

/// Emits one [`RootComplexInfo`] per host bridge carrying an `iommu-map`.
pub struct RootComplexParser;

impl HwInfoParser for RootComplexParser {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let spec = SearchSpec::Compatible(compat::PCI_HOST_COMPATIBLE);
        let mut cursor = branch;
        let mut found = false;
        while let Some(node) = walk::find_next(fdt, branch, cursor, spec)? {
            cursor = node;
            if !walk::has_property(fdt, node, "iommu-map") {
                continue;
            }
            found = true;
            parse_root_complex(fdt, node, context, sink)?;
        }
        if found { Ok(()) } else { Err(HwInfoError::NotFound) }
    }
}

fn parse_root_complex(
    fdt: &Fdt<'_>,
    node: NodeOffset,
    context: &mut ParserContext,
    sink: &mut dyn HwInfoSink,
) -> Result<()> {
    let iommu_map = fdt
        .property(node, "iommu-map")
        .ok_or(HwInfoError::Aborted)?;
    let mappings = id_mappings(&iommu_map)?;

    let info = RootComplexInfo {
        cache_coherent: walk::has_property(fdt, node, "dma-coherent"),
        ats_supported: walk::has_property(fdt, node, "ats-supported"),
        pci_segment_number: fdt
            .property(node, "linux,pci-domain")
            .and_then(|p| p.as_u32())
            .unwrap_or(0),
        memory_address_size_limit: dma_address_limit(fdt, node)?,
        id_mapping_count: mappings.len() as u32,
        id_mapping_token: sink.add(HwObject::IdMappingArray(&mappings))?,
        iort_node_id: context.allocate_iort_node_id(),
    };
    sink.add(HwObject::RootComplex(&info))?;
    Ok(())
}

/// Bit width of the largest DMA-reachable address, from `dma-ranges`.
///
/// Entries follow the PCI `ranges` layout; the limit is the smallest power
/// of two covering the highest `address + size` on the PCI side.
fn dma_address_limit(fdt: &Fdt<'_>, node: NodeOffset) -> Result<u8> {
    let Some(ranges) = fdt.property(node, "dma-ranges") else {
        return Ok(DEFAULT_DMA_ADDRESS_BITS);
    };
    let geometry = walk::parent_cell_geometry(fdt, node)?;
    let size_cells = walk::size_cells(fdt, node);
    if !(1..=2).contains(&geometry.address_cells) || !(1..=2).contains(&size_cells) {
        return Err(HwInfoError::Unsupported);
    }
    let parent_cells = geometry.address_cells as usize;
    let size_cells = size_cells as usize;
    let stride = 3 + parent_cells + size_cells;
    if ranges.cell_count() == 0 || ranges.cell_count() % stride != 0 {
        return Err(HwInfoError::Aborted);
    }

    let mut end_max = 0u64;
    for i in 0..ranges.cell_count() / stride {
        let base = i * stride;
        let address = ranges.cells_as_u64(base + 1, 2).ok_or(HwInfoError::Aborted)?;
        let size = ranges
            .cells_as_u64(base + 3 + parent_cells, size_cells)
            .ok_or(HwInfoError::Aborted)?;
        end_max = end_max.max(address.saturating_add(size));
    }
    if end_max <= 1 {
        return Ok(DEFAULT_DMA_ADDRESS_BITS);
    }
    Ok((u64::BITS - (end_max - 1).leading_zeros()) as u8)
}

// ---- SMMUv3 -----------------------------------------------------------------

/// Emits one [`SmmuV3Info`] per SMMUv3 node, with a synthesized
/// stream-ID-to-device-ID mapping array.
pub struct SmmuV3Parser;

impl HwInfoParser for SmmuV3Parser {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let spec = SearchSpec::Compatible(compat::SMMU_V3_COMPATIBLE);
        let mut cursor = branch;
        let mut found = false;
        while let Some(node) = walk::find_next(fdt, branch, cursor, spec)? {
            cursor = node;
            found = true;
            parse_smmu(fdt, branch, node, context, sink)?;
        }
        if found { Ok(()) } else { Err(HwInfoError::NotFound) }
    }
}

fn parse_smmu(
    fdt: &Fdt<'_>,
    branch: NodeOffset,
    smmu: NodeOffset,
    context: &mut ParserContext,
    sink: &mut dyn HwInfoSink,
) -> Result<()> {
    let geometry = walk::parent_cell_geometry(fdt, smmu)?;
    let (base_address, _) = walk::read_reg_required(fdt, smmu, geometry, 0)?;

    let (irqs, all_resolved) = named_interrupts(fdt, smmu)?;

    let model = if walk::has_property(fdt, smmu, "hisilicon,broken-prefetch-cmd") {
        SmmuV3Model::HiSiliconHi161x
    } else if walk::has_property(fdt, smmu, "cavium,cn9900-broken-page1-regspace") {
        SmmuV3Model::CaviumCn99xx
    } else {
        SmmuV3Model::Generic
    };

    let phandle = fdt.property(smmu, "phandle").and_then(|p| p.as_u32());
    let mut mappings = match phandle {
        Some(phandle) => stream_to_device_mappings(fdt, branch, phandle)?,
        None => Vec::new(),
    };

    // Wired interrupts missing means the SMMU signals through MSIs; its
    // own doorbell comes from msi-parent.
    let mut device_id_mapping_index = None;
    if !all_resolved {
        let msi_parent = fdt
            .property(smmu, "msi-parent")
            .ok_or(HwInfoError::Aborted)?;
        let parent_phandle = msi_parent.cell(0).ok_or(HwInfoError::Aborted)?;
        let doorbell = msi_parent.cell(1).unwrap_or(0);
        device_id_mapping_index = Some(mappings.len() as u32);
        mappings.push(IdMappingEntry {
            input_base: doorbell,
            num_ids: 1,
            output_base: doorbell,
            output_reference: parent_phandle,
        });
    }

    let id_mapping_token = if mappings.is_empty() {
        None
    } else {
        Some(sink.add(HwObject::IdMappingArray(&mappings))?)
    };
    sink.add(HwObject::SmmuV3(&SmmuV3Info {
        base_address,
        event_interrupt: irqs[0],
        pri_interrupt: irqs[1],
        gerr_interrupt: irqs[2],
        sync_interrupt: irqs[3],
        model,
        id_mapping_count: mappings.len() as u32,
        id_mapping_token,
        device_id_mapping_index,
        iort_node_id: context.allocate_iort_node_id(),
    }))?;
    Ok(())
}

/// Resolves the four wired SMMU interrupts by name. The second result is
/// false when any name is missing.
fn named_interrupts(fdt: &Fdt<'_>, smmu: NodeOffset) -> Result<([u32; 4], bool)> {
    let mut irqs = [0u32; 4];
    let (Some(names), Some(interrupts)) = (
        fdt.property(smmu, "interrupt-names"),
        fdt.property(smmu, "interrupts"),
    ) else {
        return Ok((irqs, false));
    };

    let intc = walk::intc_parent_node(fdt, smmu)?.ok_or(HwInfoError::Aborted)?;
    let cells = walk::interrupt_cells(fdt, intc)? as usize;

    let mut all_resolved = true;
    for (slot, wanted) in SMMU_IRQ_NAMES.iter().enumerate() {
        match names.as_str_list().position(|name| name == *wanted) {
            Some(position) => {
                let entry = walk::cell_run(&interrupts, position * cells, cells)?;
                irqs[slot] = ArmGicDecoder.interrupt_id(&entry)?;
            }
            None => all_resolved = false,
        }
    }
    Ok((irqs, all_resolved))
}

/// Intersects every `iommu-map` entry targeting the SMMU with the owning
/// bridge's `msi-map` entries, producing stream-ID to device-ID ranges
/// over the overlapping requester IDs.
fn stream_to_device_mappings(
    fdt: &Fdt<'_>,
    branch: NodeOffset,
    smmu_phandle: u32,
) -> Result<Vec<IdMappingEntry>> {
    let mut out = Vec::new();
    let spec = SearchSpec::Compatible(compat::PCI_HOST_COMPATIBLE);
    let mut cursor = branch;
    while let Some(bridge) = walk::find_next(fdt, branch, cursor, spec)? {
        cursor = bridge;
        let (Some(iommu_map), Some(msi_map)) = (
            fdt.property(bridge, "iommu-map"),
            fdt.property(bridge, "msi-map"),
        ) else {
            continue;
        };
        let iommu_entries = id_mappings(&iommu_map)?;
        let msi_entries = id_mappings(&msi_map)?;

        for iommu in iommu_entries
            .iter()
            .filter(|e| e.output_reference == smmu_phandle)
        {
            // A range whose end does not fit in the 32-bit ID space is
            // malformed content, not a valid mapping.
            let iommu_end = iommu
                .input_base
                .checked_add(iommu.num_ids)
                .ok_or(HwInfoError::Aborted)?;
            for msi in &msi_entries {
                let msi_end = msi
                    .input_base
                    .checked_add(msi.num_ids)
                    .ok_or(HwInfoError::Aborted)?;
                let lo = iommu.input_base.max(msi.input_base);
                let hi = iommu_end.min(msi_end);
                if lo >= hi {
                    continue;
                }
                out.push(IdMappingEntry {
                    input_base: iommu
                        .output_base
                        .checked_add(lo - iommu.input_base)
                        .ok_or(HwInfoError::Aborted)?,
                    num_ids: hi - lo,
                    output_base: msi
                        .output_base
                        .checked_add(lo - msi.input_base)
                        .ok_or(HwInfoError::Aborted)?,
                    output_reference: msi.output_reference,
                });
            }
        }
    }
    Ok(out)
}
