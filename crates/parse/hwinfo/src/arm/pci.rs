//! PCI host bridge (ECAM) configuration space discovery.

use alloc::vec::Vec;

use quartz_fdt::{Fdt, NodeOffset};

use crate::compat;
use crate::decode::{ArmGicDecoder, InterruptDecoder};
use crate::error::{HwInfoError, Result};
use crate::object::HwObject;
use crate::object::arm::{
    PciAddressMapEntry, PciConfigSpaceInfo, PciInterruptMapEntry, PciSpaceCode,
};
use crate::sink::HwInfoSink;
use crate::walk::{self, AddressCellPolicy, ArmCellPolicy, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// Cells per PCI child address: `(hi, mid, lo)`.
const PCI_ADDRESS_CELLS: usize = 3;

/// Emits one [`PciConfigSpaceInfo`] plus its referenced address-map and
/// interrupt-map arrays per ECAM host bridge in the branch.
///
/// Segment numbering uses `linux,pci-domain` when every bridge carries it,
/// or the shared counter when none does; a mix is a content violation.
pub struct PciConfigSpaceParser;

impl HwInfoParser for PciConfigSpaceParser {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let spec = SearchSpec::Compatible(compat::PCI_HOST_COMPATIBLE);
        let mut bridges = Vec::new();
        let mut cursor = branch;
        while let Some(node) = walk::find_next(fdt, branch, cursor, spec)? {
            bridges.push(node);
            cursor = node;
        }
        if bridges.is_empty() {
            return Err(HwInfoError::NotFound);
        }

        let with_domain = bridges
            .iter()
            .filter(|&&n| walk::has_property(fdt, n, "linux,pci-domain"))
            .count();
        if with_domain != 0 && with_domain != bridges.len() {
            return Err(HwInfoError::Aborted);
        }

        // Parse every bridge before the first submission.
        let mut parsed = Vec::with_capacity(bridges.len());
        for &node in &bridges {
            parsed.push(parse_host_bridge(fdt, node, context)?);
        }

        for bridge in &parsed {
            let address_map_token = sink.add(HwObject::PciAddressMap(&bridge.address_map))?;
            let interrupt_map_token = match &bridge.interrupt_map {
                Some(entries) => Some(sink.add(HwObject::PciInterruptMap(entries))?),
                None => None,
            };
            sink.add(HwObject::PciConfigSpace(&PciConfigSpaceInfo {
                base_address: bridge.base_address,
                segment_group_number: bridge.segment_group_number,
                start_bus_number: bridge.start_bus_number,
                end_bus_number: bridge.end_bus_number,
                address_map_token,
                interrupt_map_token,
            }))?;
        }
        Ok(())
    }
}

struct HostBridge {
    base_address: u64,
    segment_group_number: u16,
    start_bus_number: u8,
    end_bus_number: u8,
    address_map: Vec<PciAddressMapEntry>,
    interrupt_map: Option<Vec<PciInterruptMapEntry>>,
}

fn parse_host_bridge(
    fdt: &Fdt<'_>,
    node: NodeOffset,
    context: &mut ParserContext,
) -> Result<HostBridge> {
    let segment_group_number = match fdt.property(node, "linux,pci-domain").and_then(|p| p.as_u32())
    {
        Some(domain) => u16::try_from(domain).map_err(|_| HwInfoError::Aborted)?,
        None => context.allocate_pci_segment(),
    };

    let (start_bus_number, end_bus_number) = match fdt.property(node, "bus-range") {
        Some(range) => {
            let start = range.cell(0).ok_or(HwInfoError::Aborted)?;
            let end = range.cell(1).ok_or(HwInfoError::Aborted)?;
            (
                u8::try_from(start).map_err(|_| HwInfoError::Aborted)?,
                u8::try_from(end).map_err(|_| HwInfoError::Aborted)?,
            )
        }
        None => (0, 255),
    };

    let geometry = walk::parent_cell_geometry(fdt, node)?;
    let (base_address, _) = walk::read_reg_required(fdt, node, geometry, 0)?;

    Ok(HostBridge {
        base_address,
        segment_group_number,
        start_bus_number,
        end_bus_number,
        address_map: parse_ranges(fdt, node)?,
        interrupt_map: parse_interrupt_map(fdt, node)?,
    })
}

/// Decodes the mandatory `ranges` property into address-map entries.
///
/// Each entry is 3 PCI child cells, the parent's address cells, then the
/// bridge's own size cells.
fn parse_ranges(fdt: &Fdt<'_>, node: NodeOffset) -> Result<Vec<PciAddressMapEntry>> {
    let geometry = walk::parent_cell_geometry(fdt, node)?;
    let size_cells = walk::size_cells(fdt, node);
    if !(1..=2).contains(&geometry.address_cells) || !(1..=2).contains(&size_cells) {
        return Err(HwInfoError::Unsupported);
    }
    let parent_cells = geometry.address_cells as usize;
    let size_cells = size_cells as usize;

    let ranges = fdt.property(node, "ranges").ok_or(HwInfoError::Aborted)?;
    let stride = PCI_ADDRESS_CELLS + parent_cells + size_cells;
    if ranges.cell_count() == 0 || ranges.cell_count() % stride != 0 {
        return Err(HwInfoError::Aborted);
    }

    let mut out = Vec::with_capacity(ranges.cell_count() / stride);
    for i in 0..ranges.cell_count() / stride {
        let base = i * stride;
        let hi = ranges.cell(base).ok_or(HwInfoError::Aborted)?;
        let space_code = match (hi >> 24) & 3 {
            0 => PciSpaceCode::Config,
            1 => PciSpaceCode::Io,
            2 => PciSpaceCode::Memory32,
            _ => PciSpaceCode::Memory64,
        };
        out.push(PciAddressMapEntry {
            space_code,
            pci_address: ranges.cells_as_u64(base + 1, 2).ok_or(HwInfoError::Aborted)?,
            cpu_address: ranges
                .cells_as_u64(base + PCI_ADDRESS_CELLS, parent_cells)
                .ok_or(HwInfoError::Aborted)?,
            address_size: ranges
                .cells_as_u64(base + PCI_ADDRESS_CELLS + parent_cells, size_cells)
                .ok_or(HwInfoError::Aborted)?,
        });
    }
    Ok(out)
}

/// Decodes the optional `interrupt-map` into legacy IRQ routes.
///
/// Entry stride varies with each referenced controller's cell geometry, so
/// entries are consumed sequentially. The device-tree INTA=1 pin numbering
/// is shifted to the ACPI INTA=0 convention.
fn parse_interrupt_map(
    fdt: &Fdt<'_>,
    node: NodeOffset,
) -> Result<Option<Vec<PciInterruptMapEntry>>> {
    let Some(map) = fdt.property(node, "interrupt-map") else {
        return Ok(None);
    };

    let pin_cells = fdt
        .property(node, "#interrupt-cells")
        .and_then(|p| p.as_u32())
        .ok_or(HwInfoError::Aborted)?;
    if pin_cells != 1 {
        return Err(HwInfoError::Unsupported);
    }

    let (address_mask, pin_mask) = match fdt.property(node, "interrupt-map-mask") {
        Some(mask) => (
            mask.cell(0).ok_or(HwInfoError::Aborted)?,
            mask.cell(PCI_ADDRESS_CELLS).ok_or(HwInfoError::Aborted)?,
        ),
        None => (u32::MAX, u32::MAX),
    };

    let mut out = Vec::new();
    let mut index = 0;
    while index < map.cell_count() {
        let hi = map.cell(index).ok_or(HwInfoError::Aborted)? & address_mask;
        let pin = map
            .cell(index + PCI_ADDRESS_CELLS)
            .ok_or(HwInfoError::Aborted)?
            & pin_mask;
        let phandle = map
            .cell(index + PCI_ADDRESS_CELLS + 1)
            .ok_or(HwInfoError::Aborted)?;
        let intc = fdt
            .node_with_phandle(phandle)?
            .ok_or(HwInfoError::Aborted)?;
        let intc_address_cells = ArmCellPolicy.intc_address_cells(fdt, intc) as usize;
        let intc_interrupt_cells = walk::interrupt_cells(fdt, intc)? as usize;

        let entry = walk::cell_run(
            &map,
            index + PCI_ADDRESS_CELLS + 2 + intc_address_cells,
            intc_interrupt_cells,
        )?;
        let gsiv = ArmGicDecoder.interrupt_id(&entry)?;
        let flags = ArmGicDecoder.interrupt_flags(&entry)?;

        // INTA is 1 in the tree, 0 in the output.
        let pin = pin.checked_sub(1).ok_or(HwInfoError::Aborted)?;
        out.push(PciInterruptMapEntry {
            pci_bus: ((hi >> 16) & 0xFF) as u8,
            pci_device: ((hi >> 11) & 0x1F) as u8,
            pci_interrupt: u8::try_from(pin).map_err(|_| HwInfoError::Aborted)?,
            interrupt_gsiv: gsiv,
            interrupt_flags: flags.bits(),
        });

        index += PCI_ADDRESS_CELLS + 2 + intc_address_cells + intc_interrupt_cells;
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Recorded, RecordingSink};
    use quartz_dtb_builder::DtbBuilder;

    fn run(dtb: &[u8]) -> Result<RecordingSink> {
        let fdt = Fdt::parse(dtb).unwrap();
        let mut sink = RecordingSink::new();
        let mut context = ParserContext::new();
        PciConfigSpaceParser.parse(&fdt, fdt.root(), &mut context, &mut sink)?;
        Ok(sink)
    }

    fn add_gic(b: &mut DtbBuilder) {
        b.begin_node("intc");
        b.prop_str("compatible", "arm,gic-v3");
        b.prop_empty("interrupt-controller");
        b.prop_u32("#interrupt-cells", 3);
        b.prop_u32("#address-cells", 0);
        b.prop_u32("phandle", 1);
        b.end_node();
    }

    fn add_bridge(b: &mut DtbBuilder, name: &str, ecam: u32, domain: Option<u32>) {
        b.begin_node(name);
        b.prop_str("compatible", "pci-host-ecam-generic");
        b.prop_u32("#address-cells", 3);
        b.prop_u32("#size-cells", 2);
        b.prop_u32("#interrupt-cells", 1);
        if let Some(d) = domain {
            b.prop_u32("linux,pci-domain", d);
        }
        b.prop_cells("bus-range", &[0, 15]);
        // Root defaults: 2 address cells, 1 size cell.
        b.prop_cells("reg", &[0, ecam, 0x100_0000]);
        // One 32-bit memory range: pci 0x1000_0000 -> cpu 0x1000_0000.
        b.prop_cells(
            "ranges",
            &[0x0200_0000, 0, 0x1000_0000, 0, 0x1000_0000, 0, 0x2eff_0000],
        );
        b.end_node();
    }

    #[test]
    fn ranges_and_bus_range_decode() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        add_gic(&mut b);
        add_bridge(&mut b, "pcie@40000000", 0x4000_0000, None);
        b.end_node();

        let sink = run(&b.finish()).unwrap();
        let [
            Recorded::PciAddressMap(map),
            Recorded::PciConfigSpace(info),
        ] = sink.objects.as_slice()
        else {
            panic!("unexpected object sequence: {:?}", sink.objects);
        };
        assert_eq!(info.base_address, 0x4000_0000);
        assert_eq!(info.segment_group_number, 0);
        assert_eq!(info.start_bus_number, 0);
        assert_eq!(info.end_bus_number, 15);
        assert_eq!(info.interrupt_map_token, None);
        assert_eq!(
            map.as_slice(),
            &[PciAddressMapEntry {
                space_code: PciSpaceCode::Memory32,
                pci_address: 0x1000_0000,
                cpu_address: 0x1000_0000,
                address_size: 0x2eff_0000,
            }]
        );
    }

    #[test]
    fn legacy_pin_numbering_shifts_to_acpi() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        add_gic(&mut b);
        b.begin_node("pcie@40000000");
        b.prop_str("compatible", "pci-host-ecam-generic");
        b.prop_u32("#address-cells", 3);
        b.prop_u32("#size-cells", 2);
        b.prop_u32("#interrupt-cells", 1);
        b.prop_cells("reg", &[0, 0x4000_0000, 0x100_0000]);
        b.prop_cells(
            "ranges",
            &[0x0200_0000, 0, 0x1000_0000, 0, 0x1000_0000, 0, 0x2eff_0000],
        );
        b.prop_cells("interrupt-map-mask", &[0xf800, 0, 0, 7]);
        // Device 2 INTA and INTB: pci-addr(3), pin, phandle, gic(3).
        b.prop_cells(
            "interrupt-map",
            &[
                0x1000, 0, 0, 1, 1, 0, 4, 4, // INTA -> SPI 4
                0x1000, 0, 0, 2, 1, 0, 5, 4, // INTB -> SPI 5
            ],
        );
        b.end_node();
        b.end_node();

        let sink = run(&b.finish()).unwrap();
        let Some(Recorded::PciInterruptMap(map)) = sink
            .objects
            .iter()
            .find(|o| matches!(o, Recorded::PciInterruptMap(_)))
        else {
            panic!("expected an interrupt map");
        };
        assert_eq!(
            map.as_slice(),
            &[
                PciInterruptMapEntry {
                    pci_bus: 0,
                    pci_device: 2,
                    pci_interrupt: 0,
                    interrupt_gsiv: 4 + 32,
                    interrupt_flags: 0,
                },
                PciInterruptMapEntry {
                    pci_bus: 0,
                    pci_device: 2,
                    pci_interrupt: 1,
                    interrupt_gsiv: 5 + 32,
                    interrupt_flags: 0,
                },
            ]
        );
        let Some(Recorded::PciConfigSpace(info)) = sink
            .objects
            .iter()
            .find(|o| matches!(o, Recorded::PciConfigSpace(_)))
        else {
            panic!("expected a config space object");
        };
        assert!(info.interrupt_map_token.is_some());
    }

    #[test]
    fn segments_count_up_when_no_domain_property() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        add_gic(&mut b);
        add_bridge(&mut b, "pcie@40000000", 0x4000_0000, None);
        add_bridge(&mut b, "pcie@50000000", 0x5000_0000, None);
        add_bridge(&mut b, "pcie@60000000", 0x6000_0000, None);
        b.end_node();

        let sink = run(&b.finish()).unwrap();
        let segments: alloc::vec::Vec<u16> = sink
            .objects
            .iter()
            .filter_map(|o| match o {
                Recorded::PciConfigSpace(i) => Some(i.segment_group_number),
                _ => None,
            })
            .collect();
        assert_eq!(segments, &[0, 1, 2]);
    }

    #[test]
    fn explicit_domains_are_honored() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        add_gic(&mut b);
        add_bridge(&mut b, "pcie@40000000", 0x4000_0000, Some(4));
        add_bridge(&mut b, "pcie@50000000", 0x5000_0000, Some(7));
        b.end_node();

        let sink = run(&b.finish()).unwrap();
        let segments: alloc::vec::Vec<u16> = sink
            .objects
            .iter()
            .filter_map(|o| match o {
                Recorded::PciConfigSpace(i) => Some(i.segment_group_number),
                _ => None,
            })
            .collect();
        assert_eq!(segments, &[4, 7]);
    }

    #[test]
    fn mixed_domain_numbering_aborts() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        add_gic(&mut b);
        add_bridge(&mut b, "pcie@40000000", 0x4000_0000, Some(0));
        add_bridge(&mut b, "pcie@50000000", 0x5000_0000, None);
        add_bridge(&mut b, "pcie@60000000", 0x6000_0000, None);
        b.end_node();
        assert_eq!(run(&b.finish()), Err(HwInfoError::Aborted));
    }

    #[test]
    fn no_host_bridge_is_not_found() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.end_node();
        assert_eq!(run(&b.finish()), Err(HwInfoError::NotFound));
    }
}
