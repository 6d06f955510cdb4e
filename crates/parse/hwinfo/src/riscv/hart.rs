//! Per-hart capability records: ISA string, cache-block operations, MMU
//! mode, and the shared hart timer.

use alloc::vec::Vec;

use quartz_fdt::{Fdt, FdtProperty, NodeOffset};

use crate::error::{HwInfoError, Result};
use crate::object::HwObject;
use crate::object::riscv::{CmoInfo, IsaStringInfo, MmuInfo, MmuType, RiscVTimerInfo};
use crate::sink::HwInfoSink;
use crate::walk::{self, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// Emits ISA-string, cache-block-operation and MMU records per hart, plus
/// one timer record when `/cpus` carries `timebase-frequency`.
pub struct HartInfoParser;

impl HwInfoParser for HartInfoParser {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        _context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let cpus = walk::find_first(fdt, branch, SearchSpec::Name("cpus"))?
            .ok_or(HwInfoError::NotFound)?;

        let timer = fdt
            .property(cpus, "timebase-frequency")
            .map(|p| {
                p.as_u64()
                    .or_else(|| p.as_u32().map(u64::from))
                    .ok_or(HwInfoError::Aborted)
            })
            .transpose()?;

        struct HartRecords<'a> {
            isa: IsaStringInfo<'a>,
            cmo: Option<CmoInfo>,
            mmu: Option<MmuInfo>,
        }

        let mut harts = Vec::new();
        let mut cursor = cpus;
        while let Some(cpu) = walk::find_next(fdt, cpus, cursor, SearchSpec::Name("cpu"))? {
            cursor = cpu;
            let uid = super::hart_uid(fdt.node_name(cpu).ok_or(HwInfoError::Aborted)?)?;

            // The ISA string is the one mandatory hart capability.
            let isa = fdt
                .property(cpu, "riscv,isa")
                .and_then(|p| p.as_str())
                .ok_or(HwInfoError::Aborted)?;

            let cbom = fdt.property(cpu, "riscv,cbom-block-size");
            let cbop = fdt.property(cpu, "riscv,cbop-block-size");
            let cboz = fdt.property(cpu, "riscv,cboz-block-size");
            let cmo = if cbom.is_some() || cbop.is_some() || cboz.is_some() {
                Some(CmoInfo {
                    acpi_processor_uid: uid,
                    cbom_block_size: log2_block_size(cbom)?,
                    cbop_block_size: log2_block_size(cbop)?,
                    cboz_block_size: log2_block_size(cboz)?,
                })
            } else {
                None
            };

            let mmu = fdt
                .property(cpu, "mmu-type")
                .and_then(|p| p.as_str())
                .and_then(mmu_type)
                .map(|mmu_type| MmuInfo {
                    acpi_processor_uid: uid,
                    mmu_type,
                });

            harts.push(HartRecords {
                isa: IsaStringInfo {
                    acpi_processor_uid: uid,
                    isa,
                },
                cmo,
                mmu,
            });
        }
        if harts.is_empty() {
            return Err(HwInfoError::NotFound);
        }

        for hart in &harts {
            sink.add(HwObject::IsaString(&hart.isa))?;
            if let Some(cmo) = &hart.cmo {
                sink.add(HwObject::Cmo(cmo))?;
            }
            if let Some(mmu) = &hart.mmu {
                sink.add(HwObject::Mmu(mmu))?;
            }
        }
        if let Some(time_base_frequency) = timer {
            sink.add(HwObject::RiscVTimer(&RiscVTimerInfo {
                time_base_frequency,
            }))?;
        }
        Ok(())
    }
}

/// log2 of a cache-block size property; 0 when the property is absent.
fn log2_block_size(prop: Option<FdtProperty<'_>>) -> Result<u8> {
    let Some(p) = prop else {
        return Ok(0);
    };
    let size = p.as_u32().ok_or(HwInfoError::Aborted)?;
    if !size.is_power_of_two() {
        return Err(HwInfoError::Aborted);
    }
    Ok(size.trailing_zeros() as u8)
}

/// Maps a `mmu-type` string; unknown modes are ignored rather than fatal.
fn mmu_type(value: &str) -> Option<MmuType> {
    match value {
        "riscv,sv39" => Some(MmuType::Sv39),
        "riscv,sv48" => Some(MmuType::Sv48),
        "riscv,sv57" => Some(MmuType::Sv57),
        _ => None,
    }
}
