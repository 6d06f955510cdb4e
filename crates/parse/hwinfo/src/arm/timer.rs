//! Architected generic timer discovery.

use quartz_fdt::{Fdt, NodeOffset};

use crate::compat;
use crate::decode::{ArmGicDecoder, InterruptDecoder};
use crate::error::{HwInfoError, Result};
use crate::object::arm::{GenericTimerInfo, TIMER_FLAG_ALWAYS_ON};
use crate::object::{ADDRESS_NOT_POPULATED, HwObject};
use crate::sink::HwInfoSink;
use crate::walk::{self, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// Number of interrupt entries a timer node must carry, in fixed order:
/// secure EL1, non-secure EL1, virtual, non-secure EL2.
const TIMER_INTERRUPT_COUNT: usize = 4;

/// Emits one [`GenericTimerInfo`] per timer-compatible node in the branch.
///
/// Counter block addresses have no device-tree source and are reported as
/// [`ADDRESS_NOT_POPULATED`]; the virtualization-host-extension fields stay
/// zero.
pub struct GenericTimerParser;

impl HwInfoParser for GenericTimerParser {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        _context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let spec = SearchSpec::Compatible(compat::TIMER_COMPATIBLE);
        let mut cursor = branch;
        let mut found = false;
        while let Some(node) = walk::find_next(fdt, branch, cursor, spec)? {
            cursor = node;
            found = true;
            parse_timer_node(fdt, node, sink)?;
        }
        if found { Ok(()) } else { Err(HwInfoError::NotFound) }
    }
}

fn parse_timer_node(fdt: &Fdt<'_>, node: NodeOffset, sink: &mut dyn HwInfoSink) -> Result<()> {
    let intc = walk::intc_parent_node(fdt, node)?.ok_or(HwInfoError::Aborted)?;
    if !walk::node_is_compatible(fdt, intc, compat::GICV2_COMPATIBLE)
        && !walk::node_is_compatible(fdt, intc, compat::GICV3_COMPATIBLE)
    {
        return Err(HwInfoError::Unsupported);
    }
    let cells = walk::interrupt_cells(fdt, intc)? as usize;

    let interrupts = fdt
        .property(node, "interrupts")
        .ok_or(HwInfoError::Aborted)?;
    if interrupts.cell_count() < TIMER_INTERRUPT_COUNT * cells {
        return Err(HwInfoError::Aborted);
    }

    let always_on = if walk::has_property(fdt, node, "always-on") {
        TIMER_FLAG_ALWAYS_ON
    } else {
        0
    };

    let mut gsiv = [0u32; TIMER_INTERRUPT_COUNT];
    let mut flags = [0u32; TIMER_INTERRUPT_COUNT];
    for i in 0..TIMER_INTERRUPT_COUNT {
        let entry = walk::cell_run(&interrupts, i * cells, cells)?;
        gsiv[i] = ArmGicDecoder.interrupt_id(&entry)?;
        flags[i] = ArmGicDecoder.interrupt_flags(&entry)?.bits() | always_on;
    }

    let info = GenericTimerInfo {
        counter_control_base: ADDRESS_NOT_POPULATED,
        counter_read_base: ADDRESS_NOT_POPULATED,
        secure_el1_gsiv: gsiv[0],
        secure_el1_flags: flags[0],
        non_secure_el1_gsiv: gsiv[1],
        non_secure_el1_flags: flags[1],
        virtual_timer_gsiv: gsiv[2],
        virtual_timer_flags: flags[2],
        non_secure_el2_gsiv: gsiv[3],
        non_secure_el2_flags: flags[3],
        virtual_el2_gsiv: 0,
        virtual_el2_flags: 0,
    };
    sink.add(HwObject::GenericTimer(&info))?;
    Ok(())
}
