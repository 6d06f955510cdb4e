//! Boot architecture discovery from the PSCI firmware node.

use quartz_fdt::{Fdt, NodeOffset};

use crate::compat;
use crate::error::{HwInfoError, Result};
use crate::object::HwObject;
use crate::object::arm::{BOOT_ARCH_PSCI_COMPLIANT, BOOT_ARCH_PSCI_USE_HVC, BootArchInfo};
use crate::sink::HwInfoSink;
use crate::walk::{self, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// Emits one [`BootArchInfo`] from the branch's PSCI node.
///
/// A `method` string other than `"smc"`/`"hvc"` leaves the flags at the
/// parking-protocol default of zero.
pub struct BootArchParser;

impl HwInfoParser for BootArchParser {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        _context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let psci = walk::find_first(fdt, branch, SearchSpec::Compatible(compat::PSCI_COMPATIBLE))?
            .ok_or(HwInfoError::NotFound)?;

        let mut flags = 0;
        match fdt.property(psci, "method").and_then(|p| p.as_str()) {
            Some("smc") => flags = BOOT_ARCH_PSCI_COMPLIANT,
            Some("hvc") => flags = BOOT_ARCH_PSCI_COMPLIANT | BOOT_ARCH_PSCI_USE_HVC,
            _ => {}
        }

        sink.add(HwObject::BootArch(&BootArchInfo { flags }))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Recorded, RecordingSink};
    use alloc::vec::Vec;
    use quartz_dtb_builder::DtbBuilder;

    fn psci_dtb(method: Option<&str>) -> Vec<u8> {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.begin_node("psci");
        b.prop_str("compatible", "arm,psci-1.0");
        if let Some(m) = method {
            b.prop_str("method", m);
        }
        b.end_node();
        b.end_node();
        b.finish()
    }

    fn run(dtb: &[u8]) -> Result<RecordingSink> {
        let fdt = Fdt::parse(dtb).unwrap();
        let mut sink = RecordingSink::new();
        let mut context = ParserContext::new();
        BootArchParser.parse(&fdt, fdt.root(), &mut context, &mut sink)?;
        Ok(sink)
    }

    #[test]
    fn smc_method_is_psci() {
        let sink = run(&psci_dtb(Some("smc"))).unwrap();
        assert_eq!(
            sink.objects,
            &[Recorded::BootArch(BootArchInfo {
                flags: BOOT_ARCH_PSCI_COMPLIANT
            })]
        );
    }

    #[test]
    fn hvc_method_sets_conduit_flag() {
        let sink = run(&psci_dtb(Some("hvc"))).unwrap();
        assert_eq!(
            sink.objects,
            &[Recorded::BootArch(BootArchInfo {
                flags: BOOT_ARCH_PSCI_COMPLIANT | BOOT_ARCH_PSCI_USE_HVC
            })]
        );
    }

    #[test]
    fn unknown_method_means_parking_protocol() {
        let sink = run(&psci_dtb(Some("mailbox"))).unwrap();
        assert_eq!(
            sink.objects,
            &[Recorded::BootArch(BootArchInfo { flags: 0 })]
        );
    }

    #[test]
    fn missing_node_is_not_found() {
        let mut b = DtbBuilder::new();
        b.begin_node("");
        b.end_node();
        assert_eq!(run(&b.finish()), Err(HwInfoError::NotFound));
    }
}
