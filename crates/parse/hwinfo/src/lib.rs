//! `quartz-hwinfo` --- hardware discovery from a Flattened Device Tree.
//!
//! Walks a DTB blob (via [`quartz_fdt`]) and hands fixed-layout hardware
//! descriptions to a caller-supplied [`HwInfoSink`]: boot architecture,
//! the architected generic timer, the GIC complex, PCI host bridges with
//! their IORT/SMMUv3 topology and serial ports on Arm; hart, PLIC/APLIC
//! and IMSIC topology on RISC-V.
//!
//! Parsing is a single synchronous pass per architecture table. Each
//! top-level parser either contributes objects, reports its subsystem
//! absent (tolerated), or fails -- and a failure aborts the whole parse,
//! so a sink never holds a partially-described subsystem.
//!
//! # Usage
//!
//! ```ignore
//! let mut sink = MySink::new();
//! quartz_hwinfo::parse_arm(dtb_bytes, &mut sink)?;
//! ```

#![no_std]

extern crate alloc;

pub mod arm;
pub mod compat;
pub mod decode;
pub mod error;
pub mod object;
pub mod riscv;
pub mod serial;
pub mod sink;
pub mod walk;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{HwInfoError, Result};
pub use sink::{HwInfoSink, ObjectToken};

use quartz_fdt::{Fdt, NodeOffset};

/// Per-parse allocator state threaded through every parser.
///
/// Holds the identifier counters that older firmware kept in globals; a
/// fresh context per parse keeps repeated passes independent.
#[derive(Debug, Default)]
pub struct ParserContext {
    next_iort_node_id: u32,
    next_pci_segment: u16,
}

impl ParserContext {
    /// Creates a context with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique IORT node identifier.
    pub(crate) fn allocate_iort_node_id(&mut self) -> u32 {
        let id = self.next_iort_node_id;
        self.next_iort_node_id = self.next_iort_node_id.wrapping_add(1);
        id
    }

    /// Next PCI segment group, for trees without `linux,pci-domain`.
    pub(crate) fn allocate_pci_segment(&mut self) -> u16 {
        let segment = self.next_pci_segment;
        self.next_pci_segment = self.next_pci_segment.wrapping_add(1);
        segment
    }
}

/// One top-level parser in an architecture's dispatch table.
pub trait HwInfoParser {
    /// Parses this parser's subsystem out of the branch rooted at
    /// `branch` and submits the resulting objects.
    ///
    /// # Errors
    ///
    /// `NotFound` when the subsystem is absent from the branch (the
    /// dispatcher tolerates this); any other error is fatal to the whole
    /// parse.
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()>;
}

static ARM_SERIAL: serial::SerialPortDispatcher = serial::SerialPortDispatcher {
    decoder: &decode::ArmGicDecoder,
};
static RISCV_SERIAL: serial::SerialPortDispatcher = serial::SerialPortDispatcher {
    decoder: &decode::RiscVDecoder,
};

/// Ordered Arm dispatch table.
pub static ARM_PARSERS: &[&(dyn HwInfoParser + Sync)] = &[
    &arm::BootArchParser,
    &arm::GenericTimerParser,
    &arm::GicDispatcher,
    &arm::PciConfigSpaceParser,
    &arm::RootComplexParser,
    &arm::SmmuV3Parser,
    &ARM_SERIAL,
];

/// Ordered RISC-V dispatch table.
pub static RISCV_PARSERS: &[&(dyn HwInfoParser + Sync)] = &[
    &riscv::HartInfoParser,
    &riscv::RiscVIntcDispatcher,
    &RISCV_SERIAL,
];

/// Runs a dispatch table over the whole tree.
///
/// `NotFound` from a table entry means that subsystem is absent and is
/// swallowed here; every other error aborts immediately.
///
/// # Errors
///
/// The first fatal error from any table entry.
pub fn parse_with(
    fdt: &Fdt<'_>,
    parsers: &[&(dyn HwInfoParser + Sync)],
    sink: &mut dyn HwInfoSink,
) -> Result<()> {
    let mut context = ParserContext::new();
    for parser in parsers {
        match parser.parse(fdt, fdt.root(), &mut context, sink) {
            Err(HwInfoError::NotFound) => {}
            other => other?,
        }
    }
    Ok(())
}

/// Parses an Arm platform description out of a raw DTB blob.
///
/// # Errors
///
/// `InvalidParameter` if the blob is not a valid DTB; otherwise the first
/// fatal parser error.
pub fn parse_arm(dtb: &[u8], sink: &mut dyn HwInfoSink) -> Result<()> {
    let fdt = Fdt::parse(dtb).map_err(|_| HwInfoError::InvalidParameter)?;
    parse_with(&fdt, ARM_PARSERS, sink)
}

/// Parses a RISC-V platform description out of a raw DTB blob.
///
/// # Errors
///
/// `InvalidParameter` if the blob is not a valid DTB; otherwise the first
/// fatal parser error.
pub fn parse_riscv(dtb: &[u8], sink: &mut dyn HwInfoSink) -> Result<()> {
    let fdt = Fdt::parse(dtb).map_err(|_| HwInfoError::InvalidParameter)?;
    parse_with(&fdt, RISCV_PARSERS, sink)
}
