//! Interrupt cell decoding.
//!
//! `interrupts` properties store raw `u32` cells whose layout depends on
//! the interrupt controller binding: Arm GIC entries are
//! `(type, number, flags)` triples, RISC-V entries are a bare IRQ number
//! optionally followed by a trigger cell. Both decode to the same
//! ACPI-style output: a global interrupt ID and [`InterruptFlags`].

use bitflags::bitflags;

use crate::error::{HwInfoError, Result};

bitflags! {
    /// ACPI-style interrupt flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptFlags: u32 {
        /// Interrupt is edge-triggered (level-triggered when clear).
        const EDGE_TRIGGERED = 1 << 0;
        /// Interrupt is active-low (active-high when clear).
        const ACTIVE_LOW = 1 << 1;
    }
}

/// Architecture-specific decoding of raw interrupt cells.
///
/// Implementations are selected when the per-architecture dispatch table is
/// constructed, never by conditional compilation.
pub trait InterruptDecoder {
    /// Decodes the global interrupt ID from one `interrupts` entry.
    ///
    /// # Errors
    ///
    /// `Aborted` if too few cells are given, `Unsupported` if the entry
    /// describes an interrupt class the architecture model has no mapping
    /// for.
    fn interrupt_id(&self, cells: &[u32]) -> Result<u32>;

    /// Decodes the trigger/polarity flags from one `interrupts` entry.
    ///
    /// # Errors
    ///
    /// `Aborted` if too few cells are given.
    fn interrupt_flags(&self, cells: &[u32]) -> Result<InterruptFlags>;
}

// ---- Arm GIC ----------------------------------------------------------------

/// Interrupt type cell value for shared peripheral interrupts.
const GIC_IRQ_TYPE_SPI: u32 = 0;
/// Interrupt type cell value for private peripheral interrupts.
const GIC_IRQ_TYPE_PPI: u32 = 1;

/// GIC ID space offset for SPIs.
const SPI_OFFSET: u32 = 32;
/// GIC ID space offset for PPIs.
const PPI_OFFSET: u32 = 16;

// Device-tree trigger encoding (fourth byte of the flags cell).
const DT_IRQ_EDGE_RISING: u32 = 1 << 0;
const DT_IRQ_EDGE_FALLING: u32 = 1 << 1;
const DT_IRQ_LEVEL_LOW: u32 = 1 << 3;

/// Decoder for the Arm GIC `(type, number, flags)` cell convention.
pub struct ArmGicDecoder;

impl InterruptDecoder for ArmGicDecoder {
    fn interrupt_id(&self, cells: &[u32]) -> Result<u32> {
        let &[irq_type, number, ..] = cells else {
            return Err(HwInfoError::Aborted);
        };
        let offset = match irq_type {
            GIC_IRQ_TYPE_SPI => SPI_OFFSET,
            GIC_IRQ_TYPE_PPI => PPI_OFFSET,
            // Extended SPI/PPI ranges and anything else are not modeled.
            _ => return Err(HwInfoError::Unsupported),
        };
        // A raw number near u32::MAX cannot be a real interrupt.
        number.checked_add(offset).ok_or(HwInfoError::Aborted)
    }

    fn interrupt_flags(&self, cells: &[u32]) -> Result<InterruptFlags> {
        let raw = *cells.get(2).ok_or(HwInfoError::Aborted)?;
        let mut flags = InterruptFlags::empty();
        if raw & (DT_IRQ_EDGE_RISING | DT_IRQ_EDGE_FALLING) != 0 {
            flags |= InterruptFlags::EDGE_TRIGGERED;
        }
        if raw & (DT_IRQ_EDGE_FALLING | DT_IRQ_LEVEL_LOW) != 0 {
            flags |= InterruptFlags::ACTIVE_LOW;
        }
        Ok(flags)
    }
}

// ---- RISC-V -----------------------------------------------------------------

/// Decoder for the flat RISC-V IRQ number convention.
///
/// PLIC and APLIC sources live in a single flat number space; the first
/// cell is the IRQ number and an optional second cell carries the trigger
/// encoding.
pub struct RiscVDecoder;

impl InterruptDecoder for RiscVDecoder {
    fn interrupt_id(&self, cells: &[u32]) -> Result<u32> {
        cells.first().copied().ok_or(HwInfoError::Aborted)
    }

    fn interrupt_flags(&self, cells: &[u32]) -> Result<InterruptFlags> {
        // A single-cell entry is level-triggered active-high.
        let Some(&raw) = cells.get(1) else {
            return Ok(InterruptFlags::empty());
        };
        let mut flags = InterruptFlags::empty();
        if raw == DT_IRQ_EDGE_RISING || raw == DT_IRQ_EDGE_FALLING {
            flags |= InterruptFlags::EDGE_TRIGGERED;
        }
        if raw == DT_IRQ_EDGE_FALLING || raw == DT_IRQ_LEVEL_LOW {
            flags |= InterruptFlags::ACTIVE_LOW;
        }
        Ok(flags)
    }
}
