//! Serial port discovery and console/debug/generic classification.
//!
//! Shared between architectures; the interrupt decoder is injected when
//! the per-architecture dispatch table is built.

use alloc::vec::Vec;

use quartz_fdt::{Fdt, NodeOffset};

use crate::compat;
use crate::decode::InterruptDecoder;
use crate::error::{HwInfoError, Result};
use crate::object::HwObject;
use crate::object::arm::{
    ACCESS_SIZE_BYTE, ACCESS_SIZE_DWORD, ACCESS_SIZE_WORD, SerialPortInfo, SerialSubtype,
};
use crate::sink::HwInfoSink;
use crate::walk::{self, SearchSpec};
use crate::{HwInfoParser, ParserContext};

/// Every port is reported at this rate; the tree's own baud configuration
/// is not consulted.
pub const DEFAULT_BAUD_RATE: u64 = 115_200;

/// Classifies the branch's serial nodes into at most one console (named by
/// `/chosen`'s `stdout-path`), at most one debug port (first remaining in
/// tree order), and generic ports for the rest.
pub struct SerialPortDispatcher {
    /// Decodes each port's `interrupts` entry.
    pub decoder: &'static (dyn InterruptDecoder + Sync),
}

impl HwInfoParser for SerialPortDispatcher {
    fn parse(
        &self,
        fdt: &Fdt<'_>,
        branch: NodeOffset,
        _context: &mut ParserContext,
        sink: &mut dyn HwInfoSink,
    ) -> Result<()> {
        let spec = SearchSpec::Compatible(compat::SERIAL_COMPATIBLE);
        let mut ports = Vec::new();
        let mut cursor = branch;
        while let Some(node) = walk::find_next(fdt, branch, cursor, spec)? {
            ports.push(node);
            cursor = node;
        }
        if ports.is_empty() {
            return Err(HwInfoError::NotFound);
        }

        let console_index = console_node(fdt)?.and_then(|c| ports.iter().position(|&p| p == c));
        let debug_index = (0..ports.len()).find(|&i| Some(i) != console_index);

        // Decode every port before emitting anything.
        let mut records = Vec::with_capacity(ports.len());
        for &node in &ports {
            records.push(self.parse_port(fdt, node)?);
        }

        for (i, record) in records.iter().enumerate() {
            let object = if Some(i) == console_index {
                HwObject::SerialConsolePort(record)
            } else if Some(i) == debug_index {
                HwObject::SerialDebugPort(record)
            } else {
                HwObject::SerialPort(record)
            };
            sink.add(object)?;
        }
        Ok(())
    }
}

impl SerialPortDispatcher {
    fn parse_port(&self, fdt: &Fdt<'_>, node: NodeOffset) -> Result<SerialPortInfo> {
        let subtype = if walk::node_is_compatible(fdt, node, compat::SERIAL_16550_COMPATIBLE) {
            SerialSubtype::Uart16550
        } else if walk::node_is_compatible(fdt, node, compat::SERIAL_SBSA_COMPATIBLE) {
            SerialSubtype::Sbsa
        } else {
            SerialSubtype::Pl011
        };

        let geometry = walk::parent_cell_geometry(fdt, node)?;
        let (base_address, base_address_length) =
            walk::read_reg_required(fdt, node, geometry, 0)?;

        let intc = walk::intc_parent_node(fdt, node)?.ok_or(HwInfoError::Aborted)?;
        let cells = walk::interrupt_cells(fdt, intc)? as usize;
        let interrupts = fdt
            .property(node, "interrupts")
            .ok_or(HwInfoError::Aborted)?;
        let entry = walk::cell_run(&interrupts, 0, cells)?;
        let interrupt = self.decoder.interrupt_id(&entry)?;

        let clock_frequency = match fdt.property(node, "clock-frequency") {
            None => 0,
            // A phandle-plus-specifier clock reference is longer than one
            // cell and is not modeled.
            Some(p) if p.len() != 4 => return Err(HwInfoError::Unsupported),
            Some(p) => p.as_u32().ok_or(HwInfoError::Aborted)?,
        };

        let access_size = match subtype {
            SerialSubtype::Uart16550 => {
                match fdt.property(node, "reg-io-width").and_then(|p| p.as_u32()) {
                    None | Some(1) => ACCESS_SIZE_BYTE,
                    Some(2) => ACCESS_SIZE_WORD,
                    Some(4) => ACCESS_SIZE_DWORD,
                    Some(_) => return Err(HwInfoError::Unsupported),
                }
            }
            SerialSubtype::Pl011 | SerialSubtype::Sbsa => ACCESS_SIZE_DWORD,
        };

        Ok(SerialPortInfo {
            base_address,
            base_address_length,
            interrupt,
            baud_rate: DEFAULT_BAUD_RATE,
            clock_frequency,
            subtype,
            access_size,
        })
    }
}

/// Resolves `/chosen`'s `stdout-path` to a node, following one `/aliases`
/// indirection when the path is not absolute. Any lookup failure means "no
/// console designated", never an error.
fn console_node(fdt: &Fdt<'_>) -> Result<Option<NodeOffset>> {
    let Some(chosen) = fdt.find_node("/chosen") else {
        return Ok(None);
    };
    let Some(path) = fdt.property(chosen, "stdout-path").and_then(|p| p.as_str()) else {
        return Ok(None);
    };
    // Options after a colon (e.g. ":115200n8") are not part of the path.
    let path = path.split(':').next().unwrap_or(path);
    if path.starts_with('/') {
        return Ok(fdt.find_node(path));
    }
    let Some(aliases) = fdt.find_node("/aliases") else {
        return Ok(None);
    };
    let Some(target) = fdt.property(aliases, path).and_then(|p| p.as_str()) else {
        return Ok(None);
    };
    Ok(fdt.find_node(target))
}
