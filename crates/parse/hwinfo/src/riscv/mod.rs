//! RISC-V hart and interrupt-topology parsers.

pub mod hart;
pub mod intc;

pub use hart::HartInfoParser;
pub use intc::RiscVIntcDispatcher;

use crate::error::{HwInfoError, Result};

/// Processor UID of a hart: the hexadecimal unit address of its `cpu`
/// node name.
pub(crate) fn hart_uid(name: &str) -> Result<u32> {
    let unit = name.split('@').nth(1).ok_or(HwInfoError::Aborted)?;
    u32::from_str_radix(unit, 16).map_err(|_| HwInfoError::Aborted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_hex_unit_address() {
        assert_eq!(hart_uid("cpu@0").unwrap(), 0);
        assert_eq!(hart_uid("cpu@1a").unwrap(), 0x1a);
        assert_eq!(hart_uid("cpu"), Err(HwInfoError::Aborted));
        assert_eq!(hart_uid("cpu@x"), Err(HwInfoError::Aborted));
    }
}
