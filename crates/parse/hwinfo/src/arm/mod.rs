//! Arm hardware discovery parsers.

pub mod bootarch;
pub mod gic;
pub mod iort;
pub mod pci;
pub mod timer;

pub use bootarch::BootArchParser;
pub use gic::GicDispatcher;
pub use iort::{RootComplexParser, SmmuV3Parser};
pub use pci::PciConfigSpaceParser;
pub use timer::GenericTimerParser;
