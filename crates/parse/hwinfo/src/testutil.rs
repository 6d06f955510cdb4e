//! Test-only sink that copies every offered object into owned storage.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Result;
use crate::object::arm::{
    BootArchInfo, GenericTimerInfo, GicCInfo, GicDInfo, GicItsInfo, GicMsiFrameInfo,
    GicRedistributorInfo, IdMappingEntry, PciAddressMapEntry, PciConfigSpaceInfo,
    PciInterruptMapEntry, RootComplexInfo, SerialPortInfo, SmmuV3Info,
};
use crate::object::riscv::{AplicInfo, CmoInfo, ImsicInfo, MmuInfo, PlicInfo, RintcInfo,
    RiscVTimerInfo};
use crate::object::HwObject;
use crate::sink::{HwInfoSink, ObjectToken};

/// Owned ISA-string record (the live object borrows the blob).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsaString {
    pub acpi_processor_uid: u32,
    pub isa: String,
}

/// Owned copy of one sunk object.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    BootArch(BootArchInfo),
    GenericTimer(GenericTimerInfo),
    GicC(GicCInfo),
    GicD(GicDInfo),
    GicRedistributor(GicRedistributorInfo),
    GicIts(GicItsInfo),
    GicMsiFrame(GicMsiFrameInfo),
    PciConfigSpace(PciConfigSpaceInfo),
    PciAddressMap(Vec<PciAddressMapEntry>),
    PciInterruptMap(Vec<PciInterruptMapEntry>),
    RootComplex(RootComplexInfo),
    IdMappingArray(Vec<IdMappingEntry>),
    SmmuV3(SmmuV3Info),
    SerialConsolePort(SerialPortInfo),
    SerialDebugPort(SerialPortInfo),
    SerialPort(SerialPortInfo),
    Rintc(RintcInfo),
    Imsic(ImsicInfo),
    Plic(PlicInfo),
    Aplic(AplicInfo),
    IsaString(IsaString),
    Cmo(CmoInfo),
    Mmu(MmuInfo),
    RiscVTimer(RiscVTimerInfo),
}

/// Sink that appends owned copies in arrival order; tokens are indices.
#[derive(Debug, Default, PartialEq)]
pub struct RecordingSink {
    pub objects: Vec<Recorded>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HwInfoSink for RecordingSink {
    fn add(&mut self, object: HwObject<'_>) -> Result<ObjectToken> {
        let token = ObjectToken::from_raw(self.objects.len() as u32);
        let owned = match object {
            HwObject::BootArch(o) => Recorded::BootArch(*o),
            HwObject::GenericTimer(o) => Recorded::GenericTimer(*o),
            HwObject::GicC(o) => Recorded::GicC(*o),
            HwObject::GicD(o) => Recorded::GicD(*o),
            HwObject::GicRedistributor(o) => Recorded::GicRedistributor(*o),
            HwObject::GicIts(o) => Recorded::GicIts(*o),
            HwObject::GicMsiFrame(o) => Recorded::GicMsiFrame(*o),
            HwObject::PciConfigSpace(o) => Recorded::PciConfigSpace(*o),
            HwObject::PciAddressMap(o) => Recorded::PciAddressMap(o.to_vec()),
            HwObject::PciInterruptMap(o) => Recorded::PciInterruptMap(o.to_vec()),
            HwObject::RootComplex(o) => Recorded::RootComplex(*o),
            HwObject::IdMappingArray(o) => Recorded::IdMappingArray(o.to_vec()),
            HwObject::SmmuV3(o) => Recorded::SmmuV3(*o),
            HwObject::SerialConsolePort(o) => Recorded::SerialConsolePort(*o),
            HwObject::SerialDebugPort(o) => Recorded::SerialDebugPort(*o),
            HwObject::SerialPort(o) => Recorded::SerialPort(*o),
            HwObject::Rintc(o) => Recorded::Rintc(*o),
            HwObject::Imsic(o) => Recorded::Imsic(*o),
            HwObject::Plic(o) => Recorded::Plic(*o),
            HwObject::Aplic(o) => Recorded::Aplic(*o),
            HwObject::IsaString(o) => Recorded::IsaString(IsaString {
                acpi_processor_uid: o.acpi_processor_uid,
                isa: String::from(o.isa),
            }),
            HwObject::Cmo(o) => Recorded::Cmo(*o),
            HwObject::Mmu(o) => Recorded::Mmu(*o),
            HwObject::RiscVTimer(o) => Recorded::RiscVTimer(*o),
        };
        self.objects.push(owned);
        Ok(token)
    }
}
