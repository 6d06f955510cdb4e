//! Hardware-info objects handed to the object sink.
//!
//! Every record is a fixed-layout description of one discovered hardware
//! object, populated from one or more device-tree nodes. Fields the tree
//! provides no data for are set to architecturally-defaulted constants,
//! never left undefined. Cross-object references are expressed through
//! opaque tokens (see [`crate::sink`]), not pointers.

pub mod arm;
pub mod riscv;

pub use arm::{
    BootArchInfo, GenericTimerInfo, GicCInfo, GicDInfo, GicItsInfo, GicMsiFrameInfo,
    GicRedistributorInfo, IdMappingEntry, PciAddressMapEntry, PciConfigSpaceInfo,
    PciInterruptMapEntry, RootComplexInfo, SerialPortInfo, SerialSubtype, SmmuV3Info, SmmuV3Model,
};
pub use riscv::{AplicInfo, CmoInfo, ImsicInfo, IsaStringInfo, MmuInfo, MmuType, PlicInfo,
    RintcInfo, RiscVTimerInfo};

/// Object-kind discriminator, paired with each record handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HwObjectKind {
    /// [`BootArchInfo`].
    BootArch,
    /// [`GenericTimerInfo`].
    GenericTimer,
    /// [`GicCInfo`].
    GicC,
    /// [`GicDInfo`].
    GicD,
    /// [`GicRedistributorInfo`].
    GicRedistributor,
    /// [`GicItsInfo`].
    GicIts,
    /// [`GicMsiFrameInfo`].
    GicMsiFrame,
    /// [`PciConfigSpaceInfo`].
    PciConfigSpace,
    /// Array of [`PciAddressMapEntry`].
    PciAddressMap,
    /// Array of [`PciInterruptMapEntry`].
    PciInterruptMap,
    /// [`RootComplexInfo`].
    RootComplex,
    /// Array of [`IdMappingEntry`].
    IdMappingArray,
    /// [`SmmuV3Info`].
    SmmuV3,
    /// [`SerialPortInfo`] for the system console.
    SerialConsolePort,
    /// [`SerialPortInfo`] for the debug port.
    SerialDebugPort,
    /// [`SerialPortInfo`] for a generic port.
    SerialPort,
    /// [`RintcInfo`].
    Rintc,
    /// [`ImsicInfo`].
    Imsic,
    /// [`PlicInfo`].
    Plic,
    /// [`AplicInfo`].
    Aplic,
    /// [`IsaStringInfo`].
    IsaString,
    /// [`CmoInfo`].
    Cmo,
    /// [`MmuInfo`].
    Mmu,
    /// [`RiscVTimerInfo`].
    RiscVTimer,
}

/// One hardware-info object (or array of entries) offered to the sink.
///
/// Borrows the parser's working buffer; the sink must copy what it keeps.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum HwObject<'a> {
    /// Boot architecture flags.
    BootArch(&'a BootArchInfo),
    /// One generic timer description.
    GenericTimer(&'a GenericTimerInfo),
    /// One GIC CPU interface.
    GicC(&'a GicCInfo),
    /// The GIC distributor.
    GicD(&'a GicDInfo),
    /// One GIC redistributor discovery range.
    GicRedistributor(&'a GicRedistributorInfo),
    /// One GIC interrupt translation service.
    GicIts(&'a GicItsInfo),
    /// One GICv2m MSI frame.
    GicMsiFrame(&'a GicMsiFrameInfo),
    /// One PCI host bridge configuration space.
    PciConfigSpace(&'a PciConfigSpaceInfo),
    /// The address map referenced by a PCI configuration space object.
    PciAddressMap(&'a [PciAddressMapEntry]),
    /// The legacy interrupt map referenced by a PCI configuration space object.
    PciInterruptMap(&'a [PciInterruptMapEntry]),
    /// One IORT root complex.
    RootComplex(&'a RootComplexInfo),
    /// An ID mapping array referenced by a root complex or SMMUv3 object.
    IdMappingArray(&'a [IdMappingEntry]),
    /// One SMMUv3 instance.
    SmmuV3(&'a SmmuV3Info),
    /// The console serial port.
    SerialConsolePort(&'a SerialPortInfo),
    /// The debug serial port.
    SerialDebugPort(&'a SerialPortInfo),
    /// A generic serial port.
    SerialPort(&'a SerialPortInfo),
    /// One hart interrupt controller record.
    Rintc(&'a RintcInfo),
    /// The S-mode IMSIC description.
    Imsic(&'a ImsicInfo),
    /// One PLIC instance.
    Plic(&'a PlicInfo),
    /// One S-mode APLIC instance.
    Aplic(&'a AplicInfo),
    /// One hart's ISA string.
    IsaString(&'a IsaStringInfo<'a>),
    /// One hart's cache-block-operation geometry.
    Cmo(&'a CmoInfo),
    /// One hart's MMU addressing mode.
    Mmu(&'a MmuInfo),
    /// The hart timer description.
    RiscVTimer(&'a RiscVTimerInfo),
}

impl HwObject<'_> {
    /// Returns the kind discriminator for this object.
    #[must_use]
    pub fn kind(&self) -> HwObjectKind {
        match self {
            Self::BootArch(_) => HwObjectKind::BootArch,
            Self::GenericTimer(_) => HwObjectKind::GenericTimer,
            Self::GicC(_) => HwObjectKind::GicC,
            Self::GicD(_) => HwObjectKind::GicD,
            Self::GicRedistributor(_) => HwObjectKind::GicRedistributor,
            Self::GicIts(_) => HwObjectKind::GicIts,
            Self::GicMsiFrame(_) => HwObjectKind::GicMsiFrame,
            Self::PciConfigSpace(_) => HwObjectKind::PciConfigSpace,
            Self::PciAddressMap(_) => HwObjectKind::PciAddressMap,
            Self::PciInterruptMap(_) => HwObjectKind::PciInterruptMap,
            Self::RootComplex(_) => HwObjectKind::RootComplex,
            Self::IdMappingArray(_) => HwObjectKind::IdMappingArray,
            Self::SmmuV3(_) => HwObjectKind::SmmuV3,
            Self::SerialConsolePort(_) => HwObjectKind::SerialConsolePort,
            Self::SerialDebugPort(_) => HwObjectKind::SerialDebugPort,
            Self::SerialPort(_) => HwObjectKind::SerialPort,
            Self::Rintc(_) => HwObjectKind::Rintc,
            Self::Imsic(_) => HwObjectKind::Imsic,
            Self::Plic(_) => HwObjectKind::Plic,
            Self::Aplic(_) => HwObjectKind::Aplic,
            Self::IsaString(_) => HwObjectKind::IsaString,
            Self::Cmo(_) => HwObjectKind::Cmo,
            Self::Mmu(_) => HwObjectKind::Mmu,
            Self::RiscVTimer(_) => HwObjectKind::RiscVTimer,
        }
    }
}

/// Marker value for address fields the device tree provides no data for.
pub const ADDRESS_NOT_POPULATED: u64 = u64::MAX;
