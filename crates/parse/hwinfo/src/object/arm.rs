//! Arm hardware-info records.

use crate::sink::ObjectToken;

// ---- Boot architecture ------------------------------------------------------

/// FADT Arm boot-architecture flag: the platform implements PSCI.
pub const BOOT_ARCH_PSCI_COMPLIANT: u16 = 1 << 0;
/// FADT Arm boot-architecture flag: PSCI calls use HVC instead of SMC.
pub const BOOT_ARCH_PSCI_USE_HVC: u16 = 1 << 1;

/// Boot architecture description.
///
/// A zero flags field means the parking protocol, not PSCI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootArchInfo {
    /// Combination of the `BOOT_ARCH_*` flags.
    pub flags: u16,
}

// ---- Generic timer ----------------------------------------------------------

/// Generic timer flag: timer implemented in an always-on power domain.
pub const TIMER_FLAG_ALWAYS_ON: u32 = 1 << 2;

/// Architected generic timer description.
///
/// The four GSIV/flags pairs come from the timer node's `interrupts`
/// property in fixed order. Counter block addresses have no device-tree
/// source and stay at [`ADDRESS_NOT_POPULATED`]; the virtualization-host
/// extension fields likewise default to zero.
///
/// [`ADDRESS_NOT_POPULATED`]: crate::object::ADDRESS_NOT_POPULATED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericTimerInfo {
    /// Physical address of the counter control block.
    pub counter_control_base: u64,
    /// Physical address of the counter read block.
    pub counter_read_base: u64,
    /// Secure EL1 timer interrupt ID.
    pub secure_el1_gsiv: u32,
    /// Secure EL1 timer flags.
    pub secure_el1_flags: u32,
    /// Non-secure EL1 timer interrupt ID.
    pub non_secure_el1_gsiv: u32,
    /// Non-secure EL1 timer flags.
    pub non_secure_el1_flags: u32,
    /// Virtual timer interrupt ID.
    pub virtual_timer_gsiv: u32,
    /// Virtual timer flags.
    pub virtual_timer_flags: u32,
    /// Non-secure EL2 timer interrupt ID.
    pub non_secure_el2_gsiv: u32,
    /// Non-secure EL2 timer flags.
    pub non_secure_el2_flags: u32,
    /// Virtual EL2 timer interrupt ID (virtualization host extensions).
    pub virtual_el2_gsiv: u32,
    /// Virtual EL2 timer flags.
    pub virtual_el2_flags: u32,
}

// ---- GIC complex ------------------------------------------------------------

/// GICC flag: the processor is enabled.
pub const GICC_FLAG_ENABLED: u32 = 1 << 0;
/// GICC flag: the VGIC maintenance interrupt is edge-triggered.
pub const GICC_FLAG_VGIC_EDGE_TRIGGERED: u32 = 1 << 3;

/// GIC CPU interface description, one per `cpu` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicCInfo {
    /// GICv2 CPU interface number; always 0 on GICv3 and later.
    pub cpu_interface_number: u32,
    /// 32-bit processor UID with affinity level 3 folded into bits 31:24.
    pub acpi_processor_uid: u32,
    /// Combination of the `GICC_FLAG_*` values.
    pub flags: u32,
    /// PMU overflow interrupt ID; 0 when no PMU node exists.
    pub performance_interrupt_gsiv: u32,
    /// Physical address of the CPU interface (GICv2, optional on GICv3).
    pub physical_base_address: u64,
    /// Physical address of the virtual CPU interface.
    pub gicv_base_address: u64,
    /// Physical address of the hypervisor interface.
    pub gich_base_address: u64,
    /// VGIC maintenance interrupt ID; 0 when not wired.
    pub vgic_maintenance_interrupt: u32,
    /// MPIDR affinity value (valid affinity bits only).
    pub mpidr: u64,
}

/// GIC distributor description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicDInfo {
    /// Physical address of the distributor register frame.
    pub physical_base_address: u64,
    /// GIC architecture version (2 or 3).
    pub gic_version: u8,
}

/// One GIC redistributor discovery range (GICv3 and later).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicRedistributorInfo {
    /// Physical address of the redistributor region.
    pub discovery_range_base_address: u64,
    /// Length in bytes of the redistributor region.
    pub discovery_range_length: u32,
}

/// One GIC interrupt translation service (GICv3 and later).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicItsInfo {
    /// Sequential ITS identifier, 0-based in tree-encounter order.
    pub its_id: u32,
    /// Physical address of the ITS register frame.
    pub physical_base_address: u64,
}

/// One GICv2m MSI frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicMsiFrameInfo {
    /// Sequential frame identifier in tree-encounter order.
    pub msi_frame_id: u32,
    /// Physical address of the frame.
    pub physical_base_address: u64,
    /// Flags (bit 0: `spi_base`/`spi_count` override the frame registers).
    pub flags: u32,
    /// Overridden SPI count, when `flags` bit 0 is set.
    pub spi_count: u16,
    /// Overridden SPI base, when `flags` bit 0 is set.
    pub spi_base: u16,
}

// ---- PCI --------------------------------------------------------------------

/// One PCI host bridge configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciConfigSpaceInfo {
    /// Physical address of the ECAM window.
    pub base_address: u64,
    /// ACPI segment group number of this host bridge.
    pub segment_group_number: u16,
    /// First decoded bus number.
    pub start_bus_number: u8,
    /// Last decoded bus number.
    pub end_bus_number: u8,
    /// Token of the [`PciAddressMapEntry`] array for this bridge.
    pub address_map_token: ObjectToken,
    /// Token of the [`PciInterruptMapEntry`] array; `None` when the bridge
    /// wires no legacy interrupts.
    pub interrupt_map_token: Option<ObjectToken>,
}

/// Address space code from a PCI `ranges` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciSpaceCode {
    /// Configuration space.
    Config,
    /// I/O space.
    Io,
    /// 32-bit memory space.
    Memory32,
    /// 64-bit memory space.
    Memory64,
}

/// One PCI address-translation range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciAddressMapEntry {
    /// Address space the range decodes.
    pub space_code: PciSpaceCode,
    /// Range base on the PCI side.
    pub pci_address: u64,
    /// Range base on the CPU side.
    pub cpu_address: u64,
    /// Range length in bytes.
    pub address_size: u64,
}

/// One legacy interrupt route from a PCI `interrupt-map` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciInterruptMapEntry {
    /// Bus number of the mapped device.
    pub pci_bus: u8,
    /// Device number of the mapped device.
    pub pci_device: u8,
    /// Interrupt pin, ACPI convention (INTA = 0).
    pub pci_interrupt: u8,
    /// Interrupt controller interrupt ID the pin routes to.
    pub interrupt_gsiv: u32,
    /// Flags of the routed interrupt ([`InterruptFlags`] bits).
    ///
    /// [`InterruptFlags`]: crate::decode::InterruptFlags
    pub interrupt_flags: u32,
}

// ---- IORT -------------------------------------------------------------------

/// One ID remapping range (requester ID → stream ID → device ID).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMappingEntry {
    /// First ID of the input range.
    pub input_base: u32,
    /// Number of IDs in the range.
    pub num_ids: u32,
    /// First ID of the output range.
    pub output_base: u32,
    /// Phandle of the node the output ID space belongs to. The sink
    /// resolves this to its own token for the referenced object.
    pub output_reference: u32,
}

/// One IORT root complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootComplexInfo {
    /// The root complex and its DMA traffic are fully cache coherent.
    pub cache_coherent: bool,
    /// Address translation services are supported.
    pub ats_supported: bool,
    /// PCI segment this root complex belongs to.
    pub pci_segment_number: u32,
    /// Bit width of the largest DMA-reachable address, from `dma-ranges`.
    pub memory_address_size_limit: u8,
    /// Number of entries in the referenced ID mapping array.
    pub id_mapping_count: u32,
    /// Token of the [`IdMappingEntry`] array describing requester-ID to
    /// stream-ID translation.
    pub id_mapping_token: ObjectToken,
    /// Per-pass unique IORT node identifier.
    pub iort_node_id: u32,
}

/// SMMUv3 implementation model, for erratum-specific table generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmmuV3Model {
    /// Compliant generic implementation.
    Generic,
    /// HiSilicon Hi161x, broken prefetch command.
    HiSiliconHi161x,
    /// Cavium CN99xx, broken page-1 register space.
    CaviumCn99xx,
}

/// One SMMUv3 instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmmuV3Info {
    /// Physical address of the SMMU register frame.
    pub base_address: u64,
    /// Event queue interrupt ID; 0 when not wired.
    pub event_interrupt: u32,
    /// PRI queue interrupt ID; 0 when not wired.
    pub pri_interrupt: u32,
    /// Global error interrupt ID; 0 when not wired.
    pub gerr_interrupt: u32,
    /// Command queue sync interrupt ID; 0 when not wired.
    pub sync_interrupt: u32,
    /// Implementation model.
    pub model: SmmuV3Model,
    /// Number of entries in the referenced ID mapping array.
    pub id_mapping_count: u32,
    /// Token of the [`IdMappingEntry`] array describing stream-ID to
    /// device-ID translation; `None` when the array is empty.
    pub id_mapping_token: Option<ObjectToken>,
    /// Index into the mapping array of the entry standing for the MSI
    /// device-ID doorbell; set only for the single-mapping fallback.
    pub device_id_mapping_index: Option<u32>,
    /// Per-pass unique IORT node identifier.
    pub iort_node_id: u32,
}

// ---- Serial ports -----------------------------------------------------------

/// Serial port hardware subtype, debug-port-table encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SerialSubtype {
    /// 16550-compatible UART described by a generic address structure.
    Uart16550 = 0x0012,
    /// Arm PL011 UART.
    Pl011 = 0x0003,
    /// Arm SBSA generic UART.
    Sbsa = 0x000e,
}

/// Register access size for a 16550 UART, generic-address-structure encoding.
pub const ACCESS_SIZE_BYTE: u8 = 1;
/// 16-bit register access.
pub const ACCESS_SIZE_WORD: u8 = 2;
/// 32-bit register access.
pub const ACCESS_SIZE_DWORD: u8 = 3;

/// One serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Physical address of the register frame.
    pub base_address: u64,
    /// Length in bytes of the register frame.
    pub base_address_length: u64,
    /// Interrupt ID of the port.
    pub interrupt: u32,
    /// Fixed configured baud rate. Not read from the tree.
    pub baud_rate: u64,
    /// Input clock in Hz; 0 when the tree provides none.
    pub clock_frequency: u32,
    /// Hardware subtype.
    pub subtype: SerialSubtype,
    /// Register access size (`ACCESS_SIZE_*`); meaningful for 16550 ports,
    /// fixed to 32-bit for PL011/SBSA.
    pub access_size: u8,
}
