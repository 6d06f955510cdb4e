//! RISC-V hardware-info records.

/// RINTC flag: the hart is enabled.
pub const RINTC_FLAG_ENABLED: u32 = 1 << 0;

/// Per-hart interrupt controller description.
///
/// Produced once per `cpu` node. The external-interrupt-controller ID and
/// IMSIC fields are filled in by a second pass after PLIC/APLIC/IMSIC
/// discovery; harts without such wiring keep them at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RintcInfo {
    /// Combination of the `RINTC_FLAG_*` values.
    pub flags: u32,
    /// Hart ID from the cpu node's `reg` property.
    pub hart_id: u64,
    /// Processor UID, from the numeric unit address of the cpu node name.
    pub acpi_processor_uid: u32,
    /// Composite external-interrupt-controller ID:
    /// `(controller_id << 24) | context_id`.
    pub ext_intc_id: u32,
    /// Physical address of this hart's IMSIC S-mode interrupt file.
    pub imsic_base_address: u64,
    /// Size in bytes of this hart's IMSIC interrupt file.
    pub imsic_size: u32,
}

/// S-mode IMSIC geometry, one per system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImsicInfo {
    /// Number of distinct MSI identities per interrupt file.
    pub num_ids: u16,
    /// Number of distinct guest MSI identities.
    pub num_guest_ids: u16,
    /// Guest index bits in an interrupt file address.
    pub guest_index_bits: u8,
    /// Hart index bits in an interrupt file address.
    pub hart_index_bits: u8,
    /// Group index bits in an interrupt file address.
    pub group_index_bits: u8,
    /// Least significant bit position of the group index.
    pub group_index_shift: u8,
}

/// One platform-level interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlicInfo {
    /// Sequential external-interrupt-controller identifier.
    pub plic_id: u8,
    /// Physical address of the PLIC register frame.
    pub base_address: u64,
    /// Size in bytes of the register frame.
    pub size: u32,
    /// Number of external interrupt sources.
    pub num_sources: u16,
    /// First global system interrupt of this controller's source range.
    pub gsi_base: u32,
}

/// One S-mode advanced platform-level interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AplicInfo {
    /// Sequential external-interrupt-controller identifier.
    pub aplic_id: u8,
    /// Physical address of the APLIC register frame.
    pub base_address: u64,
    /// Size in bytes of the register frame.
    pub size: u32,
    /// Number of interrupt delivery controls (direct-mode hart contexts).
    pub num_idcs: u16,
    /// Number of external interrupt sources.
    pub num_sources: u16,
    /// First global system interrupt of this controller's source range.
    pub gsi_base: u32,
}

/// One hart's ISA string.
///
/// Borrows the string from the device-tree blob; the sink copies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsaStringInfo<'a> {
    /// Processor UID of the hart this string describes.
    pub acpi_processor_uid: u32,
    /// The `riscv,isa` string.
    pub isa: &'a str,
}

/// One hart's cache-block-operation geometry.
///
/// Block sizes are stored log2-encoded; 0 means the operation class is
/// absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmoInfo {
    /// Processor UID of the hart this record describes.
    pub acpi_processor_uid: u32,
    /// log2 of the cache-block-management operation block size.
    pub cbom_block_size: u8,
    /// log2 of the cache-block-prefetch operation block size.
    pub cbop_block_size: u8,
    /// log2 of the cache-block-zero operation block size.
    pub cboz_block_size: u8,
}

/// Virtual addressing mode of a hart MMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuType {
    /// 39-bit virtual addressing.
    Sv39,
    /// 48-bit virtual addressing.
    Sv48,
    /// 57-bit virtual addressing.
    Sv57,
}

/// One hart's MMU addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmuInfo {
    /// Processor UID of the hart this record describes.
    pub acpi_processor_uid: u32,
    /// Addressing mode from the `mmu-type` property.
    pub mmu_type: MmuType,
}

/// Hart timer description, one per system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiscVTimerInfo {
    /// Ticks of the `time` CSR per second.
    pub time_base_frequency: u64,
}
