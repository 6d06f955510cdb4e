//! Static `compatible`-string tables, one per hardware class.
//!
//! A node belongs to a class when its `compatible` property's string list
//! contains any entry of the class table. The tables are process-wide
//! constants; they are not configurable at runtime.

/// An ordered set of `compatible` strings identifying one hardware class.
pub type CompatibilityTable = [&'static str];

/// PSCI firmware nodes (boot architecture).
pub static PSCI_COMPATIBLE: &CompatibilityTable = &["arm,psci-0.2", "arm,psci-1.0", "arm,psci"];

/// Arm architected generic timer nodes.
pub static TIMER_COMPATIBLE: &CompatibilityTable = &["arm,armv7-timer", "arm,armv8-timer"];

/// GICv2 interrupt controllers.
pub static GICV2_COMPATIBLE: &CompatibilityTable = &["arm,cortex-a15-gic", "arm,gic-400"];

/// GICv3 interrupt controllers.
pub static GICV3_COMPATIBLE: &CompatibilityTable = &["arm,gic-v3"];

/// GICv2m MSI frame nodes.
pub static GICV2M_COMPATIBLE: &CompatibilityTable = &["arm,gic-v2m-frame"];

/// Armv8 PMU nodes.
pub static PMU_COMPATIBLE: &CompatibilityTable = &["arm,armv8-pmuv3"];

/// Generic ECAM PCI host bridges.
pub static PCI_HOST_COMPATIBLE: &CompatibilityTable = &["pci-host-ecam-generic"];

/// Arm SMMUv3 nodes.
pub static SMMU_V3_COMPATIBLE: &CompatibilityTable = &["arm,smmu-v3"];

/// 16550-compatible UARTs.
pub static SERIAL_16550_COMPATIBLE: &CompatibilityTable = &["ns16550a", "snps,dw-apb-uart"];

/// SBSA generic UARTs.
pub static SERIAL_SBSA_COMPATIBLE: &CompatibilityTable = &["arm,sbsa-uart"];

/// PL011 UARTs.
pub static SERIAL_PL011_COMPATIBLE: &CompatibilityTable = &["arm,pl011"];

/// Every serial UART class the serial dispatcher scans for.
pub static SERIAL_COMPATIBLE: &CompatibilityTable = &[
    "ns16550a",
    "snps,dw-apb-uart",
    "arm,sbsa-uart",
    "arm,pl011",
];

/// RISC-V hart (`cpu`) nodes.
pub static RISCV_CPU_COMPATIBLE: &CompatibilityTable = &["riscv"];

/// RISC-V per-hart interrupt controllers (children of `cpu` nodes).
pub static RISCV_CPU_INTC_COMPATIBLE: &CompatibilityTable = &["riscv,cpu-intc"];

/// RISC-V platform-level interrupt controllers.
pub static PLIC_COMPATIBLE: &CompatibilityTable =
    &["riscv,plic0", "sifive,plic-1.0.0", "thead,c900-plic"];

/// RISC-V advanced platform-level interrupt controllers.
pub static APLIC_COMPATIBLE: &CompatibilityTable = &["riscv,aplic"];

/// RISC-V incoming MSI controllers.
pub static IMSIC_COMPATIBLE: &CompatibilityTable = &["riscv,imsics"];
