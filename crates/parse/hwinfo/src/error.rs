//! The error taxonomy shared by every parser in this crate.

use quartz_fdt::FdtError;

/// Outcome classification used consistently across all parsers.
///
/// The whole parse either succeeds or fails atomically; `NotFound` is the
/// only variant a caller may swallow, and only at the one level that knows
/// the missing object is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInfoError {
    /// The expected node or property is absent and its absence is a
    /// legitimate outcome (no PSCI node, no PMU, no legacy PCI interrupts).
    NotFound,
    /// A structural or content invariant of the device tree was violated
    /// (wrong property size, malformed cell counts, inconsistent
    /// segment numbering). Fatal to the enclosing dispatcher.
    Aborted,
    /// A caller-supplied argument was malformed, or tree data describes an
    /// impossible configuration attributable to the producer rather than
    /// the format (e.g. stray MPIDR affinity bits). Fatal.
    InvalidParameter,
    /// The data is well-formed but describes a configuration this parser
    /// does not implement (unknown GIC version, non-BSA PMU wiring,
    /// unsupported cell widths). Fatal at the point of detection.
    Unsupported,
}

impl From<FdtError> for HwInfoError {
    /// Any lower-level blob-reader failure is a structural violation.
    fn from(_: FdtError) -> Self {
        Self::Aborted
    }
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, HwInfoError>;
