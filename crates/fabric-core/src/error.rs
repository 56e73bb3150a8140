//! Elaboration errors.

use fabric_boards::{MemoryType, ResourceId};
use thiserror::Error;

use crate::design::DesignError;
use crate::soc::Phase;

/// Errors that abort an elaboration run.
///
/// Every variant carries enough context (resource identity, region bounds,
/// or frequencies) to fix the board configuration that caused it.
#[derive(Debug, Error)]
pub enum ElaborationError {
    #[error("unknown resource: {name}{}", index.map(|i| format!(":{i}")).unwrap_or_default())]
    UnknownResource { name: String, index: Option<u32> },

    #[error("resource {resource} is already claimed by '{owner}'")]
    AlreadyClaimed { resource: ResourceId, owner: String },

    #[error("resource {resource} is declared more than once")]
    DuplicateDeclaration { resource: ResourceId },

    #[error("pin {pin} is declared by both {first} and {second}")]
    PinConflict {
        pin: String,
        first: ResourceId,
        second: ResourceId,
    },

    #[error("loose lookup of '{name}' denied: only the reference clock '{reference}' may be read without a claim")]
    LooseRequestDenied { name: String, reference: String },

    #[error("bus master '{attempted}' rejected: '{existing}' is already attached")]
    DuplicateMaster { existing: String, attempted: String },

    #[error(
        "region '{name}' 0x{base:08X}..0x{end:08X} overlaps '{other}' 0x{other_base:08X}..0x{other_end:08X}"
    )]
    OverlappingRegion {
        name: String,
        base: u64,
        end: u64,
        other: String,
        other_base: u64,
        other_end: u64,
    },

    #[error("region '{name}' at 0x{base:08X} (size 0x{size:X}) is not aligned to 0x{alignment:X}")]
    MisalignedRegion {
        name: String,
        base: u64,
        size: u64,
        alignment: u64,
    },

    #[error("region '{name}' at 0x{base:08X} has zero size")]
    EmptyRegion { name: String, base: u64 },

    #[error("no base address for region '{name}' in the memory map")]
    UnmappedRegion { name: String },

    #[error("address map is finalized: cannot {operation}")]
    MapFinalized { operation: String },

    #[error("{operation} is not valid in phase {phase}")]
    InvalidPhase { operation: String, phase: Phase },

    #[error(
        "cannot derive '{domain}' at {requested_hz} Hz from a {reference_hz} Hz reference with {primitive}"
    )]
    UnachievableFrequency {
        domain: String,
        requested_hz: u64,
        reference_hz: u64,
        primitive: String,
    },

    #[error(
        "module {module} ({module_width} bits) is incompatible with a {phy_width}-bit PHY: width must divide the PHY width"
    )]
    IncompatibleModuleGeometry {
        module: String,
        module_width: u32,
        phy_width: u32,
    },

    #[error("module {module} is {module_type:?} but the PHY drives {phy_type:?}")]
    MemoryTypeMismatch {
        module: String,
        module_type: MemoryType,
        phy_type: MemoryType,
    },

    #[error("invalid cache configuration: {detail}")]
    InvalidCacheConfig { detail: String },

    #[error("CSR space exhausted: '{peripheral}' needs location {location} but only {capacity} exist")]
    CsrSpaceExhausted {
        peripheral: String,
        location: usize,
        capacity: usize,
    },

    #[error("board '{board}' declares no memory")]
    MissingMemory { board: String },

    #[error("invalid clock plan: {detail}")]
    InvalidClockPlan { detail: String },

    #[error("peripheral '{name}' is registered more than once")]
    DuplicatePeripheral { name: String },

    #[error("design graph error: {0}")]
    Design(#[from] DesignError),
}

/// Result type for elaboration operations.
pub type Result<T> = std::result::Result<T, ElaborationError>;
