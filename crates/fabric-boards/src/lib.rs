//! Board identity records for fabric.
//!
//! A board is data, not logic. It is assembled from:
//! - **I/O resources:** named pins and pin groups with electrical constraints
//! - **Device model:** FPGA part, silicon family, speed grade, and PLL limits
//! - **Memory model:** DRAM module geometry and the PHY that drives it
//! - **Clock plan:** reference oscillator and the domains derived from it
//!
//! The elaboration engine in `fabric-core` consumes these records without
//! knowing which board it is composing for.

pub mod board;
pub mod device;
pub mod error;
pub mod io;
pub mod memory;
pub mod parse;

pub use board::{Board, ClockFrequency, ClockOutput, ReferenceClock, ResetInput};
pub use device::{DeviceFamily, DeviceModel, PllLimits, Toolchain};
pub use error::{BoardError, Result};
pub use io::{Direction, ResourceDecl, ResourceId, Subsignal};
pub use memory::{MemoryConfig, MemoryType, ModuleGeometry, PhyKind, PhyModel};
