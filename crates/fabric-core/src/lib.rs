//! Elaboration engine for fabric SoCs.
//!
//! Turns a board record into a fully resolved SoC description through a
//! fixed sequence of steps: resource claims, clock domain generation, bus
//! and CSR allocation, and a final freeze of the address map.
//!
//! The result ([`ElaboratedDesign`]) is pure data: a clock tree, a bus map
//! with every CSR address, the claimed pins, and a graph of the units and
//! connections that an HDL backend lowers to a netlist.

pub mod bus;
pub mod clocking;
pub mod design;
pub mod error;
pub mod hash;
pub mod peripheral;
pub mod peripherals;
pub mod platform;
pub mod soc;

pub use bus::{
    AddressRegion, BusComposer, BusMap, BusMaster, CsrAccess, CsrBank, CsrEntry, CsrLayout,
    CsrRegister,
};
pub use clocking::{
    build_clock_tree, ClockDomain, ClockDomainGenerator, ClockTree, PllConfig, PllOutput,
    ResetNetwork, ResetPolicy,
};
pub use design::{Connection, ConnectionKind, DesignError, DesignGraph, Port, Unit, UnitKind};
pub use error::{ElaborationError, Result};
pub use hash::{content_hash, ContentHash};
pub use peripheral::{Peripheral, RegionRequest, ResourceRequest};
pub use platform::{Claim, PeriodConstraint, Platform, ResourceBank, Signal, SignalBundle};
pub use soc::{elaborate, ElaboratedDesign, Phase, Slot, Soc, SocConfig};
