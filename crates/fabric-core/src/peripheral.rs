//! Peripheral capability contract.
//!
//! The composition never looks inside a peripheral. It asks what physical
//! resources the peripheral needs, hands it the claimed signals and its
//! clock domain, and registers whatever bus region, CSR registers, or bus
//! master endpoint the peripheral declares.

use crate::bus::{BusMaster, CsrRegister};
use crate::clocking::ClockDomain;
use crate::design::Unit;
use crate::error::Result;
use crate::platform::SignalBundle;

/// A physical resource a peripheral needs claimed on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub name: String,
    /// `None` binds the lowest-index unclaimed resource of that name.
    pub index: Option<u32>,
}

impl ResourceRequest {
    pub fn new(name: &str, index: Option<u32>) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// An address region a bus slave asks for. The base comes from the SoC
/// memory map under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRequest {
    pub name: String,
    pub size: u64,
    pub cached: bool,
}

/// Externally implemented block attached to the SoC.
pub trait Peripheral {
    /// Instance name; also the CSR peripheral name.
    fn name(&self) -> &str;

    /// Resources to claim before binding.
    fn declared_resources(&self) -> Vec<ResourceRequest> {
        Vec::new()
    }

    /// Domains besides the primary one the peripheral is clocked from.
    fn extra_domains(&self) -> Vec<String> {
        Vec::new()
    }

    /// Instantiate the peripheral against its domain and claimed resources,
    /// in the order they were declared.
    fn bind(&self, domain: &ClockDomain, resources: &[SignalBundle]) -> Result<Unit>;

    /// Region on the main bus, if the peripheral is a bus slave.
    fn bus_region(&self) -> Option<RegionRequest> {
        None
    }

    fn bus_region_size(&self) -> Option<u64> {
        self.bus_region().map(|r| r.size)
    }

    /// Registers to expose in the CSR space.
    fn csr_registers(&self) -> Vec<CsrRegister> {
        Vec::new()
    }

    /// Total declared CSR width in bits.
    fn csr_register_width(&self) -> u32 {
        self.csr_registers().iter().map(|r| r.width_bits * r.count).sum()
    }

    /// Bus master endpoint, if the peripheral initiates transactions.
    fn bus_master(&self) -> Option<BusMaster> {
        None
    }

    fn is_bus_master(&self) -> bool {
        self.bus_master().is_some()
    }
}
