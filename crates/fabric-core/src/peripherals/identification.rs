//! Device identification core: exposes the FPGA's factory-programmed DNA.

use fabric_boards::DeviceFamily;

use crate::bus::CsrRegister;
use crate::clocking::ClockDomain;
use crate::design::{Unit, UnitKind};
use crate::error::Result;
use crate::peripheral::Peripheral;
use crate::platform::SignalBundle;

/// Width of the device DNA value in bits.
pub const DNA_WIDTH: u32 = 57;

#[derive(Debug, Clone)]
pub struct DeviceDna {
    family: DeviceFamily,
}

impl DeviceDna {
    pub fn new(family: DeviceFamily) -> Self {
        Self { family }
    }
}

impl Peripheral for DeviceDna {
    fn name(&self) -> &str {
        "dna"
    }

    fn bind(&self, domain: &ClockDomain, _resources: &[SignalBundle]) -> Result<Unit> {
        let family = match self.family {
            DeviceFamily::Spartan6 => "spartan6",
            DeviceFamily::Artix7 => "artix7",
        };
        Ok(Unit::new(self.name(), UnitKind::Identification)
            .in_domain(&domain.name)
            .with_param("primitive", "DNA_PORT")
            .with_param("family", family)
            .with_param("width", DNA_WIDTH))
    }

    fn csr_registers(&self) -> Vec<CsrRegister> {
        vec![CsrRegister::status("id", DNA_WIDTH)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dna_is_a_status_register() {
        let dna = DeviceDna::new(DeviceFamily::Artix7);
        let regs = dna.csr_registers();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].words(32), 2);
        assert!(dna.declared_resources().is_empty());
        assert!(dna.bus_region().is_none());
    }
}
