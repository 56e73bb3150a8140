//! System CSR peripherals present in every SoC: the controller and the
//! identifier memory.

use crate::bus::CsrRegister;
use crate::clocking::ClockDomain;
use crate::design::{Unit, UnitKind};
use crate::error::Result;
use crate::peripheral::Peripheral;
use crate::platform::SignalBundle;

/// Reset value of the scratch register, readable to check CSR access.
pub const SCRATCH_RESET: u32 = 0x1234_5678;

/// Soft reset, scratch register and bus error counter.
#[derive(Debug, Clone, Default)]
pub struct SocController;

impl Peripheral for SocController {
    fn name(&self) -> &str {
        "ctrl"
    }

    fn bind(&self, domain: &ClockDomain, _resources: &[SignalBundle]) -> Result<Unit> {
        Ok(Unit::new(self.name(), UnitKind::SystemController)
            .in_domain(&domain.name)
            .with_param("scratch_reset", SCRATCH_RESET))
    }

    fn csr_registers(&self) -> Vec<CsrRegister> {
        vec![
            CsrRegister::storage("reset", 1),
            CsrRegister::storage("scratch", 32),
            CsrRegister::status("bus_errors", 32),
        ]
    }
}

/// Read-only memory holding the NUL-terminated SoC identifier string.
#[derive(Debug, Clone)]
pub struct Identifier {
    ident: String,
}

impl Identifier {
    /// Identifier text, optionally suffixed with a version.
    pub fn new(ident: &str, version: Option<&str>) -> Self {
        let ident = match version {
            Some(v) => format!("{ident} {v}"),
            None => ident.to_string(),
        };
        Self { ident }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }
}

impl Peripheral for Identifier {
    fn name(&self) -> &str {
        "identifier"
    }

    fn bind(&self, domain: &ClockDomain, _resources: &[SignalBundle]) -> Result<Unit> {
        Ok(Unit::new(self.name(), UnitKind::Identifier)
            .in_domain(&domain.name)
            .with_param("ident", self.ident.as_str()))
    }

    fn csr_registers(&self) -> Vec<CsrRegister> {
        vec![CsrRegister::memory("mem", 8, self.ident.len() as u32 + 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocking::ResetPolicy;

    fn sys() -> ClockDomain {
        ClockDomain {
            name: "sys".into(),
            frequency_hz: 83_333_333,
            requested_hz: 83_333_333,
            phase_deg: 0,
            reset_policy: ResetPolicy::Synchronous,
            reset_signal: Some("sys_rst".into()),
        }
    }

    #[test]
    fn controller_registers() {
        let ctrl = SocController;
        let names: Vec<String> = ctrl.csr_registers().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["reset", "scratch", "bus_errors"]);
        assert_eq!(ctrl.csr_register_width(), 65);
        assert!(!ctrl.is_bus_master());
    }

    #[test]
    fn identifier_depth_includes_terminator() {
        let id = Identifier::new("Mojo V3 SoC", None);
        assert_eq!(id.csr_registers()[0].count, 12);
        let versioned = Identifier::new("Mojo V3 SoC", Some("v0.1.0"));
        assert_eq!(versioned.ident(), "Mojo V3 SoC v0.1.0");
        let unit = versioned.bind(&sys(), &[]).unwrap();
        assert_eq!(
            unit.param("ident").and_then(|v| v.as_str()),
            Some("Mojo V3 SoC v0.1.0")
        );
    }
}
