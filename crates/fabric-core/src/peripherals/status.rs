//! LED status core: one storage register driving the user LEDs.

use crate::bus::CsrRegister;
use crate::clocking::ClockDomain;
use crate::design::{Unit, UnitKind};
use crate::error::Result;
use crate::peripheral::{Peripheral, ResourceRequest};
use crate::platform::SignalBundle;

use super::{bundle_at, port};

#[derive(Debug, Clone)]
pub struct LedStatus {
    count: u32,
}

impl LedStatus {
    /// Drive `count` LEDs, claimed lowest index first.
    pub fn new(count: u32) -> Self {
        Self { count }
    }
}

impl Peripheral for LedStatus {
    fn name(&self) -> &str {
        "leds"
    }

    fn declared_resources(&self) -> Vec<ResourceRequest> {
        (0..self.count)
            .map(|_| ResourceRequest::new("user_led", None))
            .collect()
    }

    fn bind(&self, domain: &ClockDomain, resources: &[SignalBundle]) -> Result<Unit> {
        let mut unit = Unit::new(self.name(), UnitKind::Status)
            .in_domain(&domain.name)
            .with_param("count", self.count);
        for i in 0..self.count as usize {
            let led = bundle_at(resources, i, "user_led")?;
            if let Some(signal) = led.primary() {
                unit = unit.with_port(port(&format!("led{i}"), signal));
            }
        }
        Ok(unit)
    }

    fn csr_registers(&self) -> Vec<CsrRegister> {
        vec![CsrRegister::storage("out", self.count)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocking::ResetPolicy;
    use crate::platform::Platform;
    use fabric_boards::Board;

    #[test]
    fn claims_every_led() {
        let board = Board::alchitry_au();
        let mut platform = Platform::new(&board).unwrap();
        let leds = LedStatus::new(8);
        let bundles: Vec<_> = leds
            .declared_resources()
            .iter()
            .map(|r| platform.request("leds", &r.name, r.index).unwrap())
            .collect();
        let domain = ClockDomain {
            name: "sys".into(),
            frequency_hz: 83_333_333,
            requested_hz: 83_333_333,
            phase_deg: 0,
            reset_policy: ResetPolicy::Synchronous,
            reset_signal: Some("sys_rst".into()),
        };
        let unit = leds.bind(&domain, &bundles).unwrap();
        assert_eq!(unit.ports.len(), 8);
        assert_eq!(unit.ports[7].signal, "user_led7");
        assert_eq!(leds.csr_register_width(), 8);
        assert!(platform.unclaimed().iter().all(|id| id.name != "user_led"));
    }

    #[test]
    fn too_few_resources() {
        let leds = LedStatus::new(2);
        let domain = ClockDomain {
            name: "sys".into(),
            frequency_hz: 1,
            requested_hz: 1,
            phase_deg: 0,
            reset_policy: ResetPolicy::Synchronous,
            reset_signal: None,
        };
        assert!(leds.bind(&domain, &[]).is_err());
    }
}
