//! UART-to-bus register bridge: the SoC's single bus master.

use crate::bus::BusMaster;
use crate::clocking::ClockDomain;
use crate::design::{Unit, UnitKind};
use crate::error::Result;
use crate::peripheral::{Peripheral, ResourceRequest};
use crate::platform::SignalBundle;

use super::{bundle_at, port, subsignal};

/// Host register access over a serial link.
#[derive(Debug, Clone)]
pub struct RegisterBridge {
    baudrate: u32,
}

impl RegisterBridge {
    pub fn new(baudrate: u32) -> Self {
        Self { baudrate }
    }

    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    /// Phase accumulator increment for the serial PHY at `clk_hz`.
    pub fn tuning_word(&self, clk_hz: u64) -> u64 {
        if clk_hz == 0 {
            return 0;
        }
        ((u128::from(self.baudrate) << 32) / u128::from(clk_hz)) as u64
    }
}

impl Peripheral for RegisterBridge {
    fn name(&self) -> &str {
        "bridge"
    }

    fn declared_resources(&self) -> Vec<ResourceRequest> {
        vec![ResourceRequest::new("serial", None)]
    }

    fn bind(&self, domain: &ClockDomain, resources: &[SignalBundle]) -> Result<Unit> {
        let serial = bundle_at(resources, 0, "serial")?;
        let tx = subsignal(serial, "tx")?;
        let rx = subsignal(serial, "rx")?;
        Ok(Unit::new(self.name(), UnitKind::BusMaster)
            .in_domain(&domain.name)
            .with_port(port("tx", tx))
            .with_port(port("rx", rx))
            .with_param("baudrate", self.baudrate)
            .with_param("tuning_word", self.tuning_word(domain.frequency_hz)))
    }

    fn bus_master(&self) -> Option<BusMaster> {
        Some(BusMaster {
            name: self.name().into(),
            transport: "uart".into(),
            data_width: 32,
        })
    }
}
