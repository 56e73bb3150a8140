//! The elaborated design graph.
//!
//! Units are the instantiated blocks of the design (the clock generator,
//! the bus interconnect, each peripheral); connections record how they are
//! wired (clock, reset, bus, CSR, pins). Unit ids are UUID v5 values derived
//! from the unit name so that repeated elaborations produce identical graphs.

use std::collections::BTreeMap;
use std::fmt;

use fabric_boards::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::hash::{content_hash, hash_hex};

/// Unit identifier, derived from the unit name.
pub type UnitId = Uuid;

/// Errors that can occur while building or serializing the design graph.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("duplicate unit: '{0}'")]
    DuplicateUnit(String),

    #[error("unit not found: '{0}'")]
    UnitNotFound(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The kind of block a unit instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    ClockGenerator,
    ResetSynchronizer,
    DelayCalibration,
    ClockForward,
    Interconnect,
    CsrBridge,
    SystemController,
    Identifier,
    BusMaster,
    MemoryPhy,
    MemoryController,
    Identification,
    Status,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::ClockGenerator => "clock-generator",
            UnitKind::ResetSynchronizer => "reset-synchronizer",
            UnitKind::DelayCalibration => "delay-calibration",
            UnitKind::ClockForward => "clock-forward",
            UnitKind::Interconnect => "interconnect",
            UnitKind::CsrBridge => "csr-bridge",
            UnitKind::SystemController => "system-controller",
            UnitKind::Identifier => "identifier",
            UnitKind::BusMaster => "bus-master",
            UnitKind::MemoryPhy => "memory-phy",
            UnitKind::MemoryController => "memory-controller",
            UnitKind::Identification => "identification",
            UnitKind::Status => "status",
        };
        write!(f, "{s}")
    }
}

/// A top-level port of a unit bound to a physical signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port name on the unit (e.g., "tx", "dq").
    pub name: String,
    /// Top-level signal the port is bound to.
    pub signal: String,
    pub width: usize,
    pub direction: Direction,
}

/// An instantiated block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub kind: UnitKind,
    /// Primary clock domain, if clocked.
    pub domain: Option<String>,
    pub ports: Vec<Port>,
    /// Pass-through parameters for the block implementation.
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl Unit {
    /// Create a unit with an id derived from its name.
    pub fn new(name: &str, kind: UnitKind) -> Self {
        Self {
            id: unit_id(name),
            name: name.into(),
            kind,
            domain: None,
            ports: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// Clock the unit from a domain.
    pub fn in_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    /// Attach a parameter.
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }
}

/// Derive a unit id from its name.
pub fn unit_id(name: &str) -> UnitId {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("fabric.unit.{name}").as_bytes())
}

/// How two units are wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionKind {
    /// Clock of the named domain.
    Clock(String),
    /// Reset of the named domain.
    Reset(String),
    /// Address-mapped bus port.
    Bus,
    /// Control/status register port.
    Csr,
    /// Memory PHY interface.
    Dfi,
}

/// A directed connection between two units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: UnitId,
    pub to: UnitId,
    pub kind: ConnectionKind,
}

/// Fully wired design produced by one elaboration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignGraph {
    units: Vec<Unit>,
    connections: Vec<Connection>,
}

impl DesignGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a unit. Unit names are unique.
    pub fn add_unit(&mut self, unit: Unit) -> Result<UnitId, DesignError> {
        if self.units.iter().any(|u| u.name == unit.name) {
            return Err(DesignError::DuplicateUnit(unit.name));
        }
        let id = unit.id;
        self.units.push(unit);
        Ok(id)
    }

    /// Wire two units by name.
    pub fn connect(&mut self, from: &str, to: &str, kind: ConnectionKind) -> Result<(), DesignError> {
        let from = self.require(from)?.id;
        let to = self.require(to)?.id;
        self.connections.push(Connection { from, to, kind });
        Ok(())
    }

    fn require(&self, name: &str) -> Result<&Unit, DesignError> {
        self.unit(name)
            .ok_or_else(|| DesignError::UnitNotFound(name.into()))
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Units in insertion order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections leaving a unit.
    pub fn connections_from(&self, name: &str) -> Vec<&Connection> {
        match self.unit(name) {
            Some(unit) => self
                .connections
                .iter()
                .filter(|c| c.from == unit.id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Connections entering a unit.
    pub fn connections_to(&self, name: &str) -> Vec<&Connection> {
        match self.unit(name) {
            Some(unit) => self.connections.iter().filter(|c| c.to == unit.id).collect(),
            None => Vec::new(),
        }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, DesignError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DesignError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Hex SHA-256 fingerprint of the graph.
    pub fn fingerprint(&self) -> Result<String, DesignError> {
        Ok(hash_hex(&content_hash(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_ids_are_name_derived() {
        let a = Unit::new("sdram", UnitKind::MemoryController);
        let b = Unit::new("sdram", UnitKind::MemoryController);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, Unit::new("dna", UnitKind::Identification).id);
    }

    #[test]
    fn duplicate_unit_rejected() {
        let mut g = DesignGraph::new();
        g.add_unit(Unit::new("crg", UnitKind::ClockGenerator)).unwrap();
        assert!(matches!(
            g.add_unit(Unit::new("crg", UnitKind::ClockGenerator)),
            Err(DesignError::DuplicateUnit(_))
        ));
    }

    #[test]
    fn connect_and_query() {
        let mut g = DesignGraph::new();
        g.add_unit(Unit::new("crg", UnitKind::ClockGenerator)).unwrap();
        g.add_unit(Unit::new("leds", UnitKind::Status).in_domain("sys"))
            .unwrap();
        g.connect("crg", "leds", ConnectionKind::Clock("sys".into()))
            .unwrap();
        assert_eq!(g.connections_from("crg").len(), 1);
        assert_eq!(g.connections_to("leds").len(), 1);
        assert!(matches!(
            g.connect("crg", "nope", ConnectionKind::Bus),
            Err(DesignError::UnitNotFound(_))
        ));
    }

    #[test]
    fn json_round_trip_and_fingerprint() {
        let mut g = DesignGraph::new();
        g.add_unit(
            Unit::new("bridge", UnitKind::BusMaster)
                .in_domain("sys")
                .with_param("baudrate", 115_200),
        )
        .unwrap();
        let json = g.to_json().unwrap();
        let back = DesignGraph::from_json(&json).unwrap();
        assert_eq!(g, back);
        assert_eq!(g.fingerprint().unwrap(), back.fingerprint().unwrap());
    }
}
