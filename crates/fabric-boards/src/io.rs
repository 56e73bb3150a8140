//! Physical I/O resource declarations.
//!
//! A resource is a named pin or pin group on the board (a clock input, an
//! LED, a serial port, a DRAM bus). Resources are identified by
//! `(name, index)` and are immutable once declared.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Signal direction as seen from the FPGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Input,
    Output,
    #[default]
    InOut,
}

/// Identity of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource name (e.g., "user_led", "serial").
    pub name: String,
    /// Resource index within its name (e.g., LED 0..7).
    pub index: u32,
}

impl ResourceId {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.index)
    }
}

/// A named part of a composite resource (e.g., `tx` of `serial`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Subsignal {
    /// Subsignal name (e.g., "tx", "dq", "ras_n").
    pub name: String,
    /// Package pins, LSB first.
    pub pins: Vec<String>,
    /// Electrical standard override for this subsignal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_standard: Option<String>,
    /// Direction of this subsignal.
    #[serde(default)]
    pub direction: Direction,
    /// Extra placement attributes (e.g., "IN_TERM=UNTUNED_SPLIT_50").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misc: Vec<String>,
}

impl Subsignal {
    /// Create a subsignal from a whitespace-separated pin list.
    pub fn new(name: impl Into<String>, pins: &str) -> Self {
        Self {
            name: name.into(),
            pins: split_pins(pins),
            io_standard: None,
            direction: Direction::InOut,
            misc: Vec::new(),
        }
    }

    /// Override the electrical standard.
    pub fn with_standard(mut self, standard: impl Into<String>) -> Self {
        self.io_standard = Some(standard.into());
        self
    }

    /// Set the direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Append a placement attribute.
    pub fn with_misc(mut self, misc: impl Into<String>) -> Self {
        self.misc.push(misc.into());
        self
    }
}

/// A declared physical resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceDecl {
    /// Resource name.
    pub name: String,
    /// Index within the name.
    pub index: u32,
    /// Pins of a single-signal resource (empty for composite resources).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pins: Vec<String>,
    /// Subsignals of a composite resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsignals: Vec<Subsignal>,
    /// Electrical standard (e.g., "LVCMOS33", "SSTL135").
    pub io_standard: String,
    /// Direction of a single-signal resource.
    #[serde(default)]
    pub direction: Direction,
    /// Extra placement attributes applied to every pin.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misc: Vec<String>,
}

impl ResourceDecl {
    /// Declare a single-signal resource from a whitespace-separated pin list.
    pub fn single(name: impl Into<String>, index: u32, pins: &str, standard: &str) -> Self {
        Self {
            name: name.into(),
            index,
            pins: split_pins(pins),
            subsignals: Vec::new(),
            io_standard: standard.into(),
            direction: Direction::InOut,
            misc: Vec::new(),
        }
    }

    /// Declare a composite resource made of subsignals.
    pub fn composite(
        name: impl Into<String>,
        index: u32,
        standard: &str,
        subsignals: Vec<Subsignal>,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            pins: Vec::new(),
            subsignals,
            io_standard: standard.into(),
            direction: Direction::InOut,
            misc: Vec::new(),
        }
    }

    /// Set the direction of a single-signal resource.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Append a placement attribute applied to the whole resource.
    pub fn with_misc(mut self, misc: impl Into<String>) -> Self {
        self.misc.push(misc.into());
        self
    }

    /// The `(name, index)` identity of this resource.
    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.name.clone(), self.index)
    }

    /// Whether this resource is made of subsignals.
    pub fn is_composite(&self) -> bool {
        !self.subsignals.is_empty()
    }

    /// Look up a subsignal by name.
    pub fn subsignal(&self, name: &str) -> Option<&Subsignal> {
        self.subsignals.iter().find(|s| s.name == name)
    }

    /// Every package pin this resource occupies.
    pub fn all_pins(&self) -> impl Iterator<Item = &str> {
        self.pins
            .iter()
            .chain(self.subsignals.iter().flat_map(|s| s.pins.iter()))
            .map(String::as_str)
    }

    /// Total number of package pins.
    pub fn pin_count(&self) -> usize {
        self.all_pins().count()
    }
}

fn split_pins(pins: &str) -> Vec<String> {
    pins.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_resource_pins() {
        let led = ResourceDecl::single("user_led", 3, "L13", "LVCMOS33");
        assert_eq!(led.id(), ResourceId::new("user_led", 3));
        assert_eq!(led.pin_count(), 1);
        assert!(!led.is_composite());
    }

    #[test]
    fn composite_resource_pins() {
        let serial = ResourceDecl::composite(
            "serial",
            0,
            "LVCMOS33",
            vec![Subsignal::new("tx", "P16"), Subsignal::new("rx", "P15")],
        );
        assert!(serial.is_composite());
        assert_eq!(serial.all_pins().collect::<Vec<_>>(), vec!["P16", "P15"]);
        assert!(serial.subsignal("rx").is_some());
        assert!(serial.subsignal("cts").is_none());
    }

    #[test]
    fn multi_pin_split() {
        let sub = Subsignal::new("ba", "E13 F15  E15");
        assert_eq!(sub.pins, vec!["E13", "F15", "E15"]);
    }

    #[test]
    fn resource_id_ordering_and_display() {
        let a = ResourceId::new("user_led", 0);
        let b = ResourceId::new("user_led", 1);
        assert!(a < b);
        assert_eq!(b.to_string(), "user_led:1");
    }
}
