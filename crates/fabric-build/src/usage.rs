//! Utilization of board pins, CSR space and main memory.

use std::fmt;

use fabric_boards::Board;
use fabric_core::ElaboratedDesign;

/// Usage of a single resource.
#[derive(Debug, Clone)]
pub struct Usage {
    /// Resource name (e.g., "pins", "csr locations").
    pub name: String,
    pub used: u64,
    pub available: u64,
    /// Unit label for display.
    pub unit: &'static str,
    /// Usage as a percentage.
    pub percent: f64,
}

impl Usage {
    fn new(name: &str, used: u64, available: u64, unit: &'static str) -> Self {
        let percent = if available > 0 {
            (used as f64 / available as f64) * 100.0
        } else {
            0.0
        };
        Self {
            name: name.into(),
            used,
            available,
            unit,
            percent,
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} {} ({:.1}%)",
            self.name, self.used, self.available, self.unit, self.percent
        )
    }
}

/// Utilization report for one elaboration.
#[derive(Debug, Clone)]
pub struct UsageReport {
    pub pins: Usage,
    pub csr_locations: Usage,
    /// Main memory mapped versus module capacity.
    pub main_ram: Option<Usage>,
    /// Declared resources nobody claimed, as `name:index`.
    pub unclaimed: Vec<String>,
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Resource Report ===")?;
        writeln!(f, "  {}", self.pins)?;
        writeln!(f, "  {}", self.csr_locations)?;
        if let Some(ref ram) = self.main_ram {
            writeln!(f, "  {ram}")?;
        }
        if !self.unclaimed.is_empty() {
            writeln!(f, "  Unclaimed: {}", self.unclaimed.join(", "))?;
        }
        Ok(())
    }
}

/// Measure how much of the board an elaborated design uses.
pub fn usage_report(design: &ElaboratedDesign, board: &Board) -> UsageReport {
    let declared_pins: usize = board.io.iter().map(|d| d.pin_count()).sum();
    let pins = Usage::new("pins", design.pin_count() as u64, declared_pins as u64, "pins");

    let csr_locations = Usage::new(
        "csr locations",
        design.bus.banks.len() as u64,
        design.bus.layout.locations as u64,
        "locations",
    );

    let main_ram = match (design.bus.region("main_ram"), &board.memory) {
        (Some(region), Some(memory)) => memory
            .capacity_bytes()
            .map(|capacity| Usage::new("main_ram", region.size, capacity, "bytes")),
        _ => None,
    };

    let unclaimed = board
        .io
        .iter()
        .map(|d| d.id())
        .filter(|id| !design.claims.iter().any(|c| &c.resource == id))
        .map(|id| id.to_string())
        .collect();

    UsageReport {
        pins,
        csr_locations,
        main_ram,
        unclaimed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_core::{elaborate, Slot, SocConfig};

    #[test]
    fn full_au_design() {
        let board = Board::alchitry_au();
        let design = elaborate(&board, &SocConfig::for_board(&board)).unwrap();
        let report = usage_report(&design, &board);
        assert_eq!(report.csr_locations.used, 6);
        assert_eq!(report.csr_locations.available, 32);
        let ram = report.main_ram.as_ref().unwrap();
        assert_eq!(ram.used, ram.available);
        assert!(report.unclaimed.is_empty());
        assert_eq!(report.pins.used, report.pins.available);
    }

    #[test]
    fn partial_design_lists_unclaimed() {
        let board = Board::mojo_v3();
        let config = SocConfig::for_board(&board).with_order(vec![Slot::Bridge]);
        let design = elaborate(&board, &config).unwrap();
        let report = usage_report(&design, &board);
        assert!(report.main_ram.is_none());
        assert!(report.unclaimed.iter().any(|r| r.starts_with("user_led")));
        assert!(report.pins.percent < 100.0);
        let text = report.to_string();
        assert!(text.contains("=== Resource Report ==="));
        assert!(text.contains("Unclaimed:"));
    }
}
