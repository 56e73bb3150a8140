//! CSR map artifacts for host-side register access.
//!
//! Two renderings of the same table: a LiteX-compatible CSV (`csr_base`,
//! `csr_register`, `constant`, `memory_region` rows) and a JSON document that
//! also carries a SHA-256 fingerprint of the register layout.

use std::fmt;

use fabric_core::{CsrAccess, ElaboratedDesign};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One placed register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CsrRow {
    pub peripheral: String,
    pub name: String,
    /// Offset from the CSR window base.
    pub offset: u64,
    pub address: u64,
    pub width: u32,
    /// Number of CSR words the register spans.
    pub words: u32,
    pub access: CsrAccess,
}

/// Base address of one peripheral's CSR location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CsrBase {
    pub peripheral: String,
    pub location: usize,
    pub address: u64,
}

/// A mapped region of the main bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoryRow {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub cached: bool,
}

/// The serialized CSR map of one elaboration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CsrMap {
    pub board: String,
    pub ident: String,
    /// Hex SHA-256 of the register layout. Equal fingerprints mean no
    /// register moved between two builds.
    pub fingerprint: String,
    pub csr_base: u64,
    pub data_width: u32,
    pub bases: Vec<CsrBase>,
    pub registers: Vec<CsrRow>,
    pub constants: Vec<(String, String)>,
    pub memories: Vec<MemoryRow>,
}

impl CsrMap {
    /// Collect the CSR map of a finalized design.
    pub fn from_design(design: &ElaboratedDesign) -> Result<Self> {
        let bus = &design.bus;
        Ok(Self {
            board: design.board.clone(),
            ident: design.ident.clone(),
            fingerprint: bus.csr_fingerprint()?,
            csr_base: bus.layout.base,
            data_width: bus.layout.data_width,
            bases: bus
                .banks
                .iter()
                .map(|b| CsrBase {
                    peripheral: b.peripheral.clone(),
                    location: b.location,
                    address: b.address,
                })
                .collect(),
            registers: bus
                .entries()
                .map(|e| CsrRow {
                    peripheral: e.peripheral.clone(),
                    name: e.name.clone(),
                    offset: e.offset,
                    address: e.address,
                    width: e.width_bits,
                    words: e.words,
                    access: e.access,
                })
                .collect(),
            constants: design.constants(),
            memories: bus
                .regions
                .iter()
                .map(|r| MemoryRow {
                    name: r.name.clone(),
                    base: r.base,
                    size: r.size,
                    cached: r.cached,
                })
                .collect(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Registers of one peripheral, in address order.
    pub fn registers_of<'a>(&'a self, peripheral: &'a str) -> impl Iterator<Item = &'a CsrRow> {
        self.registers
            .iter()
            .filter(move |r| r.peripheral == peripheral)
    }

    /// Render the LiteX-style CSV table.
    pub fn to_csv(&self) -> String {
        let rule = "#".to_string() + &"-".repeat(80);
        let mut out = String::new();
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!(
            "# Auto-generated by fabric {} for {}\n",
            env!("CARGO_PKG_VERSION"),
            self.board
        ));
        out.push_str(&rule);
        out.push('\n');
        for base in &self.bases {
            out.push_str(&format!(
                "csr_base,{},0x{:08x},,\n",
                base.peripheral, base.address
            ));
        }
        for reg in &self.registers {
            out.push_str(&format!(
                "csr_register,{},0x{:08x},{},{}\n",
                reg.name, reg.address, reg.words, reg.access
            ));
        }
        for (name, value) in &self.constants {
            out.push_str(&format!("constant,{name},{value},,\n"));
        }
        for mem in &self.memories {
            out.push_str(&format!(
                "memory_region,{},0x{:08x},{},{}\n",
                mem.name,
                mem.base,
                mem.size,
                if mem.cached { "cached" } else { "io" }
            ));
        }
        out
    }
}

impl fmt::Display for CsrMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== CSR Map ===")?;
        writeln!(f, "Board: {}", self.board)?;
        writeln!(f, "Base:  0x{:08X} ({}-bit)", self.csr_base, self.data_width)?;
        writeln!(f, "Fingerprint: {}", self.fingerprint)?;
        for base in &self.bases {
            writeln!(f)?;
            writeln!(
                f,
                "--- [{}] {} @ 0x{:08X} ---",
                base.location, base.peripheral, base.address
            )?;
            for reg in self.registers_of(&base.peripheral) {
                writeln!(
                    f,
                    "  0x{:08X}  {:<32} {:>3} bits  {}",
                    reg.address, reg.name, reg.width, reg.access
                )?;
            }
        }
        if !self.memories.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Memory Regions ---")?;
            for mem in &self.memories {
                writeln!(
                    f,
                    "  {:<10} 0x{:08X}  size 0x{:X}{}",
                    mem.name,
                    mem.base,
                    mem.size,
                    if mem.cached { " (cached)" } else { "" }
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_boards::Board;
    use fabric_core::{elaborate, SocConfig};

    fn au_map() -> CsrMap {
        let board = Board::alchitry_au();
        let design = elaborate(&board, &SocConfig::for_board(&board)).unwrap();
        CsrMap::from_design(&design).unwrap()
    }

    #[test]
    fn csv_rows() {
        let csv = au_map().to_csv();
        assert!(csv.contains("csr_base,ctrl,0x82000000,,\n"));
        assert!(csv.contains("csr_register,ctrl_scratch,0x82000004,1,rw\n"));
        assert!(csv.contains("csr_register,ctrl_bus_errors,0x82000008,1,ro\n"));
        assert!(csv.contains("constant,config_clock_frequency,83333333,,\n"));
        assert!(csv.contains("memory_region,main_ram,0x40000000,268435456,cached\n"));
        assert!(csv.contains("memory_region,csr,0x82000000,65536,io\n"));
    }

    #[test]
    fn bases_precede_registers() {
        let csv = au_map().to_csv();
        let last_base = csv.rfind("csr_base,").unwrap();
        let first_reg = csv.find("csr_register,").unwrap();
        assert!(last_base < first_reg);
    }

    #[test]
    fn json_roundtrip_keeps_fingerprint() {
        let map = au_map();
        let back = CsrMap::from_json(&map.to_json().unwrap()).unwrap();
        assert_eq!(back, map);
        assert_eq!(back.fingerprint.len(), 64);
    }

    #[test]
    fn reorder_changes_fingerprint() {
        let board = Board::alchitry_au();
        let config = SocConfig::for_board(&board).with_order(vec![
            fabric_core::Slot::Bridge,
            fabric_core::Slot::Status,
            fabric_core::Slot::Dram,
            fabric_core::Slot::Identification,
        ]);
        let reordered = CsrMap::from_design(&elaborate(&board, &config).unwrap()).unwrap();
        assert_ne!(reordered.fingerprint, au_map().fingerprint);
    }

    #[test]
    fn table_lists_every_peripheral() {
        let table = au_map().to_string();
        assert!(table.contains("=== CSR Map ==="));
        for p in ["ctrl", "identifier", "ddrphy", "sdram", "dna", "leds"] {
            assert!(table.contains(&format!("] {p} @")), "missing {p}");
        }
    }
}
