//! DRAM model: module geometry and the PHY that drives it.
//!
//! These are pass-through parameters for the DRAM controller; the
//! elaboration engine validates them against each other but never derives
//! them.

use serde::{Deserialize, Serialize};

/// DRAM technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryType {
    /// Single data rate SDRAM.
    Sdr,
    Ddr3,
}

/// Geometry of a DRAM module (one chip or a set of chips sharing a bus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleGeometry {
    /// Part name (e.g., "AS4C128M16").
    pub name: String,
    /// Technology.
    pub memtype: MemoryType,
    /// Number of banks.
    pub nbanks: u32,
    /// Number of rows per bank.
    pub nrows: u32,
    /// Number of columns per row.
    pub ncols: u32,
    /// Module data width in bits.
    pub data_width: u32,
    /// Controller-to-memory clock ratio (e.g., "1:4").
    pub rate: String,
}

impl ModuleGeometry {
    /// Number of bank address bits.
    pub fn bank_bits(&self) -> u32 {
        log2_floor(self.nbanks)
    }

    /// Number of row address bits.
    pub fn row_bits(&self) -> u32 {
        log2_floor(self.nrows)
    }

    /// Number of column address bits.
    pub fn col_bits(&self) -> u32 {
        log2_floor(self.ncols)
    }

    /// Total bank, row and column address bits.
    pub fn address_bits(&self) -> u32 {
        self.bank_bits() + self.row_bits() + self.col_bits()
    }

    /// Addressable capacity in bytes for a PHY of the given data width, or
    /// `None` if it does not fit in 64 bits.
    pub fn capacity_bytes(&self, phy_data_width: u32) -> Option<u64> {
        let words = 1u64.checked_shl(self.address_bits())?;
        words
            .checked_mul(u64::from(phy_data_width))
            .map(|bits| bits / 8)
    }

    /// Alliance Memory AS4C128M16 (DDR3, 8 banks, 16 bits).
    pub fn as4c128m16() -> Self {
        Self {
            name: "AS4C128M16".into(),
            memtype: MemoryType::Ddr3,
            nbanks: 8,
            nrows: 16384,
            ncols: 1024,
            data_width: 16,
            rate: "1:4".into(),
        }
    }

    /// Micron MT48LC32M8 (SDR, 4 banks, 8 bits).
    pub fn mt48lc32m8() -> Self {
        Self {
            name: "MT48LC32M8".into(),
            memtype: MemoryType::Sdr,
            nbanks: 4,
            nrows: 8192,
            ncols: 1024,
            data_width: 8,
            rate: "1:1".into(),
        }
    }
}

/// PHY implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhyKind {
    /// Generic single data rate PHY.
    GenSdr,
    /// Artix-7 DDR PHY (ISERDES/OSERDES based).
    A7Ddr,
}

impl PhyKind {
    /// Technology this PHY drives.
    pub fn memtype(&self) -> MemoryType {
        match self {
            PhyKind::GenSdr => MemoryType::Sdr,
            PhyKind::A7Ddr => MemoryType::Ddr3,
        }
    }

    /// Whether the PHY exposes its own CSRs (delay taps, resets).
    pub fn has_csrs(&self) -> bool {
        matches!(self, PhyKind::A7Ddr)
    }
}

/// The PHY instance on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhyModel {
    /// PHY implementation.
    pub kind: PhyKind,
    /// Resource name of the memory pins (e.g., "ddram", "sdram").
    pub resource: String,
    /// DQ width in bits.
    pub data_width: u32,
    /// Number of DFI phases.
    pub nphases: u32,
}

impl PhyModel {
    /// Width in bits of the controller-side native port.
    pub fn native_width(&self) -> u32 {
        let rate = match self.kind.memtype() {
            MemoryType::Sdr => 1,
            MemoryType::Ddr3 => 2,
        };
        self.data_width * rate * self.nphases
    }

    /// The module rate string this PHY expects (e.g., "1:4").
    pub fn rate(&self) -> String {
        format!("1:{}", self.nphases)
    }
}

/// DRAM configuration of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoryConfig {
    /// Module geometry.
    pub module: ModuleGeometry,
    /// PHY driving the module.
    pub phy: PhyModel,
    /// Default ceiling for the main memory region in bytes.
    pub default_max_size: u64,
    /// Default cache capacity in bytes.
    pub cache_size: u64,
    /// Default minimum cache data width in bits.
    pub min_cache_width: u32,
}

impl MemoryConfig {
    /// Module capacity with this board's PHY.
    pub fn capacity_bytes(&self) -> Option<u64> {
        self.module.capacity_bytes(self.phy.data_width)
    }
}

fn log2_floor(n: u32) -> u32 {
    if n == 0 {
        0
    } else {
        31 - n.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as4c128m16_capacity() {
        let module = ModuleGeometry::as4c128m16();
        assert_eq!(module.bank_bits(), 3);
        assert_eq!(module.row_bits(), 14);
        assert_eq!(module.col_bits(), 10);
        assert_eq!(module.address_bits(), 27);
        assert_eq!(module.capacity_bytes(16), Some(0x1000_0000));
    }

    #[test]
    fn mt48lc32m8_capacity() {
        let module = ModuleGeometry::mt48lc32m8();
        assert_eq!(module.capacity_bytes(8), Some(0x200_0000));
    }

    #[test]
    fn oversized_geometry_has_no_capacity() {
        let mut module = ModuleGeometry::mt48lc32m8();
        module.nrows = 1 << 30;
        module.ncols = 1 << 30;
        module.nbanks = 1 << 8;
        assert_eq!(module.address_bits(), 68);
        assert_eq!(module.capacity_bytes(8), None);

        // 2^63 words fit the shift but not the width multiply.
        module.nbanks = 1 << 3;
        assert_eq!(module.address_bits(), 63);
        assert_eq!(module.capacity_bytes(16), None);
    }

    #[test]
    fn native_port_widths() {
        let ddr = PhyModel {
            kind: PhyKind::A7Ddr,
            resource: "ddram".into(),
            data_width: 16,
            nphases: 4,
        };
        assert_eq!(ddr.native_width(), 128);
        assert_eq!(ddr.rate(), "1:4");

        let sdr = PhyModel {
            kind: PhyKind::GenSdr,
            resource: "sdram".into(),
            data_width: 8,
            nphases: 1,
        };
        assert_eq!(sdr.native_width(), 8);
        assert_eq!(sdr.kind.memtype(), MemoryType::Sdr);
    }
}
