//! FPGA device model.
//!
//! Identifies the part on the board, its silicon family, and the limits of
//! the family's phase-locked loop, which bound what clock domains can be
//! derived from the reference oscillator.

use serde::{Deserialize, Serialize};

/// Silicon family of the FPGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceFamily {
    /// Xilinx Spartan-6 (PLL_BASE).
    Spartan6,
    /// Xilinx 7-series Artix (PLLE2_BASE).
    Artix7,
}

/// Vendor toolchain used to turn an elaborated design into a bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Toolchain {
    /// Xilinx ISE (xst/ngdbuild/map/par/bitgen).
    Ise,
    /// Xilinx Vivado.
    Vivado,
}

/// Operating limits of a PLL primitive.
///
/// Divider and multiplier ranges are inclusive. The VCO range depends on
/// the speed grade; output frequencies within `margin_ppm` of the request
/// are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PllLimits {
    /// Primitive name (e.g., "PLLE2_BASE").
    pub primitive: String,
    /// Maximum number of clock outputs.
    pub max_outputs: usize,
    /// Accepted input frequency range in Hz.
    pub clkin_hz: (u64, u64),
    /// Input (reference) divider range.
    pub divclk: (u32, u32),
    /// Feedback multiplier range.
    pub mult: (u32, u32),
    /// VCO frequency range in Hz.
    pub vco_hz: (u64, u64),
    /// Output divider range.
    pub clkout_div: (u32, u32),
    /// Accepted relative frequency error in parts per million.
    pub margin_ppm: u64,
}

impl PllLimits {
    /// Spartan-6 PLL_BASE limits for the given speed grade.
    pub fn spartan6(speedgrade: i32) -> Self {
        let vco_max = if speedgrade <= -3 {
            1_080_000_000
        } else {
            1_000_000_000
        };
        Self {
            primitive: "PLL_BASE".into(),
            max_outputs: 6,
            clkin_hz: (19_000_000, 540_000_000),
            divclk: (1, 52),
            mult: (1, 64),
            vco_hz: (400_000_000, vco_max),
            clkout_div: (1, 128),
            margin_ppm: 10_000,
        }
    }

    /// Artix-7 PLLE2_BASE limits for the given speed grade.
    pub fn artix7(speedgrade: i32) -> Self {
        let vco_max = match speedgrade {
            -3 => 2_133_000_000,
            -2 => 1_866_000_000,
            _ => 1_600_000_000,
        };
        Self {
            primitive: "PLLE2_BASE".into(),
            max_outputs: 6,
            clkin_hz: (19_000_000, 800_000_000),
            divclk: (1, 56),
            mult: (2, 64),
            vco_hz: (800_000_000, vco_max),
            clkout_div: (1, 128),
            margin_ppm: 10_000,
        }
    }
}

/// Model of the FPGA mounted on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceModel {
    /// Full part number (e.g., "xc7a35t-ftg256-1").
    pub part: String,
    /// Silicon family.
    pub family: DeviceFamily,
    /// Speed grade (negative, as printed on the part).
    pub speedgrade: i32,
    /// Toolchain that builds bitstreams for this part.
    pub toolchain: Toolchain,
}

impl DeviceModel {
    /// PLL limits for this part.
    pub fn pll_limits(&self) -> PllLimits {
        match self.family {
            DeviceFamily::Spartan6 => PllLimits::spartan6(self.speedgrade),
            DeviceFamily::Artix7 => PllLimits::artix7(self.speedgrade),
        }
    }

    /// Whether the family has an input-delay calibration block (IDELAYCTRL).
    pub fn has_idelayctrl(&self) -> bool {
        matches!(self.family, DeviceFamily::Artix7)
    }

    /// Xilinx Artix-7 35T in FTG256, speed grade -1.
    pub fn xc7a35t_ftg256_1() -> Self {
        Self {
            part: "xc7a35t-ftg256-1".into(),
            family: DeviceFamily::Artix7,
            speedgrade: -1,
            toolchain: Toolchain::Vivado,
        }
    }

    /// Xilinx Spartan-6 LX9 in TQG144, speed grade -2.
    pub fn xc6slx9_2_tqg144() -> Self {
        Self {
            part: "xc6slx9-2-tqg144".into(),
            family: DeviceFamily::Spartan6,
            speedgrade: -2,
            toolchain: Toolchain::Ise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artix7_speedgrades() {
        assert_eq!(PllLimits::artix7(-1).vco_hz.1, 1_600_000_000);
        assert_eq!(PllLimits::artix7(-2).vco_hz.1, 1_866_000_000);
        assert_eq!(PllLimits::artix7(-3).vco_hz.1, 2_133_000_000);
        assert_eq!(PllLimits::artix7(-1).mult.0, 2);
    }

    #[test]
    fn spartan6_limits() {
        let limits = PllLimits::spartan6(-2);
        assert_eq!(limits.primitive, "PLL_BASE");
        assert_eq!(limits.vco_hz, (400_000_000, 1_000_000_000));
        assert_eq!(limits.max_outputs, 6);
    }

    #[test]
    fn device_dispatch() {
        let au = DeviceModel::xc7a35t_ftg256_1();
        assert_eq!(au.pll_limits().primitive, "PLLE2_BASE");
        assert!(au.has_idelayctrl());

        let mojo = DeviceModel::xc6slx9_2_tqg144();
        assert_eq!(mojo.toolchain, Toolchain::Ise);
        assert!(!mojo.has_idelayctrl());
    }
}
