//! Complete board record.
//!
//! Assembles the device, I/O resources, clock plan, and memory model of one
//! target board. Per-board variation lives here as data so that one generic
//! composition algorithm serves every board.

use serde::{Deserialize, Serialize};

use crate::device::DeviceModel;
use crate::io::{Direction, ResourceDecl, Subsignal};
use crate::memory::{MemoryConfig, ModuleGeometry, PhyKind, PhyModel};

/// The board's reference oscillator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReferenceClock {
    /// Resource name of the clock pin (e.g., "clk100").
    pub resource: String,
    /// Oscillator frequency in Hz.
    pub frequency_hz: u64,
}

impl ReferenceClock {
    /// Oscillator period in nanoseconds.
    pub fn period_ns(&self) -> f64 {
        1e9 / self.frequency_hz as f64
    }
}

/// External reset wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResetInput {
    /// Resource name of the reset button (e.g., "cpu_reset").
    pub resource: String,
    /// Whether the pin is asserted low.
    #[serde(default = "default_true")]
    pub active_low: bool,
    /// Auxiliary active-low pins that also hold the design in reset
    /// (e.g., a configuration microcontroller's "busy" line).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// How a clock output's frequency is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockFrequency {
    /// An integer multiple of the system clock.
    SysMultiple(u32),
    /// A fixed frequency in Hz, independent of the system clock.
    Fixed(u64),
}

/// One entry of the board's clock plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClockOutput {
    /// Clock domain name (e.g., "sys", "sys4x_dqs").
    pub domain: String,
    /// Frequency derivation.
    pub frequency: ClockFrequency,
    /// Phase offset in degrees.
    #[serde(default)]
    pub phase_deg: u32,
    /// Domain never receives a reset signal.
    #[serde(default)]
    pub resetless: bool,
    /// Domain exists only to drive the input-delay calibration block.
    #[serde(default)]
    pub calibration: bool,
    /// Resource the domain's clock is forwarded onto through a DDR output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_to: Option<String>,
}

impl ClockOutput {
    /// A reset-bearing domain at a multiple of the system clock.
    pub fn sys_multiple(domain: &str, factor: u32) -> Self {
        Self {
            domain: domain.into(),
            frequency: ClockFrequency::SysMultiple(factor),
            phase_deg: 0,
            resetless: false,
            calibration: false,
            forward_to: None,
        }
    }

    /// A calibration domain at a fixed frequency.
    pub fn calibration(domain: &str, hz: u64) -> Self {
        Self {
            domain: domain.into(),
            frequency: ClockFrequency::Fixed(hz),
            phase_deg: 0,
            resetless: false,
            calibration: true,
            forward_to: None,
        }
    }

    /// Set the phase offset.
    pub fn with_phase(mut self, phase_deg: u32) -> Self {
        self.phase_deg = phase_deg;
        self
    }

    /// Mark the domain resetless.
    pub fn resetless(mut self) -> Self {
        self.resetless = true;
        self
    }

    /// Forward the domain's clock onto a pin resource.
    pub fn forwarded_to(mut self, resource: &str) -> Self {
        self.forward_to = Some(resource.into());
        self
    }

    /// Requested frequency for a given system clock, or `None` if the
    /// multiple does not fit in 64 bits.
    pub fn frequency_hz(&self, sys_clk_hz: u64) -> Option<u64> {
        match self.frequency {
            ClockFrequency::SysMultiple(factor) => sys_clk_hz.checked_mul(u64::from(factor)),
            ClockFrequency::Fixed(hz) => Some(hz),
        }
    }
}

/// A complete board record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Board {
    /// Board name (e.g., "alchitry-au").
    pub name: String,
    /// One-line description.
    pub description: String,
    /// SoC identifier string exposed through the identifier CSR.
    pub ident: String,
    /// Default system clock frequency in Hz.
    pub default_sys_clk_hz: u64,
    /// Register bridge baud rate.
    pub serial_baudrate: u32,
    /// FPGA device.
    pub device: DeviceModel,
    /// Reference oscillator.
    pub reference_clock: ReferenceClock,
    /// External reset.
    pub reset: ResetInput,
    /// Clock domains derived from the reference.
    pub clock_plan: Vec<ClockOutput>,
    /// DRAM model, if the board carries memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryConfig>,
    /// Raw commands added to the toolchain project.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platform_commands: Vec<String>,
    /// Raw commands applied before bitstream generation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bitstream_commands: Vec<String>,
    /// Raw commands run after bitstream generation; `{build_name}` is expanded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_commands: Vec<String>,
    /// Declared I/O resources.
    pub io: Vec<ResourceDecl>,
}

impl Board {
    /// Look up a resource declaration by identity.
    pub fn resource(&self, name: &str, index: u32) -> Option<&ResourceDecl> {
        self.io.iter().find(|r| r.name == name && r.index == index)
    }

    /// All declarations sharing a name, in index order.
    pub fn resources_named(&self, name: &str) -> Vec<&ResourceDecl> {
        let mut found: Vec<&ResourceDecl> = self.io.iter().filter(|r| r.name == name).collect();
        found.sort_by_key(|r| r.index);
        found
    }

    /// Number of user LEDs declared.
    pub fn led_count(&self) -> usize {
        self.resources_named("user_led").len()
    }

    /// Look up a clock plan entry by domain name.
    pub fn clock_output(&self, domain: &str) -> Option<&ClockOutput> {
        self.clock_plan.iter().find(|c| c.domain == domain)
    }

    /// Alchitry Au: Artix-7 35T, 100 MHz oscillator, 256 MiB DDR3.
    pub fn alchitry_au() -> Self {
        let sstl = "SSTL135";
        let ddram = ResourceDecl::composite(
            "ddram",
            0,
            sstl,
            vec![
                Subsignal::new(
                    "a",
                    "F12 G16 G15 E16 H11 G12 H16 H12 J16 H13 E12 H14 F13 J15",
                )
                .with_direction(Direction::Output),
                Subsignal::new("ba", "E13 F15 E15").with_direction(Direction::Output),
                Subsignal::new("ras_n", "D11").with_direction(Direction::Output),
                Subsignal::new("cas_n", "D14").with_direction(Direction::Output),
                Subsignal::new("we_n", "E11").with_direction(Direction::Output),
                Subsignal::new("dm", "A14 C9").with_direction(Direction::Output),
                Subsignal::new(
                    "dq",
                    "A13 B16 B14 C11 C13 C16 C12 C14 D8 B11 C8 B10 A12 A8 B12 A9",
                )
                .with_misc("IN_TERM=UNTUNED_SPLIT_50"),
                Subsignal::new("dqs_p", "B15 B9")
                    .with_standard("DIFF_SSTL135")
                    .with_misc("IN_TERM=UNTUNED_SPLIT_50"),
                Subsignal::new("dqs_n", "A15 A10")
                    .with_standard("DIFF_SSTL135")
                    .with_misc("IN_TERM=UNTUNED_SPLIT_50"),
                Subsignal::new("clk_p", "G14")
                    .with_standard("DIFF_SSTL135")
                    .with_direction(Direction::Output),
                Subsignal::new("clk_n", "F14")
                    .with_standard("DIFF_SSTL135")
                    .with_direction(Direction::Output),
                Subsignal::new("cke", "D15").with_direction(Direction::Output),
                Subsignal::new("odt", "G11").with_direction(Direction::Output),
                Subsignal::new("cs_n", "D16").with_direction(Direction::Output),
                Subsignal::new("reset_n", "D13").with_direction(Direction::Output),
            ],
        )
        .with_misc("SLEW=FAST");

        let mut io = vec![
            ResourceDecl::single("clk100", 0, "N14", "LVCMOS33").with_direction(Direction::Input),
            ResourceDecl::single("cpu_reset", 0, "P6", "LVCMOS33")
                .with_direction(Direction::Input),
        ];
        io.extend(leds(
            &["K13", "K12", "L14", "L13", "M16", "M14", "M12", "N16"],
            "LVCMOS33",
        ));
        io.push(serial("P16", "P15", "LVCMOS33"));
        io.push(ddram);

        Self {
            name: "alchitry-au".into(),
            description: "Alchitry Au (Artix-7 35T, 100 MHz, 256 MiB DDR3)".into(),
            ident: "Alchitry Au Mini SoC".into(),
            default_sys_clk_hz: 83_333_333,
            serial_baudrate: 115_200,
            device: DeviceModel::xc7a35t_ftg256_1(),
            reference_clock: ReferenceClock {
                resource: "clk100".into(),
                frequency_hz: 100_000_000,
            },
            reset: ResetInput {
                resource: "cpu_reset".into(),
                active_low: true,
                gates: Vec::new(),
            },
            clock_plan: vec![
                ClockOutput::sys_multiple("sys", 1),
                ClockOutput::sys_multiple("sys4x", 4).resetless(),
                ClockOutput::sys_multiple("sys4x_dqs", 4)
                    .with_phase(90)
                    .resetless(),
                ClockOutput::calibration("clk200", 200_000_000),
            ],
            memory: Some(MemoryConfig {
                module: ModuleGeometry::as4c128m16(),
                phy: PhyModel {
                    kind: PhyKind::A7Ddr,
                    resource: "ddram".into(),
                    data_width: 16,
                    nphases: 4,
                },
                default_max_size: 0x1000_0000,
                cache_size: 8192,
                min_cache_width: 128,
            }),
            platform_commands: vec!["set_property INTERNAL_VREF 0.675 [get_iobanks 15]".into()],
            bitstream_commands: vec![
                "set_property BITSTREAM.GENERAL.COMPRESS TRUE [current_design]".into(),
                "set_property BITSTREAM.CONFIG.CONFIGRATE 33 [current_design]".into(),
                "set_property CONFIG_VOLTAGE 3.3 [current_design]".into(),
                "set_property CFGBVS VCCO [current_design]".into(),
                "set_property BITSTREAM.CONFIG.SPI_32BIT_ADDR NO [current_design]".into(),
                "set_property BITSTREAM.CONFIG.SPI_BUSWIDTH 1 [current_design]".into(),
                "set_property BITSTREAM.CONFIG.SPI_FALL_EDGE YES [current_design]".into(),
            ],
            additional_commands: vec!["write_bitstream -force -bin_file {build_name}".into()],
            io,
        }
    }

    /// Embedded Micro Mojo V3: Spartan-6 LX9, 50 MHz oscillator, 32 MiB SDRAM shield.
    pub fn mojo_v3() -> Self {
        let sdram = ResourceDecl::composite(
            "sdram",
            0,
            "LVTTL",
            vec![
                Subsignal::new(
                    "a",
                    "P101 P102 P104 P105 P5 P6 P7 P8 P9 P10 P88 P27 P26",
                )
                .with_direction(Direction::Output),
                Subsignal::new("dq", "P75 P78 P79 P80 P34 P35 P40 P41"),
                Subsignal::new("ba", "P85 P87").with_direction(Direction::Output),
                Subsignal::new("dm", "P74").with_direction(Direction::Output),
                Subsignal::new("ras_n", "P83").with_direction(Direction::Output),
                Subsignal::new("cas_n", "P82").with_direction(Direction::Output),
                Subsignal::new("we_n", "P81").with_direction(Direction::Output),
                Subsignal::new("cs_n", "P84").with_direction(Direction::Output),
                Subsignal::new("cke", "P30").with_direction(Direction::Output),
            ],
        )
        .with_misc("SLEW=FAST");

        let mut io = vec![
            ResourceDecl::single("clk50", 0, "P56", "LVTTL").with_direction(Direction::Input),
            ResourceDecl::single("cpu_reset", 0, "P38", "LVTTL").with_direction(Direction::Input),
        ];
        io.extend(leds(
            &["P134", "P133", "P132", "P131", "P127", "P126", "P124", "P123"],
            "LVTTL",
        ));
        io.push(serial("P59", "P55", "LVTTL"));
        io.push(ResourceDecl::single("tx_busy", 0, "P39", "LVTTL").with_direction(Direction::Input));
        io.push(ResourceDecl::single("cclk", 0, "P70", "LVTTL").with_direction(Direction::Input));
        io.push(
            ResourceDecl::single("sdram_clock", 0, "P29", "LVTTL")
                .with_direction(Direction::Output)
                .with_misc("SLEW=FAST"),
        );
        io.push(sdram);

        Self {
            name: "mojo-v3".into(),
            description: "Mojo V3 (Spartan-6 LX9, 50 MHz, 32 MiB SDRAM shield)".into(),
            ident: "Mojo V3 SoC".into(),
            default_sys_clk_hz: 66_666_666,
            serial_baudrate: 500_000,
            device: DeviceModel::xc6slx9_2_tqg144(),
            reference_clock: ReferenceClock {
                resource: "clk50".into(),
                frequency_hz: 50_000_000,
            },
            reset: ResetInput {
                resource: "cpu_reset".into(),
                active_low: true,
                gates: vec!["cclk".into()],
            },
            clock_plan: vec![
                ClockOutput::sys_multiple("sys", 1),
                ClockOutput::sys_multiple("sys_ps", 1)
                    .with_phase(90)
                    .resetless()
                    .forwarded_to("sdram_clock"),
            ],
            memory: Some(MemoryConfig {
                module: ModuleGeometry::mt48lc32m8(),
                phy: PhyModel {
                    kind: PhyKind::GenSdr,
                    resource: "sdram".into(),
                    data_width: 8,
                    nphases: 1,
                },
                default_max_size: 0x200_0000,
                cache_size: 8192,
                min_cache_width: 128,
            }),
            platform_commands: Vec::new(),
            bitstream_commands: Vec::new(),
            additional_commands: Vec::new(),
            io,
        }
    }

    /// Look up a built-in board by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "alchitry-au" => Some(Self::alchitry_au()),
            "mojo-v3" => Some(Self::mojo_v3()),
            _ => None,
        }
    }

    /// Names and descriptions of the built-in boards.
    pub fn builtin_boards() -> Vec<(&'static str, &'static str)> {
        vec![
            ("alchitry-au", "Alchitry Au (Artix-7 35T, 100 MHz, 256 MiB DDR3)"),
            ("mojo-v3", "Mojo V3 (Spartan-6 LX9, 50 MHz, 32 MiB SDRAM shield)"),
        ]
    }
}

fn leds(pins: &[&str], standard: &str) -> Vec<ResourceDecl> {
    pins.iter()
        .enumerate()
        .map(|(i, pin)| {
            ResourceDecl::single("user_led", i as u32, pin, standard)
                .with_direction(Direction::Output)
        })
        .collect()
}

fn serial(tx: &str, rx: &str, standard: &str) -> ResourceDecl {
    ResourceDecl::composite(
        "serial",
        0,
        standard,
        vec![
            Subsignal::new("tx", tx).with_direction(Direction::Output),
            Subsignal::new("rx", rx).with_direction(Direction::Input),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceFamily;

    #[test]
    fn alchitry_au_record() {
        let b = Board::alchitry_au();
        assert_eq!(b.device.family, DeviceFamily::Artix7);
        assert_eq!(b.led_count(), 8);
        assert_eq!(b.clock_plan.len(), 4);
        assert!(b.resource("clk100", 0).is_some());
        assert_eq!(b.memory.as_ref().unwrap().default_max_size, 0x1000_0000);
        assert_eq!(b.memory.as_ref().unwrap().capacity_bytes(), Some(0x1000_0000));
        assert_eq!(b.reference_clock.period_ns(), 10.0);
    }

    #[test]
    fn mojo_v3_record() {
        let b = Board::mojo_v3();
        assert_eq!(b.device.family, DeviceFamily::Spartan6);
        assert_eq!(b.memory.as_ref().unwrap().default_max_size, 0x200_0000);
        assert_eq!(b.reset.gates, vec!["cclk".to_string()]);
        let ps = b.clock_output("sys_ps").unwrap();
        assert_eq!(ps.forward_to.as_deref(), Some("sdram_clock"));
        assert!(ps.resetless);
    }

    #[test]
    fn clock_output_frequencies() {
        let sys4x = ClockOutput::sys_multiple("sys4x", 4);
        assert_eq!(sys4x.frequency_hz(83_333_333), Some(333_333_332));
        let cal = ClockOutput::calibration("clk200", 200_000_000);
        assert_eq!(cal.frequency_hz(83_333_333), Some(200_000_000));
    }

    #[test]
    fn clock_output_multiple_overflow() {
        let sys4x = ClockOutput::sys_multiple("sys4x", 4);
        assert_eq!(sys4x.frequency_hz(10_000_000_000_000_000_000), None);
        let cal = ClockOutput::calibration("clk200", 200_000_000);
        assert_eq!(cal.frequency_hz(u64::MAX), Some(200_000_000));
    }

    #[test]
    fn builtin_lookup() {
        assert!(Board::builtin("alchitry-au").is_some());
        assert!(Board::builtin("mojo-v3").is_some());
        assert!(Board::builtin("arty").is_none());
        assert_eq!(Board::builtin_boards().len(), 2);
    }

    #[test]
    fn resources_named_sorted() {
        let b = Board::mojo_v3();
        let leds = b.resources_named("user_led");
        assert_eq!(leds.len(), 8);
        assert!(leds.windows(2).all(|w| w[0].index < w[1].index));
    }
}
