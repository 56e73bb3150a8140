//! SoC assembly.
//!
//! A [`Soc`] walks a fixed lifecycle:
//!
//! ```text
//! Empty --add_clocking--> Clocked --bus master added--> BusReady --finalize--> Finalized
//! ```
//!
//! Peripherals may only be instantiated, and resources only requested, in
//! `Clocked` or `BusReady`. The order in which peripherals are registered is
//! explicit ([`SocConfig::order`]) and determines every CSR location, so a
//! given configuration always elaborates to the same register map.

use std::collections::BTreeMap;
use std::fmt;

use fabric_boards::{Board, Toolchain};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bus::{AddressRegion, BusComposer, BusMap, CsrLayout};
use crate::clocking::{build_clock_tree, ClockTree, CRG};
use crate::design::{ConnectionKind, DesignGraph, Unit, UnitKind};
use crate::error::{ElaborationError, Result};
use crate::peripheral::Peripheral;
use crate::peripherals::dram::MAIN_RAM;
use crate::peripherals::{
    DeviceDna, DramController, DramPhy, Identifier, LedStatus, RegisterBridge, SocController,
};
use crate::platform::{Claim, PeriodConstraint, Platform, SignalBundle};

/// Lifecycle phase of a [`Soc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Empty,
    Clocked,
    BusReady,
    Finalized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Empty => write!(f, "Empty"),
            Phase::Clocked => write!(f, "Clocked"),
            Phase::BusReady => write!(f, "BusReady"),
            Phase::Finalized => write!(f, "Finalized"),
        }
    }
}

/// A board peripheral slot in the registration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    /// Register bridge (the bus master).
    Bridge,
    /// DRAM PHY and controller.
    Dram,
    /// Device DNA core.
    Identification,
    /// LED status core.
    Status,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Bridge, Slot::Dram, Slot::Identification, Slot::Status];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Bridge => write!(f, "bridge"),
            Slot::Dram => write!(f, "dram"),
            Slot::Identification => write!(f, "identification"),
            Slot::Status => write!(f, "status"),
        }
    }
}

impl std::str::FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(Slot::Bridge),
            "dram" => Ok(Slot::Dram),
            "identification" => Ok(Slot::Identification),
            "status" => Ok(Slot::Status),
            other => Err(format!(
                "unknown peripheral slot '{other}' (expected bridge, dram, identification, or status)"
            )),
        }
    }
}

/// Knobs for one elaboration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SocConfig {
    pub sys_clk_hz: u64,
    pub ident: String,
    /// Suffix appended to the identifier string.
    pub ident_version: Option<String>,
    pub csr: CsrLayout,
    /// Base addresses of named regions.
    pub mem_map: BTreeMap<String, u64>,
    /// Ceiling for the main memory region.
    pub max_mem_size: u64,
    pub cache_size: u64,
    pub min_cache_width: u32,
    pub baudrate: u32,
    /// Board peripherals, in registration order.
    pub order: Vec<Slot>,
}

impl SocConfig {
    /// Defaults for a board: its sys clock, memory ceiling, cache knobs,
    /// identifier and baud rate, and every peripheral it can carry.
    pub fn for_board(board: &Board) -> Self {
        let csr = CsrLayout::default();
        let mut mem_map = BTreeMap::new();
        mem_map.insert(MAIN_RAM.to_string(), 0x4000_0000);
        mem_map.insert("csr".to_string(), csr.base);

        let (max_mem_size, cache_size, min_cache_width) = match &board.memory {
            Some(m) => (m.default_max_size, m.cache_size, m.min_cache_width),
            None => (0, 8192, 128),
        };
        let order = Slot::ALL
            .into_iter()
            .filter(|s| *s != Slot::Dram || board.memory.is_some())
            .collect();

        Self {
            sys_clk_hz: board.default_sys_clk_hz,
            ident: board.ident.clone(),
            ident_version: None,
            csr,
            mem_map,
            max_mem_size,
            cache_size,
            min_cache_width,
            baudrate: board.serial_baudrate,
            order,
        }
    }

    /// Replace the registration order.
    pub fn with_order(mut self, order: Vec<Slot>) -> Self {
        self.order = order;
        self
    }
}

/// The immutable result of a finalized elaboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElaboratedDesign {
    pub board: String,
    pub part: String,
    pub toolchain: Toolchain,
    pub ident: String,
    pub sys_clk_hz: u64,
    pub clocks: ClockTree,
    pub bus: BusMap,
    pub claims: Vec<Claim>,
    /// Every claimed signal bundle, in claim order.
    pub io: Vec<SignalBundle>,
    pub constraints: Vec<PeriodConstraint>,
    /// Peripheral names in registration order.
    pub registration: Vec<String>,
    pub graph: DesignGraph,
}

impl ElaboratedDesign {
    /// Named configuration constants exported alongside the register map.
    pub fn constants(&self) -> Vec<(String, String)> {
        let mut constants = vec![
            ("config_clock_frequency".to_string(), self.sys_clk_hz.to_string()),
            ("config_bus_standard".to_string(), "wishbone".to_string()),
            (
                "config_csr_data_width".to_string(),
                self.bus.layout.data_width.to_string(),
            ),
            ("config_csr_alignment".to_string(), "32".to_string()),
            (
                "config_csr_paging".to_string(),
                self.bus.layout.paging.to_string(),
            ),
        ];
        if let Some(sdram) = self.graph.unit("sdram") {
            for key in ["l2_size", "l2_data_width"] {
                if let Some(v) = sdram.param(key) {
                    constants.push((format!("config_{key}"), v.to_string()));
                }
            }
        }
        constants
    }

    /// Number of claimed pins.
    pub fn pin_count(&self) -> usize {
        self.io.iter().map(SignalBundle::pin_count).sum()
    }
}

/// One SoC under assembly.
#[derive(Debug)]
pub struct Soc {
    board: Board,
    config: SocConfig,
    phase: Phase,
    platform: Platform,
    clocks: Option<ClockTree>,
    bus: BusComposer,
    design: DesignGraph,
    io: Vec<SignalBundle>,
    registered: Vec<String>,
}

impl Soc {
    /// Start an empty SoC for a board.
    pub fn new(board: &Board, config: SocConfig) -> Result<Self> {
        let platform = Platform::new(board)?;
        let bus = BusComposer::new(config.csr)?;
        let mut design = DesignGraph::new();
        design.add_unit(Unit::new("bus", UnitKind::Interconnect).in_domain("sys"))?;
        design.add_unit(
            Unit::new("csr", UnitKind::CsrBridge)
                .in_domain("sys")
                .with_param("base", config.csr.base)
                .with_param("data_width", config.csr.data_width),
        )?;
        design.connect("bus", "csr", ConnectionKind::Bus)?;
        info!(board = %board.name, "SoC created");
        Ok(Self {
            board: board.clone(),
            config,
            phase: Phase::Empty,
            platform,
            clocks: None,
            bus,
            design,
            io: Vec::new(),
            registered: Vec::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &SocConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn clocks(&self) -> Option<&ClockTree> {
        self.clocks.as_ref()
    }

    pub fn bus(&self) -> &BusComposer {
        &self.bus
    }

    pub fn design(&self) -> &DesignGraph {
        &self.design
    }

    fn require_phase(&self, operation: &str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ElaborationError::InvalidPhase {
                operation: operation.into(),
                phase: self.phase,
            })
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        info!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    /// Generate the clock domains and enter `Clocked`.
    pub fn add_clocking(&mut self) -> Result<&ClockTree> {
        self.require_phase("add clocking", &[Phase::Empty])?;
        let tree = build_clock_tree(&self.board, &mut self.platform, self.config.sys_clk_hz)?;

        let mut crg = Unit::new(CRG, UnitKind::ClockGenerator)
            .with_param("primitive", tree.pll.primitive.as_str())
            .with_param("clkin", tree.clkin_signal.as_str())
            .with_param("divclk", tree.pll.divclk)
            .with_param("mult", tree.pll.mult)
            .with_param("vco_hz", tree.pll.vco_hz)
            .with_param("reset", tree.resets.condition());
        for out in &tree.pll.outputs {
            crg = crg.with_param(&format!("{}_divider", out.domain), out.divider);
        }
        self.design.add_unit(crg)?;

        for domain in tree.reset_domains() {
            let name = format!("rst_{}", domain.name);
            self.design.add_unit(
                Unit::new(&name, UnitKind::ResetSynchronizer)
                    .in_domain(&domain.name)
                    .with_param("condition", tree.resets.condition()),
            )?;
            self.design
                .connect(CRG, &name, ConnectionKind::Reset(domain.name.clone()))?;
        }
        for cal in &tree.calibration {
            let name = cal.primitive.to_lowercase();
            self.design.add_unit(
                Unit::new(&name, UnitKind::DelayCalibration)
                    .in_domain(&cal.domain)
                    .with_param("primitive", cal.primitive.as_str()),
            )?;
            self.design
                .connect(CRG, &name, ConnectionKind::Clock(cal.domain.clone()))?;
            self.design
                .connect(CRG, &name, ConnectionKind::Reset(cal.domain.clone()))?;
        }
        for fwd in &tree.forwards {
            let name = format!("{}_forward", fwd.signal);
            self.design.add_unit(
                Unit::new(&name, UnitKind::ClockForward)
                    .in_domain(&fwd.domain)
                    .with_param("primitive", fwd.primitive.as_str())
                    .with_param("signal", fwd.signal.as_str()),
            )?;
            self.design
                .connect(CRG, &name, ConnectionKind::Clock(fwd.domain.clone()))?;
        }
        for sys_unit in ["bus", "csr"] {
            self.design
                .connect(CRG, sys_unit, ConnectionKind::Clock("sys".into()))?;
        }

        self.clocks = Some(tree);
        self.set_phase(Phase::Clocked);
        self.clocks
            .as_ref()
            .ok_or_else(|| ElaborationError::InvalidClockPlan {
                detail: "clock tree missing after generation".into(),
            })
    }

    /// Claim a resource for `owner`. Valid only while peripherals may be
    /// instantiated.
    pub fn request(&mut self, owner: &str, name: &str, index: Option<u32>) -> Result<SignalBundle> {
        self.require_phase(
            &format!("request resource '{name}'"),
            &[Phase::Clocked, Phase::BusReady],
        )?;
        let bundle = self.platform.request(owner, name, index)?;
        self.io.push(bundle.clone());
        Ok(bundle)
    }

    /// Instantiate a peripheral: claim its resources, bind it to the sys
    /// domain, and register its bus master, region and CSRs.
    pub fn add_peripheral(&mut self, peripheral: &dyn Peripheral) -> Result<()> {
        let name = peripheral.name().to_string();
        self.require_phase(
            &format!("instantiate peripheral '{name}'"),
            &[Phase::Clocked, Phase::BusReady],
        )?;
        if self.registered.contains(&name) {
            return Err(ElaborationError::DuplicatePeripheral { name });
        }

        let clocks = self
            .clocks
            .as_ref()
            .ok_or_else(|| ElaborationError::InvalidPhase {
                operation: format!("instantiate peripheral '{name}'"),
                phase: self.phase,
            })?;
        let sys = clocks
            .sys()
            .cloned()
            .ok_or_else(|| ElaborationError::InvalidClockPlan {
                detail: "no 'sys' domain".into(),
            })?;
        let extra = peripheral.extra_domains();
        for domain in &extra {
            if clocks.domain(domain).is_none() {
                return Err(ElaborationError::InvalidClockPlan {
                    detail: format!("'{name}' needs domain '{domain}' which the board does not generate"),
                });
            }
        }

        let master = peripheral.bus_master();
        if let Some(m) = master.clone() {
            self.bus.attach_master(m)?;
        }

        let mut bundles = Vec::new();
        for req in peripheral.declared_resources() {
            bundles.push(self.request(&name, &req.name, req.index)?);
        }
        let unit = peripheral.bind(&sys, &bundles)?;
        self.design.add_unit(unit)?;
        self.design
            .connect(CRG, &name, ConnectionKind::Clock(sys.name.clone()))?;
        self.design
            .connect(CRG, &name, ConnectionKind::Reset(sys.name.clone()))?;
        for domain in extra {
            self.design.connect(CRG, &name, ConnectionKind::Clock(domain))?;
        }

        if let Some(req) = peripheral.bus_region() {
            let base = *self
                .config
                .mem_map
                .get(&req.name)
                .ok_or_else(|| ElaborationError::UnmappedRegion {
                    name: req.name.clone(),
                })?;
            let mut region = AddressRegion::new(&req.name, base, req.size, &name);
            if req.cached {
                region = region.cached();
            }
            self.bus.map_peripheral(region)?;
            self.design.connect("bus", &name, ConnectionKind::Bus)?;
        }

        let registers = peripheral.csr_registers();
        if !registers.is_empty() {
            self.bus.allocate_csr(&name, &registers)?;
            self.design.connect("csr", &name, ConnectionKind::Csr)?;
        }

        debug!(peripheral = %name, resources = bundles.len(), "peripheral instantiated");
        self.registered.push(name.clone());

        if master.is_some() {
            self.design.connect(&name, "bus", ConnectionKind::Bus)?;
            self.set_phase(Phase::BusReady);
        }
        Ok(())
    }

    /// Add the controller and identifier present in every SoC.
    pub fn add_system_peripherals(&mut self) -> Result<()> {
        self.add_peripheral(&SocController)?;
        let identifier = Identifier::new(&self.config.ident, self.config.ident_version.as_deref());
        self.add_peripheral(&identifier)
    }

    /// Instantiate the peripherals of one board slot.
    pub fn register(&mut self, slot: Slot) -> Result<()> {
        match slot {
            Slot::Bridge => self.add_peripheral(&RegisterBridge::new(self.config.baudrate)),
            Slot::Dram => {
                let memory = self
                    .board
                    .memory
                    .clone()
                    .ok_or_else(|| ElaborationError::MissingMemory {
                        board: self.board.name.clone(),
                    })?;
                let controller = DramController::new(
                    &memory,
                    self.config.max_mem_size,
                    self.config.cache_size,
                    self.config.min_cache_width,
                )?;
                let phy = DramPhy::new(&memory.phy);
                self.add_peripheral(&phy)?;
                self.add_peripheral(&controller)?;
                self.design
                    .connect(phy.name(), controller.name(), ConnectionKind::Dfi)?;
                Ok(())
            }
            Slot::Identification => self.add_peripheral(&DeviceDna::new(self.board.device.family)),
            Slot::Status => {
                let count = self.board.led_count() as u32;
                self.add_peripheral(&LedStatus::new(count))
            }
        }
    }

    /// Lock the maps, constrain the reference clock, and produce the
    /// elaborated design.
    pub fn finalize(&mut self) -> Result<ElaboratedDesign> {
        self.require_phase("finalize", &[Phase::BusReady])?;

        let reference = self.board.reference_clock.clone();
        let clk = self.platform.request_loose(&reference.resource, None)?;
        if let Some(signal) = clk.primary() {
            self.platform
                .add_period_constraint(signal, reference.period_ns());
        }

        let bus = self.bus.finalize()?;
        let clocks = self
            .clocks
            .clone()
            .ok_or_else(|| ElaborationError::InvalidPhase {
                operation: "finalize".into(),
                phase: self.phase,
            })?;
        self.set_phase(Phase::Finalized);

        // Clock and reset pins were claimed by the generator directly.
        let claims = self.platform.claims();
        let io: Vec<SignalBundle> = claims
            .iter()
            .filter(|c| c.owner == CRG)
            .filter_map(|c| self.platform.bank().get(&c.resource))
            .map(SignalBundle::from_decl)
            .chain(self.io.iter().cloned())
            .collect();

        Ok(ElaboratedDesign {
            board: self.board.name.clone(),
            part: self.board.device.part.clone(),
            toolchain: self.board.device.toolchain,
            ident: Identifier::new(&self.config.ident, self.config.ident_version.as_deref())
                .ident()
                .to_string(),
            sys_clk_hz: clocks.sys_frequency_hz(),
            clocks,
            bus,
            claims,
            io,
            constraints: self.platform.constraints().to_vec(),
            registration: self.registered.clone(),
            graph: self.design.clone(),
        })
    }
}

/// Run a full elaboration: clocking, system peripherals, the configured
/// board peripherals in order, then finalize.
pub fn elaborate(board: &Board, config: &SocConfig) -> Result<ElaboratedDesign> {
    let mut soc = Soc::new(board, config.clone())?;
    soc.add_clocking()?;
    soc.add_system_peripherals()?;
    for slot in &config.order {
        soc.register(*slot)?;
    }
    let design = soc.finalize()?;
    info!(
        board = %design.board,
        units = design.graph.unit_count(),
        csr_banks = design.bus.banks.len(),
        "elaboration complete"
    );
    Ok(design)
}
