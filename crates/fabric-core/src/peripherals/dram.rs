//! DRAM PHY and controller.
//!
//! Module geometry, PHY width and cache knobs are pass-through parameters
//! for the controller implementation. They are validated against each other
//! here and never derived.

use fabric_boards::{MemoryConfig, MemoryType, ModuleGeometry, PhyKind, PhyModel};
use serde::{Deserialize, Serialize};

use crate::bus::CsrRegister;
use crate::clocking::ClockDomain;
use crate::design::{Unit, UnitKind};
use crate::error::{ElaborationError, Result};
use crate::peripheral::{Peripheral, RegionRequest, ResourceRequest};
use crate::platform::SignalBundle;

use super::{bundle_at, port};

/// Name of the main memory region in the SoC memory map.
pub const MAIN_RAM: &str = "main_ram";

/// Cache placed in front of the controller's native port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity in bytes.
    pub size: u64,
    /// Effective data width in bits.
    pub data_width: u32,
    /// Reversed address interleave expected by the controller.
    pub reverse: bool,
}

impl CacheConfig {
    /// Validate the knobs and derive the effective width:
    /// `max(native_width, min_width)`.
    pub fn new(size: u64, min_width: u32, native_width: u32) -> Result<Self> {
        if !size.is_power_of_two() {
            return Err(ElaborationError::InvalidCacheConfig {
                detail: format!("cache size {size} is not a power of two"),
            });
        }
        if !min_width.is_power_of_two() || min_width < 8 {
            return Err(ElaborationError::InvalidCacheConfig {
                detail: format!("minimum cache width {min_width} is not a power of two of at least 8 bits"),
            });
        }
        let data_width = native_width.max(min_width);
        if size.saturating_mul(8) < u64::from(data_width) {
            return Err(ElaborationError::InvalidCacheConfig {
                detail: format!("cache of {size} bytes cannot hold one {data_width}-bit line"),
            });
        }
        Ok(Self {
            size,
            data_width,
            reverse: true,
        })
    }
}

/// Reject a module that does not fit the PHY: it must be of the technology
/// the PHY drives, and its width must not exceed the PHY data width and
/// must divide it evenly.
pub fn check_geometry(module: &ModuleGeometry, phy: &PhyModel) -> Result<()> {
    if module.memtype != phy.kind.memtype() {
        return Err(ElaborationError::MemoryTypeMismatch {
            module: module.name.clone(),
            module_type: module.memtype,
            phy_type: phy.kind.memtype(),
        });
    }
    let fits = module.data_width != 0
        && module.data_width <= phy.data_width
        && phy.data_width % module.data_width == 0;
    if fits {
        Ok(())
    } else {
        Err(ElaborationError::IncompatibleModuleGeometry {
            module: module.name.clone(),
            module_width: module.data_width,
            phy_width: phy.data_width,
        })
    }
}

/// The PHY driving the memory pins.
#[derive(Debug, Clone)]
pub struct DramPhy {
    phy: PhyModel,
}

impl DramPhy {
    pub fn new(phy: &PhyModel) -> Self {
        Self { phy: phy.clone() }
    }

    fn primitive(&self) -> &'static str {
        match self.phy.kind {
            PhyKind::GenSdr => "GENSDRPHY",
            PhyKind::A7Ddr => "A7DDRPHY",
        }
    }
}

impl Peripheral for DramPhy {
    fn name(&self) -> &str {
        match self.phy.kind {
            PhyKind::GenSdr => "sdrphy",
            PhyKind::A7Ddr => "ddrphy",
        }
    }

    fn declared_resources(&self) -> Vec<ResourceRequest> {
        vec![ResourceRequest::new(&self.phy.resource, Some(0))]
    }

    fn extra_domains(&self) -> Vec<String> {
        match self.phy.kind {
            PhyKind::GenSdr => Vec::new(),
            PhyKind::A7Ddr => vec!["sys4x".into(), "sys4x_dqs".into()],
        }
    }

    fn bind(&self, domain: &ClockDomain, resources: &[SignalBundle]) -> Result<Unit> {
        let pads = bundle_at(resources, 0, &self.phy.resource)?;
        let prefix = format!("{}{}_", pads.resource.name, pads.resource.index);
        let mut unit = Unit::new(self.name(), UnitKind::MemoryPhy)
            .in_domain(&domain.name)
            .with_param("primitive", self.primitive())
            .with_param("data_width", self.phy.data_width)
            .with_param("nphases", self.phy.nphases)
            .with_param("memtype", format!("{:?}", self.phy.kind.memtype()).to_uppercase());
        for signal in &pads.signals {
            let name = signal.name.strip_prefix(&prefix).unwrap_or(&signal.name);
            unit = unit.with_port(port(name, signal));
        }
        Ok(unit)
    }

    fn csr_registers(&self) -> Vec<CsrRegister> {
        if !self.phy.kind.has_csrs() {
            return Vec::new();
        }
        let strobes = self.phy.data_width / 8;
        vec![
            CsrRegister::storage("rst", 1),
            CsrRegister::storage("dly_sel", strobes),
            CsrRegister::storage("half_sys8x_taps", 5),
            CsrRegister::storage("wlevel_en", 1),
            CsrRegister::strobe("wlevel_strobe", 1),
            CsrRegister::strobe("rdly_dq_rst", 1),
            CsrRegister::strobe("rdly_dq_inc", 1),
            CsrRegister::strobe("rdly_dq_bitslip_rst", 1),
            CsrRegister::strobe("rdly_dq_bitslip", 1),
            CsrRegister::strobe("wdly_dq_rst", 1),
            CsrRegister::strobe("wdly_dq_inc", 1),
            CsrRegister::strobe("wdly_dqs_rst", 1),
            CsrRegister::strobe("wdly_dqs_inc", 1),
            CsrRegister::storage("rdphase", 2),
            CsrRegister::storage("wrphase", 2),
        ]
    }
}

/// DRAM controller with its cache, mapped as main memory.
#[derive(Debug, Clone)]
pub struct DramController {
    module: ModuleGeometry,
    phy: PhyModel,
    size: u64,
    cache: CacheConfig,
}

impl DramController {
    /// Validate the memory configuration and size the main memory region
    /// as `min(module capacity, ceiling)`.
    pub fn new(memory: &MemoryConfig, ceiling: u64, cache_size: u64, min_cache_width: u32) -> Result<Self> {
        check_geometry(&memory.module, &memory.phy)?;
        let cache = CacheConfig::new(cache_size, min_cache_width, memory.phy.native_width())?;
        let capacity = memory
            .capacity_bytes()
            .ok_or_else(|| ElaborationError::IncompatibleModuleGeometry {
                module: memory.module.name.clone(),
                module_width: memory.module.data_width,
                phy_width: memory.phy.data_width,
            })?;
        let size = capacity.min(ceiling);
        Ok(Self {
            module: memory.module.clone(),
            phy: memory.phy.clone(),
            size,
            cache,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    fn dfi_databits(&self) -> u32 {
        match self.phy.kind.memtype() {
            MemoryType::Sdr => self.phy.data_width,
            MemoryType::Ddr3 => self.phy.data_width * 2,
        }
    }
}

impl Peripheral for DramController {
    fn name(&self) -> &str {
        "sdram"
    }

    fn bind(&self, domain: &ClockDomain, _resources: &[SignalBundle]) -> Result<Unit> {
        Ok(Unit::new(self.name(), UnitKind::MemoryController)
            .in_domain(&domain.name)
            .with_param("module", self.module.name.as_str())
            .with_param("rate", self.module.rate.as_str())
            .with_param("nbanks", self.module.nbanks)
            .with_param("nrows", self.module.nrows)
            .with_param("ncols", self.module.ncols)
            .with_param("size", self.size)
            .with_param("native_width", self.phy.native_width())
            .with_param("l2_size", self.cache.size)
            .with_param("l2_data_width", self.cache.data_width)
            .with_param("l2_reverse", self.cache.reverse))
    }

    fn bus_region(&self) -> Option<RegionRequest> {
        Some(RegionRequest {
            name: MAIN_RAM.into(),
            size: self.size,
            cached: true,
        })
    }

    fn csr_registers(&self) -> Vec<CsrRegister> {
        let address_bits = self.module.row_bits().max(self.module.col_bits());
        let databits = self.dfi_databits();
        let mut regs = vec![CsrRegister::storage("dfii_control", 4)];
        for p in 0..self.phy.nphases {
            regs.push(CsrRegister::storage(&format!("dfii_pi{p}_command"), 6));
            regs.push(CsrRegister::strobe(&format!("dfii_pi{p}_command_issue"), 1));
            regs.push(CsrRegister::storage(&format!("dfii_pi{p}_address"), address_bits));
            regs.push(CsrRegister::storage(
                &format!("dfii_pi{p}_baddress"),
                self.module.bank_bits(),
            ));
            regs.push(CsrRegister::storage(&format!("dfii_pi{p}_wrdata"), databits));
            regs.push(CsrRegister::status(&format!("dfii_pi{p}_rddata"), databits));
        }
        regs
    }
}
