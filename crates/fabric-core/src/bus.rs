//! Address-Mapped Bus Composer.
//!
//! Owns the flat address space of one elaboration: the single bus master,
//! the mapped regions of bus slaves, and the CSR space. The CSR space is a
//! window of fixed-size locations; each CSR peripheral receives the next
//! free location in registration order, and its registers are laid out
//! word by word inside that location.
//!
//! Once [`BusComposer::finalize`] has run, the composer refuses every
//! further mutation and the returned [`BusMap`] is the immutable result.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ElaborationError, Result};
use crate::hash::{content_hash, hash_hex};

/// Register access mode as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsrAccess {
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "wo")]
    WriteOnly,
}

impl fmt::Display for CsrAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsrAccess::ReadOnly => write!(f, "ro"),
            CsrAccess::ReadWrite => write!(f, "rw"),
            CsrAccess::WriteOnly => write!(f, "wo"),
        }
    }
}

/// A register a peripheral asks to expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrRegister {
    pub name: String,
    pub width_bits: u32,
    pub access: CsrAccess,
    /// Number of consecutive elements (1 for plain registers, the depth for
    /// memories exposed through the CSR space).
    pub count: u32,
}

impl CsrRegister {
    /// A read-only status register.
    pub fn status(name: &str, width_bits: u32) -> Self {
        Self {
            name: name.into(),
            width_bits,
            access: CsrAccess::ReadOnly,
            count: 1,
        }
    }

    /// A read-write storage register.
    pub fn storage(name: &str, width_bits: u32) -> Self {
        Self {
            name: name.into(),
            width_bits,
            access: CsrAccess::ReadWrite,
            count: 1,
        }
    }

    /// A write-only strobe register.
    pub fn strobe(name: &str, width_bits: u32) -> Self {
        Self {
            name: name.into(),
            width_bits,
            access: CsrAccess::WriteOnly,
            count: 1,
        }
    }

    /// A read-only memory of `depth` elements.
    pub fn memory(name: &str, width_bits: u32, depth: u32) -> Self {
        Self {
            name: name.into(),
            width_bits,
            access: CsrAccess::ReadOnly,
            count: depth,
        }
    }

    /// Number of CSR words occupied at the given data width.
    pub fn words(&self, data_width: u32) -> u32 {
        self.count * self.width_bits.div_ceil(data_width).max(1)
    }
}

/// A placed register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrEntry {
    pub peripheral: String,
    /// Full register name, `<peripheral>_<register>`.
    pub name: String,
    /// Byte offset from the CSR window base.
    pub offset: u64,
    /// Absolute bus address.
    pub address: u64,
    pub width_bits: u32,
    pub words: u32,
    pub access: CsrAccess,
}

/// The registers of one peripheral at one CSR location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrBank {
    pub peripheral: String,
    pub location: usize,
    /// Byte offset of the location from the CSR window base.
    pub offset: u64,
    pub address: u64,
    pub registers: Vec<CsrEntry>,
}

impl CsrBank {
    /// Sum of declared register widths.
    pub fn width_bits(&self) -> u32 {
        self.registers.iter().map(|r| r.width_bits).sum()
    }
}

/// Geometry of the CSR window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrLayout {
    pub base: u64,
    pub data_width: u32,
    pub locations: usize,
    /// Bytes per location.
    pub paging: u64,
}

impl Default for CsrLayout {
    fn default() -> Self {
        Self {
            base: 0x8200_0000,
            data_width: 32,
            locations: 32,
            paging: 0x800,
        }
    }
}

impl CsrLayout {
    /// Size of the whole window in bytes.
    pub fn size(&self) -> u64 {
        self.locations as u64 * self.paging
    }

    /// Bytes between consecutive CSR words.
    pub fn word_stride(&self) -> u64 {
        u64::from(self.data_width / 8).max(4)
    }
}

/// The single bus master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMaster {
    pub name: String,
    /// Transport the master bridges from (e.g., "uart").
    pub transport: String,
    pub data_width: u32,
}

/// A mapped slice of the flat address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRegion {
    pub name: String,
    pub base: u64,
    pub size: u64,
    /// Peripheral that answers for the region.
    pub owner: String,
    pub cached: bool,
}

impl AddressRegion {
    pub fn new(name: &str, base: u64, size: u64, owner: &str) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            owner: owner.into(),
            cached: false,
        }
    }

    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// One past the last address.
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn overlaps(&self, other: &AddressRegion) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// Required base alignment: the size rounded up to a power of two.
    pub fn alignment(&self) -> u64 {
        self.size.checked_next_power_of_two().unwrap_or(u64::MAX)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// Mutable composer for one elaboration.
#[derive(Debug, Clone)]
pub struct BusComposer {
    layout: CsrLayout,
    master: Option<BusMaster>,
    regions: Vec<AddressRegion>,
    banks: Vec<CsrBank>,
    finalized: bool,
}

impl BusComposer {
    /// Create a composer with the CSR window already mapped.
    pub fn new(layout: CsrLayout) -> Result<Self> {
        let mut composer = Self {
            layout,
            master: None,
            regions: Vec::new(),
            banks: Vec::new(),
            finalized: false,
        };
        composer.map_peripheral(AddressRegion::new("csr", layout.base, layout.size(), "csr"))?;
        Ok(composer)
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.finalized {
            return Err(ElaborationError::MapFinalized {
                operation: operation.into(),
            });
        }
        Ok(())
    }

    /// Attach the bus master. Only one may ever be attached.
    pub fn attach_master(&mut self, master: BusMaster) -> Result<()> {
        self.ensure_open(&format!("attach master '{}'", master.name))?;
        if let Some(existing) = &self.master {
            return Err(ElaborationError::DuplicateMaster {
                existing: existing.name.clone(),
                attempted: master.name,
            });
        }
        info!(master = %master.name, transport = %master.transport, "bus master attached");
        self.master = Some(master);
        Ok(())
    }

    /// Map a region. It must not intersect any mapped region and its base
    /// must be aligned to its power-of-two size.
    pub fn map_peripheral(&mut self, region: AddressRegion) -> Result<()> {
        self.ensure_open(&format!("map region '{}'", region.name))?;
        if region.size == 0 {
            return Err(ElaborationError::EmptyRegion {
                name: region.name,
                base: region.base,
            });
        }
        let alignment = region.alignment();
        if region.base % alignment != 0 {
            return Err(ElaborationError::MisalignedRegion {
                name: region.name,
                base: region.base,
                size: region.size,
                alignment,
            });
        }
        if let Some(other) = self.regions.iter().find(|r| r.overlaps(&region)) {
            return Err(ElaborationError::OverlappingRegion {
                name: region.name.clone(),
                base: region.base,
                end: region.end(),
                other: other.name.clone(),
                other_base: other.base,
                other_end: other.end(),
            });
        }
        debug!(
            region = %region.name,
            base = format_args!("0x{:08X}", region.base),
            size = format_args!("0x{:X}", region.size),
            "region mapped"
        );
        self.regions.push(region);
        Ok(())
    }

    /// Give `peripheral` the next free CSR location and lay out its registers.
    pub fn allocate_csr(&mut self, peripheral: &str, registers: &[CsrRegister]) -> Result<&CsrBank> {
        self.ensure_open(&format!("allocate CSRs for '{peripheral}'"))?;
        if self.banks.iter().any(|b| b.peripheral == peripheral) {
            return Err(ElaborationError::DuplicatePeripheral {
                name: peripheral.into(),
            });
        }
        let location = self.banks.len();
        let stride = self.layout.word_stride();
        let words: u64 = registers
            .iter()
            .map(|r| u64::from(r.words(self.layout.data_width)))
            .sum();
        if location >= self.layout.locations || words * stride > self.layout.paging {
            return Err(ElaborationError::CsrSpaceExhausted {
                peripheral: peripheral.into(),
                location,
                capacity: self.layout.locations,
            });
        }

        let bank_offset = location as u64 * self.layout.paging;
        let mut cursor = bank_offset;
        let entries = registers
            .iter()
            .map(|reg| {
                let words = reg.words(self.layout.data_width);
                let entry = CsrEntry {
                    peripheral: peripheral.into(),
                    name: format!("{peripheral}_{}", reg.name),
                    offset: cursor,
                    address: self.layout.base + cursor,
                    width_bits: reg.width_bits,
                    words,
                    access: reg.access,
                };
                cursor += u64::from(words) * stride;
                entry
            })
            .collect();

        debug!(peripheral, location, registers = registers.len(), "CSR location allocated");
        self.banks.push(CsrBank {
            peripheral: peripheral.into(),
            location,
            offset: bank_offset,
            address: self.layout.base + bank_offset,
            registers: entries,
        });
        Ok(&self.banks[location])
    }

    pub fn master(&self) -> Option<&BusMaster> {
        self.master.as_ref()
    }

    pub fn regions(&self) -> &[AddressRegion] {
        &self.regions
    }

    pub fn banks(&self) -> &[CsrBank] {
        &self.banks
    }

    pub fn layout(&self) -> &CsrLayout {
        &self.layout
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Lock the maps and return the immutable result.
    pub fn finalize(&mut self) -> Result<BusMap> {
        self.ensure_open("finalize")?;
        self.finalized = true;
        info!(
            regions = self.regions.len(),
            csr_banks = self.banks.len(),
            "bus map finalized"
        );
        Ok(BusMap {
            layout: self.layout,
            master: self.master.clone(),
            regions: self.regions.clone(),
            banks: self.banks.clone(),
        })
    }
}

/// Finalized address and CSR maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMap {
    pub layout: CsrLayout,
    pub master: Option<BusMaster>,
    pub regions: Vec<AddressRegion>,
    pub banks: Vec<CsrBank>,
}

impl BusMap {
    pub fn region(&self, name: &str) -> Option<&AddressRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn bank(&self, peripheral: &str) -> Option<&CsrBank> {
        self.banks.iter().find(|b| b.peripheral == peripheral)
    }

    /// Every placed register, in address order.
    pub fn entries(&self) -> impl Iterator<Item = &CsrEntry> {
        self.banks.iter().flat_map(|b| b.registers.iter())
    }

    /// Look up a register by full name.
    pub fn entry(&self, name: &str) -> Option<&CsrEntry> {
        self.entries().find(|e| e.name == name)
    }

    /// Hex SHA-256 fingerprint of the CSR layout.
    pub fn csr_fingerprint(&self) -> std::result::Result<String, serde_json::Error> {
        Ok(hash_hex(&content_hash(&self.banks)?))
    }
}
