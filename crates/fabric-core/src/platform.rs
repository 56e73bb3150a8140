//! Resource Bank and Platform.
//!
//! The bank holds the immutable resource declarations of one board. The
//! platform owns the bank for one elaboration and is the single chokepoint
//! through which consumers obtain signals for physical pins: each resource
//! can be claimed exactly once, and a claim hands back a [`SignalBundle`]
//! describing the bound pins.

use std::collections::BTreeMap;

use fabric_boards::{Board, Direction, ResourceDecl, ResourceId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ElaborationError, Result};

/// One logical signal produced by a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Top-level port name (e.g., "user_led3", "serial0_tx").
    pub name: String,
    /// Package pins, LSB first.
    pub pins: Vec<String>,
    /// Electrical standard.
    pub io_standard: String,
    pub direction: Direction,
    /// Placement attributes (resource-wide first, then subsignal-specific).
    pub misc: Vec<String>,
}

impl Signal {
    /// Width in bits.
    pub fn width(&self) -> usize {
        self.pins.len()
    }
}

/// The signals bound to one claimed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub resource: ResourceId,
    pub signals: Vec<Signal>,
}

impl SignalBundle {
    pub(crate) fn from_decl(decl: &ResourceDecl) -> Self {
        let base = format!("{}{}", decl.name, decl.index);
        let signals = if decl.is_composite() {
            decl.subsignals
                .iter()
                .map(|sub| Signal {
                    name: format!("{base}_{}", sub.name),
                    pins: sub.pins.clone(),
                    io_standard: sub
                        .io_standard
                        .clone()
                        .unwrap_or_else(|| decl.io_standard.clone()),
                    direction: sub.direction,
                    misc: decl.misc.iter().chain(sub.misc.iter()).cloned().collect(),
                })
                .collect()
        } else {
            vec![Signal {
                name: base,
                pins: decl.pins.clone(),
                io_standard: decl.io_standard.clone(),
                direction: decl.direction,
                misc: decl.misc.clone(),
            }]
        };
        Self {
            resource: decl.id(),
            signals,
        }
    }

    /// Look up a signal by subsignal name (or the whole signal of a
    /// single-signal resource when `sub` is empty).
    pub fn signal(&self, sub: &str) -> Option<&Signal> {
        if sub.is_empty() {
            return self.signals.first();
        }
        let name = format!("{}{}_{sub}", self.resource.name, self.resource.index);
        self.signals.iter().find(|s| s.name == name)
    }

    /// The signal of a single-signal resource.
    pub fn primary(&self) -> Option<&Signal> {
        self.signals.first()
    }

    /// Total number of pins bound.
    pub fn pin_count(&self) -> usize {
        self.signals.iter().map(Signal::width).sum()
    }
}

/// Immutable declarations of a board's physical resources.
#[derive(Debug, Clone, Default)]
pub struct ResourceBank {
    decls: BTreeMap<ResourceId, ResourceDecl>,
    pin_owner: BTreeMap<String, ResourceId>,
}

impl ResourceBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bank from every resource a board declares.
    pub fn from_board(board: &Board) -> Result<Self> {
        let mut bank = Self::new();
        for decl in &board.io {
            bank.declare(decl.clone())?;
        }
        Ok(bank)
    }

    /// Register a resource. Identities and pins must be unique.
    pub fn declare(&mut self, decl: ResourceDecl) -> Result<()> {
        let id = decl.id();
        if self.decls.contains_key(&id) {
            return Err(ElaborationError::DuplicateDeclaration { resource: id });
        }
        for pin in decl.all_pins() {
            if let Some(first) = self.pin_owner.get(pin) {
                return Err(ElaborationError::PinConflict {
                    pin: pin.to_string(),
                    first: first.clone(),
                    second: id,
                });
            }
        }
        for pin in decl.all_pins() {
            self.pin_owner.insert(pin.to_string(), id.clone());
        }
        self.decls.insert(id, decl);
        Ok(())
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceDecl> {
        self.decls.get(id)
    }

    /// Declared indices for a resource name, ascending.
    pub fn indices(&self, name: &str) -> Vec<u32> {
        self.decls
            .keys()
            .filter(|id| id.name == name)
            .map(|id| id.index)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDecl> {
        self.decls.values()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Total number of package pins declared.
    pub fn pin_count(&self) -> usize {
        self.pin_owner.len()
    }
}

/// A recorded claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub resource: ResourceId,
    /// Name of the consumer that holds the claim.
    pub owner: String,
}

/// A clock period constraint on a top-level signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodConstraint {
    pub signal: String,
    pub period_ns: f64,
}

/// Resource claims for one board during one elaboration.
#[derive(Debug, Clone)]
pub struct Platform {
    name: String,
    bank: ResourceBank,
    /// The only resource that may be looked up without a claim.
    reference_clock: String,
    claims: BTreeMap<ResourceId, String>,
    constraints: Vec<PeriodConstraint>,
}

impl Platform {
    /// Create a platform over a board's declarations.
    pub fn new(board: &Board) -> Result<Self> {
        let bank = ResourceBank::from_board(board)?;
        Ok(Self::from_bank(
            &board.name,
            bank,
            &board.reference_clock.resource,
        ))
    }

    /// Create a platform over an existing bank.
    pub fn from_bank(name: &str, bank: ResourceBank, reference_clock: &str) -> Self {
        Self {
            name: name.into(),
            bank,
            reference_clock: reference_clock.into(),
            claims: BTreeMap::new(),
            constraints: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bank(&self) -> &ResourceBank {
        &self.bank
    }

    pub fn reference_clock(&self) -> &str {
        &self.reference_clock
    }

    /// Claim a resource for `owner` and return its signals.
    ///
    /// With `index = None` the lowest-index unclaimed resource of that name
    /// is bound.
    pub fn request(&mut self, owner: &str, name: &str, index: Option<u32>) -> Result<SignalBundle> {
        let id = self.resolve(name, index)?;
        if let Some(holder) = self.claims.get(&id) {
            return Err(ElaborationError::AlreadyClaimed {
                resource: id,
                owner: holder.clone(),
            });
        }
        let decl = self
            .bank
            .get(&id)
            .ok_or_else(|| ElaborationError::UnknownResource {
                name: name.into(),
                index,
            })?;
        let bundle = SignalBundle::from_decl(decl);
        debug!(resource = %id, owner, pins = bundle.pin_count(), "claimed resource");
        self.claims.insert(id, owner.into());
        Ok(bundle)
    }

    /// Read the reference clock's signals without claiming it.
    ///
    /// Any other resource is refused so that loose access cannot become a
    /// back door around the claim table.
    pub fn request_loose(&self, name: &str, index: Option<u32>) -> Result<SignalBundle> {
        if name != self.reference_clock {
            return Err(ElaborationError::LooseRequestDenied {
                name: name.into(),
                reference: self.reference_clock.clone(),
            });
        }
        let index = match index {
            Some(i) => i,
            None => self.bank.indices(name).first().copied().ok_or_else(|| {
                ElaborationError::UnknownResource {
                    name: name.into(),
                    index: None,
                }
            })?,
        };
        let id = ResourceId::new(name, index);
        self.bank
            .get(&id)
            .map(SignalBundle::from_decl)
            .ok_or(ElaborationError::UnknownResource {
                name: name.into(),
                index: Some(index),
            })
    }

    fn resolve(&self, name: &str, index: Option<u32>) -> Result<ResourceId> {
        let indices = self.bank.indices(name);
        if indices.is_empty() {
            return Err(ElaborationError::UnknownResource {
                name: name.into(),
                index,
            });
        }
        match index {
            Some(i) if indices.contains(&i) => Ok(ResourceId::new(name, i)),
            Some(i) => Err(ElaborationError::UnknownResource {
                name: name.into(),
                index: Some(i),
            }),
            None => {
                let free = indices
                    .iter()
                    .map(|&i| ResourceId::new(name, i))
                    .find(|id| !self.claims.contains_key(id));
                match free {
                    Some(id) => Ok(id),
                    None => {
                        // Report against the first declaration so the holder is named.
                        let id = ResourceId::new(name, indices[0]);
                        let owner = self.claims.get(&id).cloned().unwrap_or_default();
                        Err(ElaborationError::AlreadyClaimed { resource: id, owner })
                    }
                }
            }
        }
    }

    /// Add a period constraint on a signal.
    pub fn add_period_constraint(&mut self, signal: &Signal, period_ns: f64) {
        debug!(signal = %signal.name, period_ns, "period constraint");
        self.constraints.push(PeriodConstraint {
            signal: signal.name.clone(),
            period_ns,
        });
    }

    pub fn is_claimed(&self, id: &ResourceId) -> bool {
        self.claims.contains_key(id)
    }

    /// Current holder of a resource, if claimed.
    pub fn owner_of(&self, id: &ResourceId) -> Option<&str> {
        self.claims.get(id).map(String::as_str)
    }

    /// All claims, ordered by resource identity.
    pub fn claims(&self) -> Vec<Claim> {
        self.claims
            .iter()
            .map(|(resource, owner)| Claim {
                resource: resource.clone(),
                owner: owner.clone(),
            })
            .collect()
    }

    /// Declared resources nobody has claimed.
    pub fn unclaimed(&self) -> Vec<ResourceId> {
        self.bank
            .iter()
            .map(ResourceDecl::id)
            .filter(|id| !self.claims.contains_key(id))
            .collect()
    }

    pub fn constraints(&self) -> &[PeriodConstraint] {
        &self.constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn au() -> Platform {
        Platform::new(&Board::alchitry_au()).unwrap()
    }

    #[test]
    fn claim_single_resource() {
        let mut p = au();
        let led = p.request("leds", "user_led", Some(2)).unwrap();
        assert_eq!(led.resource, ResourceId::new("user_led", 2));
        assert_eq!(led.primary().unwrap().name, "user_led2");
        assert_eq!(led.primary().unwrap().pins, vec!["L14"]);
        assert!(p.is_claimed(&ResourceId::new("user_led", 2)));
        assert_eq!(p.owner_of(&ResourceId::new("user_led", 2)), Some("leds"));
    }

    #[test]
    fn claim_composite_resource() {
        let mut p = au();
        let serial = p.request("bridge", "serial", None).unwrap();
        let tx = serial.signal("tx").unwrap();
        assert_eq!(tx.name, "serial0_tx");
        assert_eq!(tx.pins, vec!["P16"]);
        assert_eq!(tx.direction, Direction::Output);
        assert_eq!(serial.pin_count(), 2);
    }

    #[test]
    fn subsignal_overrides_and_misc() {
        let mut p = au();
        let ddram = p.request("ddrphy", "ddram", Some(0)).unwrap();
        let dqs = ddram.signal("dqs_p").unwrap();
        assert_eq!(dqs.io_standard, "DIFF_SSTL135");
        assert_eq!(dqs.misc, vec!["SLEW=FAST", "IN_TERM=UNTUNED_SPLIT_50"]);
        let dq = ddram.signal("dq").unwrap();
        assert_eq!(dq.width(), 16);
        assert_eq!(dq.io_standard, "SSTL135");
    }

    #[test]
    fn double_claim_rejected() {
        let mut p = au();
        p.request("crg", "cpu_reset", Some(0)).unwrap();
        let err = p.request("other", "cpu_reset", Some(0)).unwrap_err();
        match err {
            ElaborationError::AlreadyClaimed { owner, .. } => assert_eq!(owner, "crg"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_resource_rejected() {
        let mut p = au();
        assert!(matches!(
            p.request("x", "spi_flash", None).unwrap_err(),
            ElaborationError::UnknownResource { .. }
        ));
        assert!(matches!(
            p.request("x", "user_led", Some(8)).unwrap_err(),
            ElaborationError::UnknownResource { index: Some(8), .. }
        ));
    }

    #[test]
    fn unindexed_request_takes_lowest_free() {
        let mut p = au();
        p.request("a", "user_led", Some(0)).unwrap();
        let next = p.request("b", "user_led", None).unwrap();
        assert_eq!(next.resource.index, 1);
        for _ in 2..8 {
            p.request("c", "user_led", None).unwrap();
        }
        assert!(matches!(
            p.request("d", "user_led", None).unwrap_err(),
            ElaborationError::AlreadyClaimed { .. }
        ));
    }

    #[test]
    fn loose_lookup_reference_clock_only() {
        let mut p = au();
        p.request("crg", "clk100", None).unwrap();
        let clk = p.request_loose("clk100", None).unwrap();
        assert_eq!(clk.primary().unwrap().pins, vec!["N14"]);
        assert_eq!(p.claims().len(), 1);

        assert!(matches!(
            p.request_loose("cpu_reset", None).unwrap_err(),
            ElaborationError::LooseRequestDenied { .. }
        ));
    }

    #[test]
    fn bank_rejects_duplicates() {
        let mut bank = ResourceBank::new();
        bank.declare(ResourceDecl::single("led", 0, "A1", "LVCMOS33"))
            .unwrap();
        assert!(matches!(
            bank.declare(ResourceDecl::single("led", 0, "A2", "LVCMOS33"))
                .unwrap_err(),
            ElaborationError::DuplicateDeclaration { .. }
        ));
        assert!(matches!(
            bank.declare(ResourceDecl::single("led", 1, "A1", "LVCMOS33"))
                .unwrap_err(),
            ElaborationError::PinConflict { .. }
        ));
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn unclaimed_tracks_claims() {
        let mut p = Platform::new(&Board::mojo_v3()).unwrap();
        let total = p.bank().len();
        p.request("crg", "clk50", None).unwrap();
        assert_eq!(p.unclaimed().len(), total - 1);
    }
}
