//! Clock Domain Generator.
//!
//! Derives the design's clock domains from the board's reference oscillator
//! through one PLL. The solver walks the family's divider and multiplier
//! ranges, preferring the highest VCO frequency, and accepts an output when
//! some integer divider lands within the family's relative margin of the
//! request.
//!
//! Reset-bearing domains leave reset only once the PLL reports lock and the
//! external reset (plus any auxiliary gates) is released. Resetless domains
//! never carry a reset of their own; logic placed on them borrows the
//! synchronized sys reset.

use std::fmt;

use fabric_boards::{Board, DeviceFamily, PllLimits};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ElaborationError, Result};
use crate::platform::Platform;

/// Owner name used for every claim made by the clock/reset generator.
pub const CRG: &str = "crg";

/// Signal asserted by the PLL once its outputs are stable.
pub const LOCK_SIGNAL: &str = "pll_locked";

/// Reset discipline of a clock domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// Reset released synchronously after PLL lock.
    Synchronous,
    /// Never reset.
    Resetless,
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetPolicy::Synchronous => write!(f, "synchronous"),
            ResetPolicy::Resetless => write!(f, "resetless"),
        }
    }
}

/// A generated clock domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDomain {
    pub name: String,
    /// Frequency actually produced by the PLL.
    pub frequency_hz: u64,
    /// Frequency that was asked for.
    pub requested_hz: u64,
    pub phase_deg: u32,
    pub reset_policy: ResetPolicy,
    /// Reset signal name for reset-bearing domains.
    pub reset_signal: Option<String>,
}

impl ClockDomain {
    pub fn is_resetless(&self) -> bool {
        self.reset_policy == ResetPolicy::Resetless
    }

    /// Clock period in nanoseconds.
    pub fn period_ns(&self) -> f64 {
        1e9 / self.frequency_hz as f64
    }
}

/// One configured PLL output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PllOutput {
    pub domain: String,
    pub divider: u32,
    pub phase_deg: u32,
    pub requested_hz: u64,
    pub actual_hz: f64,
}

/// A solved PLL configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PllConfig {
    pub primitive: String,
    pub clkin_hz: u64,
    pub divclk: u32,
    pub mult: u32,
    pub vco_hz: f64,
    pub outputs: Vec<PllOutput>,
}

impl PllConfig {
    pub fn output(&self, domain: &str) -> Option<&PllOutput> {
        self.outputs.iter().find(|o| o.domain == domain)
    }
}

#[derive(Debug, Clone)]
struct ClockInput {
    signal: String,
    frequency_hz: u64,
}

#[derive(Debug, Clone)]
struct OutputRequest {
    domain: String,
    frequency_hz: u64,
    phase_deg: u32,
    resetless: bool,
}

/// An external reset input. Active-low inputs are inverted before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSource {
    pub signal: String,
    pub active_low: bool,
}

impl fmt::Display for ResetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.active_low {
            write!(f, "~{}", self.signal)
        } else {
            write!(f, "{}", self.signal)
        }
    }
}

/// The combined reset condition feeding every reset-bearing domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetNetwork {
    pub sources: Vec<ResetSource>,
    pub lock_signal: String,
}

impl ResetNetwork {
    /// External reset expression, e.g. `~cpu_reset0 | ~cclk0`.
    pub fn external(&self) -> String {
        self.sources
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Full domain reset condition: held until lock and external release.
    pub fn condition(&self) -> String {
        if self.sources.is_empty() {
            format!("~{}", self.lock_signal)
        } else {
            format!("~{} | {}", self.lock_signal, self.external())
        }
    }
}

/// PLL-based generator of clock domains.
#[derive(Debug, Clone)]
pub struct ClockDomainGenerator {
    limits: PllLimits,
    clkin: Option<ClockInput>,
    outputs: Vec<OutputRequest>,
    resets: Vec<ResetSource>,
}

impl ClockDomainGenerator {
    pub fn new(limits: PllLimits) -> Self {
        Self {
            limits,
            clkin: None,
            outputs: Vec::new(),
            resets: Vec::new(),
        }
    }

    pub fn limits(&self) -> &PllLimits {
        &self.limits
    }

    /// Register the reference input.
    pub fn register_clkin(&mut self, signal: &str, frequency_hz: u64) -> Result<()> {
        let (lo, hi) = self.limits.clkin_hz;
        if frequency_hz < lo || frequency_hz > hi {
            return Err(ElaborationError::UnachievableFrequency {
                domain: signal.into(),
                requested_hz: frequency_hz,
                reference_hz: frequency_hz,
                primitive: self.limits.primitive.clone(),
            });
        }
        self.clkin = Some(ClockInput {
            signal: signal.into(),
            frequency_hz,
        });
        Ok(())
    }

    /// Request an output domain.
    pub fn create_clkout(
        &mut self,
        domain: &str,
        frequency_hz: u64,
        phase_deg: u32,
        resetless: bool,
    ) -> Result<()> {
        if self.outputs.iter().any(|o| o.domain == domain) {
            return Err(ElaborationError::InvalidClockPlan {
                detail: format!("domain '{domain}' requested twice"),
            });
        }
        if self.outputs.len() >= self.limits.max_outputs {
            return Err(ElaborationError::InvalidClockPlan {
                detail: format!(
                    "{} has only {} outputs; cannot add '{domain}'",
                    self.limits.primitive, self.limits.max_outputs
                ),
            });
        }
        if frequency_hz == 0 {
            return Err(self.unachievable(domain, frequency_hz));
        }
        self.outputs.push(OutputRequest {
            domain: domain.into(),
            frequency_hz,
            phase_deg,
            resetless,
        });
        Ok(())
    }

    /// Add an external reset input.
    pub fn add_reset(&mut self, signal: &str, active_low: bool) {
        self.resets.push(ResetSource {
            signal: signal.into(),
            active_low,
        });
    }

    /// Name of the registered reference input.
    pub fn clkin_signal(&self) -> Option<&str> {
        self.clkin.as_ref().map(|c| c.signal.as_str())
    }

    fn reference_hz(&self) -> u64 {
        self.clkin.as_ref().map_or(0, |c| c.frequency_hz)
    }

    fn unachievable(&self, domain: &str, requested_hz: u64) -> ElaborationError {
        ElaborationError::UnachievableFrequency {
            domain: domain.into(),
            requested_hz,
            reference_hz: self.reference_hz(),
            primitive: self.limits.primitive.clone(),
        }
    }

    /// Candidate VCO settings, highest VCO first within each input divider.
    fn vco_candidates(&self, clkin_hz: u64) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        let l = &self.limits;
        (l.divclk.0..=l.divclk.1).flat_map(move |divclk| {
            (l.mult.0..=l.mult.1).rev().filter_map(move |mult| {
                let vco = clkin_hz as f64 * f64::from(mult) / f64::from(divclk);
                (vco >= l.vco_hz.0 as f64 && vco <= l.vco_hz.1 as f64)
                    .then_some((divclk, mult, vco))
            })
        })
    }

    fn fit_output(&self, vco: f64, req: &OutputRequest) -> Option<PllOutput> {
        let margin = self.limits.margin_ppm as f64 / 1e6;
        let target = req.frequency_hz as f64;
        let (lo, hi) = self.limits.clkout_div;
        (lo..=hi).find_map(|divider| {
            let actual = vco / f64::from(divider);
            ((actual - target).abs() <= target * margin).then(|| PllOutput {
                domain: req.domain.clone(),
                divider,
                phase_deg: req.phase_deg,
                requested_hz: req.frequency_hz,
                actual_hz: actual,
            })
        })
    }

    /// Find a PLL configuration producing every requested output.
    pub fn solve(&self) -> Result<PllConfig> {
        let clkin = self
            .clkin
            .as_ref()
            .ok_or_else(|| ElaborationError::InvalidClockPlan {
                detail: "no reference clock registered".into(),
            })?;
        if self.outputs.is_empty() {
            return Err(ElaborationError::InvalidClockPlan {
                detail: "no output domains requested".into(),
            });
        }

        for (divclk, mult, vco) in self.vco_candidates(clkin.frequency_hz) {
            let fitted: Option<Vec<PllOutput>> = self
                .outputs
                .iter()
                .map(|req| self.fit_output(vco, req))
                .collect();
            if let Some(outputs) = fitted {
                debug!(divclk, mult, vco_hz = vco, "PLL solution");
                return Ok(PllConfig {
                    primitive: self.limits.primitive.clone(),
                    clkin_hz: clkin.frequency_hz,
                    divclk,
                    mult,
                    vco_hz: vco,
                    outputs,
                });
            }
        }

        // Blame the first output that no VCO setting can produce on its own;
        // if each is reachable alone, the combination is what fails.
        let culprit = self
            .outputs
            .iter()
            .find(|req| {
                self.vco_candidates(clkin.frequency_hz)
                    .all(|(_, _, vco)| self.fit_output(vco, req).is_none())
            })
            .or(self.outputs.last());
        Err(match culprit {
            Some(req) => self.unachievable(&req.domain, req.frequency_hz),
            None => ElaborationError::InvalidClockPlan {
                detail: "no output domains requested".into(),
            },
        })
    }

    /// Solve the PLL and produce the clock domains.
    pub fn generate(&self) -> Result<(PllConfig, Vec<ClockDomain>, ResetNetwork)> {
        let pll = self.solve()?;
        let domains = self
            .outputs
            .iter()
            .zip(&pll.outputs)
            .map(|(req, out)| {
                let reset_policy = if req.resetless {
                    ResetPolicy::Resetless
                } else {
                    ResetPolicy::Synchronous
                };
                ClockDomain {
                    name: req.domain.clone(),
                    frequency_hz: out.actual_hz.round() as u64,
                    requested_hz: req.frequency_hz,
                    phase_deg: req.phase_deg,
                    reset_policy,
                    reset_signal: (!req.resetless).then(|| format!("{}_rst", req.domain)),
                }
            })
            .collect();
        let resets = ResetNetwork {
            sources: self.resets.clone(),
            lock_signal: LOCK_SIGNAL.into(),
        };
        Ok((pll, domains, resets))
    }
}

/// Input-delay calibration block bound to a calibration domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationUnit {
    pub primitive: String,
    pub domain: String,
}

/// A domain clock driven onto a pin through a DDR output register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockForward {
    pub domain: String,
    pub signal: String,
    pub primitive: String,
}

/// Everything the clock/reset generator produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockTree {
    /// Reference input signal.
    pub clkin_signal: String,
    pub pll: PllConfig,
    pub domains: Vec<ClockDomain>,
    pub resets: ResetNetwork,
    pub calibration: Vec<CalibrationUnit>,
    pub forwards: Vec<ClockForward>,
}

impl ClockTree {
    pub fn domain(&self, name: &str) -> Option<&ClockDomain> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// The system domain.
    pub fn sys(&self) -> Option<&ClockDomain> {
        self.domain("sys")
    }

    pub fn sys_frequency_hz(&self) -> u64 {
        self.sys().map_or(0, |d| d.frequency_hz)
    }

    /// Reset signal logic on `domain` should use: its own for reset-bearing
    /// domains, the synchronized sys reset for resetless ones.
    pub fn reset_for(&self, domain: &str) -> Option<&str> {
        let d = self.domain(domain)?;
        match &d.reset_signal {
            Some(rst) => Some(rst),
            None => self.sys()?.reset_signal.as_deref(),
        }
    }

    /// Reset-bearing domains, in the order their synchronizers are built.
    pub fn reset_domains(&self) -> impl Iterator<Item = &ClockDomain> {
        self.domains.iter().filter(|d| !d.is_resetless())
    }
}

/// DDR output primitive used to forward a clock on a given family.
fn ddr_output_primitive(family: DeviceFamily) -> &'static str {
    match family {
        DeviceFamily::Spartan6 => "ODDR2",
        DeviceFamily::Artix7 => "ODDR",
    }
}

/// Claim the clock and reset pins of `board` and generate its clock plan
/// for the requested system frequency.
pub fn build_clock_tree(board: &Board, platform: &mut Platform, sys_clk_hz: u64) -> Result<ClockTree> {
    if board.clock_output("sys").is_none() {
        return Err(ElaborationError::InvalidClockPlan {
            detail: format!("board '{}' has no 'sys' domain", board.name),
        });
    }

    let mut gen = ClockDomainGenerator::new(board.device.pll_limits());

    let clk = platform.request(CRG, &board.reference_clock.resource, None)?;
    let clkin_signal = clk
        .primary()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| board.reference_clock.resource.clone());
    gen.register_clkin(&clkin_signal, board.reference_clock.frequency_hz)?;
    // No output divider can exceed the VCO ceiling.
    if sys_clk_hz > gen.limits().vco_hz.1 {
        return Err(gen.unachievable("sys", sys_clk_hz));
    }

    let mut reset_pins = vec![board.reset.resource.as_str()];
    reset_pins.extend(board.reset.gates.iter().map(String::as_str));
    for name in reset_pins {
        let bundle = platform.request(CRG, name, None)?;
        if let Some(sig) = bundle.primary() {
            gen.add_reset(&sig.name, board.reset.active_low);
        }
    }

    let mut calibration = Vec::new();
    let mut forwards = Vec::new();
    for out in &board.clock_plan {
        let requested = out
            .frequency_hz(sys_clk_hz)
            .ok_or_else(|| gen.unachievable(&out.domain, u64::MAX))?;
        gen.create_clkout(&out.domain, requested, out.phase_deg, out.resetless)?;
        if out.calibration {
            if !board.device.has_idelayctrl() {
                return Err(ElaborationError::InvalidClockPlan {
                    detail: format!(
                        "calibration domain '{}' on {} which has no IDELAYCTRL",
                        out.domain, board.device.part
                    ),
                });
            }
            calibration.push(CalibrationUnit {
                primitive: "IDELAYCTRL".into(),
                domain: out.domain.clone(),
            });
        }
        if let Some(target) = &out.forward_to {
            let pin = platform.request(CRG, target, None)?;
            let signal = pin
                .primary()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| target.clone());
            forwards.push(ClockForward {
                domain: out.domain.clone(),
                signal,
                primitive: ddr_output_primitive(board.device.family).into(),
            });
        }
    }

    let (pll, domains, resets) = gen.generate()?;
    let clkin_signal = gen.clkin_signal().unwrap_or(&clkin_signal).to_string();
    info!(
        primitive = %pll.primitive,
        vco_hz = pll.vco_hz,
        domains = domains.len(),
        "clock domains generated"
    );
    Ok(ClockTree {
        clkin_signal,
        pll,
        domains,
        resets,
        calibration,
        forwards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_boards::PllLimits;

    #[test]
    fn alchitry_au_plan() {
        let board = Board::alchitry_au();
        let mut platform = Platform::new(&board).unwrap();
        let tree = build_clock_tree(&board, &mut platform, 83_333_333).unwrap();

        assert_eq!(tree.domains.len(), 4);
        assert_eq!(tree.pll.vco_hz, 1e9);
        assert_eq!(tree.pll.mult, 10);
        assert_eq!(tree.pll.divclk, 1);
        let dividers: Vec<u32> = tree.pll.outputs.iter().map(|o| o.divider).collect();
        assert_eq!(dividers, vec![12, 3, 3, 5]);

        assert_eq!(tree.sys_frequency_hz(), 83_333_333);
        assert!(tree.domain("sys4x").unwrap().is_resetless());
        assert!(tree.domain("sys4x_dqs").unwrap().is_resetless());
        assert_eq!(tree.domain("sys4x_dqs").unwrap().phase_deg, 90);
        assert_eq!(tree.domain("clk200").unwrap().frequency_hz, 200_000_000);
        assert_eq!(tree.calibration.len(), 1);
        assert_eq!(tree.calibration[0].domain, "clk200");
        assert_eq!(tree.resets.condition(), "~pll_locked | ~cpu_reset0");
    }

    #[test]
    fn reset_signals_are_distinct() {
        let board = Board::alchitry_au();
        let mut platform = Platform::new(&board).unwrap();
        let tree = build_clock_tree(&board, &mut platform, 83_333_333).unwrap();
        let resets: Vec<&str> = tree
            .domains
            .iter()
            .filter_map(|d| d.reset_signal.as_deref())
            .collect();
        assert_eq!(resets, vec!["sys_rst", "clk200_rst"]);
        assert_eq!(tree.reset_for("sys4x"), Some("sys_rst"));
        assert_eq!(tree.reset_for("clk200"), Some("clk200_rst"));
    }

    #[test]
    fn mojo_v3_plan() {
        let board = Board::mojo_v3();
        let mut platform = Platform::new(&board).unwrap();
        let tree = build_clock_tree(&board, &mut platform, 66_666_666).unwrap();

        assert_eq!(tree.domains.len(), 2);
        assert_eq!(tree.pll.primitive, "PLL_BASE");
        assert_eq!(tree.pll.vco_hz, 1e9);
        assert_eq!(tree.pll.output("sys").unwrap().divider, 15);
        assert_eq!(tree.forwards.len(), 1);
        assert_eq!(tree.forwards[0].signal, "sdram_clock0");
        assert_eq!(tree.forwards[0].primitive, "ODDR2");
        assert!(tree.calibration.is_empty());
        assert_eq!(
            tree.resets.condition(),
            "~pll_locked | ~cpu_reset0 | ~cclk0"
        );
        // Clock, reset, gate and forwarded clock pins are claimed.
        assert_eq!(platform.claims().len(), 4);
    }

    #[test]
    fn unachievable_output_is_named() {
        let mut gen = ClockDomainGenerator::new(PllLimits::spartan6(-2));
        gen.register_clkin("clk50", 50_000_000).unwrap();
        gen.create_clkout("sys", 50_000_000, 0, false).unwrap();
        gen.create_clkout("fast", 1_200_000_000, 0, false).unwrap();
        match gen.solve().unwrap_err() {
            ElaborationError::UnachievableFrequency {
                domain,
                requested_hz,
                reference_hz,
                ..
            } => {
                assert_eq!(domain, "fast");
                assert_eq!(requested_hz, 1_200_000_000);
                assert_eq!(reference_hz, 50_000_000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reference_out_of_range() {
        let mut gen = ClockDomainGenerator::new(PllLimits::artix7(-1));
        assert!(matches!(
            gen.register_clkin("clk10", 10_000_000).unwrap_err(),
            ElaborationError::UnachievableFrequency { .. }
        ));
    }

    #[test]
    fn output_count_and_duplicates_bounded() {
        let mut gen = ClockDomainGenerator::new(PllLimits::artix7(-1));
        gen.register_clkin("clk100", 100_000_000).unwrap();
        for i in 0..6 {
            gen.create_clkout(&format!("d{i}"), 50_000_000, 0, false)
                .unwrap();
        }
        assert!(matches!(
            gen.create_clkout("d6", 50_000_000, 0, false).unwrap_err(),
            ElaborationError::InvalidClockPlan { .. }
        ));
        assert!(matches!(
            gen.create_clkout("d0", 50_000_000, 0, false).unwrap_err(),
            ElaborationError::InvalidClockPlan { .. }
        ));
    }

    #[test]
    fn calibration_needs_idelayctrl() {
        let mut board = Board::mojo_v3();
        board
            .clock_plan
            .push(fabric_boards::ClockOutput::calibration("clk200", 200_000_000));
        let mut platform = Platform::new(&board).unwrap();
        assert!(matches!(
            build_clock_tree(&board, &mut platform, 66_666_666).unwrap_err(),
            ElaborationError::InvalidClockPlan { .. }
        ));
    }

    #[test]
    fn solve_without_clkin() {
        let gen = ClockDomainGenerator::new(PllLimits::artix7(-1));
        assert!(matches!(
            gen.solve().unwrap_err(),
            ElaborationError::InvalidClockPlan { .. }
        ));
    }
}
