//! TOML parsing, serialization, validation, and discovery for board records.
//!
//! Custom boards are stored as `.board.toml` files in the `boards/` directory
//! of a fabric project. This module provides functions to load, validate,
//! serialize, and discover these files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::board::Board;
use crate::device::Toolchain;
use crate::error::{BoardError, Result};
use crate::io::ResourceId;

/// A validation issue found in a board record.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn error(message: String) -> Self {
        Self {
            severity: "error",
            message,
        }
    }

    fn warning(message: String) -> Self {
        Self {
            severity: "warning",
            message,
        }
    }
}

/// Load a board from a `.board.toml` file.
pub fn load_board_toml(path: &Path) -> Result<Board> {
    if !path.exists() {
        return Err(BoardError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_board_toml(&content)
}

/// Parse a board from a TOML string.
pub fn parse_board_toml(toml_str: &str) -> Result<Board> {
    let board: Board = toml::from_str(toml_str)?;
    Ok(board)
}

/// Serialize a board to pretty TOML.
pub fn board_to_toml(board: &Board) -> Result<String> {
    let toml_str = toml::to_string_pretty(board)?;
    Ok(toml_str)
}

/// Validate a board record for structural correctness.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
/// Warnings alone do not make a board invalid.
pub fn validate_board(board: &Board) -> std::result::Result<(), Vec<ValidationIssue>> {
    let issues = collect_issues(board);
    if issues.iter().any(|i| i.severity == "error") {
        Err(issues)
    } else {
        Ok(())
    }
}

fn collect_issues(board: &Board) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // Unique resource identities
    let mut seen = BTreeSet::new();
    for decl in &board.io {
        if !seen.insert(decl.id()) {
            issues.push(ValidationIssue::error(format!(
                "resource {} is declared more than once",
                decl.id()
            )));
        }
        if decl.pin_count() == 0 {
            issues.push(ValidationIssue::error(format!(
                "resource {} has no pins",
                decl.id()
            )));
        }
    }

    // No package pin shared between resources
    let mut pin_owner: BTreeMap<&str, ResourceId> = BTreeMap::new();
    for decl in &board.io {
        for pin in decl.all_pins() {
            if let Some(owner) = pin_owner.get(pin) {
                issues.push(ValidationIssue::error(format!(
                    "pin {pin} is assigned to both {owner} and {}",
                    decl.id()
                )));
            } else {
                pin_owner.insert(pin, decl.id());
            }
        }
    }

    let declared = |name: &str| board.io.iter().any(|r| r.name == name);

    if !declared(&board.reference_clock.resource) {
        issues.push(ValidationIssue::error(format!(
            "reference clock resource '{}' is not declared",
            board.reference_clock.resource
        )));
    }
    if board.reference_clock.frequency_hz == 0 {
        issues.push(ValidationIssue::error(
            "reference clock frequency is zero".into(),
        ));
    }

    if !declared(&board.reset.resource) {
        issues.push(ValidationIssue::error(format!(
            "reset resource '{}' is not declared",
            board.reset.resource
        )));
    }
    for gate in &board.reset.gates {
        if !declared(gate) {
            issues.push(ValidationIssue::error(format!(
                "reset gate resource '{gate}' is not declared"
            )));
        }
    }

    // Clock plan
    if board.clock_output("sys").is_none() {
        issues.push(ValidationIssue::error(
            "clock plan has no 'sys' domain".into(),
        ));
    }
    let mut domains = BTreeSet::new();
    for out in &board.clock_plan {
        if !domains.insert(out.domain.as_str()) {
            issues.push(ValidationIssue::error(format!(
                "clock domain '{}' appears more than once",
                out.domain
            )));
        }
        if out.phase_deg >= 360 {
            issues.push(ValidationIssue::error(format!(
                "clock domain '{}' has phase {} (expected 0..360)",
                out.domain, out.phase_deg
            )));
        }
        if let Some(target) = &out.forward_to {
            if !declared(target) {
                issues.push(ValidationIssue::error(format!(
                    "clock domain '{}' forwards to undeclared resource '{target}'",
                    out.domain
                )));
            }
        }
        if out.calibration && !board.device.has_idelayctrl() {
            issues.push(ValidationIssue::warning(format!(
                "calibration domain '{}' on a device without IDELAYCTRL",
                out.domain
            )));
        }
    }
    let limits = board.device.pll_limits();
    if board.clock_plan.len() > limits.max_outputs {
        issues.push(ValidationIssue::error(format!(
            "clock plan has {} domains but {} supports {}",
            board.clock_plan.len(),
            limits.primitive,
            limits.max_outputs
        )));
    }

    // Memory
    if let Some(mem) = &board.memory {
        match board.resource(&mem.phy.resource, 0) {
            None => issues.push(ValidationIssue::error(format!(
                "memory resource '{}' is not declared",
                mem.phy.resource
            ))),
            Some(decl) => match decl.subsignal("dq") {
                None => issues.push(ValidationIssue::error(format!(
                    "memory resource '{}' has no 'dq' subsignal",
                    mem.phy.resource
                ))),
                Some(dq) if dq.pins.len() as u32 != mem.phy.data_width => {
                    issues.push(ValidationIssue::error(format!(
                        "PHY data width {} does not match {} dq pins",
                        mem.phy.data_width,
                        dq.pins.len()
                    )))
                }
                Some(_) => {}
            },
        }
        if mem.module.memtype != mem.phy.kind.memtype() {
            issues.push(ValidationIssue::error(format!(
                "module {} is {:?} but the PHY drives {:?}",
                mem.module.name,
                mem.module.memtype,
                mem.phy.kind.memtype()
            )));
        }
        if mem.module.rate != mem.phy.rate() {
            issues.push(ValidationIssue::warning(format!(
                "module rate {} differs from PHY rate {}",
                mem.module.rate,
                mem.phy.rate()
            )));
        }
        if !mem.cache_size.is_power_of_two() && mem.cache_size != 0 {
            issues.push(ValidationIssue::error(format!(
                "cache size {} is not a power of two",
                mem.cache_size
            )));
        }
        match mem.capacity_bytes() {
            None => issues.push(ValidationIssue::error(format!(
                "module {} has {} address bits; capacity does not fit in 64 bits",
                mem.module.name,
                mem.module.address_bits()
            ))),
            Some(capacity) if mem.default_max_size > capacity => {
                issues.push(ValidationIssue::warning(format!(
                    "default memory ceiling 0x{:X} exceeds module capacity 0x{capacity:X}",
                    mem.default_max_size
                )))
            }
            Some(_) => {}
        }
    }

    if board.serial_baudrate == 0 {
        issues.push(ValidationIssue::error("serial baud rate is zero".into()));
    }

    if board.device.toolchain == Toolchain::Ise && !board.additional_commands.is_empty() {
        issues.push(ValidationIssue::warning(
            "additional-commands are Vivado TCL and are ignored by the ISE flow".into(),
        ));
    }

    issues
}

/// Collect warnings for a board that otherwise validates.
pub fn board_warnings(board: &Board) -> Vec<ValidationIssue> {
    collect_issues(board)
        .into_iter()
        .filter(|i| i.severity == "warning")
        .collect()
}

/// Generate a template `.board.toml` for a new board.
///
/// Seeds from the Alchitry Au with the given custom name.
pub fn generate_template(name: &str) -> Result<String> {
    let mut board = Board::alchitry_au();
    board.name = name.into();
    board.description = format!("{name} (derived from alchitry-au)");
    board_to_toml(&board)
}

/// Discover all `.board.toml` files in a project's `boards/` directory.
///
/// Returns a list of (board_name, file_path) pairs.
pub fn discover_boards(project_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let boards_dir = project_dir.join("boards");
    if !boards_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut boards = Vec::new();
    for entry in std::fs::read_dir(&boards_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".board.toml"))
            .map(str::to_string);
        if let Some(name) = name {
            boards.push((name, path));
        }
    }
    boards.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(boards)
}

/// Resolve a board by name: project-local `boards/` first, then built-ins.
pub fn resolve_board(name: &str, project_dir: Option<&Path>) -> Result<Board> {
    if let Some(dir) = project_dir {
        let local = discover_boards(dir)?.into_iter().find(|(n, _)| n == name);
        if let Some((_, path)) = local {
            return load_board_toml(&path);
        }
    }
    Board::builtin(name).ok_or_else(|| BoardError::UnknownBoard { name: name.into() })
}
