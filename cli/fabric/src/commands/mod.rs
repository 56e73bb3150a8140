//! CLI command implementations.

pub mod board;
pub mod build;
pub mod clean;
pub mod csr;
pub mod doctor;
pub mod init;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use fabric_boards::parse::{board_warnings, resolve_board, validate_board};
use fabric_boards::Board;
use fabric_core::{Slot, SocConfig};
use tracing::warn;

use crate::manifest::FabricManifest;

/// Output directory used when neither the flags nor the manifest name one.
pub const DEFAULT_OUTPUT_DIR: &str = "build";

/// Elaboration knobs shared by `build` and `csr`.
#[derive(Debug, Clone, Default, Args)]
pub struct SocArgs {
    /// Board name (built-in or boards/<name>.board.toml)
    #[arg(long)]
    pub board: Option<String>,
    /// System clock frequency in Hz (e.g., 100e6)
    #[arg(long, value_parser = parse_frequency)]
    pub sys_clk_freq: Option<u64>,
    /// Ceiling for the main memory region in bytes (decimal or 0x hex)
    #[arg(long, value_parser = parse_size)]
    pub max_mem_size: Option<u64>,
    /// Cache size in bytes
    #[arg(long, value_parser = parse_size)]
    pub cache_size: Option<u64>,
    /// Minimum cache data width in bits
    #[arg(long)]
    pub min_cache_width: Option<u32>,
    /// Suffix appended to the SoC identifier
    #[arg(long)]
    pub ident_version: Option<String>,
    /// Board peripherals in registration order (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub order: Option<Vec<Slot>>,
}

/// Parse a frequency given in Hz, accepting exponent notation.
pub fn parse_frequency(s: &str) -> std::result::Result<u64, String> {
    let hz: f64 = s
        .parse()
        .map_err(|_| format!("invalid frequency '{s}'"))?;
    if !hz.is_finite() || hz <= 0.0 {
        return Err(format!("frequency must be positive, got '{s}'"));
    }
    Ok(hz.round() as u64)
}

/// Parse a byte count in decimal or `0x` hex.
pub fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let cleaned = s.replace('_', "");
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse(),
    };
    parsed.map_err(|_| format!("invalid size '{s}'"))
}

/// Load and validate the board named by the flags or the manifest.
pub fn load_board(
    project_dir: &Path,
    manifest: Option<&FabricManifest>,
    board: Option<&str>,
) -> Result<Board> {
    let name = match board.or_else(|| manifest.and_then(|m| m.default_board())) {
        Some(name) => name,
        None => bail!("no board selected: pass --board or set `board` under [build] in fabric.toml"),
    };
    let board = resolve_board(name, Some(project_dir))
        .with_context(|| format!("loading board '{name}'"))?;

    if let Err(issues) = validate_board(&board) {
        let details: Vec<String> = issues
            .iter()
            .map(|i| format!("  {}: {}", i.severity, i.message))
            .collect();
        bail!("board '{name}' is invalid:\n{}", details.join("\n"));
    }
    for issue in board_warnings(&board) {
        warn!(board = name, "{}", issue.message);
    }
    Ok(board)
}

/// Board defaults, overridden by the manifest, overridden by the flags.
pub fn soc_config(board: &Board, manifest: Option<&FabricManifest>, args: &SocArgs) -> SocConfig {
    let section = manifest.map(|m| m.build_section()).unwrap_or_default();
    let mut config = SocConfig::for_board(board);

    if let Some(hz) = args.sys_clk_freq.or(section.sys_clk_freq) {
        config.sys_clk_hz = hz;
    }
    if let Some(size) = args.max_mem_size.or(section.max_mem_size) {
        config.max_mem_size = size;
    }
    if let Some(size) = args.cache_size.or(section.cache_size) {
        config.cache_size = size;
    }
    if let Some(width) = args.min_cache_width.or(section.min_cache_width) {
        config.min_cache_width = width;
    }
    if let Some(version) = args.ident_version.clone().or(section.ident_version) {
        config.ident_version = Some(version);
    }
    if let Some(order) = args.order.clone().or(section.order) {
        config = config.with_order(order);
    }
    config
}

/// Resolve the board and its elaboration knobs in one step.
pub fn resolve_soc(
    project_dir: &Path,
    manifest: Option<&FabricManifest>,
    args: &SocArgs,
) -> Result<(Board, SocConfig)> {
    let board = load_board(project_dir, manifest, args.board.as_deref())?;
    let config = soc_config(&board, manifest, args);
    Ok((board, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(build: &str) -> FabricManifest {
        FabricManifest::from_str(&format!("[project]\nname = \"t\"\n\n[build]\n{build}")).unwrap()
    }

    #[test]
    fn frequency_accepts_exponent_notation() {
        assert_eq!(parse_frequency("100e6").unwrap(), 100_000_000);
        assert_eq!(parse_frequency("83333333").unwrap(), 83_333_333);
        assert!(parse_frequency("fast").is_err());
        assert!(parse_frequency("-5").is_err());
    }

    #[test]
    fn size_accepts_hex() {
        assert_eq!(parse_size("0x1000_0000").unwrap(), 0x1000_0000);
        assert_eq!(parse_size("8192").unwrap(), 8192);
        assert!(parse_size("0xZZ").is_err());
    }

    #[test]
    fn flags_override_manifest_override_board() {
        let board = Board::alchitry_au();
        let m = manifest("sys-clk-freq = 80000000\ncache-size = 4096\n");
        let args = SocArgs {
            sys_clk_freq: Some(90_000_000),
            ..Default::default()
        };

        let config = soc_config(&board, Some(&m), &args);
        assert_eq!(config.sys_clk_hz, 90_000_000);
        assert_eq!(config.cache_size, 4096);
        assert_eq!(config.max_mem_size, SocConfig::for_board(&board).max_mem_size);
    }

    #[test]
    fn order_from_manifest() {
        let board = Board::mojo_v3();
        let m = manifest("order = [\"status\"]\n");
        let config = soc_config(&board, Some(&m), &SocArgs::default());
        assert_eq!(config.order, vec![Slot::Status]);
    }

    #[test]
    fn board_required() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_board(dir.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("no board selected"));
    }

    #[test]
    fn board_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest("board = \"mojo-v3\"\n");
        let board = load_board(dir.path(), Some(&m), None).unwrap();
        assert_eq!(board.name, "mojo-v3");
    }

    #[test]
    fn unknown_board() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_board(dir.path(), None, Some("arty")).unwrap_err();
        assert!(format!("{err:#}").contains("arty"));
    }
}
