//! `fabric board`: board listing, description, validation and scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use fabric_boards::parse::{
    board_to_toml, board_warnings, discover_boards, generate_template, load_board_toml,
    resolve_board, validate_board,
};
use fabric_boards::{Board, ClockFrequency};

/// List built-in boards and any project-local ones.
pub fn list(project_dir: Option<&Path>) -> Result<()> {
    println!("Built-in boards:");
    println!();
    for (name, description) in Board::builtin_boards() {
        println!("  {name:<20} {description}");
    }

    if let Some(dir) = project_dir {
        let local = discover_boards(dir)?;
        if !local.is_empty() {
            println!();
            println!("Project boards:");
            println!();
            for (name, path) in &local {
                println!("  {name:<20} {}", path.display());
            }
        }
    }

    println!();
    println!("Use 'fabric board describe <name>' for details.");
    Ok(())
}

/// Describe a board in detail, or dump it as `toml` / `json`.
pub fn describe(name: &str, project_dir: Option<&Path>, format: Option<&str>) -> Result<()> {
    let board = resolve_board(name, project_dir)
        .context("use 'fabric board list' to see available boards")?;

    match format {
        Some("toml") => print!("{}", board_to_toml(&board)?),
        Some("json") => println!("{}", serde_json::to_string_pretty(&board)?),
        Some(other) => bail!("unknown format '{other}' (expected toml or json)"),
        None => print!("{}", summary(&board)),
    }
    Ok(())
}

fn summary(board: &Board) -> String {
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line(format!("=== Board: {} ===", board.name));
    line(board.description.clone());
    line(String::new());

    line("--- Device ---".into());
    line(format!("  Part:       {}", board.device.part));
    line(format!("  Family:     {:?}", board.device.family));
    line(format!("  Toolchain:  {:?}", board.device.toolchain));
    line(String::new());

    line("--- Clocking ---".into());
    line(format!(
        "  Reference:  {} @ {:.3} MHz",
        board.reference_clock.resource,
        board.reference_clock.frequency_hz as f64 / 1e6
    ));
    line(format!(
        "  Sys clock:  {:.3} MHz (default)",
        board.default_sys_clk_hz as f64 / 1e6
    ));
    for clock in &board.clock_plan {
        let freq = match clock.frequency {
            ClockFrequency::SysMultiple(1) => "sys".to_string(),
            ClockFrequency::SysMultiple(n) => format!("{n}x sys"),
            ClockFrequency::Fixed(hz) => format!("{:.3} MHz", hz as f64 / 1e6),
        };
        let mut extra = Vec::new();
        if clock.phase_deg != 0 {
            extra.push(format!("phase {}°", clock.phase_deg));
        }
        if clock.resetless {
            extra.push("resetless".into());
        }
        if clock.calibration {
            extra.push("calibration".into());
        }
        if let Some(ref pin) = clock.forward_to {
            extra.push(format!("-> {pin}"));
        }
        line(format!("    {:<10} {freq:<12} {}", clock.domain, extra.join(", ")));
    }
    line(String::new());

    if let Some(ref memory) = board.memory {
        line("--- Memory ---".into());
        line(format!(
            "  Module:     {} ({:?}, rate {})",
            memory.module.name, memory.module.memtype, memory.module.rate
        ));
        line(format!(
            "  PHY:        {:?} on '{}', {} bits",
            memory.phy.kind, memory.phy.resource, memory.phy.data_width
        ));
        let capacity = memory
            .capacity_bytes()
            .map_or_else(|| "overflows 64 bits".to_string(), |c| format!("{c} bytes"));
        line(format!("  Capacity:   {capacity}"));
        line(String::new());
    }

    line("--- I/O ---".into());
    for decl in &board.io {
        line(format!(
            "  {:<12} {:<3} {} pins",
            decl.name,
            decl.index,
            decl.pin_count()
        ));
    }
    out
}

/// Validate a `.board.toml` file and print its issues.
pub fn validate(path: &Path) -> Result<()> {
    let board =
        load_board_toml(path).with_context(|| format!("loading {}", path.display()))?;

    let warnings = board_warnings(&board);
    for w in &warnings {
        println!("  warning: {}", w.message);
    }

    match validate_board(&board) {
        Ok(()) => {
            println!(
                "Board '{}' is valid ({} warnings)",
                board.name,
                warnings.len()
            );
            Ok(())
        }
        Err(issues) => {
            for issue in issues.iter().filter(|i| i.severity == "error") {
                println!("  error: {}", issue.message);
            }
            bail!("board '{}' failed validation", board.name)
        }
    }
}

/// Write a new `boards/<name>.board.toml` from the template.
pub fn add(name: &str, project_dir: &Path) -> Result<()> {
    let boards_dir = project_dir.join("boards");
    let path = boards_dir.join(format!("{name}.board.toml"));
    if path.exists() {
        bail!("board file '{}' already exists", path.display());
    }
    fs::create_dir_all(&boards_dir).context("creating boards/ directory")?;
    fs::write(&path, generate_template(name)?)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_builtins() {
        describe("alchitry-au", None, None).unwrap();
        describe("mojo-v3", None, Some("toml")).unwrap();
        describe("mojo-v3", None, Some("json")).unwrap();
    }

    #[test]
    fn describe_unknown_board() {
        assert!(describe("arty-a7", None, None).is_err());
        assert!(describe("mojo-v3", None, Some("yaml")).is_err());
    }

    #[test]
    fn summary_mentions_forwarding() {
        let text = summary(&Board::mojo_v3());
        assert!(text.contains("=== Board: mojo-v3 ==="));
        assert!(text.contains("-> sdram_clock"));
        assert!(text.contains("--- Memory ---"));
    }

    #[test]
    fn add_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        add("custom", dir.path()).unwrap();
        let path = dir.path().join("boards/custom.board.toml");
        assert!(path.is_file());
        validate(&path).unwrap();
        list(Some(dir.path())).unwrap();
        assert!(describe("custom", Some(dir.path()), None).is_ok());
    }

    #[test]
    fn add_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        add("custom", dir.path()).unwrap();
        let err = add("custom", dir.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn validate_rejects_duplicate_pins() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = Board::alchitry_au();
        let mut dup = board.io[0].clone();
        dup.index += 100;
        board.io.push(dup);
        let path = dir.path().join("dup.board.toml");
        fs::write(&path, board_to_toml(&board).unwrap()).unwrap();
        assert!(validate(&path).is_err());
    }
}
