//! `fabric doctor`: toolchain diagnostics.

use std::path::Path;

use anyhow::Result;
use fabric_boards::parse::resolve_board;
use fabric_boards::Toolchain;
use fabric_build::{backend_for, find_program, Backend};

use crate::manifest::FabricManifest;

/// Print toolchain diagnostic information.
pub fn run(project_dir: &Path, board: Option<&str>) -> Result<()> {
    println!("=== Fabric Doctor ===");
    println!();

    println!("Fabric version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("--- Vendor Toolchains ---");
    for toolchain in [Toolchain::Vivado, Toolchain::Ise] {
        let backend = backend_for(toolchain);
        print_tool_status(backend.as_ref());
    }
    println!();

    println!("--- Project Status ---");
    let mut default_board = None;
    match FabricManifest::find_and_load(project_dir) {
        Ok(Some((manifest, dir))) => {
            println!("  fabric.toml: found at {}", dir.display());
            println!("  Project:     {}", manifest.project.name);
            println!("  Version:     {}", manifest.project.version);
            if let Some(name) = manifest.default_board() {
                println!("  Default board: {name}");
                default_board = Some(name.to_string());
            }
        }
        Ok(None) => {
            println!("  fabric.toml: not found");
        }
        Err(e) => {
            println!("  fabric.toml: error: {e:#}");
        }
    }

    if let Some(name) = board.map(str::to_string).or(default_board) {
        println!();
        println!("--- Board: {name} ---");
        match resolve_board(&name, Some(project_dir)) {
            Ok(b) => {
                let backend = backend_for(b.device.toolchain);
                println!("  Part:      {}", b.device.part);
                println!("  Toolchain: {}", backend.name());
                let ready = find_program(backend.program()).is_some();
                println!(
                    "  Status:    {}",
                    if ready { "ready to build" } else { "elaboration only (toolchain missing)" }
                );
            }
            Err(e) => {
                println!("  {e}");
            }
        }
    }

    Ok(())
}

fn print_tool_status(backend: &dyn Backend) {
    match find_program(backend.program()) {
        Some(path) => println!("  {}: {}", backend.name(), path.display()),
        None => println!("  {}: not found ({} not on PATH)", backend.name(), backend.program()),
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn doctor_runs_without_error() {
        let dir = tempfile::tempdir().unwrap();
        super::run(dir.path(), None).unwrap();
    }

    #[test]
    fn doctor_with_board() {
        let dir = tempfile::tempdir().unwrap();
        super::run(dir.path(), Some("mojo-v3")).unwrap();
        super::run(dir.path(), Some("no-such-board")).unwrap();
    }
}
