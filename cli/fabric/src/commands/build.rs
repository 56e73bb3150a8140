//! `fabric build`: elaborate, run the vendor toolchain, promote artifacts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use fabric_build::{BuildConfig, BuildOutput};

use super::{resolve_soc, SocArgs, DEFAULT_OUTPUT_DIR};
use crate::manifest::FabricManifest;

#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub soc: SocArgs,
    /// Top-level name used for every toolchain file
    #[arg(long)]
    pub build_name: Option<String>,
    /// Output directory (default: build)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Elaborate and write artifacts without running the toolchain
    #[arg(long)]
    pub no_compile: bool,
    /// Also write the CSV CSR map to this path
    #[arg(long)]
    pub csr_csv: Option<PathBuf>,
    /// HDL source implementing the design (repeatable)
    #[arg(long = "source")]
    pub sources: Vec<PathBuf>,
}

/// Run a build and print its report.
pub fn run(project_dir: &Path, manifest: Option<&FabricManifest>, args: &BuildArgs) -> Result<()> {
    let output = execute(project_dir, manifest, args)?;
    println!("{}", output.report);
    Ok(())
}

pub(crate) fn execute(
    project_dir: &Path,
    manifest: Option<&FabricManifest>,
    args: &BuildArgs,
) -> Result<BuildOutput> {
    let (board, soc) = resolve_soc(project_dir, manifest, &args.soc)?;
    let section = manifest.map(|m| m.build_section()).unwrap_or_default();

    let build_name = args
        .build_name
        .clone()
        .or(section.build_name)
        .unwrap_or_else(|| "top".to_string());
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| section.output_dir.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let sources: Vec<PathBuf> = if args.sources.is_empty() {
        section.sources.iter().map(PathBuf::from).collect()
    } else {
        args.sources.clone()
    };
    let csr_csv = args
        .csr_csv
        .clone()
        .or_else(|| section.csr_csv.map(PathBuf::from));

    let board_name = board.name.clone();
    let config = BuildConfig {
        board,
        soc,
        build_name: build_name.clone(),
        output_dir: project_dir.join(output_dir),
        compile: !args.no_compile,
        sources: sources.iter().map(|s| project_dir.join(s)).collect(),
        csr_csv: csr_csv.map(|p| project_dir.join(p)),
    };

    fabric_build::build(config)
        .with_context(|| format!("building '{build_name}' for {board_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(board: &str) -> BuildArgs {
        BuildArgs {
            soc: SocArgs {
                board: Some(board.into()),
                ..Default::default()
            },
            no_compile: true,
            ..Default::default()
        }
    }

    #[test]
    fn no_compile_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("mojo-v3");
        a.csr_csv = Some(PathBuf::from("test/csr.csv"));

        let output = execute(dir.path(), None, &a).unwrap();
        let gw = dir.path().join("build/gateware");
        for f in ["design.json", "csr.csv", "csr.json", "top.ucf", "top.prj"] {
            assert!(gw.join(f).is_file(), "missing {f}");
        }
        assert!(dir.path().join("test/csr.csv").is_file());
        assert_eq!(output.report.toolchain, "ISE");
    }

    #[test]
    fn manifest_supplies_name_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = FabricManifest::from_str(
            "[project]\nname = \"p\"\n\n[build]\nboard = \"alchitry-au\"\nbuild-name = \"au\"\noutput-dir = \"out\"\n",
        )
        .unwrap();
        let a = BuildArgs {
            no_compile: true,
            ..Default::default()
        };

        execute(dir.path(), Some(&manifest), &a).unwrap();
        assert!(dir.path().join("out/gateware/au.tcl").is_file());
        assert!(dir.path().join("out/gateware/au.xdc").is_file());
    }

    #[test]
    fn compile_without_sources_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("alchitry-au");
        a.no_compile = false;
        let err = execute(dir.path(), None, &a).unwrap_err();
        assert!(format!("{err:#}").contains("no HDL sources"));
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    fn elaboration_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("alchitry-au");
        a.soc.sys_clk_freq = Some(2_000_000_000);
        let err = execute(dir.path(), None, &a).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("building 'top' for alchitry-au"));
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    fn sys_clock_out_of_range_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args("alchitry-au");
        a.soc.sys_clk_freq = Some(10_000_000_000_000_000_000);
        let err = execute(dir.path(), None, &a).unwrap_err();
        assert!(format!("{err:#}").contains("cannot derive 'sys'"));
    }
}
