//! Fabric CLI: compose an FPGA SoC for a board and drive its vendor toolchain.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::build::BuildArgs;
use commands::SocArgs;
use manifest::FabricManifest;

#[derive(Parser)]
#[command(name = "fabric", version, about = "Compose and build FPGA SoCs")]
struct Cli {
    /// Log more (-v info, -vv debug); RUST_LOG also applies
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new fabric project
    Init {
        /// Project name
        name: String,
    },
    /// Elaborate a SoC and build its bitstream
    Build(BuildArgs),
    /// Print the CSR map of a SoC without building it
    Csr {
        #[command(flatten)]
        soc: SocArgs,
        /// Output format: table, csv, json
        #[arg(long)]
        format: Option<String>,
    },
    /// Inspect and manage board records
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },
    /// Check vendor toolchain availability
    Doctor {
        /// Also report on this board
        #[arg(long)]
        board: Option<String>,
    },
    /// Remove build artifacts
    Clean {
        /// Output directory (default: from fabric.toml, else build)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BoardAction {
    /// List built-in and project boards
    List,
    /// Show a board record
    Describe {
        /// Board name
        name: String,
        /// Dump as toml or json instead of a summary
        #[arg(long)]
        format: Option<String>,
    },
    /// Validate a .board.toml file
    Validate {
        /// Path to the board file
        file: PathBuf,
    },
    /// Create boards/<name>.board.toml from a template
    Add {
        /// Board name
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = init_tracing(cli.verbose).and_then(|()| run(cli));
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&name),

        Commands::Build(args) => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or(cwd);
            commands::build::run(&project_dir, manifest.as_ref(), &args)
        }

        Commands::Csr { soc, format } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or(cwd);
            commands::csr::run(&project_dir, manifest.as_ref(), &soc, format.as_deref())
        }

        Commands::Board { action } => {
            let (_, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or_else(|| cwd.clone());
            match action {
                BoardAction::List => commands::board::list(Some(&project_dir)),
                BoardAction::Describe { name, format } => {
                    commands::board::describe(&name, Some(&project_dir), format.as_deref())
                }
                BoardAction::Validate { file } => commands::board::validate(&cwd.join(file)),
                BoardAction::Add { name } => {
                    let (_, project_dir) = load_manifest_required(&cwd)?;
                    commands::board::add(&name, &project_dir)
                }
            }
        }

        Commands::Doctor { board } => {
            let (_, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or(cwd);
            commands::doctor::run(&project_dir, board.as_deref())
        }

        Commands::Clean { output_dir } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or(cwd);
            let out = output_dir
                .or_else(|| {
                    manifest
                        .and_then(|m| m.build)
                        .and_then(|b| b.output_dir)
                        .map(PathBuf::from)
                })
                .unwrap_or_else(|| PathBuf::from(commands::DEFAULT_OUTPUT_DIR));
            commands::clean::run(&project_dir.join(out))
        }
    }
}

/// Load the manifest or fail with a hint to run `fabric init`.
fn load_manifest_required(cwd: &Path) -> anyhow::Result<(FabricManifest, PathBuf)> {
    match FabricManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((manifest, dir)),
        None => anyhow::bail!("no fabric.toml found (run `fabric init` first)"),
    }
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(cwd: &Path) -> anyhow::Result<(Option<FabricManifest>, Option<PathBuf>)> {
    match FabricManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::fs;

    /// Full workflow: init, csr, build without compiling, clean.
    #[test]
    fn init_csr_build_clean_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("workflow-test");

        // 1. Init
        commands::init::create_project(&project_path, "workflow-test").unwrap();

        // 2. Manifest is found from a nested directory
        let (manifest, project_dir) =
            load_manifest_required(&project_path.join("rtl")).unwrap();
        assert_eq!(project_dir, project_path);

        // 3. CSR map from the manifest's board
        commands::csr::run(&project_dir, Some(&manifest), &SocArgs::default(), Some("csv"))
            .unwrap();

        // 4. Build without a toolchain
        let args = BuildArgs {
            no_compile: true,
            ..Default::default()
        };
        commands::build::run(&project_dir, Some(&manifest), &args).unwrap();
        let gateware = project_dir.join("build/gateware");
        assert!(gateware.join("top.tcl").is_file());
        let csv = fs::read_to_string(gateware.join("csr.csv")).unwrap();
        assert!(csv.contains("csr_base,leds,0x82002800,,"));

        // 5. Clean
        commands::clean::run(&project_dir.join("build")).unwrap();
        assert!(!project_dir.join("build").exists());
    }

    #[test]
    fn manifest_required_without_project() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest_required(dir.path()).unwrap_err();
        assert!(err.to_string().contains("fabric init"));
    }

    #[test]
    fn cli_parses_build_flags() {
        let cli = Cli::try_parse_from([
            "fabric",
            "-vv",
            "build",
            "--board",
            "mojo-v3",
            "--sys-clk-freq",
            "50e6",
            "--max-mem-size",
            "0x1000000",
            "--order",
            "bridge,status",
            "--source",
            "a.v",
            "--source",
            "b.v",
            "--no-compile",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.soc.sys_clk_freq, Some(50_000_000));
        assert_eq!(args.soc.max_mem_size, Some(0x100_0000));
        assert_eq!(
            args.soc.order,
            Some(vec![fabric_core::Slot::Bridge, fabric_core::Slot::Status])
        );
        assert_eq!(args.sources.len(), 2);
        assert!(args.no_compile);
    }

    #[test]
    fn cli_rejects_unknown_slot() {
        assert!(Cli::try_parse_from(["fabric", "csr", "--order", "uart"]).is_err());
    }
}
