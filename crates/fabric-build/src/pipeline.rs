//! Build pipeline orchestrator.
//!
//! elaborate -> stage artifacts -> run toolchain -> promote. Everything is
//! written to a temporary staging directory first; the output directory is
//! touched only after the toolchain succeeds, so a failed build never leaves
//! partial artifacts behind.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use fabric_boards::Board;
use fabric_core::{elaborate, ElaboratedDesign, SocConfig};
use tracing::{debug, info};

use crate::csr::CsrMap;
use crate::error::{BuildError, Result};
use crate::report::{BuildReport, DomainSummary};
use crate::toolchain::{backend_for, run_backend, Backend};
use crate::usage::usage_report;

/// Subdirectory of the output directory that receives promoted artifacts.
pub const GATEWARE_DIR: &str = "gateware";

/// Configuration for one build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub board: Board,
    pub soc: SocConfig,
    /// Top-level name; also the stem of every toolchain file.
    pub build_name: String,
    pub output_dir: PathBuf,
    /// Run the vendor toolchain. When false, only the elaboration artifacts
    /// are produced.
    pub compile: bool,
    /// HDL sources implementing the design graph.
    pub sources: Vec<PathBuf>,
    /// Extra location for the CSV CSR map.
    pub csr_csv: Option<PathBuf>,
}

impl BuildConfig {
    /// Board defaults, compile enabled, no sources.
    pub fn new(board: Board, build_name: &str, output_dir: impl Into<PathBuf>) -> Self {
        let soc = SocConfig::for_board(&board);
        Self {
            board,
            soc,
            build_name: build_name.into(),
            output_dir: output_dir.into(),
            compile: true,
            sources: Vec::new(),
            csr_csv: None,
        }
    }
}

/// Output of a successful build.
#[derive(Debug)]
pub struct BuildOutput {
    pub design: ElaboratedDesign,
    pub csr_map: CsrMap,
    pub report: BuildReport,
    pub gateware_dir: PathBuf,
}

fn validate_build_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(BuildError::InvalidBuildName { name: name.into() })
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|e| BuildError::io(&path, e))?;
    debug!(file = %path.display(), bytes = contents.len(), "staged");
    Ok(path)
}

/// Run the full pipeline with the board's own toolchain backend.
pub fn build(config: BuildConfig) -> Result<BuildOutput> {
    let backend = backend_for(config.board.device.toolchain);
    build_with(config, backend.as_ref())
}

/// Run the full pipeline with an explicit backend.
pub fn build_with(config: BuildConfig, backend: &dyn Backend) -> Result<BuildOutput> {
    let start = Instant::now();
    validate_build_name(&config.build_name)?;
    let name = config.build_name.as_str();

    // Stage 1: elaboration
    let design = elaborate(&config.board, &config.soc)?;
    let csr_map = CsrMap::from_design(&design)?;

    if config.compile && config.sources.is_empty() {
        return Err(BuildError::NoSources {
            build_name: name.into(),
        });
    }
    let sources = config
        .sources
        .iter()
        .map(|s| fs::canonicalize(s).map_err(|e| BuildError::io(s, e)))
        .collect::<Result<Vec<_>>>()?;

    // Stage 2: staging
    let staging = tempfile::Builder::new()
        .prefix("fabric-build-")
        .tempdir()
        .map_err(|e| BuildError::io(env::temp_dir(), e))?;
    let dir = staging.path();
    info!(board = %design.board, build = name, staging = %dir.display(), "staging build");

    let mut staged = vec![
        write_file(dir, "design.json", &serde_json::to_string_pretty(&design)?)?,
        write_file(dir, "csr.csv", &csr_map.to_csv())?,
        write_file(dir, "csr.json", &csr_map.to_json()?)?,
    ];
    for file in backend.project_files(name, &design, &config.board, &sources) {
        staged.push(write_file(dir, &file.name, &file.contents)?);
    }

    // Stage 3: toolchain
    if config.compile {
        let mut log = String::new();
        run_backend(backend, name, dir, &mut log)?;
        staged.push(write_file(dir, "build.log", &log)?);
        for bit in backend.bitstreams(name) {
            let path = dir.join(&bit);
            if path.is_file() {
                staged.push(path);
            }
        }
    }

    // Stage 4: promotion
    let gateware_dir = config.output_dir.join(GATEWARE_DIR);
    fs::create_dir_all(&gateware_dir).map_err(|e| BuildError::io(&gateware_dir, e))?;
    let mut artifacts = Vec::new();
    for path in &staged {
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let dest = gateware_dir.join(file_name);
        fs::copy(path, &dest).map_err(|e| BuildError::io(&dest, e))?;
        artifacts.push(dest);
    }
    if let Some(csv) = &config.csr_csv {
        if let Some(parent) = csv.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::write(csv, csr_map.to_csv()).map_err(|e| BuildError::io(csv, e))?;
        artifacts.push(csv.clone());
    }
    info!(dir = %gateware_dir.display(), files = artifacts.len(), "artifacts promoted");

    let report = BuildReport {
        board: design.board.clone(),
        build_name: name.into(),
        part: design.part.clone(),
        toolchain: backend.name().into(),
        sys_clk_hz: design.sys_clk_hz,
        domains: design
            .clocks
            .domains
            .iter()
            .map(|d| DomainSummary {
                name: d.name.clone(),
                frequency_hz: d.frequency_hz,
                phase_deg: d.phase_deg,
                resetless: d.is_resetless(),
            })
            .collect(),
        regions: design
            .bus
            .regions
            .iter()
            .map(|r| (r.name.clone(), r.base, r.size))
            .collect(),
        csr_banks: design.bus.banks.len(),
        csr_registers: csr_map.registers.len(),
        csr_fingerprint: csr_map.fingerprint.clone(),
        usage: usage_report(&design, &config.board),
        compiled: config.compile,
        duration_ms: start.elapsed().as_millis() as u64,
        artifacts,
    };

    Ok(BuildOutput {
        design,
        csr_map,
        report,
        gateware_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{Invocation, ProjectFile};

    /// Runs a shell snippet in place of a vendor tool.
    struct Shell(&'static str);

    impl Backend for Shell {
        fn name(&self) -> &'static str {
            "shell"
        }
        fn program(&self) -> &'static str {
            "sh"
        }
        fn project_files(
            &self,
            build_name: &str,
            _: &ElaboratedDesign,
            _: &Board,
            _: &[PathBuf],
        ) -> Vec<ProjectFile> {
            vec![ProjectFile {
                name: format!("{build_name}.sh"),
                contents: self.0.into(),
            }]
        }
        fn invocations(&self, build_name: &str) -> Vec<Invocation> {
            let script = format!("{build_name}.sh");
            vec![Invocation::new("sh", &[&script])]
        }
        fn bitstreams(&self, build_name: &str) -> Vec<String> {
            vec![format!("{build_name}.bit")]
        }
    }

    fn config(out: &Path) -> BuildConfig {
        BuildConfig::new(Board::alchitry_au(), "top", out)
    }

    #[test]
    fn no_compile_promotes_elaboration_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir.path().join("build"));
        cfg.compile = false;
        cfg.csr_csv = Some(dir.path().join("test/csr.csv"));

        let output = build(cfg).unwrap();
        let gw = &output.gateware_dir;
        for f in ["design.json", "csr.csv", "csr.json", "top.xdc", "top.tcl"] {
            assert!(gw.join(f).is_file(), "missing {f}");
        }
        assert!(!gw.join("build.log").exists());
        let copy = fs::read_to_string(dir.path().join("test/csr.csv")).unwrap();
        assert_eq!(copy, output.csr_map.to_csv());
        assert!(!output.report.compiled);
        assert_eq!(output.report.domains.len(), 4);
    }

    #[test]
    fn design_json_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.compile = false;
        let output = build(cfg).unwrap();
        let json = fs::read_to_string(output.gateware_dir.join("design.json")).unwrap();
        let back: ElaboratedDesign = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output.design);
    }

    #[test]
    fn compile_requires_sources() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("build");
        assert!(matches!(
            build(config(&out)).unwrap_err(),
            BuildError::NoSources { .. }
        ));
        assert!(!out.exists());
    }

    #[test]
    fn invalid_build_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.build_name = "../escape".into();
        assert!(matches!(
            build(cfg).unwrap_err(),
            BuildError::InvalidBuildName { .. }
        ));
    }

    #[test]
    fn elaboration_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.compile = false;
        cfg.soc.sys_clk_hz = 5_000_000_000;
        assert!(matches!(
            build(cfg).unwrap_err(),
            BuildError::Elaboration(fabric_core::ElaborationError::UnachievableFrequency { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn toolchain_failure_promotes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("top.v");
        fs::write(&src, "module top(); endmodule\n").unwrap();
        let out = dir.path().join("build");
        let mut cfg = config(&out);
        cfg.sources = vec![src];

        let err = build_with(cfg, &Shell("echo synth error; exit 3\n")).unwrap_err();
        match err {
            BuildError::ToolchainFailure { tool, detail, log } => {
                assert_eq!(tool, "shell");
                assert!(detail.contains("status 3"));
                assert!(log.contains("synth error"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn toolchain_success_promotes_bitstream() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("top.v");
        fs::write(&src, "module top(); endmodule\n").unwrap();
        let mut cfg = config(dir.path());
        cfg.sources = vec![src];

        let output = build_with(cfg, &Shell("echo bitstream > top.bit\n")).unwrap();
        assert!(output.gateware_dir.join("top.bit").is_file());
        assert!(output.gateware_dir.join("build.log").is_file());
        assert!(output.report.compiled);
    }
}
