//! Vendor toolchain backends.
//!
//! A [`Backend`] knows how to lay out a project for one vendor flow (constraint
//! file, build script) and which programs to invoke. Running the programs is
//! shared: each invocation runs in the staging directory, its output is
//! appended to the build log, and the first non-zero exit aborts the build.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use fabric_boards::{Board, Toolchain};
use fabric_core::ElaboratedDesign;
use tracing::{debug, info};

use crate::constraints::{render_ucf, render_xdc};
use crate::error::{BuildError, Result};

/// Lines of tool output kept in a failure message.
const LOG_TAIL_LINES: usize = 40;

/// One program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A file written into the staging directory before the tools run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    pub name: String,
    pub contents: String,
}

/// A vendor flow.
pub trait Backend {
    /// Human-readable tool name.
    fn name(&self) -> &'static str;

    /// Main executable, probed by `fabric doctor`.
    fn program(&self) -> &'static str;

    /// Constraint and script files for a build.
    fn project_files(
        &self,
        build_name: &str,
        design: &ElaboratedDesign,
        board: &Board,
        sources: &[PathBuf],
    ) -> Vec<ProjectFile>;

    /// Programs to run, in order.
    fn invocations(&self, build_name: &str) -> Vec<Invocation>;

    /// Bitstream files a successful run leaves behind.
    fn bitstreams(&self, build_name: &str) -> Vec<String>;

    /// Scan the tool output for failures that do not set an exit status.
    fn check_log(&self, _log: &str) -> Option<String> {
        None
    }
}

/// Replace `{build_name}` placeholders in a board command.
pub fn expand_command(command: &str, build_name: &str) -> String {
    command.replace("{build_name}", build_name)
}

/// Xilinx Vivado (7-series).
#[derive(Debug, Clone, Default)]
pub struct Vivado;

impl Backend for Vivado {
    fn name(&self) -> &'static str {
        "Vivado"
    }

    fn program(&self) -> &'static str {
        "vivado"
    }

    fn project_files(
        &self,
        build_name: &str,
        design: &ElaboratedDesign,
        board: &Board,
        sources: &[PathBuf],
    ) -> Vec<ProjectFile> {
        let platform: Vec<String> = board
            .platform_commands
            .iter()
            .map(|c| expand_command(c, build_name))
            .collect();
        let xdc = render_xdc(design, &platform);

        let mut tcl = String::new();
        tcl.push_str(&format!(
            "create_project -force -name {build_name} -part {}\n",
            design.part
        ));
        for src in sources {
            tcl.push_str(&format!("read_verilog {{{}}}\n", src.display()));
        }
        tcl.push_str(&format!("read_xdc {build_name}.xdc\n"));
        tcl.push_str(&format!(
            "synth_design -directive default -top {build_name} -part {}\n",
            design.part
        ));
        tcl.push_str("report_utilization -hierarchical -file ");
        tcl.push_str(&format!("{build_name}_utilization_hierarchical_synth.rpt\n"));
        tcl.push_str("opt_design\nplace_design\nroute_design\n");
        tcl.push_str(&format!(
            "report_timing_summary -file {build_name}_timing.rpt\n"
        ));
        for cmd in &board.bitstream_commands {
            tcl.push_str(&expand_command(cmd, build_name));
            tcl.push('\n');
        }
        tcl.push_str(&format!("write_bitstream -force {build_name}.bit\n"));
        for cmd in &board.additional_commands {
            tcl.push_str(&expand_command(cmd, build_name));
            tcl.push('\n');
        }
        tcl.push_str("quit\n");

        vec![
            ProjectFile {
                name: format!("{build_name}.xdc"),
                contents: xdc,
            },
            ProjectFile {
                name: format!("{build_name}.tcl"),
                contents: tcl,
            },
        ]
    }

    fn invocations(&self, build_name: &str) -> Vec<Invocation> {
        let script = format!("{build_name}.tcl");
        vec![Invocation::new(
            self.program(),
            &["-mode", "batch", "-source", &script],
        )]
    }

    fn bitstreams(&self, build_name: &str) -> Vec<String> {
        vec![format!("{build_name}.bit"), format!("{build_name}.bin")]
    }

    fn check_log(&self, log: &str) -> Option<String> {
        log.lines()
            .find(|l| l.contains("Timing constraints are not met"))
            .map(|l| l.trim().to_string())
    }
}

/// Xilinx ISE (Spartan-6).
#[derive(Debug, Clone, Default)]
pub struct Ise;

impl Backend for Ise {
    fn name(&self) -> &'static str {
        "ISE"
    }

    fn program(&self) -> &'static str {
        "xst"
    }

    fn project_files(
        &self,
        build_name: &str,
        design: &ElaboratedDesign,
        board: &Board,
        sources: &[PathBuf],
    ) -> Vec<ProjectFile> {
        let platform: Vec<String> = board
            .platform_commands
            .iter()
            .map(|c| expand_command(c, build_name))
            .collect();
        let ucf = render_ucf(design, &platform);

        let prj: String = sources
            .iter()
            .map(|s| format!("verilog work {}\n", s.display()))
            .collect();
        let xst = format!(
            "run\n-ifn {build_name}.prj\n-top {build_name}\n-ifmt MIXED\n-opt_mode SPEED\n-reduce_control_sets auto\n-register_balancing yes\n-ofn {build_name}.ngc\n-p {}\n",
            design.part
        );
        let mut ut = String::from("-w\n-g Binary:Yes\n-g StartUpClk:CClk\n");
        for cmd in &board.bitstream_commands {
            ut.push_str(&expand_command(cmd, build_name));
            ut.push('\n');
        }

        vec![
            ProjectFile {
                name: format!("{build_name}.ucf"),
                contents: ucf,
            },
            ProjectFile {
                name: format!("{build_name}.prj"),
                contents: prj,
            },
            ProjectFile {
                name: format!("{build_name}.xst"),
                contents: xst,
            },
            ProjectFile {
                name: format!("{build_name}.ut"),
                contents: ut,
            },
        ]
    }

    fn invocations(&self, build_name: &str) -> Vec<Invocation> {
        let b = build_name;
        let xst = format!("{b}.xst");
        let ucf = format!("{b}.ucf");
        let ngc = format!("{b}.ngc");
        let ngd = format!("{b}.ngd");
        let map_ncd = format!("{b}_map.ncd");
        let pcf = format!("{b}.pcf");
        let ncd = format!("{b}.ncd");
        let ut = format!("{b}.ut");
        vec![
            Invocation::new("xst", &["-ifn", &xst]),
            Invocation::new("ngdbuild", &["-uc", &ucf, &ngc, &ngd]),
            Invocation::new("map", &["-ol", "high", "-w", "-o", &map_ncd, &ngd, &pcf]),
            Invocation::new("par", &["-ol", "high", "-w", &map_ncd, &ncd, &pcf]),
            Invocation::new("bitgen", &["-f", &ut, &ncd, b, &pcf]),
        ]
    }

    fn bitstreams(&self, build_name: &str) -> Vec<String> {
        vec![format!("{build_name}.bit"), format!("{build_name}.bin")]
    }

    fn check_log(&self, log: &str) -> Option<String> {
        log.lines()
            .find(|l| l.contains("timing constraint") && l.contains("not met"))
            .map(|l| l.trim().to_string())
    }
}

/// The backend for a board's toolchain.
pub fn backend_for(toolchain: Toolchain) -> Box<dyn Backend> {
    match toolchain {
        Toolchain::Vivado => Box::new(Vivado),
        Toolchain::Ise => Box::new(Ise),
    }
}

/// Locate an executable on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn tail(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run a backend's invocations in `dir`, accumulating their output in `log`.
pub fn run_backend(
    backend: &dyn Backend,
    build_name: &str,
    dir: &Path,
    log: &mut String,
) -> Result<()> {
    for inv in backend.invocations(build_name) {
        info!(program = %inv.program, "running toolchain step");
        debug!(args = ?inv.args, dir = %dir.display(), "invocation");
        log.push_str(&format!("$ {} {}\n", inv.program, inv.args.join(" ")));

        let output = Command::new(&inv.program)
            .args(&inv.args)
            .current_dir(dir)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BuildError::ToolchainNotFound {
                    program: inv.program.clone(),
                },
                _ => BuildError::io(dir, e),
            })?;
        log.push_str(&String::from_utf8_lossy(&output.stdout));
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let detail = match output.status.code() {
                Some(code) => format!("'{}' exited with status {code}", inv.program),
                None => format!("'{}' was terminated by a signal", inv.program),
            };
            return Err(BuildError::ToolchainFailure {
                tool: backend.name().into(),
                detail,
                log: tail(log),
            });
        }
    }
    if let Some(detail) = backend.check_log(log) {
        return Err(BuildError::ToolchainFailure {
            tool: backend.name().into(),
            detail,
            log: tail(log),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_core::{elaborate, SocConfig};

    fn files_for(board: &Board) -> Vec<ProjectFile> {
        let design = elaborate(board, &SocConfig::for_board(board)).unwrap();
        backend_for(board.device.toolchain).project_files(
            "top",
            &design,
            board,
            &[PathBuf::from("top.v")],
        )
    }

    #[test]
    fn vivado_project() {
        let board = Board::alchitry_au();
        let files = files_for(&board);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["top.xdc", "top.tcl"]);
        let tcl = &files[1].contents;
        assert!(tcl.contains("create_project -force -name top -part xc7a35t"));
        assert!(tcl.contains("read_verilog {top.v}"));
        assert!(tcl.contains("CONFIGRATE 33"));
        assert!(tcl.ends_with(
            "write_bitstream -force top.bit\nwrite_bitstream -force -bin_file top\nquit\n"
        ));
        assert!(!tcl.contains("{build_name}"));
    }

    #[test]
    fn ise_project() {
        let board = Board::mojo_v3();
        let files = files_for(&board);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["top.ucf", "top.prj", "top.xst", "top.ut"]);
        assert_eq!(files[1].contents, "verilog work top.v\n");
        let steps: Vec<String> = Ise.invocations("top").into_iter().map(|i| i.program).collect();
        assert_eq!(steps, vec!["xst", "ngdbuild", "map", "par", "bitgen"]);
    }

    #[test]
    fn placeholder_expansion() {
        assert_eq!(
            expand_command("write_cfgmem -loadbit {up 0x0 {build_name}.bit} {build_name}.bin", "soc"),
            "write_cfgmem -loadbit {up 0x0 soc.bit} soc.bin"
        );
    }

    #[test]
    fn timing_failure_detected() {
        let log = "route_design\nCRITICAL WARNING: [Timing 38-282] Timing constraints are not met.\n";
        assert!(Vivado.check_log(log).is_some());
        assert!(Vivado.check_log("all good").is_none());
    }

    #[test]
    fn missing_program_reported() {
        struct Missing;
        impl Backend for Missing {
            fn name(&self) -> &'static str {
                "Missing"
            }
            fn program(&self) -> &'static str {
                "fabric-no-such-tool"
            }
            fn project_files(
                &self,
                _: &str,
                _: &ElaboratedDesign,
                _: &Board,
                _: &[PathBuf],
            ) -> Vec<ProjectFile> {
                Vec::new()
            }
            fn invocations(&self, _: &str) -> Vec<Invocation> {
                vec![Invocation::new("fabric-no-such-tool", &[])]
            }
            fn bitstreams(&self, _: &str) -> Vec<String> {
                Vec::new()
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let mut log = String::new();
        assert!(matches!(
            run_backend(&Missing, "top", dir.path(), &mut log).unwrap_err(),
            BuildError::ToolchainNotFound { .. }
        ));
    }
}
