//! Build report aggregating elaboration and toolchain results.

use std::fmt;
use std::path::PathBuf;

use crate::usage::UsageReport;

/// One generated clock domain, as reported.
#[derive(Debug, Clone)]
pub struct DomainSummary {
    pub name: String,
    pub frequency_hz: u64,
    pub phase_deg: u32,
    pub resetless: bool,
}

/// Summary report of one build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub board: String,
    pub build_name: String,
    pub part: String,
    /// Name of the vendor flow.
    pub toolchain: String,
    pub sys_clk_hz: u64,
    pub domains: Vec<DomainSummary>,
    /// Mapped bus regions as (name, base, size).
    pub regions: Vec<(String, u64, u64)>,
    pub csr_banks: usize,
    pub csr_registers: usize,
    pub csr_fingerprint: String,
    pub usage: UsageReport,
    /// Whether the toolchain was run.
    pub compiled: bool,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
    /// Files promoted to the output directory.
    pub artifacts: Vec<PathBuf>,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Build Report ===")?;
        writeln!(f, "Board: {} ({})", self.board, self.part)?;
        writeln!(f, "Build: {}", self.build_name)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;
        writeln!(f)?;

        writeln!(f, "--- Clock Domains ---")?;
        for d in &self.domains {
            write!(
                f,
                "  {:<10} {:>12.3} MHz",
                d.name,
                d.frequency_hz as f64 / 1e6
            )?;
            if d.phase_deg != 0 {
                write!(f, "  phase {}°", d.phase_deg)?;
            }
            if d.resetless {
                write!(f, "  resetless")?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "--- Bus ---")?;
        for (name, base, size) in &self.regions {
            writeln!(f, "  {name:<10} 0x{base:08X}  size 0x{size:X}")?;
        }
        writeln!(
            f,
            "  CSR: {} registers in {} locations",
            self.csr_registers, self.csr_banks
        )?;
        writeln!(f, "  CSR fingerprint: {}", self.csr_fingerprint)?;

        writeln!(f)?;
        write!(f, "{}", self.usage)?;

        writeln!(f)?;
        writeln!(
            f,
            "--- Toolchain: {} ---",
            if self.compiled {
                format!("{} PASSED", self.toolchain)
            } else {
                format!("{} SKIPPED", self.toolchain)
            }
        )?;
        if !self.artifacts.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Artifacts ---")?;
            for a in &self.artifacts {
                writeln!(f, "  {}", a.display())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::usage_report;
    use fabric_boards::Board;
    use fabric_core::{elaborate, SocConfig};

    #[test]
    fn report_display() {
        let board = Board::mojo_v3();
        let design = elaborate(&board, &SocConfig::for_board(&board)).unwrap();
        let report = BuildReport {
            board: "mojo-v3".into(),
            build_name: "top".into(),
            part: "xc6slx9-2-tqg144".into(),
            toolchain: "ISE".into(),
            sys_clk_hz: 66_666_667,
            domains: vec![
                DomainSummary {
                    name: "sys".into(),
                    frequency_hz: 66_666_667,
                    phase_deg: 0,
                    resetless: false,
                },
                DomainSummary {
                    name: "sys_ps".into(),
                    frequency_hz: 66_666_667,
                    phase_deg: 90,
                    resetless: true,
                },
            ],
            regions: vec![("main_ram".into(), 0x4000_0000, 0x200_0000)],
            csr_banks: 5,
            csr_registers: 12,
            csr_fingerprint: "ab".repeat(32),
            usage: usage_report(&design, &board),
            compiled: false,
            duration_ms: 3,
            artifacts: vec![PathBuf::from("build/gateware/csr.csv")],
        };

        let output = format!("{report}");
        assert!(output.contains("=== Build Report ==="));
        assert!(output.contains("66.667 MHz"));
        assert!(output.contains("phase 90°  resetless"));
        assert!(output.contains("main_ram   0x40000000  size 0x2000000"));
        assert!(output.contains("ISE SKIPPED"));
        assert!(output.contains("=== Resource Report ==="));
    }
}
