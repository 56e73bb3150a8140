//! `fabric.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fabric_core::Slot;
use serde::{Deserialize, Serialize};

/// The top-level manifest structure for a fabric project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricManifest {
    /// Project metadata (required).
    pub project: ProjectConfig,
    /// Build defaults.
    #[serde(default)]
    pub build: Option<BuildSection>,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required).
    pub name: String,
    /// Project version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// `[build]` section. Every key is optional; unset keys fall back to the
/// board's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    /// Default board name.
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub build_name: Option<String>,
    /// Output directory, relative to the project root.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// System clock in Hz.
    #[serde(default)]
    pub sys_clk_freq: Option<u64>,
    /// Ceiling for the main memory region in bytes.
    #[serde(default)]
    pub max_mem_size: Option<u64>,
    #[serde(default)]
    pub cache_size: Option<u64>,
    #[serde(default)]
    pub min_cache_width: Option<u32>,
    /// Suffix for the identifier string.
    #[serde(default)]
    pub ident_version: Option<String>,
    /// Extra location for the CSV CSR map.
    #[serde(default)]
    pub csr_csv: Option<String>,
    /// HDL sources, relative to the project root.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Board peripherals, in registration order.
    #[serde(default)]
    pub order: Option<Vec<Slot>>,
}

impl FabricManifest {
    /// Search upward from `start_dir` for a `fabric.toml` file, parse and return it
    /// along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join("fabric.toml");
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: FabricManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing fabric.toml")
    }

    /// The `[build]` section, or an empty one.
    pub fn build_section(&self) -> BuildSection {
        self.build.clone().unwrap_or_default()
    }

    /// Default board name from the manifest.
    pub fn default_board(&self) -> Option<&str> {
        self.build.as_ref().and_then(|b| b.board.as_deref())
    }

    /// Generate the default template for `fabric init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"[project]
name = "{name}"
version = "0.1.0"

[build]
board = "alchitry-au"
build-name = "top"
output-dir = "build"
# sys-clk-freq = 100000000
# max-mem-size = 0x10000000
# order = ["bridge", "dram", "identification", "status"]
sources = []
"#
        )
    }
}
