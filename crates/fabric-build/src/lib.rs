//! Build pipeline for fabric SoCs.
//!
//! Takes a board and SoC configuration through elaboration, writes the
//! design and CSR map artifacts, drives the vendor toolchain, and promotes
//! the results to the output directory only when every step succeeded.

pub mod constraints;
pub mod csr;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod toolchain;
pub mod usage;

pub use csr::{CsrMap, CsrRow};
pub use error::{BuildError, Result};
pub use pipeline::{build, build_with, BuildConfig, BuildOutput, GATEWARE_DIR};
pub use report::BuildReport;
pub use toolchain::{backend_for, find_program, Backend, Ise, Vivado};
pub use usage::{usage_report, UsageReport};
