//! `fabric clean`: remove build artifacts.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Remove the output directory.
pub fn run(out_dir: &Path) -> Result<()> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir)
            .with_context(|| format!("removing {}", out_dir.display()))?;
        println!("Removed {}", out_dir.display());
    } else {
        println!("Already clean: {} does not exist", out_dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_removes_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("build");
        fs::create_dir_all(out.join("gateware")).unwrap();
        fs::write(out.join("gateware/top.bit"), b"data").unwrap();

        run(&out).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn clean_handles_already_clean() {
        let dir = tempfile::tempdir().unwrap();
        run(&dir.path().join("build")).unwrap();
    }
}
