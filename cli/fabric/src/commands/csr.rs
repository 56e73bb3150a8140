//! `fabric csr`: print the CSR map of an elaboration.

use std::path::Path;

use anyhow::{bail, Context, Result};
use fabric_build::CsrMap;
use fabric_core::elaborate;

use super::{resolve_soc, SocArgs};
use crate::manifest::FabricManifest;

/// Elaborate and print the CSR map as `table` (default), `csv` or `json`.
pub fn run(
    project_dir: &Path,
    manifest: Option<&FabricManifest>,
    args: &SocArgs,
    format: Option<&str>,
) -> Result<()> {
    let map = csr_map(project_dir, manifest, args)?;
    print!("{}", render(&map, format)?);
    Ok(())
}

fn csr_map(project_dir: &Path, manifest: Option<&FabricManifest>, args: &SocArgs) -> Result<CsrMap> {
    let (board, config) = resolve_soc(project_dir, manifest, args)?;
    let design = elaborate(&board, &config)
        .with_context(|| format!("elaborating for {}", board.name))?;
    Ok(CsrMap::from_design(&design)?)
}

fn render(map: &CsrMap, format: Option<&str>) -> Result<String> {
    match format.unwrap_or("table") {
        "table" => Ok(map.to_string()),
        "csv" => Ok(map.to_csv()),
        "json" => Ok(format!("{}\n", map.to_json()?)),
        other => bail!("unknown format '{other}' (expected table, csv, or json)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_core::Slot;

    fn au_map() -> CsrMap {
        let dir = tempfile::tempdir().unwrap();
        let args = SocArgs {
            board: Some("alchitry-au".into()),
            ..Default::default()
        };
        csr_map(dir.path(), None, &args).unwrap()
    }

    #[test]
    fn csv_rows() {
        let csv = render(&au_map(), Some("csv")).unwrap();
        assert!(csv.contains("csr_base,ctrl,0x82000000,,"));
        assert!(csv.contains("csr_register,ctrl_scratch,0x82000004,1,rw"));
        assert!(csv.contains("memory_region,main_ram,0x40000000,268435456,cached"));
    }

    #[test]
    fn json_reloads() {
        let map = au_map();
        let json = render(&map, Some("json")).unwrap();
        assert_eq!(CsrMap::from_json(&json).unwrap(), map);
    }

    #[test]
    fn table_is_default() {
        let text = render(&au_map(), None).unwrap();
        assert!(text.contains("=== CSR Map ==="));
    }

    #[test]
    fn unknown_format() {
        assert!(render(&au_map(), Some("yaml")).is_err());
    }

    #[test]
    fn order_changes_locations() {
        let dir = tempfile::tempdir().unwrap();
        let args = SocArgs {
            board: Some("alchitry-au".into()),
            order: Some(vec![Slot::Bridge, Slot::Status]),
            ..Default::default()
        };
        let map = csr_map(dir.path(), None, &args).unwrap();
        let leds = map.bases.iter().find(|b| b.peripheral == "leds").unwrap();
        assert_eq!(leds.location, 2);
    }
}
