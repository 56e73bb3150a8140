//! `fabric init`: project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::FabricManifest;

/// Create a new fabric project in directory `name`, relative to cwd.
pub fn run(name: &str) -> Result<()> {
    let project_dir = Path::new(name);
    create_project(project_dir, name)
}

pub(crate) fn create_project(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }

    fs::create_dir_all(project_dir.join("boards")).context("creating boards/ directory")?;
    fs::create_dir_all(project_dir.join("rtl")).context("creating rtl/ directory")?;

    fs::write(project_dir.join("fabric.toml"), FabricManifest::template(name))
        .context("writing fabric.toml")?;
    fs::write(project_dir.join(".gitignore"), "build/\n").context("writing .gitignore")?;

    println!("Created project '{name}'");
    println!("  {name}/fabric.toml");
    println!("  {name}/boards/");
    println!("  {name}/rtl/");
    println!("  {name}/.gitignore");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_project_structure() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("test-init-project");

        create_project(&project_path, "test-init-project").unwrap();

        assert!(project_path.join("fabric.toml").is_file());
        assert!(project_path.join("boards").is_dir());
        assert!(project_path.join("rtl").is_dir());
        assert!(project_path.join(".gitignore").is_file());
    }

    #[test]
    fn init_generates_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("valid-manifest");

        create_project(&project_path, "valid-manifest").unwrap();

        let content = fs::read_to_string(project_path.join("fabric.toml")).unwrap();
        let manifest = FabricManifest::from_str(&content).unwrap();
        assert_eq!(manifest.project.name, "valid-manifest");
    }

    #[test]
    fn init_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("existing");
        fs::create_dir(&project_path).unwrap();

        let result = create_project(&project_path, "existing");
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }
}
