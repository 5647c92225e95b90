//! Initialize kiln in a project

use std::path::Path;

use clap::Args;
use color_eyre::eyre::{eyre, Result, WrapErr};
use console::style;
use kiln_core::KilnDir;
use kiln_db::Database;

use crate::config::{KilnConfig, KILN_CONFIG, TEMPLATE};

/// Initialize kiln in a project
#[derive(Args)]
pub struct InitCommand;

impl InitCommand {
    pub async fn run(self) -> Result<()> {
        let dir = KilnDir::new();
        if KilnConfig::exists() && dir.exists() {
            return Err(eyre!(
                "Kiln is already initialized in this project ({} and {} exist)",
                KILN_CONFIG,
                KilnDir::NAME
            ));
        }

        if KilnConfig::exists() {
            println!("{} Keeping existing {}", style("!").yellow(), KILN_CONFIG);
        } else {
            std::fs::write(KILN_CONFIG, TEMPLATE)
                .wrap_err_with(|| format!("Could not write {}", KILN_CONFIG))?;
            println!("{} Created {}", style("✓").green(), KILN_CONFIG);
        }

        Database::open(&dir).await?;
        println!("{} Created {}/ registry", style("✓").green(), KilnDir::NAME);

        add_to_gitignore(Path::new(".gitignore"))?;

        println!();
        println!("{} Kiln initialized successfully!", style("✓").green().bold());
        println!();
        println!("Next steps:");
        println!(
            "  1. Add networks to {} under {}",
            KILN_CONFIG,
            style("[rpc_endpoints]").cyan()
        );
        println!(
            "  2. Store a signing key with {}",
            style("kiln wallet add <name>").cyan()
        );
        println!(
            "  3. Start a build service with {} and deploy with {}",
            style("kiln serve").cyan(),
            style("kiln deploy <contract> --network <name>").cyan()
        );

        Ok(())
    }
}

fn add_to_gitignore(gitignore_path: &Path) -> Result<()> {
    let entry = KilnDir::NAME;

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(gitignore_path)?;
        // `.kiln` and `.kiln/` both count
        let has_entry = content
            .lines()
            .any(|line| line.trim() == entry || line.trim() == format!("{}/", entry));
        if !has_entry {
            let mut new_content = content;
            if !new_content.is_empty() && !new_content.ends_with('\n') {
                new_content.push('\n');
            }
            new_content.push_str(entry);
            new_content.push('\n');
            std::fs::write(gitignore_path, new_content)?;
            println!("{} Added {} to .gitignore", style("✓").green(), entry);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gitignore_entry_appended_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gitignore");
        std::fs::write(&path, "target").unwrap();

        add_to_gitignore(&path).unwrap();
        add_to_gitignore(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "target\n.kiln\n");
    }

    #[test]
    fn test_existing_directory_entry_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gitignore");
        std::fs::write(&path, "out/\n.kiln/\n").unwrap();

        add_to_gitignore(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "out/\n.kiln/\n");
    }

    #[test]
    fn test_missing_gitignore_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gitignore");

        add_to_gitignore(&path).unwrap();

        assert!(!path.exists());
    }
}
