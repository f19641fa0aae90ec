//! Repository targets configuration.
//!
//! This module handles loading the `repos.toml` targets file and turning
//! it (or a command-line override list) into the concrete list of
//! repositories to scan.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Defaults applied to repositories that omit per-repo values.
    #[serde(default)]
    pub settings: Settings,

    /// The repository list.
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

/// Fleet-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default = "default_workflow")]
    pub default_workflow: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            default_workflow: default_workflow(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_workflow() -> String {
    "ci.yml".to_string()
}

fn default_enabled() -> bool {
    true
}

/// One repository entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Repository identifier in "owner/name" form.
    pub name: String,

    /// Workflow file to dispatch; falls back to the settings default.
    #[serde(default)]
    pub workflow_file: Option<String>,

    /// Branch to dispatch on; falls back to the settings default.
    #[serde(default)]
    pub branch: Option<String>,

    /// Directories the remote scan should skip (passed through verbatim).
    #[serde(default)]
    pub exclude_dirs: String,

    /// Disabled entries are kept in the file but never dispatched.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// A fully resolved scan target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub name: String,
    pub workflow_file: String,
    pub branch: String,
    pub exclude_dirs: String,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Resolves the list of repositories to scan.
    ///
    /// A non-empty override list of bare repository names replaces the
    /// configured entries; overridden targets use the settings defaults.
    pub fn targets(&self, specific_repos: &[String]) -> Vec<ScanTarget> {
        if !specific_repos.is_empty() {
            return specific_repos
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|name| ScanTarget {
                    name: name.to_string(),
                    workflow_file: self.settings.default_workflow.clone(),
                    branch: self.settings.default_branch.clone(),
                    exclude_dirs: String::new(),
                })
                .collect();
        }

        self.repos
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| ScanTarget {
                name: entry.name.clone(),
                workflow_file: entry
                    .workflow_file
                    .clone()
                    .unwrap_or_else(|| self.settings.default_workflow.clone()),
                branch: entry
                    .branch
                    .clone()
                    .unwrap_or_else(|| self.settings.default_branch.clone()),
                exclude_dirs: entry.exclude_dirs.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let config = Config::default();
        assert_eq!(config.settings.default_branch, "main");
        assert_eq!(config.settings.default_workflow, "ci.yml");
        assert!(config.repos.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[settings]
default_branch = "develop"
default_workflow = "nim-scan.yml"

[[repos]]
name = "acme/widgets"

[[repos]]
name = "acme/gadgets"
workflow_file = "custom-scan.yml"
branch = "release"
exclude_dirs = "docs,examples"

[[repos]]
name = "acme/retired"
enabled = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.repos.len(), 3);

        let targets = config.targets(&[]);
        assert_eq!(targets.len(), 2);

        assert_eq!(targets[0].name, "acme/widgets");
        assert_eq!(targets[0].workflow_file, "nim-scan.yml");
        assert_eq!(targets[0].branch, "develop");

        assert_eq!(targets[1].workflow_file, "custom-scan.yml");
        assert_eq!(targets[1].branch, "release");
        assert_eq!(targets[1].exclude_dirs, "docs,examples");
    }

    #[test]
    fn test_specific_repos_override() {
        let toml_content = r#"
[[repos]]
name = "acme/configured"
"#;
        let config: Config = toml::from_str(toml_content).unwrap();

        let overrides = vec![
            "acme/one".to_string(),
            " acme/two ".to_string(),
            "".to_string(),
        ];
        let targets = config.targets(&overrides);

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "acme/one");
        assert_eq!(targets[1].name, "acme/two");
        assert_eq!(targets[0].workflow_file, "ci.yml");
        assert_eq!(targets[0].branch, "main");
    }
}
