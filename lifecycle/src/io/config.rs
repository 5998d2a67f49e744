//! Lifecycle configuration stored as TOML (`casa.toml` by default).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::ChainPolicy;

/// Lifecycle configuration (TOML).
///
/// Missing fields default to the values the editor ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Directory handed to the engine when creating a project context.
    pub asset_root: PathBuf,

    pub project: ProjectFileConfig,

    pub dialogs: DialogConfig,

    /// What happens to a chained New/Load when its save dialog is cancelled.
    pub chain: ChainPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectFileConfig {
    /// Project file extension, without the leading dot.
    pub extension: String,

    /// Label of the single dialog filter.
    pub filter_name: String,

    /// Suggested name in the save dialog when no path is known yet.
    pub default_file_name: String,
}

impl Default for ProjectFileConfig {
    fn default() -> Self {
        Self {
            extension: "csa".to_string(),
            filter_name: "Casa Project".to_string(),
            default_file_name: "my_project.csa".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DialogConfig {
    pub save_title: String,
    pub load_title: String,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            save_title: "Save the Casa Project".to_string(),
            load_title: "Load the Casa Project".to_string(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("data"),
            project: ProjectFileConfig::default(),
            dialogs: DialogConfig::default(),
            chain: ChainPolicy::default(),
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<()> {
        let ext = self.project.extension.trim();
        if ext.is_empty() {
            return Err(anyhow!("project.extension must be non-empty"));
        }
        if ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(anyhow!(
                "project.extension must be a bare extension like \"csa\""
            ));
        }
        if self.project.filter_name.trim().is_empty() {
            return Err(anyhow!("project.filter_name must be non-empty"));
        }
        if self.dialogs.save_title.trim().is_empty() || self.dialogs.load_title.trim().is_empty()
        {
            return Err(anyhow!("dialog titles must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LifecycleConfig::default()`.
pub fn load_config(path: &Path) -> Result<LifecycleConfig> {
    if !path.exists() {
        let cfg = LifecycleConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LifecycleConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LifecycleConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
