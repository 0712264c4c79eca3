use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use tmdl::{BackupPolicy, Editor, LintOptions, PartitionMode, Reindent};

pub const CONFIG_FILE_NAME: &str = "tmdl.toml";

/// Contents of `tmdl.toml`. Every field is optional; CLI flags win.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backup: Option<BackupSetting>,
    pub reindent: Option<ReindentSetting>,
    /// Keywords treated as trailing properties in addition to the built-in list.
    pub extra_property_keywords: Vec<String>,
    pub lint: LintSection,
    pub validator: ValidatorSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintSection {
    pub mixed_indentation: bool,
}

impl Default for LintSection {
    fn default() -> Self {
        LintSection {
            mixed_indentation: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorSection {
    /// External validator executable.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackupSetting {
    None,
    Sidecar,
    Alongside,
}

impl From<BackupSetting> for BackupPolicy {
    fn from(setting: BackupSetting) -> Self {
        match setting {
            BackupSetting::None => BackupPolicy::None,
            BackupSetting::Sidecar => BackupPolicy::WriteSidecar,
            BackupSetting::Alongside => BackupPolicy::ReturnOriginalAlongside,
        }
    }
}

/// `mode:` of a partition written by `add-partition` or `create-table`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeSetting {
    #[default]
    Import,
    DirectQuery,
    Dual,
}

impl From<ModeSetting> for PartitionMode {
    fn from(setting: ModeSetting) -> Self {
        match setting {
            ModeSetting::Import => PartitionMode::Import,
            ModeSetting::DirectQuery => PartitionMode::DirectQuery,
            ModeSetting::Dual => PartitionMode::Dual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReindentSetting {
    Flatten,
    Relative,
}

impl From<ReindentSetting> for Reindent {
    fn from(setting: ReindentSetting) -> Self {
        match setting {
            ReindentSetting::Flatten => Reindent::Flatten,
            ReindentSetting::Relative => Reindent::Relative,
        }
    }
}

impl Config {
    /// Load `explicit` if given, else `./tmdl.toml` when it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if !local.is_file() {
                    return Ok(Config::default());
                }
                local
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn editor(&self, reindent: Option<ReindentSetting>) -> Editor {
        let reindent = reindent.or(self.reindent).map(Reindent::from).unwrap_or_default();
        Editor::new()
            .with_property_keywords(self.extra_property_keywords.iter().cloned())
            .with_reindent(reindent)
    }

    pub fn backup_policy(&self, flag: Option<BackupSetting>) -> BackupPolicy {
        flag.or(self.backup).map(BackupPolicy::from).unwrap_or_default()
    }

    pub fn lint_options(&self) -> LintOptions {
        LintOptions {
            mixed_indentation: self.lint.mixed_indentation,
            extra_property_keywords: self.extra_property_keywords.clone(),
        }
    }
}
