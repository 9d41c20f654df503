//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::infra::logging::{LogSink, LoggingConfig};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static PROJECT_CONFIG_PATH: &str = ".liveedit/config.toml";

/// Layered configuration loaded from defaults, user, project, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stamp: Stamp,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    /// Name of the injected identifier attribute.
    #[serde(default = "Stamp::default_attribute")]
    pub attribute: String,
    /// File extensions (without the dot) that carry UI markup.
    #[serde(default = "Stamp::default_extensions")]
    pub extensions: Vec<String>,
}

impl Stamp {
    fn default_attribute() -> String {
        "data-edit-id".to_owned()
    }

    fn default_extensions() -> Vec<String> {
        vec!["jsx".into(), "tsx".into()]
    }
}

impl Default for Stamp {
    fn default() -> Self {
        Self {
            attribute: Self::default_attribute(),
            extensions: Self::default_extensions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    /// Dependency/vendor directories that are never parsed or written.
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            excluded: vec![
                "node_modules/".into(),
                ".git/".into(),
                "dist/".into(),
                "build/".into(),
                "target/".into(),
                "vendor/".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logging {
    #[serde(default = "Logging::default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Logging {
    fn default_level() -> String {
        "warn".into()
    }

    /// Injectable logging settings for [`crate::infra::logging::init`].
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.level.clone(),
            sink: match &self.file {
                Some(path) => LogSink::File(path.clone()),
                None => LogSink::Stderr,
            },
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            file: None,
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    attribute: Option<String>,
    log_level: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            attribute: env::var("LIVEEDIT_ATTRIBUTE").ok(),
            log_level: env::var("LIVEEDIT_LOG").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(attribute: &str, log_level: &str) -> Self {
        Self {
            attribute: Some(attribute.to_owned()),
            log_level: Some(log_level.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration for the project at `root` from defaults, user
    /// config, project config, and env overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let project = Some(root.join(PROJECT_CONFIG_PATH));
        Self::load_with_layers(global, project, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        project: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_toml(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(project_path) = project.filter(|path| path.exists()) {
            layers.push(Self::from_file(&project_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_toml(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            stamp: merge_stamp(self.stamp, other.stamp),
            paths: merge_paths(self.paths, other.paths),
            logging: merge_logging(self.logging, other.logging),
        }
    }
}

fn merge_stamp(base: Stamp, overlay: Stamp) -> Stamp {
    let attribute = if overlay.attribute != Stamp::default_attribute() {
        overlay.attribute
    } else {
        base.attribute
    };

    let mut extensions: BTreeSet<String> = base.extensions.into_iter().collect();
    extensions.extend(
        overlay
            .extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase()),
    );

    Stamp {
        attribute,
        extensions: extensions.into_iter().collect(),
    }
}

fn merge_paths(base: Paths, overlay: Paths) -> Paths {
    let mut excluded: BTreeSet<String> = base.excluded.into_iter().collect();
    excluded.extend(overlay.excluded);
    Paths {
        excluded: excluded.into_iter().collect(),
    }
}

fn merge_logging(base: Logging, overlay: Logging) -> Logging {
    Logging {
        level: if overlay.level != Logging::default_level() {
            overlay.level
        } else {
            base.level
        },
        file: overlay.file.or(base.file),
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("liveedit/config.toml"))
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(attribute) = env.attribute.filter(|value| !value.trim().is_empty()) {
        config.stamp.attribute = attribute;
    }
    if let Some(level) = env.log_level {
        config.logging.level = level;
    }
    config
}
