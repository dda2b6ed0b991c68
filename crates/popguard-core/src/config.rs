use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::PopGuardError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub popguard: PopGuardConfig,
    pub coordinator: CoordinatorConfig,
    pub authority: AuthorityConfig,
    pub reporting: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopGuardConfig {
    /// Initial state of popup blocking for a new session.
    pub popup_blocking: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// 0 waits until the authority answers or the session is torn down.
    pub response_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    pub mode: AuthorityMode,
    pub prompt_answer: PromptAnswer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityMode {
    Interactive,
    Allow,
    Deny,
}

/// How an automatic authority answers text prompts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptAnswer {
    Default,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub store_reports: bool,
    pub human_summary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    pub filter: String,
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl CoordinatorConfig {
    pub fn response_timeout(&self) -> Option<Duration> {
        match self.response_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            popguard: PopGuardConfig {
                popup_blocking: true,
            },
            coordinator: CoordinatorConfig {
                response_timeout_ms: 0,
            },
            authority: AuthorityConfig {
                mode: AuthorityMode::Interactive,
                prompt_answer: PromptAnswer::Default,
            },
            reporting: ReportConfig {
                store_reports: true,
                human_summary: true,
            },
            logging: LoggingConfig {
                filter: "info".to_string(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), PopGuardError> {
        if self.logging.filter.trim().is_empty() {
            return Err(PopGuardError::InvalidConfig(
                "logging.filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let output = toml::to_string_pretty(self).context("render config TOML")?;
        Ok(output)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let contents = self.to_toml_string()?;
        fs::write(path, contents).with_context(|| format!("write config at {}", path.display()))?;
        Ok(())
    }
}

impl ConfigPaths {
    pub fn resolve() -> Result<Self> {
        let project_dirs = ProjectDirs::from("io", "popguard", "popguard")
            .ok_or_else(|| anyhow::anyhow!("unable to determine project directories"))?;
        let config_dir = project_dirs.config_dir();
        let data_dir = project_dirs.data_dir();
        Ok(Self {
            config_path: config_dir.join("config.toml"),
            data_dir: data_dir.to_path_buf(),
            report_dir: data_dir.join("reports"),
        })
    }
}

impl FromStr for AuthorityMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "interactive" => Ok(AuthorityMode::Interactive),
            "allow" => Ok(AuthorityMode::Allow),
            "deny" => Ok(AuthorityMode::Deny),
            _ => Err(format!("unknown authority mode: {value}")),
        }
    }
}

impl fmt::Display for AuthorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AuthorityMode::Interactive => "interactive",
            AuthorityMode::Allow => "allow",
            AuthorityMode::Deny => "deny",
        };
        write!(f, "{value}")
    }
}
