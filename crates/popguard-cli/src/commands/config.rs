use std::path::PathBuf;

use anyhow::{Context, Result};

use popguard_core::config::{Config, ConfigPaths};

/// An explicit path must exist; the default location falls back to built-in defaults.
pub fn load_or_default(path: Option<&PathBuf>, paths: &ConfigPaths) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("load config {}", path.display()))
        }
        None if paths.config_path.exists() => Config::load(&paths.config_path),
        None => Ok(Config::default_config()),
    }
}

pub fn print_effective(config: &Config) -> Result<()> {
    let output = config.to_toml_string()?;
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in(dir: &std::path::Path) -> ConfigPaths {
        ConfigPaths {
            config_path: dir.join("config.toml"),
            data_dir: dir.to_path_buf(),
            report_dir: dir.join("reports"),
        }
    }

    #[test]
    fn test_missing_default_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(None, &paths_in(dir.path())).unwrap();
        assert!(config.popguard.popup_blocking);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(load_or_default(Some(&missing), &paths_in(dir.path())).is_err());
    }
}
