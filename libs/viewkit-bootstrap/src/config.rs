use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use viewkit::FactoryConfig;

use crate::paths::home_dir::resolve_home_dir;

/// Prefix of environment overrides, e.g. `VIEWKIT__APP__ROOT_MODULE=ShopModule`.
pub const ENV_PREFIX: &str = "VIEWKIT__";

const DEFAULT_SUBDIR: &str = ".viewkit";

/// Application configuration for hosts that resolve a viewkit module graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub app: AppSection,
    /// Factory tuning passed straight to `viewkit::Factory::with_config`.
    #[serde(default)]
    pub factory: FactoryConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    /// Short type name of the module to resolve, e.g. `AppModule`.
    pub root_module: String,
    /// Base directory for relative log file paths; normalized to an absolute
    /// path on load.
    #[serde(default)]
    pub home_dir: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            root_module: "AppModule".to_string(),
            // Empty => $HOME/.viewkit (%APPDATA%/.viewkit on Windows)
            home_dir: String::new(),
        }
    }
}

/// Logging configuration: tracing target → sink settings.
/// Key "default" applies to every target without its own entry.
pub type LoggingConfig = HashMap<String, LogSection>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// "trace" | "debug" | "info" | "warn" | "error" | "off"
    pub console_level: String,
    /// Log file relative to `app.home_dir`; empty disables the file sink.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    /// How many rotated files to keep
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        LogSection {
            console_level: "info".to_string(),
            file: "logs/viewkit.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            factory: FactoryConfig::default(),
            logging: Some(default_logging_config()),
        }
    }
}

impl AppConfig {
    /// Layered load: defaults → YAML file → `VIEWKIT__*` environment.
    /// Normalizes `app.home_dir` into an absolute path and creates it.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Logging stays None unless the file or environment provides it.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            // VIEWKIT__FACTORY__RESOLVE_TIMEOUT=2s maps to factory.resolve_timeout
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: AppConfig = figment
            .extract()
            .context("Failed to extract config from figment")?;

        config
            .normalize_home_dir()
            .context("Failed to resolve app.home_dir")?;
        Ok(config)
    }

    /// Load configuration from file or fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                c.normalize_home_dir()
                    .context("Failed to resolve app.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(root) = &args.root {
            self.app.root_module = root.clone();
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }

    /// Absolute home directory (valid after loading).
    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.app.home_dir)
    }

    fn normalize_home_dir(&mut self) -> Result<()> {
        let resolved = resolve_home_dir(Some(&self.app.home_dir), DEFAULT_SUBDIR, true)
            .context("home_dir normalization failed")?;
        self.app.home_dir = resolved.to_string_lossy().to_string();
        Ok(())
    }
}

/// Command line arguments relevant to configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub root: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("viewkit.yaml");
        fs::write(&path, body).expect("Failed to write config file");
        path
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.app.root_module, "AppModule");
        assert!(config.app.home_dir.is_empty());
        assert_eq!(config.factory.resolve_timeout, None);

        let logging = config.logging.as_ref().unwrap();
        let default = &logging["default"];
        assert_eq!(default.console_level, "info");
        assert_eq!(default.file, "logs/viewkit.log");
    }

    #[test]
    fn test_yaml_serialization() {
        let yaml = AppConfig::default().to_yaml().expect("Failed to serialize to YAML");

        assert!(yaml.contains("app:"));
        assert!(yaml.contains("root_module: AppModule"));
        assert!(yaml.contains("factory:"));
        assert!(yaml.contains("logging:"));
    }

    #[test]
    fn test_layered_loading_yaml() {
        let tmp = tempdir().unwrap();
        let home = tmp.path().join("home");
        let body = format!(
            r#"
app:
  root_module: "ShopModule"
  home_dir: "{}"
factory:
  resolve_timeout: "2s"
logging:
  default:
    console_level: "warn"
    file: ""
"#,
            home.display()
        );
        let path = write_config(tmp.path(), &body);

        let config = AppConfig::load_layered(&path).expect("Failed to load config");

        assert_eq!(config.app.root_module, "ShopModule");
        assert_eq!(config.home_dir(), home);
        assert!(home.is_dir());
        assert_eq!(config.factory.resolve_timeout, Some(Duration::from_secs(2)));
        let logging = config.logging.unwrap();
        assert_eq!(logging["default"].console_level, "warn");
        assert!(logging["default"].file.is_empty());
    }

    #[test]
    fn test_layered_loading_without_logging_section() {
        let tmp = tempdir().unwrap();
        let body = format!(
            "app:\n  root_module: AppModule\n  home_dir: \"{}\"\n",
            tmp.path().display()
        );
        let path = write_config(tmp.path(), &body);

        let config = AppConfig::load_layered(&path).unwrap();
        assert!(config.logging.is_none());
        assert_eq!(config.factory.resolve_timeout, None);
    }

    #[test]
    fn test_env_overrides_yaml() {
        let tmp = tempdir().unwrap();
        let body = format!(
            "app:\n  root_module: AppModule\n  home_dir: \"{}\"\nfactory:\n  log_dependency_maps: false\n",
            tmp.path().display()
        );
        let path = write_config(tmp.path(), &body);

        std::env::set_var("VIEWKIT__FACTORY__LOG_DEPENDENCY_MAPS", "true");
        let config = AppConfig::load_layered(&path);
        std::env::remove_var("VIEWKIT__FACTORY__LOG_DEPENDENCY_MAPS");

        assert!(config.unwrap().factory.log_dependency_maps);
    }

    #[test]
    fn test_deny_unknown_fields() {
        let tmp = tempdir().unwrap();
        let body = format!(
            "app:\n  root_module: AppModule\n  home_dir: \"{}\"\n  port: 8080\n",
            tmp.path().display()
        );
        let path = write_config(tmp.path(), &body);

        assert!(AppConfig::load_layered(&path).is_err());
    }

    #[test]
    fn test_relative_home_dir_rejected() {
        let tmp = tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            "app:\n  root_module: AppModule\n  home_dir: \"relative/home\"\n",
        );

        let err = AppConfig::load_layered(&path).unwrap_err();
        assert!(format!("{err:#}").contains("home_dir"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            root: Some("CatalogModule".into()),
            verbose: 1,
            ..Default::default()
        };

        config.apply_cli_overrides(&args);

        assert_eq!(config.app.root_module, "CatalogModule");
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "debug");
    }

    #[test]
    fn test_cli_overrides_verbose_levels() {
        let mut config = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "info");

        config.apply_cli_overrides(&CliArgs {
            verbose: 3,
            ..Default::default()
        });
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "trace");
        assert_eq!(config.app.root_module, "AppModule");
    }
}
