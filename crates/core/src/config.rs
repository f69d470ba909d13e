use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::VelocityUnit;
use crate::error::{Result, SightlineError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub http_addr: String,
    pub debug: bool,
    pub max_page_limit: u64,
    pub query_timeout: Duration,
    pub velocity_unit: VelocityUnit,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_root = env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(home).join(".local/share"));

        Self {
            db_path: data_root.join("sightline/sightline.duckdb"),
            http_addr: "127.0.0.1:8080".to_string(),
            debug: false,
            max_page_limit: 100,
            query_timeout: Duration::from_secs(10),
            velocity_unit: VelocityUnit::Hour,
            log_format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    /// Layers command-line values over a loaded config with the same
    /// validation the file and environment go through.
    pub fn apply(&mut self, overrides: ConfigOverrides, source: &str) -> Result<()> {
        apply_overrides(self, overrides, source)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub http_addr: Option<String>,
    pub debug: Option<bool>,
    pub max_page_limit: Option<u64>,
    pub query_timeout: Option<String>,
    pub velocity_unit: Option<String>,
    pub log_format: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("SIGHTLINE_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("sightline/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| SightlineError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| SightlineError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let debug = match env::var("SIGHTLINE_DEBUG") {
        Ok(v) => Some(parse_bool(&v).ok_or_else(|| {
            SightlineError::Config(format!("bad SIGHTLINE_DEBUG in environment: {v}"))
        })?),
        Err(_) => None,
    };
    let max_page_limit = match env::var("SIGHTLINE_MAX_PAGE_LIMIT") {
        Ok(v) => Some(v.parse::<u64>().map_err(|e| {
            SightlineError::Config(format!("bad SIGHTLINE_MAX_PAGE_LIMIT in environment: {e}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        db_path: env::var("SIGHTLINE_DB_PATH").ok().map(PathBuf::from),
        http_addr: env::var("SIGHTLINE_HTTP_ADDR").ok(),
        debug,
        max_page_limit,
        query_timeout: env::var("SIGHTLINE_QUERY_TIMEOUT").ok(),
        velocity_unit: env::var("SIGHTLINE_VELOCITY_UNIT").ok(),
        log_format: env::var("SIGHTLINE_LOG_FORMAT").ok(),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = overrides.debug {
        cfg.debug = v;
    }
    if let Some(v) = overrides.max_page_limit {
        if v == 0 {
            return Err(SightlineError::Config(format!(
                "bad max_page_limit in {source}: must be at least 1"
            )));
        }
        cfg.max_page_limit = v;
    }
    if let Some(v) = overrides.query_timeout {
        cfg.query_timeout = humantime::parse_duration(&v).map_err(|e| {
            SightlineError::Config(format!("bad query_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.velocity_unit {
        cfg.velocity_unit = v.parse().map_err(|e| {
            SightlineError::Config(format!("bad velocity_unit in {source}: {e}"))
        })?;
    }
    if let Some(v) = overrides.log_format {
        cfg.log_format = match v.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => LogFormat::Compact,
            "json" => LogFormat::Json,
            _ => {
                return Err(SightlineError::Config(format!(
                    "bad log_format in {source}: {v}"
                )));
            }
        };
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn load_without_file() -> Result<Config> {
        // SAFETY: callers are #[serial].
        unsafe {
            env::set_var(
                "SIGHTLINE_CONFIG",
                env::temp_dir().join("sightline-absent/config.toml"),
            );
        }
        let cfg = Config::load();
        unsafe {
            env::remove_var("SIGHTLINE_CONFIG");
        }
        cfg
    }

    #[test]
    fn default_has_expected_limits() {
        let cfg = Config::default();
        assert_eq!(cfg.http_addr, "127.0.0.1:8080");
        assert_eq!(cfg.max_page_limit, 100);
        assert_eq!(cfg.query_timeout, Duration::from_secs(10));
        assert_eq!(cfg.velocity_unit, VelocityUnit::Hour);
        assert!(!cfg.debug);
    }

    #[test]
    fn apply_file_overrides_updates_fields() {
        let mut cfg = Config::default();
        let file: ConfigOverrides = toml::from_str(
            r#"
            http_addr = "0.0.0.0:9000"
            debug = true
            max_page_limit = 25
            query_timeout = "3s"
            velocity_unit = "minute"
            log_format = "json"
            "#,
        )
        .unwrap();

        apply_overrides(&mut cfg, file, "config file").unwrap();

        assert_eq!(cfg.http_addr, "0.0.0.0:9000");
        assert!(cfg.debug);
        assert_eq!(cfg.max_page_limit, 25);
        assert_eq!(cfg.query_timeout, Duration::from_secs(3));
        assert_eq!(cfg.velocity_unit, VelocityUnit::Minute);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn command_line_values_share_the_parsers() {
        let mut cfg = Config::default();
        cfg.apply(
            ConfigOverrides {
                log_format: Some("text".to_string()),
                velocity_unit: Some("minute".to_string()),
                query_timeout: Some("750ms".to_string()),
                ..ConfigOverrides::default()
            },
            "command line",
        )
        .unwrap();
        assert_eq!(cfg.log_format, LogFormat::Compact);
        assert_eq!(cfg.velocity_unit, VelocityUnit::Minute);
        assert_eq!(cfg.query_timeout, Duration::from_millis(750));

        let err = cfg
            .apply(
                ConfigOverrides {
                    log_format: Some("xml".to_string()),
                    ..ConfigOverrides::default()
                },
                "command line",
            )
            .unwrap_err();
        assert!(err.to_string().contains("bad log_format in command line"));
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = Config::default();
        let bad_timeout = ConfigOverrides {
            query_timeout: Some("soon".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad_timeout, "config file").is_err());

        let zero_limit = ConfigOverrides {
            max_page_limit: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, zero_limit, "config file").is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_win() {
        // SAFETY: serialised with the other env tests.
        unsafe {
            env::set_var("SIGHTLINE_DEBUG", "true");
            env::set_var("SIGHTLINE_MAX_PAGE_LIMIT", "40");
            env::set_var("SIGHTLINE_VELOCITY_UNIT", "day");
        }
        let cfg = load_without_file().unwrap();
        unsafe {
            env::remove_var("SIGHTLINE_DEBUG");
            env::remove_var("SIGHTLINE_MAX_PAGE_LIMIT");
            env::remove_var("SIGHTLINE_VELOCITY_UNIT");
        }
        assert!(cfg.debug);
        assert_eq!(cfg.max_page_limit, 40);
        assert_eq!(cfg.velocity_unit, VelocityUnit::Day);
    }

    #[test]
    #[serial]
    fn bad_env_value_is_config_error() {
        unsafe {
            env::set_var("SIGHTLINE_MAX_PAGE_LIMIT", "lots");
        }
        let err = load_without_file().unwrap_err();
        unsafe {
            env::remove_var("SIGHTLINE_MAX_PAGE_LIMIT");
        }
        assert!(matches!(err, SightlineError::Config(_)));
    }
}
