use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MODE: &str = "development";

#[derive(Debug, Parser)]
#[command(name = "account-api", version, about = "User account HTTP service")]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Overrides the port of the bind address.
    #[arg(long, short = 'p', value_name = "PORT")]
    pub port: Option<u16>,

    /// Run mode reported at startup (e.g. development, production).
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub seed_file: Option<PathBuf>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub mode: String,
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid port value for env var {key}: {value}")]
    InvalidEnvPort { key: String, value: String },
    #[error("invalid value for env var {key}: not unicode")]
    NotUnicode { key: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    port: Option<u16>,
    mode: Option<String>,
    seed_file: Option<PathBuf>,
}

/// Values read from the process environment.
#[derive(Debug, Default)]
struct EnvConfig {
    port: Option<u16>,
    mode: Option<String>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;
        let from_env = read_env_config()?;
        Ok(Self::resolve(cli, from_env, from_file))
    }

    /// Precedence: CLI, then environment, then config file, then defaults.
    fn resolve(cli: Cli, env: EnvConfig, file: FileConfig) -> Self {
        let mut bind = cli
            .bind
            .or(file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)));
        if let Some(port) = cli.port.or(env.port).or(file.port) {
            bind.set_port(port);
        }

        let mode = cli
            .mode
            .or(env.mode)
            .or(file.mode)
            .map(|mode| mode.trim().to_string())
            .filter(|mode| !mode.is_empty())
            .unwrap_or_else(|| String::from(DEFAULT_MODE));

        Self {
            bind,
            mode,
            seed_file: cli.seed_file.or(file.seed_file),
        }
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env_config() -> Result<EnvConfig, ConfigError> {
    let port = read_env("PORT")?
        .map(|value| parse_port_value("PORT", &value))
        .transpose()?;
    let mode = match read_env("ACCOUNT_API_MODE")? {
        Some(mode) => Some(mode),
        None => read_env("APP_ENV")?,
    };
    Ok(EnvConfig { port, mode })
}

fn read_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: String::from(key),
        }),
    }
}

fn parse_port_value(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidEnvPort {
            key: String::from(key),
            value: String::from(raw),
        })
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::PathBuf;

    use anyhow::Result;
    use clap::Parser;
    use tempfile::tempdir;

    use super::{parse_port_value, read_file_config, AppConfig, Cli, EnvConfig, FileConfig};

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("account-api").chain(args.iter().copied()))
    }

    #[test]
    fn parse_port_value_accepts_valid_ports() {
        assert_eq!(parse_port_value("PORT", "3000").ok(), Some(3000));
        assert_eq!(parse_port_value("PORT", " 8080 ").ok(), Some(8080));
    }

    #[test]
    fn parse_port_value_rejects_invalid_values() {
        assert!(parse_port_value("PORT", "http").is_err());
        assert!(parse_port_value("PORT", "70000").is_err());
        assert!(parse_port_value("PORT", "").is_err());
    }

    #[test]
    fn defaults_bind_all_interfaces_in_development_mode() {
        let config = AppConfig::resolve(cli(&[]), EnvConfig::default(), FileConfig::default());
        assert_eq!(config.bind, SocketAddr::from(([0, 0, 0, 0], 3000)));
        assert_eq!(config.mode, "development");
        assert!(config.seed_file.is_none());
    }

    #[test]
    fn env_port_overrides_file_but_not_cli() {
        let file = FileConfig {
            port: Some(4000),
            ..Default::default()
        };
        let env = EnvConfig {
            port: Some(5000),
            mode: Some(String::from("production")),
        };
        let config = AppConfig::resolve(cli(&[]), env, file);
        assert_eq!(config.bind.port(), 5000);
        assert_eq!(config.mode, "production");

        let env = EnvConfig {
            port: Some(5000),
            mode: None,
        };
        let config = AppConfig::resolve(cli(&["--port", "6000"]), env, FileConfig::default());
        assert_eq!(config.bind.port(), 6000);
    }

    #[test]
    fn port_applies_to_configured_bind_address() {
        let file = FileConfig {
            bind: Some(SocketAddr::from(([127, 0, 0, 1], 9000))),
            ..Default::default()
        };
        let env = EnvConfig {
            port: Some(7000),
            mode: None,
        };
        let config = AppConfig::resolve(cli(&[]), env, file);
        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 7000)));
    }

    #[test]
    fn blank_mode_falls_back_to_default() {
        let config = AppConfig::resolve(
            cli(&["--mode", "  "]),
            EnvConfig::default(),
            FileConfig::default(),
        );
        assert_eq!(config.mode, "development");
    }

    #[test]
    fn file_config_parses_all_fields() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "bind = \"127.0.0.1:8000\"\nport = 8001\nmode = \"staging\"\nseed_file = \"seed.toml\"\n",
        )?;

        let file = read_file_config(Some(&path))?;
        let config = AppConfig::resolve(cli(&[]), EnvConfig::default(), file);

        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 8001)));
        assert_eq!(config.mode, "staging");
        assert_eq!(config.seed_file, Some(PathBuf::from("seed.toml")));
        Ok(())
    }

    #[test]
    fn file_config_rejects_unknown_types() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number\"\n")?;

        assert!(read_file_config(Some(&path)).is_err());
        Ok(())
    }
}
