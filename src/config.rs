use crate::error::ValidationErrorMode;
use crate::scoring::QuarterCheck;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8000";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    pub quarter_check: QuarterCheck,
    pub validation_errors: ValidationErrorMode,
    pub graceful_shutdown_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: default_bind_address(),
            quarter_check: QuarterCheck::default(),
            validation_errors: ValidationErrorMode::default(),
            graceful_shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            port: cli_port,
            quarter_check: cli_quarter_check,
            validation_errors: cli_validation_errors,
            shutdown_timeout_secs: cli_shutdown_timeout_secs,
            max_body_bytes: cli_max_body_bytes,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            port: file_port,
            quarter_check: file_quarter_check,
            validation_errors: file_validation_errors,
            shutdown_timeout_secs: file_shutdown_timeout_secs,
            max_body_bytes: file_max_body_bytes,
        } = file_config;

        let mut http_bind_address = cli_http_bind
            .or(file_http_bind)
            .unwrap_or_else(default_bind_address);

        if let Some(port) = cli_port.or(file_port) {
            anyhow::ensure!(port != 0, "port override must be non-zero");
            http_bind_address.set_port(port);
        }

        let quarter_check = cli_quarter_check
            .or(file_quarter_check)
            .unwrap_or_default();

        let validation_errors = cli_validation_errors
            .or(file_validation_errors)
            .unwrap_or_default();

        let graceful_shutdown_timeout_secs = cli_shutdown_timeout_secs
            .or(file_shutdown_timeout_secs)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

        let max_body_bytes = cli_max_body_bytes
            .or(file_max_body_bytes)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self {
            http_bind_address,
            quarter_check,
            validation_errors,
            graceful_shutdown_timeout_secs,
            max_body_bytes,
        })
    }

    /// Checks settings that would otherwise only fail once traffic arrives.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.max_body_bytes > 0,
            "max body size must be greater than zero"
        );
        Ok(())
    }
}

fn default_bind_address() -> SocketAddr {
    DEFAULT_HTTP_BIND
        .parse()
        .expect("default bind address valid")
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "receipt-processor",
    about = "Scores purchase receipts and serves the points by id",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "RECEIPT_PROCESSOR_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address (default 0.0.0.0:8000)"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "PORT",
        value_name = "PORT",
        help = "Listen port, overriding the port of the bind address",
        value_parser = clap::value_parser!(u16)
    )]
    pub port: Option<u16>,

    #[arg(
        long,
        env = "RECEIPT_PROCESSOR_QUARTER_CHECK",
        value_enum,
        value_name = "MODE",
        help = "How totals are tested for being a multiple of 0.25 (float or cents)"
    )]
    pub quarter_check: Option<QuarterCheck>,

    #[arg(
        long,
        env = "RECEIPT_PROCESSOR_VALIDATION_ERRORS",
        value_enum,
        value_name = "MODE",
        help = "Whether rejected receipts report the failed check (generic or detailed)"
    )]
    pub validation_errors: Option<ValidationErrorMode>,

    #[arg(
        long,
        env = "RECEIPT_PROCESSOR_SHUTDOWN_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Seconds to wait for in-flight requests on shutdown",
        value_parser = clap::value_parser!(u64)
    )]
    pub shutdown_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "RECEIPT_PROCESSOR_MAX_BODY_BYTES",
        value_name = "BYTES",
        help = "Largest accepted request body",
        value_parser = clap::value_parser!(usize)
    )]
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    port: Option<u16>,
    quarter_check: Option<QuarterCheck>,
    validation_errors: Option<ValidationErrorMode>,
    shutdown_timeout_secs: Option<u64>,
    max_body_bytes: Option<usize>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_args() {
        let config = ServerConfig::from_args(CliArgs::default()).unwrap();
        assert_eq!(config.http_bind_address, DEFAULT_HTTP_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(config.quarter_check, QuarterCheck::Float);
        assert_eq!(config.validation_errors, ValidationErrorMode::Generic);
        assert_eq!(config.graceful_shutdown_timeout_secs, 30);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn port_overrides_bind_port() {
        let args = CliArgs {
            http_bind: Some("127.0.0.1:9000".parse().unwrap()),
            port: Some(8080),
            ..CliArgs::default()
        };
        let config = ServerConfig::from_args(args).unwrap();
        assert_eq!(config.http_bind_address, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn zero_port_is_rejected() {
        let args = CliArgs {
            port: Some(0),
            ..CliArgs::default()
        };
        assert!(ServerConfig::from_args(args).is_err());
    }

    #[test]
    fn zero_body_limit_fails_validation() {
        let config = ServerConfig {
            max_body_bytes: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn cli_flags_parse() {
        let args = CliArgs::try_parse_from([
            "receipt-processor",
            "--quarter-check",
            "cents",
            "--validation-errors",
            "detailed",
            "--http-bind",
            "127.0.0.1:8001",
        ])
        .unwrap();
        let config = ServerConfig::from_args(args).unwrap();
        assert_eq!(config.quarter_check, QuarterCheck::Cents);
        assert_eq!(config.validation_errors, ValidationErrorMode::Detailed);
        assert_eq!(
            config.http_bind_address.ip(),
            "127.0.0.1".parse::<std::net::IpAddr>().unwrap()
        );
    }

    #[test]
    fn yaml_file_fills_unset_values() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "http_bind: 127.0.0.1:7000\nquarter_check: cents\nshutdown_timeout_secs: 5"
        )
        .unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            shutdown_timeout_secs: Some(10),
            ..CliArgs::default()
        };
        let config = ServerConfig::from_args(args).unwrap();
        assert_eq!(config.http_bind_address, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.quarter_check, QuarterCheck::Cents);
        // CLI wins over the file
        assert_eq!(config.graceful_shutdown_timeout_secs, 10);
    }

    #[test]
    fn json_file_is_supported() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"validation_errors": "detailed", "port": 8123}}"#).unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            ..CliArgs::default()
        };
        let config = ServerConfig::from_args(args).unwrap();
        assert_eq!(config.validation_errors, ValidationErrorMode::Detailed);
        assert_eq!(config.http_bind_address.port(), 8123);
    }

    #[test]
    fn unknown_extension_and_missing_file_fail() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            ..CliArgs::default()
        };
        assert!(ServerConfig::from_args(args).is_err());

        let args = CliArgs {
            config: Some(PathBuf::from("/definitely/not/here.yaml")),
            ..CliArgs::default()
        };
        assert!(ServerConfig::from_args(args).is_err());
    }
}
