//! Session configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (named by the caller or by OXCROPS_CONFIG)
//! 3. Environment variables

use oxcrops_protocol::{RpcLimits, DEFAULT_OUTPUT_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// RPC protocol sequence used to reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportSequence {
    #[default]
    MapiHttp,
    NcacnIpTcp,
    NcacnHttp,
}

impl TransportSequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportSequence::MapiHttp => "mapi_http",
            TransportSequence::NcacnIpTcp => "ncacn_ip_tcp",
            TransportSequence::NcacnHttp => "ncacn_http",
        }
    }
}

impl fmt::Display for TransportSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportSequence {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mapi_http" | "mapihttp" => Ok(TransportSequence::MapiHttp),
            "ncacn_ip_tcp" => Ok(TransportSequence::NcacnIpTcp),
            "ncacn_http" => Ok(TransportSequence::NcacnHttp),
            other => Err(ConfigError::ValidationError(format!(
                "unknown transport sequence '{}'",
                other
            ))),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Transport sequence used by `connect` when none is given.
    pub transport: TransportSequence,
    /// Follow Logon redirects transparently.
    pub auto_redirect: bool,
    /// Redirects followed for one call before giving up.
    pub max_redirects: u32,
    /// Output buffer size sent with every call unless overridden.
    pub output_buffer_size: u32,
    /// Obfuscate request payloads with the XOR magic.
    pub xor_magic: bool,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Round-trip timeout in seconds.
    pub request_timeout_secs: u64,
    /// Conditions that fail a whole call.
    pub limits: RpcLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportSequence::default(),
            auto_redirect: false,
            max_redirects: 3,
            output_buffer_size: DEFAULT_OUTPUT_BUFFER_SIZE,
            xor_magic: false,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            limits: RpcLimits::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("OXCROPS_CONFIG").map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Like [`SessionConfig::load`], with the file named by the caller.
    ///
    /// `None` starts from defaults. Environment overrides and validation
    /// apply either way.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    fn load_with(
        path: Option<&Path>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(var);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: SessionConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `OXCROPS_*` overrides read through `var`. Unparseable values
    /// are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(transport) = var("OXCROPS_TRANSPORT") {
            if let Ok(parsed) = transport.parse() {
                self.transport = parsed;
            }
        }

        if let Some(enabled) = var("OXCROPS_AUTO_REDIRECT") {
            self.auto_redirect = parse_bool(&enabled);
        }

        if let Some(max) = var("OXCROPS_MAX_REDIRECTS") {
            if let Ok(n) = max.parse() {
                self.max_redirects = n;
            }
        }

        if let Some(size) = var("OXCROPS_OUTPUT_BUFFER_SIZE") {
            if let Some(n) = parse_u32(&size) {
                self.output_buffer_size = n;
            }
        }

        if let Some(enabled) = var("OXCROPS_XOR_MAGIC") {
            self.xor_magic = parse_bool(&enabled);
        }

        if let Some(timeout) = var("OXCROPS_CONNECT_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = secs;
            }
        }

        if let Some(timeout) = var("OXCROPS_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.request_timeout_secs = secs;
            }
        }

        if let Some(enforce) = var("OXCROPS_ENFORCE_OUTPUT_LIMITS") {
            self.limits.enforce_output_buffer_limits = parse_bool(&enforce);
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.min_output_buffer_size > self.limits.max_output_buffer_size {
            return Err(ConfigError::ValidationError(format!(
                "min_output_buffer_size {:#x} exceeds max_output_buffer_size {:#x}",
                self.limits.min_output_buffer_size, self.limits.max_output_buffer_size
            )));
        }
        if self.output_buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "output_buffer_size must be nonzero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be nonzero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_transport(mut self, transport: TransportSequence) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_auto_redirect(mut self, enabled: bool) -> Self {
        self.auto_redirect = enabled;
        self
    }

    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_output_buffer_size(mut self, size: u32) -> Self {
        self.output_buffer_size = size;
        self
    }

    pub fn with_xor_magic(mut self, enabled: bool) -> Self {
        self.xor_magic = enabled;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_limits(mut self, limits: RpcLimits) -> Self {
        self.limits = limits;
        self
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Accepts decimal or `0x`-prefixed hex.
fn parse_u32(value: &str) -> Option<u32> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.transport, TransportSequence::MapiHttp);
        assert!(!config.auto_redirect);
        assert_eq!(config.output_buffer_size, 0x10008);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = SessionConfig::default()
            .with_transport(TransportSequence::NcacnIpTcp)
            .with_auto_redirect(true);
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("ncacn_ip_tcp"));
        let parsed: SessionConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "auto_redirect: true\nmax_redirects: 1\nlimits:\n  enforce_output_buffer_limits: true"
        )
        .unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert!(config.auto_redirect);
        assert_eq!(config.max_redirects, 1);
        assert!(config.limits.enforce_output_buffer_limits);
        assert_eq!(config.transport, TransportSequence::MapiHttp);
        assert!(config.limits.reserved_rop_ids.contains(0x28));
    }

    #[test]
    fn test_from_file_errors() {
        let err = SessionConfig::from_file("/nonexistent/oxcrops.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_redirects: [not, a, number]").unwrap();
        let err = SessionConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        let config = SessionConfig::default().with_output_buffer_size(0x8008);
        config.save(&path).unwrap();
        assert_eq!(SessionConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OXCROPS_TRANSPORT", "ncacn_http"),
            ("OXCROPS_AUTO_REDIRECT", "yes"),
            ("OXCROPS_MAX_REDIRECTS", "5"),
            ("OXCROPS_OUTPUT_BUFFER_SIZE", "0x8008"),
            ("OXCROPS_REQUEST_TIMEOUT", "not-a-number"),
            ("OXCROPS_ENFORCE_OUTPUT_LIMITS", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = SessionConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.transport, TransportSequence::NcacnHttp);
        assert!(config.auto_redirect);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.output_buffer_size, 0x8008);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.limits.enforce_output_buffer_limits);
    }

    #[test]
    fn test_load_with_file_applies_overrides_and_validates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_redirects: 1\nxor_magic: false").unwrap();

        let vars: HashMap<&str, &str> = [("OXCROPS_XOR_MAGIC", "true")].into_iter().collect();
        let config = SessionConfig::load_with(Some(file.path()), |name| {
            vars.get(name).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.max_redirects, 1);
        assert!(config.xor_magic);

        let mut invalid = NamedTempFile::new().unwrap();
        writeln!(invalid, "output_buffer_size: 0").unwrap();
        let err = SessionConfig::load_with(Some(invalid.path()), |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        // An override can also make a valid file invalid.
        let err = SessionConfig::load_with(Some(file.path()), |name| {
            (name == "OXCROPS_REQUEST_TIMEOUT").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_load_with_no_file_uses_defaults() {
        let config = SessionConfig::load_with(None, |_| None).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let mut config = SessionConfig::default();
        config.limits.min_output_buffer_size = 0x50000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_transport_sequence_parse() {
        assert_eq!(
            "MAPI_HTTP".parse::<TransportSequence>().unwrap(),
            TransportSequence::MapiHttp
        );
        assert!("ncalrpc".parse::<TransportSequence>().is_err());
        assert_eq!(TransportSequence::NcacnIpTcp.to_string(), "ncacn_ip_tcp");
    }
}
