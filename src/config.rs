//! Client configuration
//!
//! Loaded from TOML. Only the `[broker]` section is required:
//!
//! ```toml
//! [client]
//! id = "sensor-gateway"
//! clean_session = true
//!
//! [broker]
//! url = "mqtts://localhost:8883"
//! keepalive_secs = 60
//! ca_path = "/etc/ssl/certs"
//!
//! [timing]
//! connect_poll_ms = 100
//! misc_interval_ms = 1000
//! reconnect_delay_ms = 5000
//! ```

use crate::engine::SessionOptions;
use crate::transport::mqtt::{BrokerAddress, DriverTimings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Prefix of generated client identifiers
pub const CLIENT_ID_PREFIX: &str = "mqtt-dispatch";

/// Main client configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    pub broker: BrokerSection,
    #[serde(default)]
    pub timing: TimingSection,
}

/// Session identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Client identifier (must match [a-zA-Z0-9._-]+); generated when absent
    pub id: Option<String>,
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            id: None,
            clean_session: default_clean_session(),
        }
    }
}

fn default_clean_session() -> bool {
    true
}

/// Broker location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// `mqtt://host[:port]` (default port 1883) or `mqtts://host[:port]` (8883)
    pub url: String,
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
    /// Directory of CA certificates; enables TLS on the engine (`mqtts://` only)
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
}

fn default_keepalive() -> u64 {
    60
}

/// Driver timer intervals in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSection {
    #[serde(default = "default_connect_poll_ms")]
    pub connect_poll_ms: u64,
    #[serde(default = "default_misc_interval_ms")]
    pub misc_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            connect_poll_ms: default_connect_poll_ms(),
            misc_interval_ms: default_misc_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_connect_poll_ms() -> u64 {
    100
}

fn default_misc_interval_ms() -> u64 {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid client ID format: {0}")]
    InvalidClientId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientConfig {
    /// Configuration for `broker_url` with every other setting at its default
    pub fn new(broker_url: impl Into<String>) -> Self {
        let mut config = Self {
            client: ClientSection::default(),
            broker: BrokerSection {
                url: broker_url.into(),
                keepalive_secs: default_keepalive(),
                ca_path: None,
            },
            timing: TimingSection::default(),
        };
        config.resolve_client_id();
        config
    }

    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        config.resolve_client_id();
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref id) = self.client.id {
            validate_client_id(id)?;
        }

        self.broker_address()?;

        if self.broker.ca_path.is_some() && !self.broker.url.starts_with("mqtts://") {
            return Err(ConfigError::InvalidConfig(
                "ca_path requires an mqtts:// broker URL".to_string(),
            ));
        }

        if self.broker.keepalive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "keepalive_secs must be greater than 0".to_string(),
            ));
        }

        self.driver_timings()
            .validate()
            .map_err(ConfigError::InvalidConfig)
    }

    /// Fill in a generated client identifier when none was configured
    fn resolve_client_id(&mut self) {
        if self.client.id.is_none() {
            self.client.id = Some(generate_client_id());
        }
    }

    pub fn client_id(&self) -> &str {
        self.client.id.as_deref().unwrap_or(CLIENT_ID_PREFIX)
    }

    /// Parse the broker URL into host, port and keepalive
    pub fn broker_address(&self) -> Result<BrokerAddress, ConfigError> {
        parse_broker_url(
            &self.broker.url,
            Duration::from_secs(self.broker.keepalive_secs),
        )
    }

    /// Parameters the protocol engine is created with
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            client_id: self.client_id().to_string(),
            clean_session: self.client.clean_session,
        }
    }

    pub fn driver_timings(&self) -> DriverTimings {
        DriverTimings {
            connect_poll: Duration::from_millis(self.timing.connect_poll_ms),
            misc_interval: Duration::from_millis(self.timing.misc_interval_ms),
            reconnect_delay: Duration::from_millis(self.timing.reconnect_delay_ms),
        }
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[client]
id = "test-client"

[broker]
url = "mqtt://localhost:1883"
"#;
        Self::from_toml_str(toml_content).expect("Test config should parse")
    }
}

/// Parse `mqtt://` and `mqtts://` broker URLs
pub fn parse_broker_url(broker_url: &str, keepalive: Duration) -> Result<BrokerAddress, ConfigError> {
    let url =
        Url::parse(broker_url).map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;

    let default_port = match url.scheme() {
        "mqtt" => 1883,
        "mqtts" => 8883,
        _ => return Err(ConfigError::InvalidBrokerUrl(broker_url.to_string())),
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;
    let port = url.port().unwrap_or(default_port);

    Ok(BrokerAddress::new(host, port, keepalive))
}

/// Validate client ID format
fn validate_client_id(client_id: &str) -> Result<(), ConfigError> {
    let valid_chars = client_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if client_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidClientId(format!(
            "Client ID '{client_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

fn generate_client_id() -> String {
    format!("{CLIENT_ID_PREFIX}-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[client]
id = "sensor-gateway"
clean_session = false

[broker]
url = "mqtt://broker.local:1884"
keepalive_secs = 30

[timing]
connect_poll_ms = 50
misc_interval_ms = 500
reconnect_delay_ms = 2000
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.client_id(), "sensor-gateway");
        assert!(!config.client.clean_session);

        let broker = config.broker_address().unwrap();
        assert_eq!(broker.host, "broker.local");
        assert_eq!(broker.port, 1884);
        assert_eq!(broker.keepalive, Duration::from_secs(30));

        let timings = config.driver_timings();
        assert_eq!(timings.connect_poll, Duration::from_millis(50));
        assert_eq!(timings.misc_interval, Duration::from_millis(500));
        assert_eq!(timings.reconnect_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_content = r#"
[broker]
url = "mqtt://localhost"
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert!(config.client.clean_session);
        assert_eq!(config.broker.keepalive_secs, 60);
        assert_eq!(config.driver_timings(), DriverTimings::default());
        assert_eq!(config.broker_address().unwrap().port, 1883);

        let id = config.client_id();
        assert!(id.starts_with("mqtt-dispatch-"), "generated id: {id}");
        assert!(validate_client_id(id).is_ok());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = ClientConfig::new("mqtt://localhost");
        let b = ClientConfig::new("mqtt://localhost");
        assert_ne!(a.client_id(), b.client_id());
    }

    #[test]
    fn test_session_options() {
        let config = ClientConfig::test_config();
        let options = config.session_options();
        assert_eq!(options.client_id, "test-client");
        assert!(options.clean_session);
    }

    #[test]
    fn test_broker_url_parsing() {
        let keepalive = Duration::from_secs(60);

        let tls = parse_broker_url("mqtts://secure.example.com", keepalive).unwrap();
        assert_eq!(tls.host, "secure.example.com");
        assert_eq!(tls.port, 8883);

        let explicit = parse_broker_url("mqtt://10.0.0.5:11883", keepalive).unwrap();
        assert_eq!(explicit.host, "10.0.0.5");
        assert_eq!(explicit.port, 11883);

        for invalid in ["invalid-url", "http://localhost:1883", "mqtt://", ""] {
            assert!(
                matches!(
                    parse_broker_url(invalid, keepalive),
                    Err(ConfigError::InvalidBrokerUrl(_))
                ),
                "{invalid} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_client_id() {
        assert!(validate_client_id("invalid@client").is_err());
        assert!(validate_client_id("").is_err());
        assert!(validate_client_id("valid-client_123.test").is_ok());

        let toml_content = r#"
[client]
id = "has space"

[broker]
url = "mqtt://localhost"
"#;
        assert!(matches!(
            ClientConfig::from_toml_str(toml_content),
            Err(ConfigError::InvalidClientId(_))
        ));
    }

    #[test]
    fn test_invalid_timing_rejected() {
        let toml_content = r#"
[broker]
url = "mqtt://localhost"

[timing]
reconnect_delay_ms = 0
"#;
        assert!(matches!(
            ClientConfig::from_toml_str(toml_content),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_keepalive_rejected() {
        let toml_content = r#"
[broker]
url = "mqtt://localhost"
keepalive_secs = 0
"#;
        assert!(matches!(
            ClientConfig::from_toml_str(toml_content),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_broker_section() {
        let toml_content = r#"
[client]
id = "lonely"
"#;
        assert!(matches!(
            ClientConfig::from_toml_str(toml_content),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[client]
id = "from-file"

[broker]
url = "mqtts://broker.example.com"
"#
        )
        .unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.client_id(), "from-file");
        assert_eq!(config.broker_address().unwrap().port, 8883);
    }

    #[test]
    fn test_tls_ca_path() {
        let toml_content = r#"
[broker]
url = "mqtts://secure.example.com"
ca_path = "/etc/ssl/certs"
"#;
        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.broker.ca_path, Some(PathBuf::from("/etc/ssl/certs")));
        assert_eq!(ClientConfig::test_config().broker.ca_path, None);

        let plain = r#"
[broker]
url = "mqtt://localhost"
ca_path = "/etc/ssl/certs"
"#;
        assert!(matches!(
            ClientConfig::from_toml_str(plain),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ClientConfig::load_from_file(Path::new("/nonexistent/mqtt-dispatch.toml"));
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn test_config_error_display() {
        let errors = vec![
            ConfigError::InvalidBrokerUrl("nope".to_string()),
            ConfigError::InvalidClientId("bad id".to_string()),
            ConfigError::InvalidConfig("zero".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
