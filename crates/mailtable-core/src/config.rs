//! Connector configuration.

use std::time::Duration;

use mailtable_imap::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, Security};
use mailtable_mime::HeaderDecoding;

use crate::stream::ScanPolicy;

/// Default IMAP host.
pub const DEFAULT_HOST: &str = "imap.gmail.com";

/// Default IMAP port (implicit TLS).
pub const DEFAULT_PORT: u16 = 993;

/// Environment variable holding the account email.
pub const ENV_EMAIL: &str = "MAILTABLE_EMAIL";
/// Environment variable holding the account password.
pub const ENV_PASSWORD: &str = "MAILTABLE_PASSWORD";
/// Environment variable overriding the host.
pub const ENV_HOST: &str = "MAILTABLE_HOST";
/// Environment variable overriding the port.
pub const ENV_PORT: &str = "MAILTABLE_PORT";
/// Environment variable enabling [`ScanPolicy::SkipInvalid`].
pub const ENV_SKIP_INVALID: &str = "MAILTABLE_SKIP_INVALID";

/// Configuration problems detected before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Account email is empty.
    #[error("Email address is required")]
    EmptyEmail,
    /// Password is empty.
    #[error("Password is required")]
    EmptyPassword,
    /// Host is empty.
    #[error("IMAP host is required")]
    EmptyHost,
    /// Port is zero.
    #[error("IMAP port must be 1-65535")]
    InvalidPort,
    /// A required environment variable is not set.
    #[error("Environment variable {0} is not set")]
    MissingVariable(&'static str),
    /// An environment variable holds an unusable value.
    #[error("Environment variable {name} has invalid value {value:?}")]
    InvalidVariable {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

impl ConfigError {
    /// Returns the configuration field this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyEmail => "email",
            Self::EmptyPassword => "password",
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::MissingVariable(name) | Self::InvalidVariable { name, .. } => *name,
        }
    }
}

/// Account and connection settings for a [`MailConnector`](crate::MailConnector).
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Account email, used as the login name.
    pub email: String,
    /// Account password or app password.
    pub password: String,
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection security.
    pub security: Security,
    /// Timeout for connect, TLS handshake, greeting.
    pub connect_timeout: Duration,
    /// Timeout for each command round trip.
    pub io_timeout: Duration,
    /// What a scan does with undecodable messages.
    pub policy: ScanPolicy,
    /// How much of each encoded header is decoded.
    pub header_decoding: HeaderDecoding,
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("policy", &self.policy)
            .field("header_decoding", &self.header_decoding)
            .finish()
    }
}

impl ConnectorConfig {
    /// Creates a configuration for the default endpoint.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        ConnectorConfigBuilder::new(email, password).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::new(email, password)
    }

    /// Reads the configuration from `MAILTABLE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if email or password is missing, or if the port
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let email = lookup(ENV_EMAIL).ok_or(ConfigError::MissingVariable(ENV_EMAIL))?;
        let password = lookup(ENV_PASSWORD).ok_or(ConfigError::MissingVariable(ENV_PASSWORD))?;

        let mut builder = ConnectorConfigBuilder::new(email, password);

        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
            builder = builder.host(host.trim());
        }

        if let Some(value) = lookup(ENV_PORT) {
            let port = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidVariable {
                    name: ENV_PORT,
                    value: value.clone(),
                })?;
            builder = builder.port(port);
        }

        if let Some(value) = lookup(ENV_SKIP_INVALID) {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => builder = builder.policy(ScanPolicy::SkipInvalid),
                "" | "0" | "false" | "no" => {}
                _ => {
                    return Err(ConfigError::InvalidVariable {
                        name: ENV_SKIP_INVALID,
                        value,
                    });
                }
            }
        }

        Ok(builder.build())
    }

    /// Checks the settings that can be verified offline.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.email.trim().is_empty() {
            return Err(ConfigError::EmptyEmail);
        }
        if self.password.is_empty() {
            return Err(ConfigError::EmptyPassword);
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(())
    }
}

/// Builder for [`ConnectorConfig`].
#[derive(Debug, Clone)]
pub struct ConnectorConfigBuilder {
    config: ConnectorConfig,
}

impl ConnectorConfigBuilder {
    /// Creates a builder for the default endpoint.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            config: ConnectorConfig {
                email: email.into(),
                password: password.into(),
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                security: Security::Implicit,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                io_timeout: DEFAULT_IO_TIMEOUT,
                policy: ScanPolicy::default(),
                header_decoding: HeaderDecoding::default(),
            },
        }
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Sets the scan policy.
    #[must_use]
    pub const fn policy(mut self, policy: ScanPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Sets the header decoding mode.
    #[must_use]
    pub const fn header_decoding(mut self, mode: HeaderDecoding) -> Self {
        self.config.header_decoding = mode;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ConnectorConfig {
        self.config
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::new("me@gmail.com", "app-password");
        assert_eq!(config.host, "imap.gmail.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.policy, ScanPolicy::AbortOnError);
        assert_eq!(config.header_decoding, HeaderDecoding::FirstSegment);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ConnectorConfig::builder("me@example.com", "pw")
            .host("localhost")
            .port(1143)
            .security(Security::None)
            .io_timeout(Duration::from_secs(5))
            .policy(ScanPolicy::SkipInvalid)
            .header_decoding(HeaderDecoding::Full)
            .build();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1143);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert_eq!(config.policy, ScanPolicy::SkipInvalid);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectorConfig::new("me@gmail.com", "hunter2");
        let debug = format!("{config:?}");
        assert!(debug.contains("me@gmail.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_validate() {
        let cases = [
            (ConnectorConfig::new("", "pw"), ConfigError::EmptyEmail),
            (ConnectorConfig::new("me@x.com", ""), ConfigError::EmptyPassword),
            (
                ConnectorConfig::builder("me@x.com", "pw").host(" ").build(),
                ConfigError::EmptyHost,
            ),
            (
                ConnectorConfig::builder("me@x.com", "pw").port(0).build(),
                ConfigError::InvalidPort,
            ),
        ];

        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
        assert_eq!(ConfigError::InvalidPort.field(), "port");
    }

    #[test]
    fn test_from_lookup_minimal() {
        let config = ConnectorConfig::from_lookup(lookup(&[
            ("MAILTABLE_EMAIL", "me@gmail.com"),
            ("MAILTABLE_PASSWORD", "pw"),
        ]))
        .unwrap();

        assert_eq!(config.email, "me@gmail.com");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.policy, ScanPolicy::AbortOnError);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ConnectorConfig::from_lookup(lookup(&[
            ("MAILTABLE_EMAIL", "me@example.com"),
            ("MAILTABLE_PASSWORD", "pw"),
            ("MAILTABLE_HOST", "mail.example.com"),
            ("MAILTABLE_PORT", "1993"),
            ("MAILTABLE_SKIP_INVALID", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.host, "mail.example.com");
        assert_eq!(config.port, 1993);
        assert_eq!(config.policy, ScanPolicy::SkipInvalid);
    }

    #[test]
    fn test_from_lookup_errors() {
        let missing = ConnectorConfig::from_lookup(lookup(&[("MAILTABLE_EMAIL", "me@x.com")]));
        assert_eq!(missing, Err(ConfigError::MissingVariable(ENV_PASSWORD)));

        let bad_port = ConnectorConfig::from_lookup(lookup(&[
            ("MAILTABLE_EMAIL", "me@x.com"),
            ("MAILTABLE_PASSWORD", "pw"),
            ("MAILTABLE_PORT", "imap"),
        ]));
        assert!(matches!(
            bad_port,
            Err(ConfigError::InvalidVariable { name: "MAILTABLE_PORT", .. })
        ));

        let bad_flag = ConnectorConfig::from_lookup(lookup(&[
            ("MAILTABLE_EMAIL", "me@x.com"),
            ("MAILTABLE_PASSWORD", "pw"),
            ("MAILTABLE_SKIP_INVALID", "maybe"),
        ]));
        assert!(bad_flag.is_err());
    }
}
