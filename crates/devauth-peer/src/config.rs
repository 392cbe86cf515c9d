// ============================================
// File: crates/devauth-peer/src/config.rs
// ============================================
//! # Peer Configuration
//!
//! ## Creation Reason
//! Collects everything a peer needs to know about its environment (broker,
//! topics, key files, shared channel key) into one TOML file, so no
//! component reads process-wide state.
//!
//! ## Main Functionality
//! - `PeerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Broker client id and connect options per role
//!
//! ## Configuration Sections
//! - `broker`: Broker address and MQTT session options
//! - `topics`: Challenge/response and data topic names
//! - `keys`: PEM key file paths
//! - `channel`: Shared AES-256 key and reply behaviour
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [broker]
//! url = "tcp://localhost:1883"
//! client_id_prefix = "devauth"
//! device_secret = "factory-secret-0001"
//! keep_alive_secs = 30
//!
//! [topics]
//! challenge = "iot/auth/challenge"
//! response = "iot/auth/response"
//! data = "device1/data"
//! data_response = "device2/response"
//!
//! [keys]
//! private_key_file = "keys/private_key.pem"
//! public_key_file = "keys/public_key.pem"
//!
//! [channel]
//! shared_key_hex = "3031323334353637383961626364656630313233343536373839616263646566"
//! reply_on_receive = true
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Protocol timings (response deadline, connect timeout) are NOT here
//! - The default shared key is public. Every real deployment must set one.
//! - Validate config before connecting to the broker
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use devauth_common::time::unix_timestamp_nanos;
use devauth_common::types::Topic;
use devauth_core::crypto::derive_device_id;
use devauth_core::protocol::{
    DEFAULT_CHALLENGE_TOPIC, DEFAULT_DATA_RESPONSE_TOPIC, DEFAULT_DATA_TOPIC,
    DEFAULT_RESPONSE_TOPIC,
};
use devauth_core::SymmetricKey;
use devauth_transport::mqtt::parse_broker_url;
use devauth_transport::ConnectOptions;

use crate::error::{PeerError, Result};

/// Minimum accepted MQTT keep-alive.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Hex characters of the device id used in client identifiers.
const CLIENT_ID_DEVICE_CHARS: usize = 16;

// ============================================
// Role
// ============================================

/// What a peer process is doing; part of its broker client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Issues challenges and verifies responses.
    Verifier,
    /// Signs challenges (the prover).
    Responder,
    /// Sends on the secure channel.
    Sender,
    /// Receives on the secure channel.
    Listener,
}

impl Role {
    /// Lowercase name used in client ids and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verifier => "verifier",
            Self::Responder => "responder",
            Self::Sender => "sender",
            Self::Listener => "listener",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// PeerConfig
// ============================================

/// Main peer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Broker connection.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Topic names.
    #[serde(default)]
    pub topics: TopicsConfig,

    /// Key file locations.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Secure channel settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PeerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PeerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| PeerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    ///
    /// # Errors
    /// Returns error if an existing file is invalid.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            warn!("Configuration file {} not found, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or validated.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PeerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        self.topics.validate()?;
        self.keys.validate()?;
        self.channel.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Broker client identifier for `role`.
    ///
    /// `{prefix}-{role}-{device id prefix}` when a device secret is set,
    /// otherwise `{prefix}-{role}-{unix nanos}`.
    ///
    /// # Errors
    /// Returns error if the device id cannot be derived.
    pub fn client_id(&self, role: Role) -> Result<String> {
        let suffix = match &self.broker.device_secret {
            Some(secret) => {
                let device_id = derive_device_id(secret.as_bytes())?;
                device_id[..CLIENT_ID_DEVICE_CHARS].to_owned()
            }
            None => unix_timestamp_nanos().to_string(),
        };
        Ok(format!("{}-{}-{}", self.broker.client_id_prefix, role, suffix))
    }

    /// Transport options for `role`.
    ///
    /// # Errors
    /// Returns error if the client id cannot be built.
    pub fn connect_options(&self, role: Role) -> Result<ConnectOptions> {
        let mut options = ConnectOptions::new(&self.broker.url, self.client_id(role)?);
        options.clean_session = self.broker.clean_session;
        options.resume_subscriptions = self.broker.resume_subscriptions;
        options.auto_reconnect = self.broker.auto_reconnect;
        options.keep_alive = Duration::from_secs(self.broker.keep_alive_secs);
        options.channel_capacity = self.broker.channel_capacity;
        Ok(options)
    }

    /// Parses the shared channel key.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the key is not 64 hex characters.
    pub fn shared_key(&self) -> Result<SymmetricKey> {
        self.channel.shared_key()
    }
}

// ============================================
// BrokerConfig
// ============================================

/// Broker configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker address (`tcp://host:port`, `mqtt://host:port` or `host:port`).
    #[serde(default = "default_broker_url")]
    pub url: String,

    /// Leading part of every client id.
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,

    /// Secret used to derive a stable device identity.
    #[serde(default)]
    pub device_secret: Option<String>,

    /// Start with a clean MQTT session.
    #[serde(default = "default_true")]
    pub clean_session: bool,

    /// Re-issue subscriptions after a reconnect the broker did not resume.
    /// When `false` the running role stops once its subscriptions are lost.
    #[serde(default = "default_true")]
    pub resume_subscriptions: bool,

    /// Reconnect automatically after a connection loss.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Per-subscription queue capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_broker_url() -> String {
    "tcp://localhost:1883".to_string()
}

fn default_client_id_prefix() -> String {
    "devauth".to_string()
}

fn default_true() -> bool {
    true
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    devauth_transport::traits::DEFAULT_CHANNEL_CAPACITY
}

impl BrokerConfig {
    fn validate(&self) -> Result<()> {
        parse_broker_url(&self.url)
            .map_err(|e| PeerError::config_invalid("broker.url", e.to_string()))?;

        if self.client_id_prefix.is_empty() {
            return Err(PeerError::config_invalid(
                "broker.client_id_prefix",
                "cannot be empty",
            ));
        }

        if matches!(&self.device_secret, Some(secret) if secret.is_empty()) {
            return Err(PeerError::config_invalid(
                "broker.device_secret",
                "cannot be empty when set",
            ));
        }

        if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(PeerError::config_invalid(
                "broker.keep_alive_secs",
                format!("must be at least {MIN_KEEP_ALIVE_SECS}"),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(PeerError::config_invalid(
                "broker.channel_capacity",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            client_id_prefix: default_client_id_prefix(),
            device_secret: None,
            clean_session: true,
            resume_subscriptions: true,
            auto_reconnect: true,
            keep_alive_secs: default_keep_alive_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

// ============================================
// TopicsConfig
// ============================================

/// Topic names section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Verifier publishes challenges here.
    #[serde(default = "default_challenge_topic")]
    pub challenge: String,

    /// Responder publishes signatures here.
    #[serde(default = "default_response_topic")]
    pub response: String,

    /// Sender to listener secure channel topic.
    #[serde(default = "default_data_topic")]
    pub data: String,

    /// Listener to sender secure channel topic.
    #[serde(default = "default_data_response_topic")]
    pub data_response: String,
}

fn default_challenge_topic() -> String {
    DEFAULT_CHALLENGE_TOPIC.to_string()
}

fn default_response_topic() -> String {
    DEFAULT_RESPONSE_TOPIC.to_string()
}

fn default_data_topic() -> String {
    DEFAULT_DATA_TOPIC.to_string()
}

fn default_data_response_topic() -> String {
    DEFAULT_DATA_RESPONSE_TOPIC.to_string()
}

/// Validated topic names.
#[derive(Debug, Clone)]
pub struct Topics {
    /// See [`TopicsConfig::challenge`].
    pub challenge: Topic,
    /// See [`TopicsConfig::response`].
    pub response: Topic,
    /// See [`TopicsConfig::data`].
    pub data: Topic,
    /// See [`TopicsConfig::data_response`].
    pub data_response: Topic,
}

impl TopicsConfig {
    fn validate(&self) -> Result<()> {
        let topics = self.parse()?;
        if topics.challenge == topics.response {
            return Err(PeerError::config_invalid(
                "topics.response",
                "must differ from topics.challenge",
            ));
        }
        if topics.data == topics.data_response {
            return Err(PeerError::config_invalid(
                "topics.data_response",
                "must differ from topics.data",
            ));
        }
        Ok(())
    }

    /// Parses every topic name.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first bad topic.
    pub fn parse(&self) -> Result<Topics> {
        let parse = |field: &str, name: &str| {
            Topic::new(name).map_err(|e| PeerError::config_invalid(format!("topics.{field}"), e.to_string()))
        };
        Ok(Topics {
            challenge: parse("challenge", &self.challenge)?,
            response: parse("response", &self.response)?,
            data: parse("data", &self.data)?,
            data_response: parse("data_response", &self.data_response)?,
        })
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            challenge: default_challenge_topic(),
            response: default_response_topic(),
            data: default_data_topic(),
            data_response: default_data_response_topic(),
        }
    }
}

// ============================================
// KeysConfig
// ============================================

/// Key file section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// PEM private key (prover side).
    #[serde(default = "default_private_key_file")]
    pub private_key_file: String,

    /// PEM public key (verifier side).
    #[serde(default = "default_public_key_file")]
    pub public_key_file: String,
}

fn default_private_key_file() -> String {
    "keys/private_key.pem".to_string()
}

fn default_public_key_file() -> String {
    "keys/public_key.pem".to_string()
}

impl KeysConfig {
    fn validate(&self) -> Result<()> {
        if self.private_key_file.is_empty() {
            return Err(PeerError::config_missing("keys.private_key_file"));
        }
        if self.public_key_file.is_empty() {
            return Err(PeerError::config_missing("keys.public_key_file"));
        }
        Ok(())
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            private_key_file: default_private_key_file(),
            public_key_file: default_public_key_file(),
        }
    }
}

// ============================================
// ChannelConfig
// ============================================

/// Secure channel section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// 32-byte AES key as 64 hex characters.
    #[serde(default = "default_shared_key_hex")]
    pub shared_key_hex: String,

    /// Listener answers each message with an acknowledgement.
    #[serde(default = "default_true")]
    pub reply_on_receive: bool,
}

/// Hex of the ASCII key `0123456789abcdef0123456789abcdef`.
const DEFAULT_SHARED_KEY_HEX: &str =
    "3031323334353637383961626364656630313233343536373839616263646566";

fn default_shared_key_hex() -> String {
    DEFAULT_SHARED_KEY_HEX.to_string()
}

impl ChannelConfig {
    fn validate(&self) -> Result<()> {
        self.shared_key().map(|_| ())
    }

    /// Parses the shared key.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the key is not 64 hex characters.
    pub fn shared_key(&self) -> Result<SymmetricKey> {
        SymmetricKey::from_hex(self.shared_key_hex.trim())
            .map_err(|e| PeerError::config_invalid("channel.shared_key_hex", e.to_string()))
    }

    /// Returns `true` if the well-known default key is in use.
    #[must_use]
    pub fn uses_default_key(&self) -> bool {
        self.shared_key_hex.trim().eq_ignore_ascii_case(DEFAULT_SHARED_KEY_HEX)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            shared_key_hex: default_shared_key_hex(),
            reply_on_receive: true,
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PeerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.broker.resume_subscriptions);
        assert!(config.channel.uses_default_key());
        assert_eq!(config.shared_key().unwrap().as_bytes(), b"0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [broker]
            url = "mqtt://broker.local:8883"
            client_id_prefix = "plant7"
            device_secret = "factory-secret-0001"
            clean_session = false
            resume_subscriptions = false
            keep_alive_secs = 60

            [topics]
            challenge = "plant7/auth/challenge"
            response = "plant7/auth/response"

            [keys]
            private_key_file = "/etc/devauth/private_key.pem"

            [channel]
            shared_key_hex = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
            reply_on_receive = false

            [logging]
            level = "debug"
        "#;

        let config = PeerConfig::from_str(toml).unwrap();
        assert_eq!(config.broker.url, "mqtt://broker.local:8883");
        assert!(!config.broker.clean_session);
        assert!(!config.broker.resume_subscriptions);
        assert_eq!(config.topics.challenge, "plant7/auth/challenge");
        // unspecified topics keep their defaults
        assert_eq!(config.topics.data, "device1/data");
        assert_eq!(config.keys.public_key_file, "keys/public_key.pem");
        assert!(!config.channel.reply_on_receive);
        assert!(!config.channel.uses_default_key());
        assert_eq!(config.logging.level, "debug");

        let options = config.connect_options(Role::Responder).unwrap();
        assert_eq!(options.keep_alive, Duration::from_secs(60));
        assert!(!options.clean_session);
        assert!(options.auto_reconnect);
    }

    #[test]
    fn test_malformed_toml() {
        let err = PeerConfig::from_str("[broker\nurl = ").unwrap_err();
        assert!(matches!(err, PeerError::ConfigLoad { .. }));
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("[broker]\nurl = \"http://example.com\"", "broker.url"),
            ("[broker]\nkeep_alive_secs = 1", "broker.keep_alive_secs"),
            ("[broker]\nchannel_capacity = 0", "broker.channel_capacity"),
            ("[broker]\ndevice_secret = \"\"", "broker.device_secret"),
            ("[topics]\nchallenge = \"iot/+/challenge\"", "topics.challenge"),
            ("[topics]\nresponse = \"iot/auth/challenge\"", "topics.response"),
            ("[topics]\ndata = \"\"", "topics.data"),
            ("[channel]\nshared_key_hex = \"abcd\"", "channel.shared_key_hex"),
            ("[channel]\nshared_key_hex = \"zz\"", "channel.shared_key_hex"),
        ];
        for (toml, field) in cases {
            match PeerConfig::from_str(toml) {
                Err(PeerError::ConfigInvalid { field: f, .. }) => assert_eq!(f, field, "{toml}"),
                other => panic!("expected ConfigInvalid for {toml}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_key_path() {
        let err = PeerConfig::from_str("[keys]\npublic_key_file = \"\"").unwrap_err();
        assert!(matches!(err, PeerError::ConfigMissing { .. }));
    }

    #[test]
    fn test_client_id_with_device_secret() {
        let mut config = PeerConfig::default();
        config.broker.device_secret = Some("secret".to_string());

        let verifier = config.client_id(Role::Verifier).unwrap();
        let responder = config.client_id(Role::Responder).unwrap();
        assert!(verifier.starts_with("devauth-verifier-"));
        assert_eq!(verifier.len(), "devauth-verifier-".len() + CLIENT_ID_DEVICE_CHARS);
        assert_ne!(verifier, responder);
        // stable for the same secret
        assert_eq!(verifier, config.client_id(Role::Verifier).unwrap());
    }

    #[test]
    fn test_client_id_without_device_secret() {
        let config = PeerConfig::default();
        let id = config.client_id(Role::Listener).unwrap();
        let suffix = id.strip_prefix("devauth-listener-").unwrap();
        assert!(suffix.parse::<u64>().unwrap() > 0);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = PeerConfig::default();
        config.broker.device_secret = Some("abc".to_string());
        let parsed = PeerConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.broker.device_secret.as_deref(), Some("abc"));
        assert_eq!(parsed.topics.response, config.topics.response);
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let config = PeerConfig::load_or_default("/nonexistent/devauth.toml").await.unwrap();
        assert_eq!(config.broker.url, "tcp://localhost:1883");
    }
}
