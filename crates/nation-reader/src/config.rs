//! Reader configuration.
//!
//! Configuration can be loaded from a YAML file; every field has a default so
//! a file only needs the values it changes:
//!
//! ```yaml
//! port: /dev/ttyUSB0
//! antennas: [1, 3]
//! settle_delay_ms: 500
//! catalog: catalog.yaml
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use nation_protocol::{AntennaSet, ResyncPolicy, MAX_ANTENNAS};
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, ReaderResult};

/// Prefix selecting a serial-over-TCP bridge instead of a local port.
pub const TCP_PREFIX: &str = "tcp://";

/// Resync policy, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncMode {
    /// Drop a whole frame that fails its checksum.
    #[default]
    DiscardFrame,
    /// Drop one byte and search again.
    SkipByte,
}

impl From<ResyncMode> for ResyncPolicy {
    fn from(mode: ResyncMode) -> Self {
        match mode {
            ResyncMode::DiscardFrame => ResyncPolicy::DiscardFrame,
            ResyncMode::SkipByte => ResyncPolicy::SkipByte,
        }
    }
}

/// Configuration for a reader connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Serial device path, or `tcp://host:port` for a serial-over-TCP bridge.
    pub port: String,

    /// Serial baud rate.
    pub baud_rate: u32,

    /// How long a single read waits for data (milliseconds).
    pub read_timeout_ms: u64,

    /// Quiet time after stopping inventory before a write is sent (milliseconds).
    /// The reader keeps reporting tags for a moment after STOP.
    pub settle_delay_ms: u64,

    /// How long to wait for a write result (milliseconds).
    pub write_timeout_ms: u64,

    /// Antennas used for inventory (1-4).
    pub antennas: Vec<u8>,

    /// Continuous inventory (false = single round).
    pub continuous: bool,

    /// Product catalogue used to resolve EPCs.
    pub catalog: Option<PathBuf>,

    /// What to discard when a frame fails its checksum.
    pub resync: ResyncMode,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            port: String::new(),
            baud_rate: 115_200,
            read_timeout_ms: 50,
            settle_delay_ms: 300,
            write_timeout_ms: 2000,
            antennas: vec![1],
            continuous: true,
            catalog: None,
            resync: ResyncMode::default(),
        }
    }
}

impl ReaderConfig {
    /// Create a config for the given port with default settings.
    pub fn for_port(port: impl Into<String>) -> Self {
        ReaderConfig {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Load a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ReaderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse a config from YAML text.
    pub fn from_yaml(text: &str) -> ReaderResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Set the antennas used for inventory.
    pub fn with_antennas(mut self, antennas: Vec<u8>) -> Self {
        self.antennas = antennas;
        self
    }

    /// Set the settle delay.
    pub fn with_settle_delay_ms(mut self, settle_delay_ms: u64) -> Self {
        self.settle_delay_ms = settle_delay_ms;
        self
    }

    /// Set the write timeout.
    pub fn with_write_timeout_ms(mut self, write_timeout_ms: u64) -> Self {
        self.write_timeout_ms = write_timeout_ms;
        self
    }

    /// Check the configuration for values the reader cannot use.
    pub fn validate(&self) -> ReaderResult<()> {
        if self.port.trim().is_empty() {
            return Err(ReaderError::InvalidConfig("port cannot be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ReaderError::InvalidConfig(
                "baud rate must be greater than zero".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(ReaderError::InvalidConfig(
                "read timeout must be greater than zero".to_string(),
            ));
        }
        if self.antennas.is_empty() {
            return Err(ReaderError::InvalidConfig(
                "select at least one antenna".to_string(),
            ));
        }
        if let Some(&bad) = self
            .antennas
            .iter()
            .find(|&&id| id == 0 || id > MAX_ANTENNAS)
        {
            return Err(ReaderError::InvalidConfig(format!(
                "antenna {} out of range (1-{})",
                bad, MAX_ANTENNAS
            )));
        }
        Ok(())
    }

    /// The configured antennas as a selection.
    pub fn antenna_set(&self) -> ReaderResult<AntennaSet> {
        Ok(AntennaSet::from_ids(&self.antennas)?)
    }

    /// TCP address when the port names a serial-over-TCP bridge.
    pub fn tcp_address(&self) -> Option<&str> {
        self.port.strip_prefix(TCP_PREFIX)
    }

    /// Read timeout as a duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Settle delay as a duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Write timeout as a duration.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.antennas, vec![1]);
        assert!(config.continuous);
        assert_eq!(config.resync, ResyncMode::DiscardFrame);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ReaderConfig::from_yaml(
            "port: /dev/ttyUSB0\nantennas: [1, 3]\nresync: skip_byte\n",
        )
        .unwrap();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.antennas, vec![1, 3]);
        assert_eq!(config.resync, ResyncMode::SkipByte);
        assert_eq!(config.settle_delay_ms, 300);
        assert_eq!(config.antenna_set().unwrap().mask(), 0x05);
    }

    #[test]
    fn test_validate() {
        assert!(ReaderConfig::default().validate().is_err());
        assert!(ReaderConfig::for_port("COM3").validate().is_ok());
        assert!(ReaderConfig::for_port("COM3")
            .with_antennas(vec![])
            .validate()
            .is_err());
        assert!(ReaderConfig::for_port("COM3")
            .with_antennas(vec![2, 5])
            .validate()
            .is_err());
    }

    #[test]
    fn test_zero_read_timeout_rejected() {
        let config =
            ReaderConfig::from_yaml("port: tcp://127.0.0.1:4001\nread_timeout_ms: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ReaderError::InvalidConfig(_))));
    }

    #[test]
    fn test_tcp_address() {
        assert_eq!(
            ReaderConfig::for_port("tcp://10.0.0.5:4001").tcp_address(),
            Some("10.0.0.5:4001")
        );
        assert_eq!(ReaderConfig::for_port("/dev/ttyUSB0").tcp_address(), None);
    }
}
