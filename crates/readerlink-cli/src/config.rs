//! Configuration file handling for readerlink

use anyhow::{Context, Result};
use readerlink_terminal::TerminalErrorCode;
use readerlink_terminal::mock::SimulatedTerminalConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Location used when neither the reader nor the user provides one.
pub const DEFAULT_LOCATION: &str = "tml_simulated";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location applied to readers without a binding
    pub location: Option<String>,
    /// Scan timeout in seconds
    pub discovery_timeout_secs: Option<u64>,
    /// Install a pending firmware update after connecting
    pub install_update: Option<bool>,
    /// How long to keep printing reader prompts before disconnecting
    pub linger_ms: Option<u64>,
    /// Simulated terminal behaviour
    pub simulator: SimulatorConfig,
}

/// Simulated terminal section of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub discovery_delay_ms: u64,
    pub connect_delay_ms: u64,
    pub update_step_delay_ms: u64,
    pub update_steps: u32,
    pub update_available: bool,
    pub update_failure: Option<TerminalErrorCode>,
    pub fail_connect: bool,
    pub battery_level: Option<f32>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            discovery_delay_ms: 500,
            connect_delay_ms: 800,
            update_step_delay_ms: 300,
            update_steps: 10,
            update_available: true,
            update_failure: None,
            fail_connect: false,
            battery_level: Some(0.75),
        }
    }
}

impl SimulatorConfig {
    /// Build the simulated terminal configuration
    pub fn to_terminal_config(&self) -> SimulatedTerminalConfig {
        let defaults = SimulatedTerminalConfig::default();
        SimulatedTerminalConfig {
            discovery_delay: Duration::from_millis(self.discovery_delay_ms),
            connect_delay: Duration::from_millis(self.connect_delay_ms),
            update_step_delay: Duration::from_millis(self.update_step_delay_ms),
            update_steps: self.update_steps,
            available_update: if self.update_available {
                defaults.available_update.clone()
            } else {
                None
            },
            update_failure: self.update_failure,
            fail_connect: self.fail_connect,
            battery_level: self.battery_level,
            ..defaults
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        location: Option<&str>,
        discovery_timeout_secs: Option<u64>,
        install_update: bool,
        simulated: bool,
    ) -> MergedConfig {
        MergedConfig {
            location: location
                .map(String::from)
                .or_else(|| self.location.clone())
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            discovery_timeout: discovery_timeout_secs
                .or(self.discovery_timeout_secs)
                .map(Duration::from_secs),
            install_update: install_update || self.install_update.unwrap_or(false),
            linger: Duration::from_millis(self.linger_ms.unwrap_or(1500)),
            simulated,
            terminal: self.simulator.to_terminal_config(),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub location: String,
    pub discovery_timeout: Option<Duration>,
    pub install_update: bool,
    pub linger: Duration,
    pub simulated: bool,
    pub terminal: SimulatedTerminalConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            location = "tml_store_42"
            discovery_timeout_secs = 20
            install_update = true

            [simulator]
            update_steps = 3
            update_failure = "READER_SOFTWARE_UPDATE_FAILED_BATTERY_LOW"
            battery_level = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(config.location.as_deref(), Some("tml_store_42"));
        assert_eq!(config.discovery_timeout_secs, Some(20));
        assert_eq!(config.simulator.update_steps, 3);
        assert_eq!(
            config.simulator.update_failure,
            Some(TerminalErrorCode::ReaderSoftwareUpdateFailedBatteryLow)
        );
        // Unset fields keep their defaults
        assert_eq!(config.simulator.connect_delay_ms, 800);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[rstest]
    #[case(Some("tml_cli"), Some("tml_file"), "tml_cli")]
    #[case(None, Some("tml_file"), "tml_file")]
    #[case(None, None, DEFAULT_LOCATION)]
    fn test_merge_location(
        #[case] arg: Option<&str>,
        #[case] file: Option<&str>,
        #[case] expected: &str,
    ) {
        let config = Config {
            location: file.map(String::from),
            ..Config::default()
        };

        let merged = config.merge_with_args(arg, None, false, true);
        assert_eq!(merged.location, expected);
    }

    #[test]
    fn test_merge_flags() {
        let config = Config {
            discovery_timeout_secs: Some(30),
            install_update: Some(true),
            ..Config::default()
        };

        let merged = config.merge_with_args(None, Some(5), false, true);
        assert_eq!(merged.discovery_timeout, Some(Duration::from_secs(5)));
        assert!(merged.install_update);

        let merged = Config::default().merge_with_args(None, None, false, true);
        assert_eq!(merged.discovery_timeout, None);
        assert!(!merged.install_update);
    }

    #[test]
    fn test_simulator_without_update() {
        let simulator = SimulatorConfig {
            update_available: false,
            ..SimulatorConfig::default()
        };

        let terminal = simulator.to_terminal_config();
        assert!(terminal.available_update.is_none());
        assert_eq!(terminal.readers.len(), 2);
    }
}
