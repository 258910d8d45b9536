//! Simulator configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working configuration. Values are validated after loading and
//! after command-line overrides are applied.

use crate::broadcaster::{Destination, DestinationKind, join_endpoint, validate_url};
use crate::delivery::DeliveryPolicy;
use crate::engine::{
    DEFAULT_DEVICE_ID, DEFAULT_INTERVAL_SECS, DEFAULT_PATIENT_ID, EngineOptions, MIN_INTERVAL_SECS,
};
use crate::error::{ConfigError, ValidationError};
use crate::vitals::ConditionMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
    pub rule_engine: RuleEngineConfig,
    pub user_interface: UserInterfaceConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            cors: true,
        }
    }
}

impl ServerConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub mode: ConditionMode,
    pub interval_secs: u64,
    pub patient_id: String,
    pub device_id: String,
    pub quality_indicators: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: ConditionMode::Normal,
            interval_secs: DEFAULT_INTERVAL_SECS,
            patient_id: DEFAULT_PATIENT_ID.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            quality_indicators: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleEngineConfig {
    pub base_url: String,
    pub endpoint_path: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub enabled: bool,
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            endpoint_path: "/api/vitals/stream".to_string(),
            timeout_secs: 5,
            max_attempts: 3,
            enabled: true,
        }
    }
}

impl RuleEngineConfig {
    pub fn url(&self) -> String {
        join_endpoint(&self.base_url, &self.endpoint_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInterfaceConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub enabled: bool,
}

impl Default for UserInterfaceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001/api/vitals/update".to_string(),
            timeout_secs: 3,
            max_attempts: 3,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub retry_delay_secs: u64,
    pub retry_on_status: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: 2,
            retry_on_status: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Optional file receiving a copy of every log line.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl SimulatorConfig {
    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.simulation.interval_secs < MIN_INTERVAL_SECS {
            return Err(ValidationError::IntervalTooShort {
                got: self.simulation.interval_secs,
                min: MIN_INTERVAL_SECS,
            });
        }
        if self.simulation.patient_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "patient_id" });
        }
        if self.simulation.device_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "device_id" });
        }
        if self.server.port == 0 {
            return Err(ValidationError::InvalidField {
                field: "server.port",
                reason: "port must be non-zero".to_string(),
            });
        }

        validate_url(&self.rule_engine.url())?;
        validate_url(&self.user_interface.url)?;

        for (field, timeout, attempts) in [
            ("rule_engine", self.rule_engine.timeout_secs, self.rule_engine.max_attempts),
            ("user_interface", self.user_interface.timeout_secs, self.user_interface.max_attempts),
        ] {
            if timeout == 0 {
                return Err(ValidationError::InvalidField {
                    field,
                    reason: "timeout_secs must be at least 1".to_string(),
                });
            }
            if attempts == 0 {
                return Err(ValidationError::InvalidField {
                    field,
                    reason: "max_attempts must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            mode: self.simulation.mode,
            interval_secs: self.simulation.interval_secs,
            patient_id: self.simulation.patient_id.clone(),
            device_id: self.simulation.device_id.clone(),
            quality_indicators: self.simulation.quality_indicators,
        }
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            retry_delay: Duration::from_secs(self.delivery.retry_delay_secs),
            retry_on_status: self.delivery.retry_on_status,
        }
    }

    /// Destinations in delivery order: rule engine first, then the UI.
    pub fn destinations(&self) -> Vec<Destination> {
        let rules = &self.rule_engine;
        let ui = &self.user_interface;
        vec![
            Destination::new(DestinationKind::RuleEngine, rules.url())
                .with_timeout(rules.timeout_secs)
                .with_max_attempts(rules.max_attempts)
                .with_enabled(rules.enabled),
            Destination::new(DestinationKind::UserInterface, ui.url.clone())
                .with_timeout(ui.timeout_secs)
                .with_max_attempts(ui.max_attempts)
                .with_enabled(ui.enabled),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.url(), "http://localhost:8000");
        assert_eq!(config.rule_engine.url(), "http://localhost:3000/api/vitals/stream");
        assert_eq!(config.delivery_policy().retry_delay, Duration::from_secs(2));

        let destinations = config.destinations();
        assert_eq!(destinations[0].timeout_secs, 5);
        assert_eq!(destinations[1].timeout_secs, 3);
        assert_eq!(destinations[1].url, "http://localhost:3001/api/vitals/update");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SimulatorConfig = serde_json::from_str(
            r#"{
                "simulation": {"mode": "emergency", "interval_secs": 2},
                "user_interface": {"enabled": false}
            }"#,
        )
        .unwrap();

        assert_eq!(config.simulation.mode, ConditionMode::Emergency);
        assert_eq!(config.simulation.interval_secs, 2);
        assert_eq!(config.simulation.patient_id, "patient_001");
        assert!(!config.user_interface.enabled);
        assert_eq!(config.user_interface.timeout_secs, 3);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = SimulatorConfig::default();
        config.simulation.interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::IntervalTooShort { got: 0, .. })
        ));

        let mut config = SimulatorConfig::default();
        config.user_interface.url = "ws://localhost:3001/vitals".to_string();
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.rule_engine.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("vitals-config-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 9100}}, "delivery": {{"retry_on_status": true}}}}"#
        )
        .unwrap();
        drop(file);

        let config = SimulatorConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 9100);
        assert!(config.delivery_policy().retry_on_status);
    }

    #[test]
    fn test_load_reports_missing_and_malformed_files() {
        let missing = SimulatorConfig::load("/nonexistent/vitals.json").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let path = std::env::temp_dir().join(format!("vitals-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let malformed = SimulatorConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(malformed, ConfigError::Parse { .. }));
    }
}
