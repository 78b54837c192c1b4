//! Configuration loading and typed config structures for the Lifegrid simulation.
//!
//! The canonical configuration lives in `lifegrid-config.yaml` at the
//! working directory. Every key is optional; missing sections fall back to
//! a 20x20 grid ticking every 500 ms for 30 seconds.

use std::path::Path;
use std::time::Duration;

use lifegrid_types::GridDims;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `lifegrid-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Grid dimensions.
    #[serde(default)]
    pub grid: GridConfig,

    /// Director tick interval and run duration.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Mailbox capacities.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Visualization server address.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Seed for the initial pattern. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `OBSERVER_PORT` overrides `observer.port`
    /// - `LIFEGRID_SEED` overrides `seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides and validating the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override values from an arbitrary key lookup.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("OBSERVER_PORT") {
            match val.parse() {
                Ok(port) => self.observer.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "ignoring OBSERVER_PORT"),
            }
        }
        if let Some(val) = lookup("LIFEGRID_SEED") {
            match val.parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(e) => tracing::warn!(value = %val, error = %e, "ignoring LIFEGRID_SEED"),
            }
        }
    }

    /// Check that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };
        if self.grid.width == 0 || self.grid.height == 0 {
            return invalid("grid width and height must be at least 1");
        }
        if self.timing.tick_interval_ms == 0 {
            return invalid("timing.tick_interval_ms must be at least 1");
        }
        if self.broker.inbox_capacity == 0 || self.broker.feed_capacity == 0 {
            return invalid("broker capacities must be at least 1");
        }
        Ok(())
    }
}

/// Grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GridConfig {
    /// Number of columns.
    #[serde(default = "default_grid_side")]
    pub width: u32,

    /// Number of rows.
    #[serde(default = "default_grid_side")]
    pub height: u32,
}

impl GridConfig {
    /// The configured dimensions as [`GridDims`].
    pub const fn dims(self) -> GridDims {
        GridDims::new(self.width, self.height)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: default_grid_side(),
            height: default_grid_side(),
        }
    }
}

/// Director timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Real-time milliseconds between director ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Seconds the director ticks before publishing the end sentinel.
    #[serde(default = "default_run_duration_secs")]
    pub run_duration_secs: u64,
}

impl TimingConfig {
    /// The tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The run duration as a [`Duration`].
    pub const fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_duration_secs)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            run_duration_secs: default_run_duration_secs(),
        }
    }
}

/// Mailbox capacities.
///
/// One tick delivers at most eight neighbor notifications and one phase
/// signal to a cell, so the default inbox leaves ample headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Capacity of each cell's inbox.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Capacity of the visualization bridge's inbox and of each viewer's
    /// feed. A viewer more than this many payloads behind is disconnected.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: default_inbox_capacity(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

/// Visualization server address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Host address to bind.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_grid_side() -> u32 {
    20
}

const fn default_tick_interval_ms() -> u64 {
    500
}

const fn default_run_duration_secs() -> u64 {
    30
}

const fn default_inbox_capacity() -> usize {
    64
}

const fn default_feed_capacity() -> usize {
    4096
}

fn default_observer_host() -> String {
    String::from("0.0.0.0")
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.dims(), GridDims::new(20, 20));
        assert_eq!(config.timing.tick_interval(), Duration::from_millis(500));
        assert_eq!(config.timing.run_duration(), Duration::from_secs(30));
        assert_eq!(config.broker.inbox_capacity, 64);
        assert_eq!(config.observer.port, 8080);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
grid:
  width: 8
  height: 6
timing:
  tick_interval_ms: 100
  run_duration_secs: 5
broker:
  inbox_capacity: 32
  feed_capacity: 512
observer:
  host: "127.0.0.1"
  port: 9090
seed: 42
logging:
  level: "debug"
"#;
        let mut config: SimulationConfig = serde_yml::from_str(yaml).unwrap();
        config.apply_overrides(|_| None);
        assert!(config.validate().is_ok());

        assert_eq!(config.grid.dims(), GridDims::new(8, 6));
        assert_eq!(config.timing.tick_interval_ms, 100);
        assert_eq!(config.timing.run_duration_secs, 5);
        assert_eq!(config.broker.feed_capacity, 512);
        assert_eq!(config.observer.host, "127.0.0.1");
        assert_eq!(config.observer.port, 9090);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "grid:\n  width: 5\n";
        let config: SimulationConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.grid.width, 5);
        assert_eq!(config.grid.height, 20);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn zero_width_is_rejected() {
        let yaml = "grid:\n  width: 0\n";
        let config: SimulationConfig = serde_yml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config = SimulationConfig {
            timing: TimingConfig {
                tick_interval_ms: 0,
                run_duration_secs: 1,
            },
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = SimulationConfig {
            broker: BrokerConfig {
                inbox_capacity: 0,
                feed_capacity: 1,
            },
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_replace_port_and_seed() {
        let mut config = SimulationConfig::default();
        config.apply_overrides(|key| match key {
            "OBSERVER_PORT" => Some(String::from("9191")),
            "LIFEGRID_SEED" => Some(String::from("7")),
            _ => None,
        });
        assert_eq!(config.observer.port, 9191);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn unparseable_override_is_ignored() {
        let mut config = SimulationConfig::default();
        config.apply_overrides(|key| (key == "OBSERVER_PORT").then(|| String::from("http")));
        assert_eq!(config.observer.port, 8080);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("lifegrid-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
