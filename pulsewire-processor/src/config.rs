//! Processor configuration: TOML file < environment < CLI flags.
//!
//! Every field here corresponds 1:1 to an entry in the protocol's
//! "Configuration surface" table. Parsing is deliberately hand-rolled for
//! CLI flags (no argument-parsing crate) and `serde` + `toml` for the file
//! layer, matching the minimal-dependency posture of the rest of the
//! workspace.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub input_port: u16,
    pub beats_port: u16,
    pub sample_rate_hz: u32,
    pub bundle_size: usize,

    pub moving_avg_samples: usize,
    pub threshold_fraction: f32,
    pub min_signal_range: i32,
    pub refractory_ms: i64,
    pub min_ibi_ms: i64,
    pub max_ibi_ms: i64,
    pub flat_threshold: i32,
    pub flat_samples: u32,
    pub decay_rate: f32,
    pub decay_interval_samples: u32,

    pub stale_timeout_ms: i64,

    pub predictor_enabled: bool,
    pub predictor_confidence_threshold: f32,

    pub log_level: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            input_port: pulsewire_wire::DEFAULT_INPUT_PORT,
            beats_port: pulsewire_wire::DEFAULT_BEATS_PORT,
            sample_rate_hz: pulsewire_wire::SAMPLE_RATE_HZ,
            bundle_size: pulsewire_wire::DEFAULT_BUNDLE_SIZE,

            moving_avg_samples: 5,
            threshold_fraction: 0.6,
            min_signal_range: 50,
            refractory_ms: 300,
            min_ibi_ms: 300,
            max_ibi_ms: 3000,
            flat_threshold: 5,
            flat_samples: 50,
            decay_rate: 0.1,
            decay_interval_samples: 150,

            stale_timeout_ms: 2000,

            predictor_enabled: true,
            predictor_confidence_threshold: 0.5,

            log_level: "info".to_string(),
        }
    }
}

impl ProcessorConfig {
    /// Load the file layer (if present), apply `PULSEWIRE_<FIELD>` env
    /// overrides, then apply parsed CLI flags. Returns the merged config
    /// and any leftover args the caller didn't recognize as a positional
    /// (there are none today, but this keeps the door open).
    pub fn load(args: &[String]) -> Result<Self, ConfigError> {
        let config_path = cli_flag_value(args, "--config")
            .or_else(|| std::env::var("PULSEWIRE_CONFIG").ok())
            .unwrap_or_else(|| "pulsewire.toml".to_string());

        let mut config = Self::from_file(&config_path)?;
        config.apply_env();
        config.apply_cli(args)?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config: ProcessorConfig = toml::from_str(&text)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        macro_rules! env_override {
            ($field:ident, $name:literal) => {
                if let Ok(v) = std::env::var(concat!("PULSEWIRE_", $name)) {
                    if let Ok(parsed) = v.parse() {
                        self.$field = parsed;
                    }
                }
            };
        }
        env_override!(input_port, "INPUT_PORT");
        env_override!(beats_port, "BEATS_PORT");
        env_override!(stale_timeout_ms, "STALE_TIMEOUT_MS");
        env_override!(predictor_enabled, "PREDICTOR_ENABLED");
        if let Ok(v) = std::env::var("PULSEWIRE_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    fn apply_cli(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(v) = cli_flag_value(args, "--input-port") {
            self.input_port = v.parse().map_err(|_| ConfigError::InvalidField {
                field: "input_port",
                message: v,
            })?;
        }
        if let Some(v) = cli_flag_value(args, "--beats-port") {
            self.beats_port = v.parse().map_err(|_| ConfigError::InvalidField {
                field: "beats_port",
                message: v,
            })?;
        }
        if let Some(v) = cli_flag_value(args, "--stale-timeout-ms") {
            self.stale_timeout_ms = v.parse().map_err(|_| ConfigError::InvalidField {
                field: "stale_timeout_ms",
                message: v,
            })?;
        }
        if cli_has_flag(args, "--no-predictor") {
            self.predictor_enabled = false;
        }
        if let Some(v) = cli_flag_value(args, "--log-level") {
            self.log_level = v;
        }
        Ok(())
    }
}

/// Finds `--flag value` or `--flag=value` in an argument list.
fn cli_flag_value(args: &[String], flag: &str) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&format!("{flag}=")) {
            return Some(v.to_string());
        }
        if arg == flag {
            return args.get(i + 1).cloned();
        }
    }
    None
}

fn cli_has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_table() {
        let config = ProcessorConfig::default();
        assert_eq!(config.input_port, 8000);
        assert_eq!(config.beats_port, 8001);
        assert_eq!(config.refractory_ms, 300);
        assert!(config.predictor_enabled);
    }

    #[test]
    fn cli_flag_value_reads_space_and_equals_forms() {
        let args = vec!["--input-port".to_string(), "9000".to_string()];
        assert_eq!(cli_flag_value(&args, "--input-port"), Some("9000".to_string()));

        let args = vec!["--input-port=9001".to_string()];
        assert_eq!(cli_flag_value(&args, "--input-port"), Some("9001".to_string()));
    }

    #[test]
    fn no_predictor_flag_disables_predictor() {
        let mut config = ProcessorConfig::default();
        config.apply_cli(&["--no-predictor".to_string()]).unwrap();
        assert!(!config.predictor_enabled);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ProcessorConfig::from_file("/nonexistent/pulsewire.toml").unwrap();
        assert_eq!(config.input_port, ProcessorConfig::default().input_port);
    }
}
