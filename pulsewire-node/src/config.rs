//! Sensor-node configuration: TOML file < environment < CLI flags, same
//! layering as the processor's configuration surface.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::NodeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub sensor_id: u8,
    pub server_host: String,
    pub server_port: u16,
    pub admin_port: u16,
    pub sample_rate_hz: u32,
    pub bundle_size: usize,
    /// "synthetic" (deterministic sine, for demos and tests) or "stdin"
    /// (read one decimal ADC value per line). Real ADC bring-up is out
    /// of scope.
    pub sample_source: String,
    pub watchdog_timeout_ms: u64,
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sensor_id: 0,
            server_host: "127.0.0.1".to_string(),
            server_port: pulsewire_wire::DEFAULT_INPUT_PORT,
            admin_port: pulsewire_wire::DEFAULT_ADMIN_PORT,
            sample_rate_hz: pulsewire_wire::SAMPLE_RATE_HZ,
            bundle_size: pulsewire_wire::DEFAULT_BUNDLE_SIZE,
            sample_source: "synthetic".to_string(),
            watchdog_timeout_ms: 30_000,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn load(args: &[String]) -> Result<Self, NodeError> {
        let config_path = cli_flag_value(args, "--config")
            .or_else(|| std::env::var("PULSEWIRE_NODE_CONFIG").ok())
            .unwrap_or_else(|| "pulsewire-node.toml".to_string());

        let mut config = Self::from_file(&config_path)?;
        config.apply_env();
        config.apply_cli(args);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, NodeError> {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PULSEWIRE_NODE_SENSOR_ID") {
            if let Ok(v) = v.parse() {
                self.sensor_id = v;
            }
        }
        if let Ok(v) = std::env::var("PULSEWIRE_NODE_SERVER_HOST") {
            self.server_host = v;
        }
        if let Ok(v) = std::env::var("PULSEWIRE_NODE_SERVER_PORT") {
            if let Ok(v) = v.parse() {
                self.server_port = v;
            }
        }
    }

    fn apply_cli(&mut self, args: &[String]) {
        if let Some(v) = cli_flag_value(args, "--sensor-id") {
            if let Ok(v) = v.parse() {
                self.sensor_id = v;
            }
        }
        if let Some(v) = cli_flag_value(args, "--server") {
            if let Some((host, port)) = v.rsplit_once(':') {
                if let Ok(port) = port.parse() {
                    self.server_host = host.to_string();
                    self.server_port = port;
                }
            }
        }
        if let Some(v) = cli_flag_value(args, "--sample-source") {
            self.sample_source = v;
        }
        if let Some(v) = cli_flag_value(args, "--log-level") {
            self.log_level = v;
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_protocol_constants() {
        let config = NodeConfig::default();
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.admin_port, 8006);
        assert_eq!(config.bundle_size, 5);
    }

    #[test]
    fn cli_server_flag_splits_host_and_port() {
        let mut config = NodeConfig::default();
        config.apply_cli(&["--server".to_string(), "10.0.0.5:9000".to_string()]);
        assert_eq!(config.server_host, "10.0.0.5");
        assert_eq!(config.server_port, 9000);
    }
}
