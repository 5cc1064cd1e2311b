use thiserror::Error;

/// Fatal startup conditions. Everything else the processor encounters at
/// runtime (malformed packets, stale sensors, spurious beats, send
/// failures) is handled locally and never escapes as an error — only a
/// bind failure is worth a non-zero exit.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("failed to bind ingress socket on {addr}: {source}")]
    IngressBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind fan-out socket on {addr}: {source}")]
    FanoutBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load config from {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },
}

/// Errors loading and merging the TOML/env/CLI configuration layers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {message}")]
    InvalidField { field: &'static str, message: String },
}
