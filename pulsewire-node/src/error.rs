use thiserror::Error;

/// Fatal startup conditions for the sensor node. Wi-Fi loss and main-loop
/// stall are handled internally (reconnect loop, watchdog reset) and
/// never surface here.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to bind egress socket on {addr}: {source}")]
    EgressBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind admin socket on {addr}: {source}")]
    AdminBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect egress socket to {addr}: {source}")]
    EgressConnect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
