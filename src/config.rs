//! Connection settings for the feed manager API

use std::time::Duration;

use clap::Args;

/// Where and how to reach the API.
///
/// Every option can also be supplied through the environment (or a `.env`
/// file loaded by the binary).
#[derive(Args, Debug, Clone)]
pub struct TransportConfig {
    /// Base URL of the API server
    #[arg(long = "url", env = "FEEDMGR_URL")]
    pub url: String,

    /// API token sent as X-Auth-Token
    #[arg(long, env = "FEEDMGR_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Request timeout in seconds
    #[arg(long, env = "FEEDMGR_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates
    #[arg(long, env = "FEEDMGR_INSECURE", default_value = "false")]
    pub insecure: bool,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout_secs: 30,
            insecure: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
