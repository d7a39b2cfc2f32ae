use std::net::IpAddr;
use std::net::SocketAddr;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::ensure;
use anyhow::Context;
use config::FileFormat;
use lazy_static_include::*;
use serde_derive::Deserialize;
use tracing::debug;

use crate::dispatcher::SenderPolicy;

lazy_static_include_str! {
    DEFAULT_CONFIG => "src/config/default.toml",
}

/// Keys given as comma separated lists in the environment.
const LIST_KEYS: [&str; 1] = ["gateway.supported_senders"];

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub lookup: LookupConfig,
    pub prometheus: PrometheusConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.port != 0, "Server port is required");
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid server host `{}`", self.host))?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Contracts allowed to query the gateway. Empty accepts any sender.
    #[serde(default)]
    pub supported_senders: Vec<Address>,
}

impl GatewayConfig {
    pub fn sender_policy(&self) -> SenderPolicy {
        SenderPolicy::new(self.supported_senders.iter().copied())
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LookupConfig {
    /// Upper bound of a single upstream fetch.
    pub request_timeout_secs: u64,
}

impl LookupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.request_timeout_secs > 0,
            "Lookup request timeout must be positive"
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PrometheusConfig {
    pub port: u16,
}

impl Config {
    /// Layers the embedded defaults, the optional local file and the
    /// environment (`SECTION__KEY`), in that order.
    pub fn load(local_file: Option<String>) -> anyhow::Result<Config> {
        let mut config_builder = config::Config::builder();
        config_builder =
            config_builder.add_source(config::File::from_str(&DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(local_file) = local_file {
            debug!("Loading local configuration from {}", local_file);
            config_builder = config_builder.add_source(config::File::with_name(&local_file));
        }

        let mut environment = config::Environment::default()
            .separator("__")
            .list_separator(",")
            .ignore_empty(true);
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }

        config_builder
            .add_source(environment)
            .build()
            .context("Could not load configuration")?
            .try_deserialize()
            .context("Could not deserialize configuration")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.validate()?;
        self.lookup.validate()?;
        ensure!(self.prometheus.port != 0, "Prometheus port is required");
        ensure!(
            self.prometheus.port != self.server.port,
            "Prometheus and server ports must differ"
        );
        Ok(())
    }
}
