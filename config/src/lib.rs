#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod domain;
mod duration;
mod service_config;

use app_config::AppConfig;
pub use app_config::get_config_dir;
pub use args::Args;
pub use domain::{
    Domain,
    Intervals,
};
use eyre::{
    eyre,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
pub use service_config::{
    ClientDefaults,
    ServiceConfig,
    ServiceName,
    ServiceSettings,
    Services,
};
use std::net::SocketAddr;
use strum::IntoEnumIterator as _;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    app_config: AppConfig,
    pub server: ServerConfig,
    pub client: ClientDefaults,
    pub intervals: Intervals,
    #[serde(default)]
    pub services: Services,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    /// Layers, lowest priority first: built-in defaults, `config.yaml` in the
    /// config dir, the `--config` file, `MCC_*` environment variables, CLI flags.
    pub fn new(args: &Args) -> Result<Self, config::ConfigError> {
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        builder = builder.add_source(
            config::File::from(config_dir.join("config.yaml"))
                .format(config::FileFormat::Yaml)
                .required(false),
        );

        if let Some(path) = &args.config {
            debug!(?path, "Layering config file from args");
            builder = builder.add_source(config::File::from(path.as_path()).format(config::FileFormat::Yaml));
        }

        builder = builder
            .add_source(
                config::Environment::with_prefix("MCC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .add_source(args.clone());

        builder.build()?.try_deserialize()
    }

    /// Rejects values that would make a client or a collection loop misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.client.max_attempts == 0 {
            return Err(eyre!("client.max_attempts must be at least 1"));
        }
        for name in ServiceName::iter() {
            if self.services.get(name).max_attempts == Some(0) {
                return Err(eyre!("services.{name}.max_attempts must be at least 1"));
            }
        }
        for domain in Domain::iter() {
            if self.intervals.get(domain).is_zero() {
                return Err(eyre!("intervals.{domain} must be greater than zero"));
            }
        }
        Ok(())
    }

    /// Services with enough configuration to build a client, in a stable order.
    pub fn configured_services(&self) -> Vec<ServiceSettings> {
        ServiceName::iter()
            .filter_map(|name| self.services.get(name).resolve(name, &self.client))
            .collect()
    }

    pub fn config_dir(&self) -> &std::path::Path {
        &self.app_config.config_dir
    }
}
