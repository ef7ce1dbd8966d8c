use serde::{
    de::Error as _,
    Deserialize,
    Deserializer,
    Serialize,
};
use std::time::Duration;
use strum::{
    Display,
    EnumIter,
    EnumString,
};
use url::Url;

/// Every remote service the dashboard knows how to talk to.
#[derive(
    Debug, Clone, Copy, Display, EnumIter, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceName {
    Sonarr,
    Radarr,
    Prowlarr,
    Bazarr,
    Overseerr,
    Plex,
    Tdarr,
    Sabnzbd,
    Unpackerr,
}

impl ServiceName {
    /// Tdarr's key is optional and Unpackerr has no auth at all.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, ServiceName::Tdarr | ServiceName::Unpackerr)
    }
}

/// Raw per-service section as it appears in the configuration sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    #[serde(deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(deserialize_with = "non_empty", skip_serializing)]
    pub api_key: Option<String>,
    #[serde(with = "crate::duration::option", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(with = "crate::duration::option", skip_serializing_if = "Option::is_none")]
    pub retry_base_delay: Option<Duration>,
}

/// One section per [`ServiceName`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Services {
    pub sonarr: ServiceConfig,
    pub radarr: ServiceConfig,
    pub prowlarr: ServiceConfig,
    pub bazarr: ServiceConfig,
    pub overseerr: ServiceConfig,
    pub plex: ServiceConfig,
    pub tdarr: ServiceConfig,
    pub sabnzbd: ServiceConfig,
    pub unpackerr: ServiceConfig,
}

impl Services {
    pub fn get(&self, name: ServiceName) -> &ServiceConfig {
        match name {
            ServiceName::Sonarr => &self.sonarr,
            ServiceName::Radarr => &self.radarr,
            ServiceName::Prowlarr => &self.prowlarr,
            ServiceName::Bazarr => &self.bazarr,
            ServiceName::Overseerr => &self.overseerr,
            ServiceName::Plex => &self.plex,
            ServiceName::Tdarr => &self.tdarr,
            ServiceName::Sabnzbd => &self.sabnzbd,
            ServiceName::Unpackerr => &self.unpackerr,
        }
    }

    pub fn get_mut(&mut self, name: ServiceName) -> &mut ServiceConfig {
        match name {
            ServiceName::Sonarr => &mut self.sonarr,
            ServiceName::Radarr => &mut self.radarr,
            ServiceName::Prowlarr => &mut self.prowlarr,
            ServiceName::Bazarr => &mut self.bazarr,
            ServiceName::Overseerr => &mut self.overseerr,
            ServiceName::Plex => &mut self.plex,
            ServiceName::Tdarr => &mut self.tdarr,
            ServiceName::Sabnzbd => &mut self.sabnzbd,
            ServiceName::Unpackerr => &mut self.unpackerr,
        }
    }
}

/// Client defaults applied to every service that does not override them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientDefaults {
    #[serde(with = "crate::duration")]
    pub timeout: Duration,
    pub max_attempts: u32,
    #[serde(with = "crate::duration")]
    pub retry_base_delay: Duration,
}

/// A service with enough configuration to build a client for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub name: ServiceName,
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl ServiceConfig {
    pub fn is_configured(&self, name: ServiceName) -> bool {
        self.url.is_some() && (!name.requires_api_key() || self.api_key.is_some())
    }

    pub fn resolve(&self, name: ServiceName, defaults: &ClientDefaults) -> Option<ServiceSettings> {
        if !self.is_configured(name) {
            return None;
        }
        Some(ServiceSettings {
            name,
            base_url: self.url.clone()?,
            api_key: self.api_key.clone(),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_base_delay: self.retry_base_delay.unwrap_or(defaults.retry_base_delay),
        })
    }
}

/// Environment variables cannot be unset inside a layered config, so an empty
/// string means "not configured".
fn non_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}
