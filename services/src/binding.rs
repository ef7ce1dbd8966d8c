//! Per-service URL and credential shaping.
//!
//! Every service hangs its API off a different path and expects the key in a
//! different place. A [`Binding`] captures that once at startup so the client
//! itself stays generic.

use mcc_config::{
    ServiceName,
    ServiceSettings,
};
use reqwest::{
    header::ACCEPT,
    RequestBuilder,
};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Path {
    /// Endpoint is appended below the prefix.
    Prefix(&'static str),
    /// Every endpoint resolves to the same path; the operation travels in the query.
    Fixed(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credential {
    None,
    Header(&'static str),
    HeaderAndQuery(&'static str),
    Query(&'static str),
}

/// How to reach a service's lightweight status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCall {
    Json {
        endpoint: &'static str,
        query: &'static [(&'static str, &'static str)],
    },
    Text {
        endpoint: &'static str,
    },
}

#[derive(Clone)]
pub struct Binding {
    service: ServiceName,
    base_url: String,
    api_key: Option<String>,
    path: Path,
    credential: Credential,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl Binding {
    pub fn new(service: ServiceName, base_url: &Url, api_key: Option<String>) -> Self {
        let (path, credential) = match service {
            ServiceName::Sonarr | ServiceName::Radarr => (Path::Prefix("/api/v3/"), Credential::Header("X-Api-Key")),
            ServiceName::Prowlarr | ServiceName::Overseerr => {
                (Path::Prefix("/api/v1/"), Credential::Header("X-Api-Key"))
            }
            ServiceName::Bazarr => (Path::Prefix("/api/"), Credential::Header("X-API-KEY")),
            ServiceName::Plex => (Path::Prefix("/"), Credential::HeaderAndQuery("X-Plex-Token")),
            ServiceName::Tdarr => (Path::Prefix("/api/v2/"), Credential::Header("x-api-key")),
            ServiceName::Sabnzbd => (Path::Fixed("/api"), Credential::Query("apikey")),
            ServiceName::Unpackerr => (Path::Prefix("/"), Credential::None),
        };
        Self {
            service,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key,
            path,
            credential,
        }
    }

    pub fn from_settings(settings: &ServiceSettings) -> Self {
        Self::new(settings.name, &settings.base_url, settings.api_key.clone())
    }

    pub fn service(&self) -> ServiceName {
        self.service
    }

    pub fn url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        match self.path {
            Path::Prefix(prefix) => format!("{}{prefix}{}", self.base_url, endpoint.trim_start_matches('/')).parse(),
            Path::Fixed(path) => format!("{}{path}", self.base_url).parse(),
        }
    }

    /// Adds the `Accept` header, the credential and any fixed query parameters.
    pub fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        request = request.header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = match self.credential {
                Credential::None => request,
                Credential::Header(name) => request.header(name, key),
                Credential::HeaderAndQuery(name) => request.header(name, key).query(&[(name, key)]),
                Credential::Query(name) => request.query(&[(name, key)]),
            };
        }
        if self.service == ServiceName::Sabnzbd {
            request = request.query(&[("output", "json")]);
        }
        request
    }

    pub fn status_call(&self) -> StatusCall {
        match self.service {
            ServiceName::Overseerr | ServiceName::Tdarr => StatusCall::Json {
                endpoint: "status",
                query: &[],
            },
            ServiceName::Plex => StatusCall::Json {
                endpoint: "identity",
                query: &[],
            },
            // fullstatus is gone in SABnzbd 4.x
            ServiceName::Sabnzbd => StatusCall::Json {
                endpoint: "",
                query: &[("mode", "version")],
            },
            ServiceName::Unpackerr => StatusCall::Text { endpoint: "metrics" },
            ServiceName::Sonarr | ServiceName::Radarr | ServiceName::Prowlarr | ServiceName::Bazarr => {
                StatusCall::Json {
                    endpoint: "system/status",
                    query: &[],
                }
            }
        }
    }
}
