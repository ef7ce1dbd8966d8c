//! Typed endpoint calls layered on [`crate::ServiceClient::request`].

mod arr;
mod plex;
mod sabnzbd;
mod tdarr;
mod unpackerr;

pub use unpackerr::{
    parse_prometheus,
    MetricSample,
    Metrics,
};
