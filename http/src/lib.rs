//! HTTP surface: REST snapshots, the WebSocket push channel and the Prometheus
//! exporter, all reading from the collectors' [`mcc_collectors::Hub`].

#[macro_use]
extern crate tracing;

pub mod error;
mod metrics;
pub mod router;
mod ws;

pub use metrics::Gauges;
pub use router::{
    create_router,
    AppState,
};
