//! Polling and broadcast kernel.
//!
//! One [`Supervisor`] per [`Domain`] runs that domain's [`Collector`] on its
//! own interval. Collectors read from the shared [`ServiceClients`] and publish
//! a payload to the [`Hub`], which caches it and pushes it to subscribers.

#[macro_use]
extern crate tracing;

mod calendar;
mod downloads;
mod health;
mod hub;
mod json;
mod streaming;
mod supervisor;
mod transcoding;

pub use calendar::{
    CalendarCollector,
    CalendarPayload,
    Episode,
    Movie,
};
pub use downloads::{
    DownloadsCollector,
    DownloadsPayload,
    QueueRecord,
    SabnzbdItem,
    SabnzbdQueue,
};
pub use health::{
    HealthCollector,
    HealthPayload,
    ServiceHealth,
    ServiceStatus,
};
pub use hub::{
    Envelope,
    Hub,
    Subscriber,
    SubscriberId,
};
pub use streaming::{
    Session,
    StreamingCollector,
    StreamingPayload,
};
pub use supervisor::{
    collector_fn,
    run_cycle,
    Collector,
    CycleOutcome,
    FnCollector,
    Supervisor,
    SupervisorState,
};
pub use transcoding::{
    Node,
    TranscodingCollector,
    TranscodingPayload,
};

use mcc_config::{
    Domain,
    Intervals,
};
use mcc_services::ServiceClients;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a domain reports before anything has been collected.
pub fn empty_payload(domain: Domain) -> Value {
    let payload = match domain {
        Domain::Health => serde_json::to_value(HealthPayload::default()),
        Domain::Downloads => serde_json::to_value(DownloadsPayload::default()),
        Domain::Streaming => serde_json::to_value(StreamingPayload::default()),
        Domain::Transcoding => serde_json::to_value(TranscodingPayload::default()),
        Domain::Calendar => serde_json::to_value(CalendarPayload::default()),
    };
    payload.unwrap_or(Value::Null)
}

/// Starts one supervisor per domain.
pub fn spawn_supervisors(
    hub: &Hub,
    clients: &ServiceClients,
    intervals: &Intervals,
    cancel: &CancellationToken,
) -> Vec<Supervisor> {
    let supervisors = vec![
        Supervisor::spawn(
            HealthCollector::new(hub.clone(), clients.clone()),
            intervals.health,
            cancel,
        ),
        Supervisor::spawn(
            DownloadsCollector::new(hub.clone(), clients.clone()),
            intervals.downloads,
            cancel,
        ),
        Supervisor::spawn(
            StreamingCollector::new(hub.clone(), clients.clone()),
            intervals.streaming,
            cancel,
        ),
        Supervisor::spawn(
            TranscodingCollector::new(hub.clone(), clients.clone()),
            intervals.transcoding,
            cancel,
        ),
        Supervisor::spawn(
            CalendarCollector::new(hub.clone(), clients.clone()),
            intervals.calendar,
            cancel,
        ),
    ];
    info!(count = supervisors.len(), "Collectors started");
    supervisors
}

/// Stops every supervisor and waits for all loops to finish.
pub async fn stop_supervisors(supervisors: Vec<Supervisor>) {
    futures::future::join_all(supervisors.into_iter().map(Supervisor::stop)).await;
    info!("Collectors stopped");
}

/// Runs a single cycle of every collector and returns the resulting envelopes.
pub async fn collect_once(hub: &Hub, clients: &ServiceClients) -> Vec<Arc<Envelope>> {
    let cancel = CancellationToken::new();
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(HealthCollector::new(hub.clone(), clients.clone())),
        Box::new(DownloadsCollector::new(hub.clone(), clients.clone())),
        Box::new(StreamingCollector::new(hub.clone(), clients.clone())),
        Box::new(TranscodingCollector::new(hub.clone(), clients.clone())),
        Box::new(CalendarCollector::new(hub.clone(), clients.clone())),
    ];
    let outcomes = futures::future::join_all(collectors.iter().map(|c| run_cycle(&**c, &cancel))).await;
    for (collector, outcome) in collectors.iter().zip(outcomes) {
        if let CycleOutcome::Failed(err) = outcome {
            error!(domain = %collector.domain(), "Collection failed: {err:?}");
        }
    }
    hub.snapshots()
}
