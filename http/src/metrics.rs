//! Prometheus gauges derived from the cached snapshots.
//!
//! Values are recomputed from the hub on every scrape, so the exporter holds no
//! state of its own beyond the registry.

use mcc_collectors::{
    DownloadsPayload,
    HealthPayload,
    Hub,
    ServiceStatus,
    StreamingPayload,
    TranscodingPayload,
};
use mcc_config::Domain;
use prometheus::{
    Encoder as _,
    Gauge,
    GaugeVec,
    IntGauge,
    Opts,
    Registry,
    TextEncoder,
};
use serde::de::DeserializeOwned;

pub struct Gauges {
    registry: Registry,
    service_up: GaugeVec,
    service_latency: GaugeVec,
    downloads_active: IntGauge,
    streams_active: IntGauge,
    transcodes_active: IntGauge,
    tdarr_queue_size: IntGauge,
    tdarr_space_saved: Gauge,
}

impl std::fmt::Debug for Gauges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauges").finish_non_exhaustive()
    }
}

impl Gauges {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let service_up = GaugeVec::new(
            Opts::new("mcc_service_up", "Whether the service answered its last health check (1 up, 0 down)"),
            &["service"],
        )?;
        let service_latency = GaugeVec::new(
            Opts::new("mcc_service_latency_seconds", "Response time of the last health check"),
            &["service"],
        )?;
        let downloads_active = IntGauge::new("mcc_downloads_active", "Items in the download and import queues")?;
        let streams_active = IntGauge::new("mcc_plex_streams_active", "Active Plex sessions")?;
        let transcodes_active = IntGauge::new("mcc_plex_transcode_active", "Plex sessions being transcoded")?;
        let tdarr_queue_size = IntGauge::new("mcc_tdarr_queue_size", "Files staged in Tdarr")?;
        let tdarr_space_saved = Gauge::new("mcc_tdarr_space_saved_bytes", "Library size change reported by Tdarr")?;

        registry.register(Box::new(service_up.clone()))?;
        registry.register(Box::new(service_latency.clone()))?;
        registry.register(Box::new(downloads_active.clone()))?;
        registry.register(Box::new(streams_active.clone()))?;
        registry.register(Box::new(transcodes_active.clone()))?;
        registry.register(Box::new(tdarr_queue_size.clone()))?;
        registry.register(Box::new(tdarr_space_saved.clone()))?;

        Ok(Self {
            registry,
            service_up,
            service_latency,
            downloads_active,
            streams_active,
            transcodes_active,
            tdarr_queue_size,
            tdarr_space_saved,
        })
    }

    /// Sets every gauge from the hub's current snapshots. Domains without a
    /// snapshot leave their gauges untouched.
    pub fn refresh(&self, hub: &Hub) {
        if let Some(health) = payload::<HealthPayload>(hub, Domain::Health) {
            self.service_up.reset();
            self.service_latency.reset();
            for service in &health.services {
                let name = service.name.to_string();
                let up = if service.status == ServiceStatus::Online { 1.0 } else { 0.0 };
                self.service_up.with_label_values(&[name.as_str()]).set(up);
                self.service_latency
                    .with_label_values(&[name.as_str()])
                    .set(service.response_ms as f64 / 1000.0);
            }
        }
        if let Some(downloads) = payload::<DownloadsPayload>(hub, Domain::Downloads) {
            self.downloads_active.set(downloads.active() as i64);
        }
        if let Some(streaming) = payload::<StreamingPayload>(hub, Domain::Streaming) {
            self.streams_active.set(streaming.stream_count as i64);
            self.transcodes_active.set(streaming.transcode_count as i64);
        }
        if let Some(transcoding) = payload::<TranscodingPayload>(hub, Domain::Transcoding) {
            self.tdarr_queue_size.set(transcoding.queue_size as i64);
            self.tdarr_space_saved
                .set(transcoding.size_diff_bytes.as_f64().unwrap_or_default());
        }
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn payload<T: DeserializeOwned>(hub: &Hub, domain: Domain) -> Option<T> {
    let envelope = hub.snapshot(domain)?;
    match serde_json::from_value(envelope.payload.clone()) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(%domain, "Snapshot does not match the expected payload: {err}");
            None
        }
    }
}
