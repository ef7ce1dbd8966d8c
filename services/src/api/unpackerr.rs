use crate::{
    ClientError,
    ServiceClient,
};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

lazy_static::lazy_static! {
    static ref METRIC_LINE: Regex =
        Regex::new(r"^(?P<name>[a-zA-Z_:][a-zA-Z0-9_:]*)(?:\{(?P<labels>[^}]*)\})?\s+(?P<value>\S+)$").unwrap();
    static ref LABEL_PAIR: Regex = Regex::new(r#"(\w+)="([^"]*)""#).unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

pub type Metrics = BTreeMap<String, Vec<MetricSample>>;

/// Parses Prometheus exposition text. Comments, blank lines and lines that do
/// not look like `name{labels} value` are skipped.
pub fn parse_prometheus(text: &str) -> Metrics {
    let mut metrics = Metrics::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(captures) = METRIC_LINE.captures(line) else {
            continue;
        };
        let Ok(value) = captures["value"].parse::<f64>() else {
            continue;
        };
        let labels = captures
            .name("labels")
            .map(|labels| {
                LABEL_PAIR
                    .captures_iter(labels.as_str())
                    .map(|pair| (pair[1].to_string(), pair[2].to_string()))
                    .collect()
            })
            .unwrap_or_default();
        metrics
            .entry(captures["name"].to_string())
            .or_default()
            .push(MetricSample { labels, value });
    }
    metrics
}

/// Unpackerr only speaks plain-text Prometheus.
impl ServiceClient {
    pub async fn unpackerr_metrics(&self) -> Result<Metrics, ClientError> {
        let text = self.get_text("metrics").await?;
        Ok(parse_prometheus(&text))
    }
}
