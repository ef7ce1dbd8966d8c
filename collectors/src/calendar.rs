use crate::{
    json::{
        flag,
        items,
        number,
        text,
    },
    Collector,
    Hub,
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use eyre::Result;
use mcc_config::{
    Domain,
    ServiceName,
};
use mcc_services::ServiceClients;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Number,
    Value,
};
use std::{
    future::Future,
    pin::Pin,
};

const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub series: String,
    pub title: String,
    pub air_date: String,
    pub season: Number,
    pub episode: Number,
    pub has_file: bool,
}

impl Episode {
    fn from_sonarr(entry: &Value) -> Self {
        let series = match entry.get("series") {
            Some(series @ Value::Object(_)) => text(&series["title"]),
            _ => text(&entry["seriesTitle"]),
        };
        Self {
            series,
            title: text(&entry["title"]),
            air_date: first_text(entry, &["airDateUtc", "airDate"]),
            season: number(&entry["seasonNumber"]),
            episode: number(&entry["episodeNumber"]),
            has_file: flag(&entry["hasFile"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub title: String,
    pub release_date: String,
    pub has_file: bool,
}

impl Movie {
    fn from_radarr(entry: &Value) -> Self {
        Self {
            title: text(&entry["title"]),
            release_date: first_text(entry, &["digitalRelease", "physicalRelease", "inCinemas"]),
            has_file: flag(&entry["hasFile"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarPayload {
    pub episodes: Vec<Episode>,
    pub movies: Vec<Movie>,
}

fn first_text(entry: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| entry.get(*key).filter(|v| !v.is_null()))
        .map(text)
        .unwrap_or_default()
}

/// `YYYY-MM-DD` bounds of the window starting at `now`.
fn window(now: DateTime<Utc>) -> (String, String) {
    let end = now + TimeDelta::days(WINDOW_DAYS);
    (now.format("%Y-%m-%d").to_string(), end.format("%Y-%m-%d").to_string())
}

/// Upcoming Sonarr episodes and Radarr releases for the next week.
#[derive(Debug, Clone)]
pub struct CalendarCollector {
    hub: Hub,
    clients: ServiceClients,
}

impl CalendarCollector {
    pub fn new(hub: Hub, clients: ServiceClients) -> Self {
        Self { hub, clients }
    }

    pub async fn gather(&self) -> CalendarPayload {
        let (start, end) = window(Utc::now());
        let (episodes, movies) = tokio::join!(
            self.entries(ServiceName::Sonarr, &start, &end),
            self.entries(ServiceName::Radarr, &start, &end),
        );
        CalendarPayload {
            episodes: episodes.iter().map(Episode::from_sonarr).collect(),
            movies: movies.iter().map(Movie::from_radarr).collect(),
        }
    }

    async fn entries(&self, name: ServiceName, start: &str, end: &str) -> Vec<Value> {
        let Some(client) = self.clients.get(name) else {
            return Vec::new();
        };
        match client.calendar(start, end).await {
            Ok(response) => items(&response).cloned().collect(),
            Err(err) => {
                debug!(service = %name, "Failed to poll calendar: {err}");
                Vec::new()
            }
        }
    }
}

impl Collector for CalendarCollector {
    fn domain(&self) -> Domain {
        Domain::Calendar
    }

    fn collect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let payload = self.gather().await;
            self.hub.publish(Domain::Calendar, serde_json::to_value(payload)?).await;
            Ok(())
        })
    }
}
