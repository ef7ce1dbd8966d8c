use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use strum::{
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
};

/// The fixed set of data domains published through the hub.
#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Domain {
    Health,
    Downloads,
    Streaming,
    Transcoding,
    Calendar,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Intervals {
    #[serde(with = "crate::duration")]
    pub health: Duration,
    #[serde(with = "crate::duration")]
    pub downloads: Duration,
    #[serde(with = "crate::duration")]
    pub streaming: Duration,
    #[serde(with = "crate::duration")]
    pub transcoding: Duration,
    #[serde(with = "crate::duration")]
    pub calendar: Duration,
}

impl Intervals {
    pub fn get(&self, domain: Domain) -> Duration {
        match domain {
            Domain::Health => self.health,
            Domain::Downloads => self.downloads,
            Domain::Streaming => self.streaming,
            Domain::Transcoding => self.transcoding,
            Domain::Calendar => self.calendar,
        }
    }
}
