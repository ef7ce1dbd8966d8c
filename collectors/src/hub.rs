//! Latest-value cache and fan-out point for every domain.
//!
//! The hub keeps exactly one [`Envelope`] per [`Domain`] and pushes each new
//! one to all registered subscribers. Delivery runs outside the lock on a copy
//! of the subscriber list; subscribers that fail are dropped afterwards.
//! Delivery never waits: a subscriber that cannot take a message right away
//! counts as dead.

use chrono::{
    DateTime,
    Utc,
};
use eyre::Result;
use mcc_config::Domain;
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};
use strum::IntoEnumIterator as _;
use tokio::sync::mpsc::{
    error::TrySendError,
    Sender,
};

/// Timestamped, domain-tagged payload. Serializes as `{type, timestamp, data}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub domain: Domain,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "data")]
    pub payload: Value,
}

impl Envelope {
    pub fn new(domain: Domain, payload: Value) -> Self {
        Self {
            domain,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receiver of serialized envelopes. Must not block; an error means the
/// subscriber is dead.
pub trait Subscriber: Send + Sync {
    fn deliver(&self, message: Arc<str>) -> Result<()>;
}

/// Hands the message to a bounded channel whose receiver does the actual I/O.
/// A full buffer means the receiver stopped draining.
impl Subscriber for Sender<Arc<str>> {
    fn deliver(&self, message: Arc<str>) -> Result<()> {
        self.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => eyre::eyre!("Subscriber buffer full"),
            TrySendError::Closed(_) => eyre::eyre!("Subscriber channel closed"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Arc<dyn Subscriber>)>,
    snapshots: HashMap<Domain, Arc<Envelope>>,
}

#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Hub")
            .field("subscribers", &inner.subscribers.len())
            .field("snapshots", &inner.snapshots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber to the live set. Each call yields a fresh id.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, subscriber));
        debug!(%id, total = inner.subscribers.len(), "Subscriber registered");
        id
    }

    /// Registers a subscriber and hands it every cached envelope, in domain
    /// order, while holding the lock. A concurrent publish is therefore seen
    /// either in the replay or as a later delivery, never before a stale one.
    pub fn register_with_replay(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;

        for domain in Domain::iter() {
            let Some(envelope) = inner.snapshots.get(&domain) else {
                continue;
            };
            let message = match envelope.to_json() {
                Ok(json) => json,
                Err(err) => {
                    error!(%id, %domain, "Failed to serialize snapshot: {err}");
                    continue;
                }
            };
            if let Err(err) = subscriber.deliver(message.into()) {
                warn!(%id, %domain, "Subscriber failed during replay: {err}");
                return id;
            }
        }

        inner.subscribers.push((id, subscriber));
        debug!(%id, total = inner.subscribers.len(), "Subscriber registered with replay");
        id
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(existing, _)| *existing != id);
        let removed = inner.subscribers.len() != before;
        if removed {
            debug!(%id, total = inner.subscribers.len(), "Subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    pub fn snapshot(&self, domain: Domain) -> Option<Arc<Envelope>> {
        self.inner.lock().unwrap().snapshots.get(&domain).cloned()
    }

    /// Every cached envelope, in domain order.
    pub fn snapshots(&self) -> Vec<Arc<Envelope>> {
        let inner = self.inner.lock().unwrap();
        Domain::iter()
            .filter_map(|domain| inner.snapshots.get(&domain).cloned())
            .collect()
    }

    /// Caches a new envelope for `domain` and pushes it to every subscriber
    /// registered at this moment. Never fails because of a subscriber.
    pub async fn publish(&self, domain: Domain, payload: Value) -> Arc<Envelope> {
        let envelope = Arc::new(Envelope::new(domain, payload));

        let targets = {
            let mut inner = self.inner.lock().unwrap();
            inner.snapshots.insert(domain, envelope.clone());
            inner.subscribers.clone()
        };

        if targets.is_empty() {
            return envelope;
        }

        let message: Arc<str> = match envelope.to_json() {
            Ok(json) => json.into(),
            Err(err) => {
                error!(%domain, "Failed to serialize envelope: {err}");
                return envelope;
            }
        };

        let dead = targets
            .iter()
            .filter_map(|(id, subscriber)| match subscriber.deliver(message.clone()) {
                Ok(()) => None,
                Err(err) => {
                    warn!(%id, %domain, "Dropping subscriber after failed delivery: {err}");
                    Some(*id)
                }
            })
            .collect::<Vec<_>>();

        if !dead.is_empty() {
            self.inner
                .lock()
                .unwrap()
                .subscribers
                .retain(|(id, _)| !dead.contains(id));
        }

        envelope
    }
}
