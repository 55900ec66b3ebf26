// Connected subscribers, their outbound queues, and what file versions each has been sent.

use crate::file_watcher::ObservedFile;
use crate::models::{Event, MonitoredFile, ProjectsSnapshot, ServiceStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type SubscriberId = u64;

/// Membership boundary taken when a cycle starts gathering. Fan-outs made with it skip
/// subscribers that joined afterwards; those get their on-join snapshots instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoff(SubscriberId);

/// Handle returned by `join`: the id to leave with and the stream of pushed events.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub events: mpsc::Receiver<Event>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber {0} is not registered")]
    UnknownSubscriber(SubscriberId),
    #[error("subscriber {0} queue is full; event dropped")]
    QueueFull(SubscriberId),
    #[error("subscriber {0} disconnected")]
    Disconnected(SubscriberId),
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
    pub disconnected: usize,
}

#[derive(Debug)]
struct Subscriber {
    tx: mpsc::Sender<Event>,
    /// Cleared until the on-join snapshots are queued; fan-outs skip the subscriber meanwhile.
    admitted: AtomicBool,
    /// path -> mtime of the content last delivered to this subscriber.
    seen: Mutex<HashMap<String, SystemTime>>,
}

pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,
    queue_capacity: usize,
}

impl SubscriptionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(2),
        }
    }

    /// Registers a subscriber that receives fan-outs right away.
    pub fn join(&self) -> Subscription {
        self.register(true)
    }

    /// Registers a subscriber that only receives single deliveries until `admit` is called.
    pub fn join_pending(&self) -> Subscription {
        self.register(false)
    }

    /// Makes a pending subscriber eligible for fan-outs. Returns false if it already left.
    pub fn admit(&self, id: SubscriberId) -> bool {
        match self.member(id) {
            Ok(subscriber) => {
                subscriber.admitted.store(true, Ordering::Release);
                true
            }
            Err(_) => false,
        }
    }

    /// Boundary for a fan-out covering everyone registered up to now.
    pub fn cutoff(&self) -> Cutoff {
        Cutoff(self.next_id.load(Ordering::Acquire))
    }

    fn register(&self, admitted: bool) -> Subscription {
        let (tx, events) = mpsc::channel(self.queue_capacity);
        let subscriber = Arc::new(Subscriber {
            tx,
            admitted: AtomicBool::new(admitted),
            seen: Mutex::new(HashMap::new()),
        });
        // Id allocation and insertion share the write lock: an id below a cutoff is always
        // in the map by the time the fan-out reads it.
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        subscribers.insert(id, subscriber);
        drop(subscribers);
        tracing::debug!(subscriber = id, admitted, "subscriber joined");
        Subscription { id, events }
    }

    /// Returns false if `id` was not registered (already left).
    pub fn leave(&self, id: SubscriberId) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            tracing::debug!(subscriber = id, "subscriber left");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `event` to every admitted subscriber that joined before `cutoff`.
    pub fn broadcast(&self, cutoff: Cutoff, event: &Event) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (id, subscriber) in self.members(cutoff) {
            let result = send(id, &subscriber.tx, event.clone());
            self.record(&mut report, id, event.name(), result);
        }
        report
    }

    /// Sends each subscriber a projects snapshot tailored to what it has already received:
    /// a file whose content mtime matches the subscriber's last delivered one goes out
    /// `unchanged` without content.
    pub fn broadcast_projects(
        &self,
        cutoff: Cutoff,
        services: &[ServiceStatus],
        files: &[ObservedFile],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (id, subscriber) in self.members(cutoff) {
            let result = deliver_projects(id, &subscriber, services, files, false);
            self.record(&mut report, id, crate::models::PROJECTS_UPDATE, result);
        }
        report
    }

    pub fn deliver_to(&self, id: SubscriberId, event: Event) -> Result<(), DeliveryError> {
        let subscriber = self.member(id)?;
        let result = send(id, &subscriber.tx, event);
        if result == Err(DeliveryError::Disconnected(id)) {
            self.leave(id);
        }
        result
    }

    /// Single-subscriber projects delivery with full content for every readable file,
    /// regardless of what the subscriber was sent before.
    pub fn deliver_projects_to(
        &self,
        id: SubscriberId,
        services: &[ServiceStatus],
        files: &[ObservedFile],
    ) -> Result<(), DeliveryError> {
        let subscriber = self.member(id)?;
        let result = deliver_projects(id, &subscriber, services, files, true);
        if result == Err(DeliveryError::Disconnected(id)) {
            self.leave(id);
        }
        result
    }

    fn member(&self, id: SubscriberId) -> Result<Arc<Subscriber>, DeliveryError> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(DeliveryError::UnknownSubscriber(id))
    }

    fn members(&self, Cutoff(before): Cutoff) -> Vec<(SubscriberId, Arc<Subscriber>)> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, s)| **id < before && s.admitted.load(Ordering::Acquire))
            .map(|(id, s)| (*id, s.clone()))
            .collect()
    }

    fn record(
        &self,
        report: &mut DeliveryReport,
        id: SubscriberId,
        event: &str,
        result: Result<(), DeliveryError>,
    ) {
        match result {
            Ok(()) => report.delivered += 1,
            Err(DeliveryError::QueueFull(_)) => {
                tracing::warn!(subscriber = id, event, "subscriber queue full; event dropped");
                report.dropped += 1;
            }
            Err(DeliveryError::Disconnected(_)) | Err(DeliveryError::UnknownSubscriber(_)) => {
                self.leave(id);
                report.disconnected += 1;
            }
        }
    }
}

fn send(id: SubscriberId, tx: &mpsc::Sender<Event>, event: Event) -> Result<(), DeliveryError> {
    tx.try_send(event).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryError::QueueFull(id),
        TrySendError::Closed(_) => DeliveryError::Disconnected(id),
    })
}

/// Tailors and sends; the seen map only changes if the send succeeded. A file sent without
/// reusable content (missing or unreadable) is forgotten, so its next readable version goes
/// out in full even when the mtime is the one delivered before.
fn deliver_projects(
    id: SubscriberId,
    subscriber: &Subscriber,
    services: &[ServiceStatus],
    files: &[ObservedFile],
    force_full: bool,
) -> Result<(), DeliveryError> {
    let mut seen = subscriber
        .seen
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let mut sent = Vec::new();
    let mut forgotten = Vec::new();
    let files = files
        .iter()
        .map(|observed| {
            let Some(modified) = observed.content_modified else {
                forgotten.push(observed.file.path.as_str());
                return observed.file.clone();
            };
            if !force_full && seen.get(&observed.file.path) == Some(&modified) {
                return unchanged_copy(&observed.file);
            }
            sent.push((observed.file.path.clone(), modified));
            observed.file.clone()
        })
        .collect();

    let event = Event::ProjectsUpdate(ProjectsSnapshot {
        services: services.to_vec(),
        files,
    });
    send(id, &subscriber.tx, event)?;
    for path in forgotten {
        seen.remove(path);
    }
    seen.extend(sent);
    Ok(())
}

fn unchanged_copy(file: &MonitoredFile) -> MonitoredFile {
    MonitoredFile {
        name: file.name.clone(),
        path: file.path.clone(),
        expand: file.expand,
        exists: file.exists,
        size: file.size,
        modified: file.modified,
        content: None,
        unchanged: true,
        error: file.error.clone(),
    }
}
