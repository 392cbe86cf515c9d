// ============================================
// File: crates/devauth-transport/src/router.rs
// ============================================
//! # Subscription Router
//!
//! ## Creation Reason
//! Both transports need the same fan-out step: given one incoming publish,
//! push it into every local subscription whose filter matches.
//!
//! ## Main Functionality
//! - `Router`: Table of (owner, filter, qos, sender) routes
//! - Non-blocking dispatch with `try_send`; closed routes are pruned,
//!   full ones drop the message with a warning
//!
//! ## ⚠️ Important Note for Next Developer
//! - `dispatch` runs on the transport's event loop; it must never await
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

use crate::topic::topic_matches;
use crate::traits::{Message, QoS, Subscription};

/// Owner tag for routes; lets one router serve several clients.
pub type OwnerId = u64;

struct Route {
    owner: OwnerId,
    filter: String,
    qos: QoS,
    tx: mpsc::Sender<Message>,
}

/// Fan-out table from topic filters to subscription queues.
pub struct Router {
    routes: Mutex<Vec<Route>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl Router {
    /// Creates a router whose subscriptions queue up to `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Adds a route and returns its subscription.
    pub fn add(&self, owner: OwnerId, filter: &str, qos: QoS) -> Subscription {
        self.add_with_backlog(owner, filter, qos, Vec::new())
    }

    /// Adds a route whose queue starts with `backlog` (e.g. retained
    /// messages). Backlog beyond the queue capacity is dropped.
    pub fn add_with_backlog(
        &self,
        owner: OwnerId,
        filter: &str,
        qos: QoS,
        backlog: Vec<Message>,
    ) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        for message in backlog {
            if tx.try_send(message).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.routes.lock().push(Route {
            owner,
            filter: filter.to_owned(),
            qos,
            tx,
        });
        Subscription::new(filter, rx)
    }

    /// Delivers `message` to every matching route. Returns the number of
    /// subscriptions that accepted it.
    pub fn dispatch(&self, message: &Message) -> usize {
        let mut delivered = 0;
        self.routes.lock().retain(|route| {
            if !topic_matches(&route.filter, &message.topic) {
                return !route.tx.is_closed();
            }
            match route.tx.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        filter = %route.filter,
                        topic = %message.topic,
                        "Subscription queue full, dropping message"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(filter = %route.filter, "Pruning closed subscription");
                    false
                }
            }
        });
        delivered
    }

    /// Distinct live filters with the highest QoS requested for each.
    #[must_use]
    pub fn active_filters(&self) -> Vec<(String, QoS)> {
        let mut filters: Vec<(String, QoS)> = Vec::new();
        for route in self.routes.lock().iter().filter(|r| !r.tx.is_closed()) {
            match filters.iter_mut().find(|(f, _)| *f == route.filter) {
                Some((_, qos)) => *qos = (*qos).max(route.qos),
                None => filters.push((route.filter.clone(), route.qos)),
            }
        }
        filters
    }

    /// Removes every route of `owner`, ending those subscriptions.
    pub fn remove_owner(&self, owner: OwnerId) {
        self.routes.lock().retain(|r| r.owner != owner);
    }

    /// Removes all routes.
    pub fn clear(&self) {
        self.routes.lock().clear();
    }

    /// Number of routes, including ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    /// Returns `true` if there are no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages dropped because a queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ============================================
// Tests
// ============================================
