// ============================================
// File: crates/devauth-transport/src/acks.rs
// ============================================
//! # Broker Acknowledgement Tracking
//!
//! ## Creation Reason
//! `rumqttc` reports a request as accepted once it sits in the local
//! request queue. A publish or subscribe only succeeded once the broker
//! answered it, so the MQTT transport waits for PUBACK/PUBCOMP/SUBACK.
//!
//! ## Main Functionality
//! - `AckTracker`: Matches queued requests to packet ids, then to acks
//! - `AckWaiter`: Receiving half handed to the caller
//!
//! ## Correlation
//! ```text
//!   enqueue (FIFO) ──► Outgoing::Publish(pkid) ──► PubAck(pkid) / PubComp(pkid)
//!   enqueue (FIFO) ──► Outgoing::Subscribe(pkid) ──► SubAck(pkid, codes)
//! ```
//! QoS 0 publishes have pkid 0 and complete as soon as they are written.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Matching relies on `rumqttc` writing requests in queue order. Push
//!   the pending entry and enqueue the request under the SAME lock.
//! - After a connection error every waiter is failed. Packets the client
//!   retransmits after a reconnect are not tracked.
//!
//! ## Last Modified
//! v0.1.0 - Initial acknowledgement tracking

use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Result delivered to a waiting caller: `Err` carries the broker or
/// connection reason.
pub(crate) type AckResult = std::result::Result<(), String>;

/// Receiving half of a pending acknowledgement.
pub(crate) type AckWaiter = oneshot::Receiver<AckResult>;

type AckSender = oneshot::Sender<AckResult>;

/// Pending publishes and subscribes of one MQTT client.
#[derive(Default)]
pub(crate) struct AckTracker {
    queued_publishes: VecDeque<AckSender>,
    // `None` for subscriptions nobody awaits (re-subscribe after reconnect).
    queued_subscribes: VecDeque<Option<AckSender>>,
    inflight_publishes: HashMap<u16, AckSender>,
    inflight_subscribes: HashMap<u16, Option<AckSender>>,
}

impl AckTracker {
    /// Registers a publish about to be enqueued.
    pub(crate) fn expect_publish(&mut self) -> AckWaiter {
        let (tx, rx) = oneshot::channel();
        self.queued_publishes.push_back(tx);
        rx
    }

    /// Registers a subscribe about to be enqueued.
    pub(crate) fn expect_subscribe(&mut self) -> AckWaiter {
        let (tx, rx) = oneshot::channel();
        self.queued_subscribes.push_back(Some(tx));
        rx
    }

    /// Registers a subscribe whose SUBACK is only logged.
    pub(crate) fn expect_untracked_subscribe(&mut self) {
        self.queued_subscribes.push_back(None);
    }

    /// Drops the most recent publish entry after its enqueue failed.
    pub(crate) fn cancel_last_publish(&mut self) {
        self.queued_publishes.pop_back();
    }

    /// Drops the most recent subscribe entry after its enqueue failed.
    pub(crate) fn cancel_last_subscribe(&mut self) {
        self.queued_subscribes.pop_back();
    }

    /// A PUBLISH left the client with `pkid`.
    pub(crate) fn publish_sent(&mut self, pkid: u16) {
        let Some(tx) = self.queued_publishes.pop_front() else {
            debug!(pkid, "Untracked PUBLISH written");
            return;
        };
        if pkid == 0 {
            let _ = tx.send(Ok(()));
        } else {
            self.inflight_publishes.insert(pkid, tx);
        }
    }

    /// A SUBSCRIBE left the client with `pkid`.
    pub(crate) fn subscribe_sent(&mut self, pkid: u16) {
        match self.queued_subscribes.pop_front() {
            Some(entry) => {
                self.inflight_subscribes.insert(pkid, entry);
            }
            None => debug!(pkid, "Untracked SUBSCRIBE written"),
        }
    }

    /// PUBACK (QoS 1) or PUBCOMP (QoS 2) received.
    pub(crate) fn publish_acked(&mut self, pkid: u16) {
        if let Some(tx) = self.inflight_publishes.remove(&pkid) {
            let _ = tx.send(Ok(()));
        }
    }

    /// SUBACK received; `rejected` is set when any return code is a failure.
    pub(crate) fn subscribe_acked(&mut self, pkid: u16, rejected: bool) {
        let Some(entry) = self.inflight_subscribes.remove(&pkid) else {
            return;
        };
        match entry {
            Some(tx) => {
                let result = if rejected {
                    Err("broker rejected subscription".to_owned())
                } else {
                    Ok(())
                };
                let _ = tx.send(result);
            }
            None if rejected => warn!(pkid, "Broker rejected re-subscription"),
            None => debug!(pkid, "Re-subscription acknowledged"),
        }
    }

    /// Fails every pending request with `reason`.
    pub(crate) fn fail_all(&mut self, reason: &str) {
        let queued = self.queued_publishes.drain(..).map(Some);
        let inflight = self.inflight_publishes.drain().map(|(_, tx)| Some(tx));
        let subscribes = self
            .queued_subscribes
            .drain(..)
            .chain(self.inflight_subscribes.drain().map(|(_, tx)| tx));

        for tx in queued.chain(inflight).chain(subscribes).flatten() {
            let _ = tx.send(Err(reason.to_owned()));
        }
    }

    /// Requests still waiting for the broker.
    pub(crate) fn pending(&self) -> usize {
        self.queued_publishes.len()
            + self.queued_subscribes.len()
            + self.inflight_publishes.len()
            + self.inflight_subscribes.len()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos0_publish_completes_on_write() {
        let mut acks = AckTracker::default();
        let mut waiter = acks.expect_publish();

        acks.publish_sent(0);
        assert_eq!(waiter.try_recv().unwrap(), Ok(()));
        assert_eq!(acks.pending(), 0);
    }

    #[test]
    fn test_qos1_publish_waits_for_puback() {
        let mut acks = AckTracker::default();
        let mut first = acks.expect_publish();
        let mut second = acks.expect_publish();

        acks.publish_sent(7);
        acks.publish_sent(8);
        assert!(first.try_recv().is_err());

        acks.publish_acked(8);
        assert_eq!(second.try_recv().unwrap(), Ok(()));
        assert!(first.try_recv().is_err());

        acks.publish_acked(7);
        assert_eq!(first.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn test_rejected_suback_fails_waiter() {
        let mut acks = AckTracker::default();
        let mut waiter = acks.expect_subscribe();

        acks.subscribe_sent(3);
        acks.subscribe_acked(3, true);
        assert!(waiter.try_recv().unwrap().is_err());
    }

    #[test]
    fn test_untracked_subscribe_keeps_order() {
        let mut acks = AckTracker::default();
        acks.expect_untracked_subscribe();
        let mut waiter = acks.expect_subscribe();

        acks.subscribe_sent(1);
        acks.subscribe_sent(2);
        acks.subscribe_acked(1, true);
        assert!(waiter.try_recv().is_err());

        acks.subscribe_acked(2, false);
        assert_eq!(waiter.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn test_fail_all_releases_everyone() {
        let mut acks = AckTracker::default();
        let mut inflight = acks.expect_publish();
        let mut queued = acks.expect_publish();
        let mut sub = acks.expect_subscribe();
        acks.publish_sent(4);

        acks.fail_all("connection lost");
        assert_eq!(inflight.try_recv().unwrap(), Err("connection lost".to_owned()));
        assert!(queued.try_recv().unwrap().is_err());
        assert!(sub.try_recv().unwrap().is_err());
        assert_eq!(acks.pending(), 0);
    }

    #[test]
    fn test_cancel_removes_last_entry() {
        let mut acks = AckTracker::default();
        let mut kept = acks.expect_publish();
        let _cancelled = acks.expect_publish();
        acks.cancel_last_publish();

        acks.publish_sent(0);
        assert_eq!(kept.try_recv().unwrap(), Ok(()));
        assert_eq!(acks.pending(), 0);
    }
}
