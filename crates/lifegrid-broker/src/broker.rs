//! The topic broker.
//!
//! [`Broker`] is the only shared mutable state in a running simulation.
//! Every subscription and publication goes through one mutex, so the
//! replay performed by [`Broker::subscribe`] and the delivery performed
//! by [`Broker::publish`] can never interleave: a subscriber added after
//! N retained publications sees exactly those N payloads followed by
//! every later one, with no gap and no duplicate.
//!
//! # Retention
//!
//! History is unbounded by default. Control topics that never need
//! replay can opt out with [`Retention::Disabled`], and chatty topics can
//! keep only their newest payloads with [`Retention::Latest`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use lifegrid_types::{Envelope, Topic};
use tracing::{debug, warn};

use crate::mailbox::{Delivery, Mailbox, MailboxId, MailboxReceiver};

/// How much of a topic's history the broker keeps for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Keep every payload ever published.
    #[default]
    Unbounded,
    /// Keep only the newest `n` payloads.
    Latest(usize),
    /// Keep nothing; new subscribers receive no replay.
    Disabled,
}

impl Retention {
    /// Maximum number of retained payloads, or `None` when unbounded.
    const fn limit(self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Latest(n) => Some(n),
            Self::Disabled => Some(0),
        }
    }
}

/// Result of a [`Broker::subscribe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscribed {
    /// The mailbox was registered and the retained history replayed.
    New {
        /// Number of historical payloads queued into the mailbox.
        replayed: usize,
    },
    /// The mailbox was already registered on the topic. Nothing was
    /// registered or replayed, so the mailbox never sees a payload twice.
    AlreadySubscribed,
}

/// Per-publication delivery accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Publication {
    /// Mailboxes that queued the payload.
    pub delivered: usize,
    /// Mailboxes that were full and dropped the payload.
    pub dropped_full: usize,
    /// Mailboxes that were closed and dropped the payload.
    pub dropped_closed: usize,
}

impl Publication {
    /// Whether every registered mailbox received the payload.
    pub const fn is_complete(&self) -> bool {
        self.dropped_full == 0 && self.dropped_closed == 0
    }

    const fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered = self.delivered.saturating_add(1),
            Delivery::Full => self.dropped_full = self.dropped_full.saturating_add(1),
            Delivery::Closed => self.dropped_closed = self.dropped_closed.saturating_add(1),
        }
    }
}

/// Running totals over the broker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrokerStats {
    /// Number of topics that have seen a subscription or publication.
    pub topics: usize,
    /// Total calls to [`Broker::publish`].
    pub publications: u64,
    /// Total envelopes queued into mailboxes (live and replayed).
    pub delivered: u64,
    /// Total envelopes dropped because a mailbox was full.
    pub dropped_full: u64,
    /// Total envelopes dropped because a mailbox was closed.
    pub dropped_closed: u64,
}

#[derive(Default)]
struct BrokerState {
    /// Topic -> retained payloads, oldest first.
    history: HashMap<Topic, VecDeque<String>>,
    /// Topic -> registered mailboxes, in subscription order.
    subscriptions: HashMap<Topic, Vec<Mailbox>>,
    /// Topic -> retention override.
    retention: HashMap<Topic, Retention>,
    stats: BrokerStats,
}

impl BrokerState {
    fn retention(&self, topic: &Topic) -> Retention {
        self.retention.get(topic).copied().unwrap_or_default()
    }

    fn count_topics(&mut self) {
        let extra = self
            .subscriptions
            .keys()
            .filter(|topic| !self.history.contains_key(*topic))
            .count();
        self.stats.topics = self.history.len().saturating_add(extra);
    }

    fn tally(&mut self, delivery: Delivery) {
        let counter = match delivery {
            Delivery::Delivered => &mut self.stats.delivered,
            Delivery::Full => &mut self.stats.dropped_full,
            Delivery::Closed => &mut self.stats.dropped_closed,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Topic broker with replay-on-subscribe.
///
/// Share it between tasks with [`Arc`](std::sync::Arc); every method takes
/// `&self`.
#[derive(Default)]
pub struct Broker {
    next_mailbox: AtomicU64,
    state: Mutex<BrokerState>,
}

impl Broker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bounded mailbox with a broker-unique id.
    pub fn open_mailbox(&self, capacity: usize) -> (Mailbox, MailboxReceiver) {
        let id = MailboxId(self.next_mailbox.fetch_add(1, Ordering::Relaxed));
        Mailbox::channel(id, capacity)
    }

    /// Set the retention policy of `topic`, trimming existing history to fit.
    pub fn set_retention(&self, topic: &Topic, retention: Retention) {
        let mut state = self.lock();
        if let Some(limit) = retention.limit()
            && let Some(history) = state.history.get_mut(topic)
        {
            trim(history, limit);
        }
        state.retention.insert(topic.clone(), retention);
    }

    /// Register `mailbox` under `topic`, then replay the topic's retained
    /// history into it, oldest first, before returning.
    ///
    /// Subscribing a mailbox that is already registered on the topic is
    /// accepted and does nothing.
    pub fn subscribe(&self, mailbox: &Mailbox, topic: &Topic) -> Subscribed {
        let mut guard = self.lock();
        let state = &mut *guard;

        let subscribers = state.subscriptions.entry(topic.clone()).or_default();
        if subscribers.iter().any(|m| m.id() == mailbox.id()) {
            debug!(%topic, mailbox = %mailbox.id(), "mailbox already subscribed");
            return Subscribed::AlreadySubscribed;
        }
        subscribers.push(mailbox.clone());

        let mut replay = Publication::default();
        let mut outcomes = Vec::new();
        if let Some(history) = state.history.get(topic) {
            for payload in history {
                let delivery = mailbox.deliver(Envelope::new(topic.clone(), payload.clone()));
                replay.record(delivery);
                outcomes.push(delivery);
                if delivery == Delivery::Closed {
                    break;
                }
            }
        }
        for delivery in outcomes {
            state.tally(delivery);
        }

        if replay.dropped_closed > 0 {
            prune_closed(state.subscriptions.get_mut(topic));
        }
        if replay.dropped_full > 0 {
            warn!(
                %topic,
                mailbox = %mailbox.id(),
                dropped = replay.dropped_full,
                "mailbox full during replay, history payloads dropped"
            );
        }
        state.count_topics();

        debug!(%topic, mailbox = %mailbox.id(), replayed = replay.delivered, "subscribed");
        Subscribed::New {
            replayed: replay.delivered,
        }
    }

    /// Append `payload` to the topic's history and deliver it to every
    /// registered mailbox in subscription order.
    ///
    /// Never blocks: full mailboxes drop the payload, closed mailboxes
    /// drop it silently and are unregistered.
    pub fn publish(&self, topic: &Topic, payload: impl Into<String>) -> Publication {
        let payload = payload.into();
        let mut guard = self.lock();
        let state = &mut *guard;

        state.stats.publications = state.stats.publications.saturating_add(1);

        let limit = state.retention(topic).limit();
        if limit != Some(0) {
            let history = state.history.entry(topic.clone()).or_default();
            history.push_back(payload.clone());
            if let Some(limit) = limit {
                trim(history, limit);
            }
        }

        let mut publication = Publication::default();
        let mut outcomes = Vec::new();
        if let Some(subscribers) = state.subscriptions.get(topic) {
            for mailbox in subscribers {
                let delivery = mailbox.deliver(Envelope::new(topic.clone(), payload.clone()));
                if delivery == Delivery::Full {
                    warn!(%topic, mailbox = %mailbox.id(), "mailbox full, payload dropped");
                }
                publication.record(delivery);
                outcomes.push(delivery);
            }
        }
        for delivery in outcomes {
            state.tally(delivery);
        }

        if publication.dropped_closed > 0 {
            debug!(
                %topic,
                closed = publication.dropped_closed,
                "pruning closed mailboxes"
            );
            prune_closed(state.subscriptions.get_mut(topic));
        }
        state.count_topics();

        publication
    }

    /// Number of payloads currently retained for `topic`.
    pub fn history_len(&self, topic: &Topic) -> usize {
        self.lock().history.get(topic).map_or(0, VecDeque::len)
    }

    /// Number of mailboxes currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.lock().subscriptions.get(topic).map_or(0, Vec::len)
    }

    /// Snapshot of the lifetime totals.
    pub fn stats(&self) -> BrokerStats {
        self.lock().stats
    }

    /// Acquire the state lock, recovering from poisoning.
    ///
    /// The state is only ever mutated by complete, non-panicking steps, so
    /// a panic elsewhere while the guard was held leaves it consistent.
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("broker lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Drop the oldest payloads until at most `limit` remain.
fn trim(history: &mut VecDeque<String>, limit: usize) {
    while history.len() > limit {
        history.pop_front();
    }
}

fn prune_closed(subscribers: Option<&mut Vec<Mailbox>>) {
    if let Some(subscribers) = subscribers {
        subscribers.retain(|mailbox| !mailbox.is_closed());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn drain(rx: &mut MailboxReceiver) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            out.push(envelope.payload);
        }
        out
    }

    #[test]
    fn subscribe_to_fresh_topic_replays_nothing() {
        let broker = Broker::new();
        let (mailbox, mut rx) = broker.open_mailbox(8);
        let result = broker.subscribe(&mailbox, &Topic::new("quiet"));
        assert_eq!(result, Subscribed::New { replayed: 0 });
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn replay_then_live_without_gap_or_duplicate() {
        let broker = Broker::new();
        let topic = Topic::new("t");
        broker.publish(&topic, "a");
        broker.publish(&topic, "b");

        let (mailbox, mut rx) = broker.open_mailbox(8);
        assert_eq!(
            broker.subscribe(&mailbox, &topic),
            Subscribed::New { replayed: 2 }
        );
        broker.publish(&topic, "c");

        assert_eq!(drain(&mut rx), vec!["a", "b", "c"]);
    }

    #[test]
    fn envelope_carries_topic() {
        let broker = Broker::new();
        let topic = Topic::new("3,4");
        let (mailbox, mut rx) = broker.open_mailbox(8);
        broker.subscribe(&mailbox, &topic);
        broker.publish(&topic, "3,4");
        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.topic, topic);
        assert_eq!(envelope.payload, "3,4");
    }

    #[test]
    fn duplicate_subscription_is_accepted_without_duplicate_delivery() {
        let broker = Broker::new();
        let topic = Topic::new("t");
        broker.publish(&topic, "old");

        let (mailbox, mut rx) = broker.open_mailbox(8);
        assert_eq!(
            broker.subscribe(&mailbox, &topic),
            Subscribed::New { replayed: 1 }
        );
        assert_eq!(
            broker.subscribe(&mailbox, &topic),
            Subscribed::AlreadySubscribed
        );
        assert_eq!(broker.subscriber_count(&topic), 1);

        let publication = broker.publish(&topic, "new");
        assert_eq!(publication.delivered, 1);
        assert_eq!(drain(&mut rx), vec!["old", "new"]);
    }

    #[test]
    fn full_mailbox_drops_newest() {
        let broker = Broker::new();
        let topic = Topic::new("t");
        let (mailbox, mut rx) = broker.open_mailbox(1);
        broker.subscribe(&mailbox, &topic);

        assert!(broker.publish(&topic, "first").is_complete());
        let second = broker.publish(&topic, "second");
        assert_eq!(second.dropped_full, 1);
        assert_eq!(second.delivered, 0);

        assert_eq!(drain(&mut rx), vec!["first"]);
        assert_eq!(broker.stats().dropped_full, 1);
        // The registration survives a full inbox.
        assert_eq!(broker.subscriber_count(&topic), 1);
    }

    #[test]
    fn closed_mailbox_is_dropped_silently_and_pruned() {
        let broker = Broker::new();
        let topic = Topic::new("t");
        let (open, mut open_rx) = broker.open_mailbox(4);
        let (closed, mut closed_rx) = broker.open_mailbox(4);
        broker.subscribe(&closed, &topic);
        broker.subscribe(&open, &topic);
        closed_rx.close();

        let publication = broker.publish(&topic, "x");
        assert_eq!(publication.delivered, 1);
        assert_eq!(publication.dropped_closed, 1);
        assert_eq!(broker.subscriber_count(&topic), 1);

        let again = broker.publish(&topic, "y");
        assert_eq!(again.dropped_closed, 0);
        assert_eq!(drain(&mut open_rx), vec!["x", "y"]);
    }

    #[test]
    fn disabled_retention_skips_history() {
        let broker = Broker::new();
        let topic = Topic::new("director");
        broker.set_retention(&topic, Retention::Disabled);
        broker.publish(&topic, "propagate");
        assert_eq!(broker.history_len(&topic), 0);

        let (mailbox, mut rx) = broker.open_mailbox(4);
        assert_eq!(
            broker.subscribe(&mailbox, &topic),
            Subscribed::New { replayed: 0 }
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn latest_retention_keeps_newest() {
        let broker = Broker::new();
        let topic = Topic::new("t");
        for payload in ["a", "b", "c", "d"] {
            broker.publish(&topic, payload);
        }
        broker.set_retention(&topic, Retention::Latest(2));
        assert_eq!(broker.history_len(&topic), 2);
        broker.publish(&topic, "e");

        let (mailbox, mut rx) = broker.open_mailbox(8);
        broker.subscribe(&mailbox, &topic);
        assert_eq!(drain(&mut rx), vec!["d", "e"]);
    }

    #[test]
    fn replay_into_small_mailbox_drops_tail() {
        let broker = Broker::new();
        let topic = Topic::new("t");
        for payload in ["a", "b", "c"] {
            broker.publish(&topic, payload);
        }
        let (mailbox, mut rx) = broker.open_mailbox(2);
        assert_eq!(
            broker.subscribe(&mailbox, &topic),
            Subscribed::New { replayed: 2 }
        );
        assert_eq!(drain(&mut rx), vec!["a", "b"]);
        assert_eq!(broker.stats().dropped_full, 1);
    }

    #[test]
    fn stats_track_topics_and_publications() {
        let broker = Broker::new();
        let (mailbox, _rx) = broker.open_mailbox(8);
        broker.subscribe(&mailbox, &Topic::new("a"));
        broker.publish(&Topic::new("a"), "1");
        broker.publish(&Topic::new("b"), "2");

        let stats = broker.stats();
        assert_eq!(stats.topics, 2);
        assert_eq!(stats.publications, 2);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn mailbox_ids_are_unique() {
        let broker = Broker::new();
        let (a, _ra) = broker.open_mailbox(1);
        let (b, _rb) = broker.open_mailbox(1);
        assert_ne!(a.id(), b.id());
    }
}
