//! Bounded mailboxes.
//!
//! A [`Mailbox`] is the delivery sink the broker registers under a topic.
//! It pairs a bounded [`mpsc::Sender`] with a broker-unique [`MailboxId`],
//! which is how the broker recognizes a repeated subscription of the same
//! sink to the same topic.

use core::fmt;

use lifegrid_types::Envelope;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Receiving half of a mailbox.
pub type MailboxReceiver = mpsc::Receiver<Envelope>;

/// Identifier of a mailbox, unique within one broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MailboxId(pub u64);

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mailbox-{}", self.0)
    }
}

/// Outcome of handing one envelope to one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The envelope was queued.
    Delivered,
    /// The mailbox was at capacity; the envelope was dropped.
    Full,
    /// The receiving half was closed or dropped; the envelope was dropped.
    Closed,
}

/// Sending half of a bounded inbox, as registered with the broker.
#[derive(Clone)]
pub struct Mailbox {
    id: MailboxId,
    tx: mpsc::Sender<Envelope>,
}

impl Mailbox {
    /// Create a mailbox and its receiver. `capacity` is clamped to at
    /// least 1.
    pub(crate) fn channel(id: MailboxId, capacity: usize) -> (Self, MailboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, tx }, rx)
    }

    /// The mailbox identifier.
    pub const fn id(&self) -> MailboxId {
        self.id
    }

    /// Whether the receiving half has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue an envelope without waiting.
    pub(crate) fn deliver(&self, envelope: Envelope) -> Delivery {
        match self.tx.try_send(envelope) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("id", &self.id)
            .field("capacity", &self.tx.max_capacity())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lifegrid_types::Topic;

    use super::*;

    fn envelope(payload: &str) -> Envelope {
        Envelope::new(Topic::new("t"), payload)
    }

    #[test]
    fn full_mailbox_reports_full() {
        let (mailbox, mut rx) = Mailbox::channel(MailboxId(1), 1);
        assert_eq!(mailbox.deliver(envelope("a")), Delivery::Delivered);
        assert_eq!(mailbox.deliver(envelope("b")), Delivery::Full);
        assert_eq!(rx.try_recv().unwrap().payload, "a");
    }

    #[test]
    fn closed_mailbox_reports_closed() {
        let (mailbox, mut rx) = Mailbox::channel(MailboxId(2), 4);
        rx.close();
        assert!(mailbox.is_closed());
        assert_eq!(mailbox.deliver(envelope("a")), Delivery::Closed);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (mailbox, _rx) = Mailbox::channel(MailboxId(3), 0);
        assert_eq!(mailbox.deliver(envelope("a")), Delivery::Delivered);
    }
}
