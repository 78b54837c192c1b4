//! Topic-based publish/subscribe broker for the Lifegrid simulation.
//!
//! The broker keeps two mappings per topic: the ordered history of every
//! payload published on it, and the ordered list of subscribed mailboxes.
//! Subscribing replays the retained history before returning; publishing
//! appends to the history and then delivers to every current subscriber.
//!
//! # Modules
//!
//! - [`broker`] -- [`Broker`], retention policy, and delivery accounting
//! - [`mailbox`] -- Bounded inboxes that receive [`Envelope`]s
//!
//! # Delivery policy
//!
//! Both operations are synchronous for the caller and never block: all
//! broker state lives behind one mutex, and each mailbox is a bounded
//! `tokio::sync::mpsc` channel fed with `try_send`.
//!
//! - A full mailbox drops the new envelope (drop-newest) and the drop is
//!   logged and counted.
//! - A closed mailbox (its owner stopped) drops the envelope silently and
//!   its registrations are pruned.
//!
//! [`Envelope`]: lifegrid_types::Envelope

pub mod broker;
pub mod mailbox;

pub use broker::{Broker, BrokerStats, Publication, Retention, Subscribed};
pub use mailbox::{Delivery, Mailbox, MailboxId, MailboxReceiver};
