//! Broker-to-viewer relay.
//!
//! [`spawn_bridge`] opens one broker mailbox, subscribes it to every
//! coordinate topic of the grid and to the director topic, and relays each
//! received payload into the [`AppState`] feed. Coordinate topics replay
//! their history on subscription, so a bridge started after the seeds were
//! published still sees them first.

use std::sync::Arc;

use lifegrid_broker::{Broker, MailboxReceiver};
use lifegrid_types::Topic;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state::AppState;

/// Handle to a running bridge task.
#[derive(Debug)]
pub struct BridgeHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<u64>,
}

impl BridgeHandle {
    /// Stop the bridge after it relays everything already queued.
    ///
    /// Returns the number of payloads the bridge relayed, or the join
    /// error if the task failed.
    pub async fn stop(self) -> Result<u64, tokio::task::JoinError> {
        // The task may already be gone; the join below reports why.
        let _ = self.stop.send(());
        self.task.await
    }
}

/// Subscribe a relay mailbox of `capacity` and spawn the relay task.
pub fn spawn_bridge(broker: &Broker, state: Arc<AppState>, capacity: usize) -> BridgeHandle {
    let (mailbox, inbox) = broker.open_mailbox(capacity);
    broker.subscribe(&mailbox, &Topic::director());
    for coord in state.dims.coords() {
        broker.subscribe(&mailbox, &Topic::coord(coord));
    }
    info!(mailbox = %mailbox.id(), dims = %state.dims, "visualization bridge subscribed");

    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(relay(inbox, state, stop_rx));
    BridgeHandle {
        stop: stop_tx,
        task,
    }
}

async fn relay(
    mut inbox: MailboxReceiver,
    state: Arc<AppState>,
    mut stop: oneshot::Receiver<()>,
) -> u64 {
    let mut relayed: u64 = 0;
    let mut stopping = false;
    loop {
        tokio::select! {
            _ = &mut stop, if !stopping => {
                stopping = true;
                inbox.close();
            }
            envelope = inbox.recv() => {
                let Some(envelope) = envelope else { break };
                let receivers = state.relay(envelope.payload);
                relayed = relayed.saturating_add(1);
                debug!(topic = %envelope.topic, receivers, "payload relayed");
            }
        }
    }
    info!(relayed, "visualization bridge stopped");
    relayed
}
