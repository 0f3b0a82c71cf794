//! Observer side of a brain: merged, windowed cell updates.
//!
//! A subscription runs a small pump task that merges every cell's broadcast
//! channel into one stream and flushes it in fixed windows. The pump is the
//! only reader of those channels for its observer, so a slow observer only
//! ever makes its own receivers lag; the tick driver never waits.

use crate::lock;
use crate::manager::{SharedSlot, SimulationManager};
use futures::stream::{self, SelectAll, Stream, StreamExt};
use petbrain_data::CellState;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Batches waiting for a slow observer before the pump stops reading.
const BATCH_QUEUE: usize = 16;

type CellUpdates = Pin<Box<dyn Stream<Item = CellState> + Send>>;

/// Live view of one pet's brain.
///
/// Yields the full grid first, then one batch per window in which any cell
/// changed. Windows arrive in time order; the order of updates inside a
/// batch is unspecified. The stream ends when the brain is stopped.
///
/// Dropping the subscription detaches the observer; the last one to leave
/// arms the grace-period stop.
#[derive(Debug)]
pub struct BrainSubscription {
    pet_id: Uuid,
    rx: mpsc::Receiver<Vec<CellState>>,
    pump: JoinHandle<()>,
    _guard: SubscriberGuard,
}

impl BrainSubscription {
    #[must_use]
    pub fn pet_id(&self) -> Uuid {
        self.pet_id
    }

    /// Next batch, or `None` once the brain has been stopped.
    pub async fn next_batch(&mut self) -> Option<Vec<CellState>> {
        self.rx.recv().await
    }
}

impl Stream for BrainSubscription {
    type Item = Vec<CellState>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for BrainSubscription {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Counts one observer on a slot for as long as it lives.
#[derive(Debug)]
pub(crate) struct SubscriberGuard {
    manager: SimulationManager,
    pet_id: Uuid,
    slot: SharedSlot,
}

impl SubscriberGuard {
    pub(crate) fn new(manager: SimulationManager, pet_id: Uuid, slot: SharedSlot) -> Self {
        Self {
            manager,
            pet_id,
            slot,
        }
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.manager.release(self.pet_id, &self.slot);
    }
}

pub(crate) fn open(
    runtime: &Handle,
    slot: SharedSlot,
    window: Duration,
    guard: SubscriberGuard,
) -> BrainSubscription {
    let pet_id = guard.pet_id;
    let (tx, rx) = mpsc::channel(BATCH_QUEUE);
    let pump = runtime.spawn(pump(pet_id, slot, window, tx));
    BrainSubscription {
        pet_id,
        rx,
        pump,
        _guard: guard,
    }
}

enum PumpExit {
    /// The observer went away.
    ObserverGone,
    /// Every cell channel closed: the grid was replaced or discarded.
    GridClosed,
}

/// Feeds one observer until it leaves or the brain is stopped.
///
/// When the grid is rebuilt under a live observer, the pump re-attaches to
/// the new grid and sends its snapshot before resuming deltas.
async fn pump(
    pet_id: Uuid,
    slot: SharedSlot,
    window: Duration,
    tx: mpsc::Sender<Vec<CellState>>,
) {
    loop {
        // Only a short-lived clone of the grid is held here; keeping it
        // would keep the cell channels open after a rebuild.
        let attached = {
            let slot = lock(&slot);
            match &slot.grid {
                Some(grid) if !slot.retired => {
                    let grid = lock(grid);
                    Some((slot.generation, grid.snapshot(), grid.subscribe_all()))
                }
                _ => None,
            }
        };
        let Some((generation, snapshot, receivers)) = attached else {
            break;
        };

        if tx.send(snapshot).await.is_err() {
            break;
        }

        match forward_windows(merge(receivers), window, &tx).await {
            PumpExit::ObserverGone => break,
            PumpExit::GridClosed => {
                let rebuilt = {
                    let slot = lock(&slot);
                    !slot.retired && slot.grid.is_some() && slot.generation != generation
                };
                if !rebuilt {
                    break;
                }
                tracing::debug!(pet_id = %pet_id, "Observer re-attaching to rebuilt grid");
            }
        }
    }
    tracing::debug!(pet_id = %pet_id, "Subscription pump finished");
}

/// One stream of every update from every cell. Lagged receivers skip ahead.
fn merge(receivers: Vec<broadcast::Receiver<CellState>>) -> SelectAll<CellUpdates> {
    stream::select_all(receivers.into_iter().map(|rx| {
        let updates = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(state) => return Some((state, rx)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Box::pin(updates) as CellUpdates
    }))
}

async fn forward_windows(
    mut updates: SelectAll<CellUpdates>,
    window: Duration,
    tx: &mpsc::Sender<Vec<CellState>>,
) -> PumpExit {
    let mut flush = tokio::time::interval_at(tokio::time::Instant::now() + window, window);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut batch = Vec::new();

    loop {
        tokio::select! {
            // drain everything already published before closing a window
            biased;
            _ = tx.closed() => return PumpExit::ObserverGone,
            next = updates.next() => match next {
                Some(state) => batch.push(state),
                None => {
                    if !batch.is_empty() && tx.send(batch).await.is_err() {
                        return PumpExit::ObserverGone;
                    }
                    return PumpExit::GridClosed;
                }
            },
            _ = flush.tick() => {
                if !batch.is_empty() && tx.send(std::mem::take(&mut batch)).await.is_err() {
                    return PumpExit::ObserverGone;
                }
            }
        }
    }
}
