//! A single grid cell: fixed identity, one current state, one outbound channel.

use petbrain_data::{CellState, CellType, CorticalLayer};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Moore neighborhood size.
pub const MAX_NEIGHBORS: usize = 8;

/// One cell of a brain grid.
///
/// Neighbors are stored as indices into the owning grid's cell array, so the
/// cyclic neighbor relation carries no ownership. The current state has a
/// single writer (the tick driver holding the grid); anyone may read it or
/// subscribe to the outbound channel.
#[derive(Debug)]
pub struct Cell {
    id: Arc<str>,
    x: u32,
    y: u32,
    layer: CorticalLayer,
    cell_type: CellType,
    neighbors: Vec<usize>,
    state: CellState,
    tx: broadcast::Sender<CellState>,
}

impl Cell {
    /// Creates a resting cell whose channel buffers at most `channel_capacity`
    /// updates per observer.
    ///
    /// # Panics
    /// If `channel_capacity` is zero.
    #[must_use]
    pub fn new(
        x: u32,
        y: u32,
        layer: CorticalLayer,
        cell_type: CellType,
        channel_capacity: usize,
    ) -> Self {
        let id: Arc<str> = Arc::from(format!("cell-{x}-{y}"));
        let (tx, _) = broadcast::channel(channel_capacity);
        let state = CellState::resting(
            Arc::clone(&id),
            x,
            y,
            layer,
            cell_type,
            chrono::Utc::now().timestamp_millis(),
        );
        Self {
            id,
            x,
            y,
            layer,
            cell_type,
            neighbors: Vec::with_capacity(MAX_NEIGHBORS),
            state,
            tx,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> u32 {
        self.y
    }

    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (self.x as usize, self.y as usize)
    }

    #[must_use]
    pub fn layer(&self) -> CorticalLayer {
        self.layer
    }

    #[must_use]
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    #[must_use]
    pub fn state(&self) -> &CellState {
        &self.state
    }

    /// Grid indices of the wired neighbors.
    #[must_use]
    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors
    }

    /// Wires `index` as a neighbor. Ignored once eight are wired or when
    /// already present; returns whether it was added.
    pub fn add_neighbor(&mut self, index: usize) -> bool {
        if self.neighbors.len() >= MAX_NEIGHBORS || self.neighbors.contains(&index) {
            return false;
        }
        self.neighbors.push(index);
        true
    }

    /// Replaces the current state and publishes it.
    ///
    /// Never blocks: with no observers the send is a silent no-op, and an
    /// observer whose buffer is full loses its oldest pending updates.
    pub fn emit(&mut self, next: CellState) {
        self.state = next;
        // Err only means nobody is listening
        let _ = self.tx.send(self.state.clone());
    }

    /// New observer of every state emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CellState> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
