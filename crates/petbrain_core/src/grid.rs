//! Toroidal grid of cells with Moore-neighborhood wiring.

use crate::cell::Cell;
use crate::config::MIN_GRID_SIZE;
use crate::rules::RuleEngine;
use petbrain_data::{CellState, CellType, CorticalLayer, SimulationParameters};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Relative positions of the 8 Moore neighbors, row by row.
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A `width x height` torus of cells.
///
/// Layers follow the row (four equal horizontal bands, superficial at the
/// top); cell types come from a seeded draw so the composition of a grid is
/// reproducible from `(width, height, seed)`.
#[derive(Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    seed: u64,
    cells: Vec<Cell>,
    tick: u64,
}

impl Grid {
    /// Builds and wires a grid.
    ///
    /// # Panics
    /// If either dimension is below 3 (a neighbor would alias the cell itself)
    /// or `channel_capacity` is zero.
    #[must_use]
    pub fn new(width: usize, height: usize, seed: u64, channel_capacity: usize) -> Self {
        assert!(
            width >= MIN_GRID_SIZE && height >= MIN_GRID_SIZE,
            "grid must be at least {MIN_GRID_SIZE}x{MIN_GRID_SIZE}, got {width}x{height}"
        );

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            let layer = CorticalLayer::from_y(y, height);
            for x in 0..width {
                let cell_type = CellType::from_draw(layer, rng.gen::<f64>());
                cells.push(Cell::new(
                    x as u32,
                    y as u32,
                    layer,
                    cell_type,
                    channel_capacity,
                ));
            }
        }

        let mut grid = Self {
            width,
            height,
            seed,
            cells,
            tick: 0,
        };
        grid.wire_neighbors();
        grid
    }

    /// Square grid, the shape every pet brain uses.
    #[must_use]
    pub fn square(size: usize, seed: u64, channel_capacity: usize) -> Self {
        Self::new(size, size, seed, channel_capacity)
    }

    fn wire_neighbors(&mut self) {
        let (w, h) = (self.width as isize, self.height as isize);
        for y in 0..h {
            for x in 0..w {
                let idx = (y * w + x) as usize;
                for (dx, dy) in NEIGHBOR_OFFSETS {
                    let nx = (x + dx).rem_euclid(w);
                    let ny = (y + dy).rem_euclid(h);
                    self.cells[idx].add_neighbor((ny * w + nx) as usize);
                }
            }
        }
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Ticks evaluated since the grid was built.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Cell at `(x, y)`.
    ///
    /// # Panics
    /// If the coordinates are outside the grid. Callers derive coordinates
    /// from the grid itself, so this is a programming error.
    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) out of bounds for {}x{} grid",
            self.width,
            self.height
        );
        &self.cells[self.index(x, y)]
    }

    /// Mutable access with the same bounds contract as [`Grid::cell`].
    pub fn cell_mut(&mut self, x: usize, y: usize) -> &mut Cell {
        assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) out of bounds for {}x{} grid",
            self.width,
            self.height
        );
        let idx = self.index(x, y);
        &mut self.cells[idx]
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Current state of every cell, row-major.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CellState> {
        self.cells.iter().map(|c| c.state().clone()).collect()
    }

    /// One receiver per cell, each seeing updates emitted from now on.
    #[must_use]
    pub fn subscribe_all(&self) -> Vec<broadcast::Receiver<CellState>> {
        self.cells.iter().map(Cell::subscribe).collect()
    }

    /// Puts the center cell into an active, firing state.
    pub fn seed_center(&mut self) {
        let (cx, cy) = (self.width / 2, self.height / 2);
        let now = chrono::Utc::now().timestamp_millis();
        let cell = self.cell_mut(cx, cy);
        let seeded = CellState {
            activation: 1.0,
            is_firing: true,
            timestamp: now,
            last_fired_at: now,
            ..cell.state().clone()
        };
        cell.emit(seeded);
    }

    /// Advances every cell by one tick and publishes the results.
    ///
    /// All next states are computed from the previous tick before any cell is
    /// written, so neighbors never observe a half-updated grid. Returns the
    /// number of cells firing after the tick.
    pub fn step(&mut self, engine: &RuleEngine, params: &SimulationParameters) -> usize {
        let cells = &self.cells;

        #[cfg(feature = "rayon")]
        let next: Vec<CellState> = cells
            .par_iter()
            .map(|cell| engine.evaluate(cell, cells, params))
            .collect();

        #[cfg(not(feature = "rayon"))]
        let next: Vec<CellState> = cells
            .iter()
            .map(|cell| engine.evaluate(cell, cells, params))
            .collect();

        let mut firing = 0;
        for (cell, state) in self.cells.iter_mut().zip(next) {
            if state.is_firing {
                firing += 1;
            }
            cell.emit(state);
        }
        self.tick += 1;
        firing
    }
}
