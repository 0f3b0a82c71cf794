//! Periodic tick task, one per running brain.

use crate::lock;
use petbrain_core::{Grid, Metrics, RuleEngine};
use petbrain_data::SimulationParameters;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use uuid::Uuid;

/// Handle to a running tick task.
///
/// The task owns a clone of the grid and the only write access to it while
/// it runs. Parameters reach it through a watch channel, so an update is
/// picked up on the next tick without ever blocking the task.
#[derive(Debug)]
pub(crate) struct Driver {
    task: JoinHandle<()>,
    params_tx: watch::Sender<SimulationParameters>,
}

impl Driver {
    pub(crate) fn spawn(
        runtime: &Handle,
        pet_id: Uuid,
        grid: Arc<Mutex<Grid>>,
        engine: Arc<RuleEngine>,
        metrics: Arc<Metrics>,
        params: SimulationParameters,
    ) -> Self {
        let (params_tx, params_rx) = watch::channel(params);
        let task = runtime.spawn(run(pet_id, grid, engine, metrics, params_rx));
        Self { task, params_tx }
    }

    /// Hands new parameters to the running task.
    pub(crate) fn apply(&self, params: SimulationParameters) {
        self.params_tx.send_replace(params);
    }

    pub(crate) fn stop(self) {
        self.task.abort();
    }
}

fn ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run(
    pet_id: Uuid,
    grid: Arc<Mutex<Grid>>,
    engine: Arc<RuleEngine>,
    metrics: Arc<Metrics>,
    mut params_rx: watch::Receiver<SimulationParameters>,
) {
    let mut params = *params_rx.borrow_and_update();
    let mut interval = ticker(params.tick_interval());

    loop {
        interval.tick().await;

        match params_rx.has_changed() {
            Ok(true) => {
                let next = *params_rx.borrow_and_update();
                if next.tick_interval_ms != params.tick_interval_ms {
                    interval = ticker(next.tick_interval());
                }
                params = next;
                tracing::debug!(pet_id = %pet_id, ?params, "Driver picked up new parameters");
            }
            Ok(false) => {}
            // the owning slot dropped us without aborting
            Err(_) => break,
        }

        if engine.is_paused() {
            continue;
        }

        let started = Instant::now();
        let (cells, firing) = {
            let mut grid = lock(&grid);
            let firing = grid.step(&engine, &params);
            (grid.cells().len(), firing)
        };
        metrics.record_tick(started.elapsed(), cells, firing);
    }

    tracing::debug!(pet_id = %pet_id, "Driver loop exited");
}
