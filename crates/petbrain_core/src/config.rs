//! Configuration management for the brain simulation.
//!
//! Strongly-typed sections that map onto a `brain.toml` file. Only global
//! knobs live here; per-pet tunables are derived from vitals by
//! [`crate::mapper`].
//!
//! ## Configuration Hierarchy
//!
//! 1. Default values (hardcoded in `Default` impls)
//! 2. `brain.toml` file (overrides defaults)
//!
//! ## Example `brain.toml`
//!
//! ```toml
//! [simulation]
//! paused = false
//! shutdown_grace_period_ms = 30000
//! batch_window_ms = 50
//! cell_channel_capacity = 64
//! grid_seed = 42
//!
//! [synaptic_weights]
//! N = 1.0
//! NE = 0.9
//! E = 1.0
//! SE = 0.9
//! S = 1.0
//! SW = 0.9
//! W = 1.0
//! NW = 0.9
//!
//! [lifecycle]
//! poll_interval_ms = 5000
//! ```

use petbrain_data::Direction;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest grid edge that still gives every cell 8 distinct toroidal neighbors.
pub const MIN_GRID_SIZE: usize = 3;

/// Runtime behavior shared by every pet's simulation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Initial value of the global pause flag.
    pub paused: bool,
    /// Delay between the last observer leaving and the driver stopping.
    pub shutdown_grace_period_ms: u64,
    /// Width of the window cell updates are batched into for observers.
    pub batch_window_ms: u64,
    /// Bounded buffer per cell channel; older updates are dropped beyond it.
    pub cell_channel_capacity: usize,
    /// Seed for the random cell type draw when grids are built.
    pub grid_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            paused: false,
            shutdown_grace_period_ms: 30_000,
            batch_window_ms: 50,
            cell_channel_capacity: 64,
            grid_seed: 42,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_period_ms)
    }

    #[must_use]
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

/// Directional synaptic weights, keyed by the compass direction of the
/// neighbor -> cell step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SynapticWeights {
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "NE")]
    pub ne: f64,
    #[serde(rename = "E")]
    pub e: f64,
    #[serde(rename = "SE")]
    pub se: f64,
    #[serde(rename = "S")]
    pub s: f64,
    #[serde(rename = "SW")]
    pub sw: f64,
    #[serde(rename = "W")]
    pub w: f64,
    #[serde(rename = "NW")]
    pub nw: f64,
}

impl Default for SynapticWeights {
    fn default() -> Self {
        Self {
            n: 1.0,
            ne: 0.9,
            e: 1.0,
            se: 0.9,
            s: 1.0,
            sw: 0.9,
            w: 1.0,
            nw: 0.9,
        }
    }
}

impl SynapticWeights {
    /// Same weight in every direction.
    #[must_use]
    pub fn uniform(weight: f64) -> Self {
        Self {
            n: weight,
            ne: weight,
            e: weight,
            se: weight,
            s: weight,
            sw: weight,
            w: weight,
            nw: weight,
        }
    }

    #[inline]
    #[must_use]
    pub fn weight(&self, direction: Direction) -> f64 {
        match direction {
            Direction::N => self.n,
            Direction::NE => self.ne,
            Direction::E => self.e,
            Direction::SE => self.se,
            Direction::S => self.s,
            Direction::SW => self.sw,
            Direction::W => self.w,
            Direction::NW => self.nw,
        }
    }
}

/// How often the lifecycle pulls fresh vitals for a pet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    pub poll_interval_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
        }
    }
}

impl LifecycleConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BrainConfig {
    pub simulation: SimulationConfig,
    pub synaptic_weights: SynapticWeights,
    pub lifecycle: LifecycleConfig,
}

impl BrainConfig {
    /// Validates all configuration parameters.
    ///
    /// # Validation Rules
    /// - Synaptic weights must be finite and within `[0.0, 2.0]`
    /// - Batch window, channel capacity and poll interval must be positive
    pub fn validate(&self) -> anyhow::Result<()> {
        for direction in Direction::ALL {
            let weight = self.synaptic_weights.weight(direction);
            anyhow::ensure!(
                weight.is_finite() && (0.0..=2.0).contains(&weight),
                "Synaptic weight {} must be in [0.0, 2.0], got {}",
                direction.label(),
                weight
            );
        }

        anyhow::ensure!(
            self.simulation.batch_window_ms > 0,
            "Batch window must be positive"
        );
        anyhow::ensure!(
            self.simulation.cell_channel_capacity > 0,
            "Cell channel capacity must be positive"
        );
        anyhow::ensure!(
            self.simulation.cell_channel_capacity <= 65_536,
            "Cell channel capacity too large (max 65536)"
        );
        anyhow::ensure!(
            self.lifecycle.poll_interval_ms > 0,
            "Vitals poll interval must be positive"
        );

        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Digest of the sections that change simulation output.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.synaptic_weights).as_bytes());
        hasher.update(self.simulation.grid_seed.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}
