use serde::{Deserialize, Serialize};

/// Horizontal band of the cortical column a cell lives in.
///
/// Bands are ordered from the most superficial (top of the grid) to the
/// deepest (bottom). Each band scales how easily its cells reach threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorticalLayer {
    #[serde(rename = "LAYER_2_3")]
    Layer2_3,
    /// Input layer, denser in inhibitory interneurons.
    #[serde(rename = "LAYER_4")]
    Layer4,
    /// Deep pyramidal layer, the only one capable of bursting.
    #[serde(rename = "LAYER_5")]
    Layer5,
    #[serde(rename = "LAYER_6")]
    Layer6,
}

impl CorticalLayer {
    pub const ALL: [CorticalLayer; 4] = [
        CorticalLayer::Layer2_3,
        CorticalLayer::Layer4,
        CorticalLayer::Layer5,
        CorticalLayer::Layer6,
    ];

    #[must_use]
    pub fn depth(self) -> u8 {
        match self {
            CorticalLayer::Layer2_3 => 0,
            CorticalLayer::Layer4 => 1,
            CorticalLayer::Layer5 => 2,
            CorticalLayer::Layer6 => 3,
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            CorticalLayer::Layer2_3 => "L2/3",
            CorticalLayer::Layer4 => "L4",
            CorticalLayer::Layer5 => "L5",
            CorticalLayer::Layer6 => "L6",
        }
    }

    /// Divisor applied to the global firing threshold. Higher means easier firing.
    #[must_use]
    pub fn firing_multiplier(self) -> f64 {
        match self {
            CorticalLayer::Layer2_3 => 0.8,
            CorticalLayer::Layer4 => 1.2,
            CorticalLayer::Layer5 => 1.0,
            CorticalLayer::Layer6 => 0.6,
        }
    }

    /// Band for row `y` of a grid `height` rows tall, split into four equal quartiles.
    #[must_use]
    pub fn from_y(y: usize, height: usize) -> Self {
        // 4y < k*h is the exact integer form of y/h < k/4
        let scaled = y * 4;
        if scaled < height {
            CorticalLayer::Layer2_3
        } else if scaled < height * 2 {
            CorticalLayer::Layer4
        } else if scaled < height * 3 {
            CorticalLayer::Layer5
        } else {
            CorticalLayer::Layer6
        }
    }
}

/// Excitatory or inhibitory neuron, fixed for the lifetime of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellType {
    Excitatory,
    Inhibitory,
}

impl CellType {
    /// Expected share of the population outside the input layer.
    #[must_use]
    pub fn proportion(self) -> f64 {
        match self {
            CellType::Excitatory => 0.8,
            CellType::Inhibitory => 0.2,
        }
    }

    /// Sign applied to this cell's activation when it feeds a neighbor.
    #[must_use]
    pub fn polarity(self) -> f64 {
        match self {
            CellType::Excitatory => 1.0,
            CellType::Inhibitory => -1.0,
        }
    }

    /// Probability that a cell in `layer` is drawn inhibitory.
    #[must_use]
    pub fn inhibitory_probability(layer: CorticalLayer) -> f64 {
        if layer == CorticalLayer::Layer4 {
            0.3
        } else {
            CellType::Inhibitory.proportion()
        }
    }

    /// Maps a uniform draw in `[0, 1)` to a type for `layer`.
    #[must_use]
    pub fn from_draw(layer: CorticalLayer, draw: f64) -> Self {
        if draw < Self::inhibitory_probability(layer) {
            CellType::Inhibitory
        } else {
            CellType::Excitatory
        }
    }
}

/// Position of a cell in its action-potential waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeuronPhase {
    #[default]
    Resting,
    Depolarizing,
    Repolarizing,
    Hyperpolarized,
    Recovering,
    Bursting,
}

impl NeuronPhase {
    /// Ticks spent in the phase before the next transition.
    #[must_use]
    pub fn typical_duration(self) -> u32 {
        match self {
            NeuronPhase::Resting => 0,
            NeuronPhase::Depolarizing => 2,
            NeuronPhase::Repolarizing => 3,
            NeuronPhase::Hyperpolarized => 2,
            NeuronPhase::Recovering => 3,
            NeuronPhase::Bursting => 1,
        }
    }

    #[must_use]
    pub fn base_activation(self) -> f64 {
        match self {
            NeuronPhase::Resting | NeuronPhase::Recovering => 0.0,
            NeuronPhase::Depolarizing | NeuronPhase::Bursting => 1.0,
            NeuronPhase::Repolarizing => 0.4,
            NeuronPhase::Hyperpolarized => -0.1,
        }
    }

    /// Only resting and recovering cells may initiate a spike.
    #[must_use]
    pub fn can_fire(self) -> bool {
        matches!(self, NeuronPhase::Resting | NeuronPhase::Recovering)
    }

    #[must_use]
    pub fn is_spiking(self) -> bool {
        matches!(self, NeuronPhase::Depolarizing | NeuronPhase::Bursting)
    }
}

/// Compass direction of a neighbor relative to the cell it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    /// Direction for a unit offset, `dy` growing downwards. `None` for the
    /// zero offset or anything outside the Moore neighborhood.
    #[must_use]
    pub fn from_offset(dx: i64, dy: i64) -> Option<Self> {
        match (dx, dy) {
            (0, -1) => Some(Direction::N),
            (1, -1) => Some(Direction::NE),
            (1, 0) => Some(Direction::E),
            (1, 1) => Some(Direction::SE),
            (0, 1) => Some(Direction::S),
            (-1, 1) => Some(Direction::SW),
            (-1, 0) => Some(Direction::W),
            (-1, -1) => Some(Direction::NW),
            _ => None,
        }
    }

    /// Direction of the step `from -> to` on a torus. Offsets wider than one
    /// cell crossed an edge and are folded to the opposite sign.
    #[must_use]
    pub fn between(from: (usize, usize), to: (usize, usize)) -> Option<Self> {
        let fold = |d: i64| if d.abs() > 1 { -d.signum() } else { d };
        let dx = fold(to.0 as i64 - from.0 as i64);
        let dy = fold(to.1 as i64 - from.1 as i64);
        Self::from_offset(dx, dy)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::NE => "NE",
            Direction::E => "E",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::W => "W",
            Direction::NW => "NW",
        }
    }
}
