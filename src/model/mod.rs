pub use petbrain_core::{Grid, Metrics, RuleEngine};
pub mod cell {
    pub use petbrain_core::cell::*;
}
pub mod config {
    pub use petbrain_core::config::*;
}
pub mod grid {
    pub use petbrain_core::grid::*;
}
pub mod mapper {
    pub use petbrain_core::mapper::*;
}
pub mod metrics {
    pub use petbrain_core::metrics::*;
}
pub mod rules {
    pub use petbrain_core::rules::*;
}

pub mod engine {
    pub use petbrain_engine::*;
}

pub mod state {
    pub use petbrain_data::*;
    pub mod cell {
        pub use petbrain_data::data::cell::*;
    }
    pub mod neuron {
        pub use petbrain_data::data::neuron::*;
    }
    pub mod pet {
        pub use petbrain_data::data::pet::*;
    }
}
