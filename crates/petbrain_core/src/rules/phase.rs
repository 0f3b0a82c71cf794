//! Action-potential state machine.
//!
//! Each tick a cell moves through
//! `RESTING -> DEPOLARIZING -> REPOLARIZING -> HYPERPOLARIZED -> RECOVERING -> RESTING`
//! (2 + 3 + 2 + 3 ticks after the firing tick), optionally looping through
//! `BURSTING` when a deep pyramidal cell fires on very strong input.

use petbrain_data::{CellState, NeuronPhase};

/// Spikes in one burst, including the spike that starts it.
pub const BURST_SPIKE_COUNT: u32 = 3;

/// A recovering cell needs this much more input than a resting one to fire.
pub const RECOVERY_THRESHOLD_FACTOR: f64 = 1.5;

/// Resting activation never leaks up to a full spike.
pub const RESTING_ACTIVATION_CAP: f64 = 0.99;

/// Per-tick drive of the state machine.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInput {
    /// Weighted neighbor input for this tick.
    pub input: f64,
    /// Layer-adjusted firing threshold.
    pub threshold: f64,
    /// Whether this cell is eligible to burst (deep pyramidal, excitatory).
    pub burst_capable: bool,
    pub burst_threshold_multiplier: f64,
    pub decay_factor: f64,
    pub input_leakage: f64,
}

/// Membrane variables the machine rewrites; everything else on a
/// [`CellState`] is carried over by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Membrane {
    pub phase: NeuronPhase,
    pub countdown: u32,
    pub activation: f64,
    pub burst_mode: bool,
    pub burst_count: u32,
    pub firing: bool,
}

impl Membrane {
    #[must_use]
    pub fn from_state(state: &CellState) -> Self {
        Self {
            phase: state.neuron_phase,
            countdown: state.phase_countdown,
            activation: state.activation,
            burst_mode: state.burst_mode,
            burst_count: state.burst_count,
            firing: false,
        }
    }

    fn fire(&mut self) {
        self.phase = NeuronPhase::Depolarizing;
        self.countdown = NeuronPhase::Depolarizing.typical_duration();
        self.activation = 1.0;
        self.firing = true;
    }

    fn enter_hyperpolarized(&mut self) {
        self.phase = NeuronPhase::Hyperpolarized;
        self.countdown = NeuronPhase::Hyperpolarized.typical_duration();
        self.burst_mode = false;
        self.burst_count = 0;
    }

    fn rest(&mut self) {
        self.phase = NeuronPhase::Resting;
        self.countdown = 0;
        self.activation = 0.0;
    }

    fn tick_down(&mut self) {
        self.countdown = self.countdown.saturating_sub(1);
    }

    /// Fraction of a phase already elapsed, from the remaining countdown.
    fn progress(&self, phase: NeuronPhase) -> f64 {
        1.0 - f64::from(self.countdown) / f64::from(phase.typical_duration())
    }
}

/// Advances `membrane` by one tick. The returned activation is not clamped yet.
#[must_use]
pub fn advance(mut m: Membrane, drive: &PhaseInput) -> Membrane {
    match m.phase {
        NeuronPhase::Resting => {
            if drive.input > drive.threshold {
                m.fire();
                if drive.burst_capable
                    && drive.input > drive.threshold * drive.burst_threshold_multiplier
                {
                    m.burst_mode = true;
                    m.burst_count = BURST_SPIKE_COUNT - 1;
                }
            } else {
                let decayed = m.activation * drive.decay_factor;
                let leaked = drive.input.max(0.0) * drive.input_leakage;
                m.activation = (decayed + leaked).min(RESTING_ACTIVATION_CAP);
                m.countdown = 0;
            }
        }
        NeuronPhase::Depolarizing => {
            m.tick_down();
            m.activation = 1.0;
            m.firing = true;
            if m.countdown == 0 {
                m.phase = NeuronPhase::Repolarizing;
                m.countdown = NeuronPhase::Repolarizing.typical_duration();
            }
        }
        NeuronPhase::Repolarizing => {
            m.tick_down();
            // linear fall from the peak down to the undershoot
            m.activation = 1.0 - m.progress(NeuronPhase::Repolarizing) * 1.1;
            if m.countdown == 0 {
                if m.burst_mode && m.burst_count > 0 {
                    m.phase = NeuronPhase::Bursting;
                    m.countdown = NeuronPhase::Bursting.typical_duration();
                    m.activation = 1.0;
                    m.burst_count -= 1;
                    m.firing = true;
                } else {
                    m.enter_hyperpolarized();
                }
            }
        }
        NeuronPhase::Hyperpolarized => {
            m.tick_down();
            m.activation = -0.1;
            if m.countdown == 0 {
                m.phase = NeuronPhase::Recovering;
                m.countdown = NeuronPhase::Recovering.typical_duration();
            }
        }
        NeuronPhase::Recovering => {
            if m.countdown > 0 {
                m.tick_down();
                m.activation = -0.1 + m.progress(NeuronPhase::Recovering) * 0.1;
            }
            // the relative refractory decision happens on the tick the window closes
            if m.countdown == 0 {
                if drive.input > drive.threshold * RECOVERY_THRESHOLD_FACTOR {
                    m.fire();
                } else {
                    m.rest();
                }
            }
        }
        NeuronPhase::Bursting => {
            m.tick_down();
            m.activation = 1.0;
            m.firing = true;
            if m.countdown == 0 {
                if m.burst_mode && m.burst_count > 0 {
                    m.countdown = NeuronPhase::Bursting.typical_duration();
                    m.burst_count -= 1;
                } else {
                    m.enter_hyperpolarized();
                }
            }
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(input: f64) -> PhaseInput {
        PhaseInput {
            input,
            threshold: 1.5,
            burst_capable: false,
            burst_threshold_multiplier: 2.5,
            decay_factor: 0.9,
            input_leakage: 0.1,
        }
    }

    fn resting(activation: f64) -> Membrane {
        Membrane {
            phase: NeuronPhase::Resting,
            countdown: 0,
            activation,
            burst_mode: false,
            burst_count: 0,
            firing: false,
        }
    }

    fn in_phase(phase: NeuronPhase, countdown: u32) -> Membrane {
        Membrane {
            phase,
            countdown,
            ..resting(0.0)
        }
    }

    #[test]
    fn test_resting_below_threshold_decays_and_leaks() {
        let m = advance(resting(0.5), &drive(1.0));
        assert_eq!(m.phase, NeuronPhase::Resting);
        assert!(!m.firing);
        assert!((m.activation - (0.45 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_resting_at_threshold_does_not_fire() {
        let m = advance(resting(0.0), &drive(1.5));
        assert_eq!(m.phase, NeuronPhase::Resting);
    }

    #[test]
    fn test_resting_negative_input_does_not_leak() {
        let m = advance(resting(0.5), &drive(-3.0));
        assert!((m.activation - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_resting_activation_capped() {
        let mut d = drive(1.4);
        d.input_leakage = 1.0;
        let m = advance(resting(0.9), &d);
        assert_eq!(m.activation, RESTING_ACTIVATION_CAP);
    }

    #[test]
    fn test_silent_resting_cell_settles_from_cap() {
        let d = drive(0.0);
        let mut m = resting(RESTING_ACTIVATION_CAP);
        for tick in 0..200 {
            let next = advance(m, &d);
            assert_eq!(next.phase, NeuronPhase::Resting, "tick {tick}");
            assert!(!next.firing, "tick {tick}");
            assert!(next.activation >= 0.0, "tick {tick}");
            assert!(next.activation <= m.activation, "tick {tick}: activation rose");
            m = next;
        }
        assert!(m.activation < 1e-6);
    }

    #[test]
    fn test_resting_above_threshold_fires() {
        let m = advance(resting(0.0), &drive(1.6));
        assert_eq!(m.phase, NeuronPhase::Depolarizing);
        assert_eq!(m.countdown, 2);
        assert_eq!(m.activation, 1.0);
        assert!(m.firing);
        assert!(!m.burst_mode);
    }

    #[test]
    fn test_burst_requires_capable_cell_and_strong_input() {
        let mut d = drive(4.0);
        let m = advance(resting(0.0), &d);
        assert!(!m.burst_mode, "incapable cell never bursts");

        d.burst_capable = true;
        let m = advance(resting(0.0), &d);
        assert!(m.burst_mode);
        assert_eq!(m.burst_count, 2);

        d.input = 3.5; // below 1.5 * 2.5
        let m = advance(resting(0.0), &d);
        assert!(m.firing);
        assert!(!m.burst_mode);
    }

    #[test]
    fn test_repolarizing_falls_linearly() {
        let quiet = drive(0.0);
        let m1 = advance(in_phase(NeuronPhase::Repolarizing, 3), &quiet);
        let m2 = advance(m1, &quiet);
        let m3 = advance(m2, &quiet);
        assert!((m1.activation - (1.0 - 1.1 / 3.0)).abs() < 1e-9);
        assert!((m2.activation - (1.0 - 2.2 / 3.0)).abs() < 1e-9);
        assert!((m3.activation - (-0.1)).abs() < 1e-9);
        assert_eq!(m3.phase, NeuronPhase::Hyperpolarized);
        assert_eq!(m3.countdown, 2);
    }

    #[test]
    fn test_idle_cycle_is_ten_ticks() {
        let quiet = drive(0.0);
        let mut m = advance(resting(0.0), &drive(2.0));
        assert_eq!(m.phase, NeuronPhase::Depolarizing);

        let expected = [
            NeuronPhase::Depolarizing,
            NeuronPhase::Repolarizing,
            NeuronPhase::Repolarizing,
            NeuronPhase::Repolarizing,
            NeuronPhase::Hyperpolarized,
            NeuronPhase::Hyperpolarized,
            NeuronPhase::Recovering,
            NeuronPhase::Recovering,
            NeuronPhase::Recovering,
            NeuronPhase::Resting,
        ];
        for (tick, phase) in expected.iter().enumerate() {
            m = advance(m, &quiet);
            assert_eq!(m.phase, *phase, "tick {}", tick + 1);
        }
        assert_eq!(m.activation, 0.0);
        assert_eq!(m.countdown, 0);
    }

    #[test]
    fn test_recovery_closing_tick_fires_on_strong_input() {
        let m = advance(in_phase(NeuronPhase::Recovering, 1), &drive(2.3));
        assert_eq!(m.phase, NeuronPhase::Depolarizing);
        assert!(m.firing);
    }

    #[test]
    fn test_recovery_closing_tick_rests_on_moderate_input() {
        // above the resting threshold but below 1.5x
        let m = advance(in_phase(NeuronPhase::Recovering, 1), &drive(2.0));
        assert_eq!(m.phase, NeuronPhase::Resting);
        assert_eq!(m.activation, 0.0);
        assert!(!m.firing);
    }

    #[test]
    fn test_recovery_mid_window_ignores_input() {
        let m = advance(in_phase(NeuronPhase::Recovering, 3), &drive(10.0));
        assert_eq!(m.phase, NeuronPhase::Recovering);
        assert_eq!(m.countdown, 2);
        assert!(!m.firing);
        assert!((m.activation - (-0.1 + 0.1 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_recovery_decides_immediately() {
        let m = advance(in_phase(NeuronPhase::Recovering, 0), &drive(0.0));
        assert_eq!(m.phase, NeuronPhase::Resting);
        let m = advance(in_phase(NeuronPhase::Recovering, 0), &drive(3.0));
        assert_eq!(m.phase, NeuronPhase::Depolarizing);
    }

    #[test]
    fn test_burst_runs_three_spikes_then_hyperpolarizes() {
        let quiet = drive(0.0);
        let mut d = drive(5.0);
        d.burst_capable = true;
        let mut m = advance(resting(0.0), &d);
        assert_eq!(m.burst_count, 2);

        // depolarizing x2, repolarizing x3
        for _ in 0..5 {
            m = advance(m, &quiet);
        }
        assert_eq!(m.phase, NeuronPhase::Bursting);
        assert_eq!(m.burst_count, 1);
        assert_eq!(m.activation, 1.0);

        m = advance(m, &quiet);
        assert_eq!(m.phase, NeuronPhase::Bursting);
        assert_eq!(m.burst_count, 0);
        assert!(m.firing);

        m = advance(m, &quiet);
        assert_eq!(m.phase, NeuronPhase::Hyperpolarized);
        assert!(!m.burst_mode);
        assert_eq!(m.countdown, 2);
    }
}
