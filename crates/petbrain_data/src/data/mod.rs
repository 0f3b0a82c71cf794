//! Core data structures for the petbrain simulation.

pub mod cell;
pub mod neuron;
pub mod pet;
