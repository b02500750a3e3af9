//! Neural network module for agent brains.
//!
//! A single hidden layer whose width evolves:
//! - Dense `ndarray` weight matrices, ReLU hidden activation
//! - Gaussian weight mutations
//! - Structural mutations (grow/shrink the hidden layer by one neuron)

mod mutations;
mod network;

pub use mutations::MutationConfig;
pub use network::Brain;
