//! Brain mutations: hidden-layer growth/shrink and Gaussian weight noise.

use super::network::{random_weight, Brain};
use crate::config::Config;
use ndarray::{s, Array2};
use rand::Rng;

/// Configuration for mutation operations
#[derive(Clone, Debug)]
pub struct MutationConfig {
    /// Probability used by every mutation operator
    pub mutation_rate: f32,
    /// Standard deviation of weight perturbations
    pub mutation_power: f32,
    pub min_hidden: usize,
    pub max_hidden: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            mutation_rate: 0.1,
            mutation_power: 0.1,
            min_hidden: 1,
            max_hidden: 16,
        }
    }
}

impl MutationConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mutation_rate: config.population.mutation_rate,
            mutation_power: config.brain.mutation_power,
            min_hidden: config.brain.min_hidden,
            max_hidden: config.brain.max_hidden,
        }
    }
}

/// Standard normal sample via the Box-Muller transform
pub(crate) fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    const TWO_PI: f32 = std::f32::consts::TAU;
    let u1 = rng.gen::<f32>().clamp(f32::MIN_POSITIVE, 1.0);
    let u2 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (TWO_PI * u2).cos()
}

impl Brain {
    /// Apply structural then weight mutation
    pub fn mutate<R: Rng + ?Sized>(&mut self, config: &MutationConfig, rng: &mut R) {
        if rng.gen::<f32>() < config.mutation_rate {
            self.mutate_structure(config.min_hidden, config.max_hidden, rng);
        }
        self.mutate_weights(config.mutation_rate, config.mutation_power, rng);
    }

    /// Grow or shrink the hidden layer by one neuron, direction chosen
    /// uniformly. A step past either bound leaves the shape unchanged.
    /// Returns whether the shape changed.
    pub fn mutate_structure<R: Rng + ?Sized>(
        &mut self,
        min_hidden: usize,
        max_hidden: usize,
        rng: &mut R,
    ) -> bool {
        let hidden = self.hidden_size();
        if rng.gen_bool(0.5) {
            if hidden < max_hidden {
                self.grow_hidden(rng);
                return true;
            }
        } else if hidden > min_hidden {
            self.shrink_hidden();
            return true;
        }
        false
    }

    /// Append one hidden neuron: a new input-weight column and output-weight row
    pub fn grow_hidden<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let hidden = self.hidden_size();
        let old_in = &self.input_weights;
        let old_out = &self.output_weights;

        let input_weights = Array2::from_shape_fn((self.input_size, hidden + 1), |(i, j)| {
            if j < hidden {
                old_in[[i, j]]
            } else {
                random_weight(rng)
            }
        });
        let output_weights = Array2::from_shape_fn((hidden + 1, self.output_size), |(i, j)| {
            if i < hidden {
                old_out[[i, j]]
            } else {
                random_weight(rng)
            }
        });

        self.input_weights = input_weights;
        self.output_weights = output_weights;
    }

    /// Drop the last hidden neuron
    pub fn shrink_hidden(&mut self) {
        let hidden = self.hidden_size();
        if hidden == 0 {
            return;
        }
        self.input_weights = self.input_weights.slice(s![.., ..hidden - 1]).to_owned();
        self.output_weights = self.output_weights.slice(s![..hidden - 1, ..]).to_owned();
    }

    /// Perturb each weight with probability `rate` by N(0, power²) noise
    pub fn mutate_weights<R: Rng + ?Sized>(&mut self, rate: f32, power: f32, rng: &mut R) {
        for w in self
            .input_weights
            .iter_mut()
            .chain(self.output_weights.iter_mut())
        {
            if rng.gen::<f32>() < rate {
                *w += gaussian(rng) * power;
            }
        }
    }
}
