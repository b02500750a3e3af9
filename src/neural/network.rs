//! Two-layer feed-forward brain and its forward pass.

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Single-hidden-layer network.
///
/// `input_weights` is `[input_size × hidden_size]`, `output_weights` is
/// `[hidden_size × output_size]`. There are no biases; the decision inputs
/// carry a constant 1.0 instead.
#[derive(Clone, Debug)]
pub struct Brain {
    pub input_size: usize,
    pub output_size: usize,
    pub input_weights: Array2<f32>,
    pub output_weights: Array2<f32>,
}

/// Draw one freshly initialized weight
#[inline]
pub(crate) fn random_weight<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen_range(-1.0..1.0)
}

impl Serialize for Brain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let input_data: Vec<f32> = self.input_weights.iter().copied().collect();
        let output_data: Vec<f32> = self.output_weights.iter().copied().collect();

        let mut state = serializer.serialize_struct("Brain", 4)?;
        state.serialize_field("shape", &[self.input_size, self.hidden_size(), self.output_size])?;
        state.serialize_field("input_weights", &input_data)?;
        state.serialize_field("output_weights", &output_data)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Brain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BrainData {
            shape: [usize; 3],
            input_weights: Vec<f32>,
            output_weights: Vec<f32>,
        }

        let data = BrainData::deserialize(deserializer)?;
        let [inputs, hidden, outputs] = data.shape;
        let input_weights = Array2::from_shape_vec((inputs, hidden), data.input_weights)
            .map_err(serde::de::Error::custom)?;
        let output_weights = Array2::from_shape_vec((hidden, outputs), data.output_weights)
            .map_err(serde::de::Error::custom)?;

        Ok(Brain {
            input_size: inputs,
            output_size: outputs,
            input_weights,
            output_weights,
        })
    }
}

impl Brain {
    /// Create a network with uniformly random weights in [-1, 1)
    pub fn new_random<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Self {
        let input_weights = Array2::from_shape_fn((input_size, hidden_size), |_| random_weight(rng));
        let output_weights =
            Array2::from_shape_fn((hidden_size, output_size), |_| random_weight(rng));

        Self {
            input_size,
            output_size,
            input_weights,
            output_weights,
        }
    }

    /// Current number of hidden neurons
    #[inline]
    pub fn hidden_size(&self) -> usize {
        self.input_weights.ncols()
    }

    /// Forward pass: `relu(inputs · W1) · W2`
    pub fn forward(&self, inputs: &[f32]) -> Vec<f32> {
        debug_assert_eq!(inputs.len(), self.input_size);

        let x = Array1::from_vec(inputs.to_vec());
        let mut hidden = x.dot(&self.input_weights);
        hidden.mapv_inplace(|h| h.max(0.0));

        hidden.dot(&self.output_weights).to_vec()
    }

    /// Index of the strongest output; ties go to the lowest index
    pub fn argmax(outputs: &[f32]) -> usize {
        let mut best = 0;
        for (i, &value) in outputs.iter().enumerate().skip(1) {
            if value > outputs[best] {
                best = i;
            }
        }
        best
    }

    /// Both matrices agree on the hidden size and the I/O sizes
    pub fn is_consistent(&self) -> bool {
        self.input_weights.nrows() == self.input_size
            && self.output_weights.nrows() == self.hidden_size()
            && self.output_weights.ncols() == self.output_size
    }

    /// Get total number of weights
    pub fn parameter_count(&self) -> usize {
        self.input_weights.len() + self.output_weights.len()
    }

    /// Check if network is valid (no NaN/Inf)
    pub fn is_valid(&self) -> bool {
        self.input_weights.iter().all(|w| w.is_finite())
            && self.output_weights.iter().all(|w| w.is_finite())
    }
}
