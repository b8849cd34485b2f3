//! Two-hidden-layer perceptron shared by actors and critics.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Fully connected network: `input -> units -> units -> output`, ReLU
/// between layers and a linear head.
#[derive(Module, Debug)]
pub struct MlpModel<B: Backend> {
    hidden_0: Linear<B>,
    hidden_1: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> MlpModel<B> {
    /// Forward pass over a `[batch, input]` tensor.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.hidden_0.forward(x));
        let x = relu(self.hidden_1.forward(x));
        self.output.forward(x)
    }
}

/// Layer sizes for [`MlpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlpConfig {
    /// Input width.
    pub input: usize,
    /// Output width.
    pub output: usize,
    /// Width of both hidden layers.
    pub num_units: usize,
}

impl MlpConfig {
    /// Create a config with 64 hidden units.
    pub fn new(input: usize, output: usize) -> Self {
        Self {
            input,
            output,
            num_units: 64,
        }
    }

    /// Set the hidden layer width.
    pub fn with_num_units(mut self, units: usize) -> Self {
        self.num_units = units;
        self
    }

    /// Initialize a fresh model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpModel<B> {
        MlpModel {
            hidden_0: LinearConfig::new(self.input, self.num_units).init(device),
            hidden_1: LinearConfig::new(self.num_units, self.num_units).init(device),
            output: LinearConfig::new(self.num_units, self.output).init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = MlpConfig::new(6, 3).with_num_units(16).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 2>::zeros([5, 6], &device);
        assert_eq!(model.forward(input).dims(), [5, 3]);
    }

    #[test]
    fn test_num_params() {
        let device = Default::default();
        let model = MlpConfig::new(4, 2).with_num_units(8).init::<TestBackend>(&device);
        // (4*8 + 8) + (8*8 + 8) + (8*2 + 2)
        assert_eq!(model.num_params(), 40 + 72 + 18);
    }
}
