use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Linear},
    tensor::{
        activation::{relu, sigmoid},
        backend::Backend,
        Tensor,
    },
};

use super::xavier_linear;

/// Configuration for a highway block
#[derive(Config, Debug)]
pub struct HighwayConfig {
    /// Input and output width
    pub size: usize,

    /// Number of stacked highway layers
    #[config(default = 1)]
    pub num_layers: usize,

    /// Dropout applied between layers
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl HighwayConfig {
    /// Initialize a highway block
    pub fn init<B: Backend>(&self, device: &B::Device) -> Highway<B> {
        let linear = || xavier_linear(self.size, self.size, device);

        Highway {
            trans: (0..self.num_layers).map(|_| linear()).collect(),
            gate: (0..self.num_layers).map(|_| linear()).collect(),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Gated residual projection: `x = g * relu(W_t x) + (1 - g) * x` with `g = sigmoid(W_g x)`
#[derive(Module, Debug)]
pub struct Highway<B: Backend> {
    /// Transform layers
    pub trans: Vec<Linear<B>>,

    /// Gate layers
    pub gate: Vec<Linear<B>>,

    /// Dropout between layers
    pub dropout: Dropout,
}

impl<B: Backend> Highway<B> {
    /// Apply the block to the last dimension of the input
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let mut x = input;

        for (i, (trans, gate)) in self.trans.iter().zip(&self.gate).enumerate() {
            if i > 0 {
                x = self.dropout.forward(x);
            }

            let g = sigmoid(gate.forward(x.clone()));
            let h = relu(trans.forward(x.clone()));

            x = g.clone() * h + g.neg().add_scalar(1.0) * x;
        }

        x
    }
}

/// The highway blocks of the character encoder
#[derive(Module, Debug)]
pub struct CharHighways<B: Backend> {
    /// Forward char LSTM output to the forward language model
    pub forw2word: Highway<B>,

    /// Backward char LSTM output to the backward language model
    pub back2word: Highway<B>,

    /// Concatenated forward and backward char features to the word encoder
    pub fb2char: Highway<B>,
}

impl<B: Backend> CharHighways<B> {
    /// Initialize the highway blocks for a char LSTM of width `char_hidden_dim`
    pub fn new(
        char_hidden_dim: usize,
        num_layers: usize,
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        let config = HighwayConfig::new(char_hidden_dim)
            .with_num_layers(num_layers)
            .with_dropout(dropout);

        Self {
            forw2word: config.init(device),
            back2word: config.init(device),
            fb2char: HighwayConfig {
                size: 2 * char_hidden_dim,
                ..config.clone()
            }
            .init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, module::Param, nn::LinearRecord};
    use pretty_assertions::assert_eq;

    use crate::utils::tensors::{float_tensor, to_vec};

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_closed_gate_is_identity() {
        let device = Default::default();
        let mut highway = HighwayConfig::new(3).init::<TestBackend>(&device);

        // A strongly negative gate bias shuts the transform path
        let gate = highway.gate.remove(0);
        let gate = gate.load_record(LinearRecord {
            weight: Param::from_tensor(Tensor::zeros([3, 3], &device)),
            bias: Some(Param::from_tensor(
                Tensor::ones([3], &device).mul_scalar(-100.0),
            )),
        });
        highway.gate.push(gate);

        let input = float_tensor::<TestBackend, 2>(vec![0.5, -1.0, 2.0], [1, 3], &device);

        let output = to_vec(highway.forward(input.clone()));

        for (actual, expected) in output.iter().zip(to_vec(input)) {
            assert!((actual - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_keeps_shape_across_layers() {
        let device = Default::default();
        let highway = HighwayConfig::new(4)
            .with_num_layers(3)
            .init::<TestBackend>(&device);

        let input = float_tensor::<TestBackend, 3>(vec![0.1; 2 * 5 * 4], [2, 5, 4], &device);

        assert_eq!(highway.trans.len(), 3);
        assert_eq!(highway.forward(input).dims(), [2, 5, 4]);
    }

    #[test]
    fn test_char_highways_sizes() {
        let device = Default::default();
        let highways = CharHighways::<TestBackend>::new(3, 2, 0.5, &device);

        assert_eq!(highways.forw2word.trans[0].weight.val().dims(), [3, 3]);
        assert_eq!(highways.back2word.gate.len(), 2);
        assert_eq!(highways.fb2char.trans[0].weight.val().dims(), [6, 6]);
    }
}
