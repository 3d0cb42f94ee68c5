use burn::{
    config::Config,
    module::Module,
    nn::{
        lstm::{Lstm, LstmConfig},
        Dropout, DropoutConfig, Initializer,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::utils::tensors::reverse_sequence;

/// Configuration for a stack of LSTM layers
#[derive(Config, Debug)]
pub struct StackedLstmConfig {
    /// Width of the input features
    pub d_input: usize,

    /// Hidden size of each direction
    pub d_hidden: usize,

    /// Number of stacked layers
    #[config(default = 1)]
    pub num_layers: usize,

    /// Dropout applied to the input of every layer but the first
    #[config(default = 0.0)]
    pub dropout: f64,

    /// Run a second stack over the reversed sequence and concatenate both directions
    #[config(default = false)]
    pub bidirectional: bool,
}

impl StackedLstmConfig {
    /// Initialize the stack
    pub fn init<B: Backend>(&self, device: &B::Device) -> StackedLstm<B> {
        let directions = if self.bidirectional { 2 } else { 1 };

        let layer = |i: usize| {
            let d_input = if i == 0 {
                self.d_input
            } else {
                self.d_hidden * directions
            };

            LstmConfig::new(d_input, self.d_hidden, true)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device)
        };

        let forward_layers = (0..self.num_layers).map(layer).collect();
        let backward_layers = if self.bidirectional {
            (0..self.num_layers).map(layer).collect()
        } else {
            Vec::new()
        };

        StackedLstm {
            forward_layers,
            backward_layers,
            dropout: DropoutConfig::new(self.dropout).init(),
            d_output: self.d_hidden * directions,
        }
    }
}

/// Stacked LSTM over batch-first sequences. Padding is not packed away, so the backward direction
/// reads trailing padding first.
#[derive(Module, Debug)]
pub struct StackedLstm<B: Backend> {
    /// Left-to-right layers
    pub forward_layers: Vec<Lstm<B>>,

    /// Right-to-left layers, empty for a unidirectional stack
    pub backward_layers: Vec<Lstm<B>>,

    /// Dropout between layers
    pub dropout: Dropout,

    /// Width of the output features
    pub d_output: usize,
}

impl<B: Backend> StackedLstm<B> {
    /// Run the stack over `[batch_size, seq_length, d_input]`, returning the hidden states of the
    /// top layer, `[batch_size, seq_length, d_hidden * directions]`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = input;

        for (i, forward_layer) in self.forward_layers.iter().enumerate() {
            if i > 0 {
                x = self.dropout.forward(x);
            }

            let (_, forward) = forward_layer.forward(x.clone(), None);

            x = match self.backward_layers.get(i) {
                Some(backward_layer) => {
                    let (_, backward) = backward_layer.forward(reverse_sequence(x), None);

                    Tensor::cat(vec![forward, reverse_sequence(backward)], 2)
                }
                None => forward,
            };
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use crate::{
        models::crf::tests::values,
        utils::tensors::{float_tensor, to_vec},
    };

    use super::*;

    type TestBackend = NdArray<f32>;

    fn input(last: f32) -> Tensor<TestBackend, 3> {
        let mut raw = values(4 * 3, 9);
        let n = raw.len();
        raw[n - 1] = last;

        float_tensor::<TestBackend, 3>(raw, [1, 4, 3], &Default::default())
    }

    #[test]
    fn test_unidirectional_is_causal() {
        let lstm = StackedLstmConfig::new(3, 5)
            .with_num_layers(2)
            .init::<TestBackend>(&Default::default());

        let a = to_vec(lstm.forward(input(0.0)));
        let b = to_vec(lstm.forward(input(3.0)));

        assert_eq!(a.len(), 4 * 5);
        // Only the last position sees the changed input
        assert_eq!(&a[..3 * 5], &b[..3 * 5]);
        assert_ne!(&a[3 * 5..], &b[3 * 5..]);
    }

    #[test]
    fn test_bidirectional_concatenates_directions() {
        let lstm = StackedLstmConfig::new(3, 5)
            .with_bidirectional(true)
            .init::<TestBackend>(&Default::default());

        let a = lstm.forward(input(0.0));
        assert_eq!(a.dims(), [1, 4, 10]);
        assert_eq!(lstm.d_output, 10);

        let a = to_vec(a);
        let b = to_vec(lstm.forward(input(3.0)));

        // The forward half of the first position is untouched, the backward half is not
        assert_eq!(&a[..5], &b[..5]);
        assert_ne!(&a[5..10], &b[5..10]);
    }
}
