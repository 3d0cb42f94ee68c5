/// Linear-chain CRF heads, loss and decoding
pub mod crf;

/// Self-attention word encoder
pub mod attention;

/// Highway blocks
pub mod highway;

/// Stacked LSTMs
pub mod lstm;

/// The sequence tagger
pub mod tagger;

use burn::{
    module::Param,
    nn::{Initializer, Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};

/// A linear layer with Xavier uniform weights and a zero bias
pub fn xavier_linear<B: Backend>(d_input: usize, d_output: usize, device: &B::Device) -> Linear<B> {
    let mut linear = LinearConfig::new(d_input, d_output)
        .with_initializer(Initializer::XavierUniform { gain: 1.0 })
        .init(device);

    linear.bias = linear
        .bias
        .map(|_| Param::from_tensor(Tensor::zeros([d_output], device)));

    linear
}

/// Model Error
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// Pre-trained word vectors don't fit the word embedding table
    #[error("expected a {expected:?} word embedding, found {found:?}")]
    EmbeddingShape {
        /// `[vocab_size, word_dim]` of the model
        expected: [usize; 2],

        /// Shape of the given weights
        found: [usize; 2],
    },

    /// A corpus index without a CRF head
    #[error("corpus {file_no} has no CRF head, the model has {file_num}")]
    UnknownFile {
        /// The requested corpus
        file_no: usize,

        /// Number of heads
        file_num: usize,
    },
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use crate::utils::tensors::to_vec;

    use super::*;

    #[test]
    fn test_xavier_linear_has_zero_bias() {
        let linear = xavier_linear::<NdArray<f32>>(4, 3, &Default::default());

        let bias = linear.bias.map(|bias| to_vec(bias.val()));

        assert_eq!(bias, Some(vec![0.0; 3]));
        assert!(to_vec(linear.weight.val()).iter().any(|w| *w != 0.0));
    }
}
