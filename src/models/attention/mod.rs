//! Multi-head self-attention encoder over word sequences

/// Sinusoid position encodings
pub mod position;

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Initializer, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    tensor::{
        activation::{relu, softmax},
        backend::Backend,
        Bool, Tensor,
    },
};

/// Pre-softmax score given to masked keys
const MASKED_SCORE: f32 = -1.0e9;

/// Build the `[batch_size, n_head, len_q, len_k]` key padding mask from a `[batch_size, len_k]`
/// word mask (`1.0` on real words). `true` marks keys that must not be attended to.
pub fn key_padding_mask<B: Backend>(
    word_mask: Tensor<B, 2>,
    n_head: usize,
    len_q: usize,
) -> Tensor<B, 4, Bool> {
    let [batch_size, len_k] = word_mask.dims();

    word_mask
        .reshape([batch_size, 1, 1, len_k])
        .repeat(1, n_head)
        .repeat(2, len_q)
        .equal_elem(0.0)
}

/// Softmax attention scaled by a temperature
#[derive(Module, Debug)]
pub struct ScaledDotProductAttention<B: Backend> {
    /// Dropout on the attention probabilities
    pub dropout: Dropout,

    /// Divisor of the query-key products, `sqrt(d_k)`
    pub temperature: f64,

    _backend: std::marker::PhantomData<B>,
}

impl<B: Backend> ScaledDotProductAttention<B> {
    /// Attend `[batch, heads, len_q, d_k]` queries over keys and values, returning the attended
    /// values and the attention probabilities
    pub fn forward(
        &self,
        q: Tensor<B, 4>,
        k: Tensor<B, 4>,
        v: Tensor<B, 4>,
        mask: Option<Tensor<B, 4, Bool>>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let scores = q.matmul(k.swap_dims(2, 3)).div_scalar(self.temperature);

        let scores = match mask {
            Some(mask) => scores.mask_fill(mask, MASKED_SCORE),
            None => scores,
        };

        let attn = self.dropout.forward(softmax(scores, 3));

        (attn.clone().matmul(v), attn)
    }
}

/// Configuration for multi-head attention with independent key and value widths
#[derive(Config, Debug)]
pub struct MultiHeadAttentionConfig {
    /// Width of the input and output features
    pub d_model: usize,

    /// Number of heads
    #[config(default = 8)]
    pub n_head: usize,

    /// Query and key width per head
    #[config(default = 64)]
    pub d_k: usize,

    /// Value width per head
    #[config(default = 64)]
    pub d_v: usize,

    /// Dropout on attention probabilities and on the output projection
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl MultiHeadAttentionConfig {
    /// Initialize the attention block
    pub fn init<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        let projection = |d_out: usize, d_head: usize| {
            LinearConfig::new(self.d_model, d_out)
                .with_initializer(Initializer::Normal {
                    mean: 0.0,
                    std: (2.0 / (self.d_model + d_head) as f64).sqrt(),
                })
                .init(device)
        };

        MultiHeadAttention {
            w_qs: projection(self.n_head * self.d_k, self.d_k),
            w_ks: projection(self.n_head * self.d_k, self.d_k),
            w_vs: projection(self.n_head * self.d_v, self.d_v),
            attention: ScaledDotProductAttention {
                dropout: DropoutConfig::new(self.dropout).init(),
                temperature: (self.d_k as f64).sqrt(),
                _backend: std::marker::PhantomData,
            },
            layer_norm: LayerNormConfig::new(self.d_model).init(device),
            fc: LinearConfig::new(self.n_head * self.d_v, self.d_model)
                .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            n_head: self.n_head,
            d_k: self.d_k,
            d_v: self.d_v,
        }
    }
}

/// Multi-head attention with a residual connection and layer normalization
#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    /// Query projection
    pub w_qs: Linear<B>,

    /// Key projection
    pub w_ks: Linear<B>,

    /// Value projection
    pub w_vs: Linear<B>,

    /// Per-head attention
    pub attention: ScaledDotProductAttention<B>,

    /// Normalization of the residual sum
    pub layer_norm: LayerNorm<B>,

    /// Output projection of the concatenated heads
    pub fc: Linear<B>,

    /// Dropout on the output projection
    pub dropout: Dropout,

    /// Number of heads
    pub n_head: usize,

    /// Query and key width per head
    pub d_k: usize,

    /// Value width per head
    pub d_v: usize,
}

impl<B: Backend> MultiHeadAttention<B> {
    /// Attend `[batch_size, len_q, d_model]` queries over keys and values. Returns the normalized
    /// output and the `[batch_size, n_head, len_q, len_k]` attention probabilities.
    pub fn forward(
        &self,
        q: Tensor<B, 3>,
        k: Tensor<B, 3>,
        v: Tensor<B, 3>,
        mask: Option<Tensor<B, 4, Bool>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch_size, len_q, _] = q.dims();
        let [_, len_k, _] = k.dims();

        let residual = q.clone();

        let heads = |x: Tensor<B, 3>, len: usize, d_head: usize| {
            x.reshape([batch_size, len, self.n_head, d_head])
                .swap_dims(1, 2)
        };

        let q = heads(self.w_qs.forward(q), len_q, self.d_k);
        let k = heads(self.w_ks.forward(k), len_k, self.d_k);
        let v = heads(self.w_vs.forward(v), len_k, self.d_v);

        let (output, attn) = self.attention.forward(q, k, v, mask);

        let output = output
            .swap_dims(1, 2)
            .reshape([batch_size, len_q, self.n_head * self.d_v]);

        let output = self.dropout.forward(self.fc.forward(output));

        (self.layer_norm.forward(output + residual), attn)
    }
}

/// Configuration for the position-wise feed-forward block
#[derive(Config, Debug)]
pub struct PositionwiseFeedForwardConfig {
    /// Width of the input and output features
    pub d_in: usize,

    /// Width of the inner layer
    pub d_hid: usize,

    /// Dropout on the block output
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl PositionwiseFeedForwardConfig {
    /// Initialize the block
    pub fn init<B: Backend>(&self, device: &B::Device) -> PositionwiseFeedForward<B> {
        PositionwiseFeedForward {
            w_1: LinearConfig::new(self.d_in, self.d_hid).init(device),
            w_2: LinearConfig::new(self.d_hid, self.d_in).init(device),
            layer_norm: LayerNormConfig::new(self.d_in).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Two position-wise linear layers with a residual connection and layer normalization
#[derive(Module, Debug)]
pub struct PositionwiseFeedForward<B: Backend> {
    /// Inner layer
    pub w_1: Linear<B>,

    /// Output layer
    pub w_2: Linear<B>,

    /// Normalization of the residual sum
    pub layer_norm: LayerNorm<B>,

    /// Dropout on the block output
    pub dropout: Dropout,
}

impl<B: Backend> PositionwiseFeedForward<B> {
    /// Apply the block to `[batch_size, seq_length, d_in]`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let output = self.w_2.forward(relu(self.w_1.forward(input.clone())));

        self.layer_norm.forward(self.dropout.forward(output) + input)
    }
}

/// Configuration for a stack of self-attention encoder layers
#[derive(Config, Debug)]
pub struct EncoderConfig {
    /// Width of the input and output features
    pub d_model: usize,

    /// Width of the feed-forward inner layer
    pub d_inner: usize,

    /// Number of stacked layers
    #[config(default = 1)]
    pub n_layers: usize,

    /// Number of heads
    #[config(default = 8)]
    pub n_head: usize,

    /// Query and key width per head
    #[config(default = 64)]
    pub d_k: usize,

    /// Value width per head
    #[config(default = 64)]
    pub d_v: usize,

    /// Dropout rate
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl EncoderConfig {
    /// Initialize the encoder
    pub fn init<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let attention = MultiHeadAttentionConfig::new(self.d_model)
            .with_n_head(self.n_head)
            .with_d_k(self.d_k)
            .with_d_v(self.d_v)
            .with_dropout(self.dropout);

        let feed_forward = PositionwiseFeedForwardConfig::new(self.d_model, self.d_inner)
            .with_dropout(self.dropout);

        let layers = (0..self.n_layers)
            .map(|_| EncoderLayer {
                slf_attn: attention.init(device),
                pos_ffn: feed_forward.init(device),
            })
            .collect();

        Encoder {
            layers,
            n_head: self.n_head,
        }
    }
}

/// Self-attention followed by a position-wise feed-forward block
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    /// Self-attention block
    pub slf_attn: MultiHeadAttention<B>,

    /// Feed-forward block
    pub pos_ffn: PositionwiseFeedForward<B>,
}

impl<B: Backend> EncoderLayer<B> {
    /// Encode `[batch_size, seq_length, d_model]`. Both block outputs are zeroed at padding via the
    /// `[batch_size, seq_length, d_model]` non-pad mask.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        non_pad_mask: Tensor<B, 3>,
        slf_attn_mask: Tensor<B, 4, Bool>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (output, attn) =
            self.slf_attn
                .forward(input.clone(), input.clone(), input, Some(slf_attn_mask));
        let output = output * non_pad_mask.clone();

        let output = self.pos_ffn.forward(output) * non_pad_mask;

        (output, attn)
    }
}

/// A stack of encoder layers
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    /// Encoder layers
    pub layers: Vec<EncoderLayer<B>>,

    /// Number of heads per layer
    pub n_head: usize,
}

impl<B: Backend> Encoder<B> {
    /// Encode `[batch_size, seq_length, d_model]` features, where `word_mask` is `1.0` on real
    /// words. Padded positions are neither attended to nor carried in the output.
    pub fn forward(&self, input: Tensor<B, 3>, word_mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch_size, seq_length, d_model] = input.dims();

        let slf_attn_mask = key_padding_mask(word_mask.clone(), self.n_head, seq_length);
        let non_pad_mask = word_mask
            .reshape([batch_size, seq_length, 1])
            .repeat(2, d_model);

        self.layers.iter().fold(input, |output, layer| {
            let (output, _) = layer.forward(output, non_pad_mask.clone(), slf_attn_mask.clone());
            output
        })
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

    const D_MODEL: usize = 8;

    fn mask() -> Tensor<TestBackend, 2> {
        // Three real words then one padding position
        float_tensor(vec![1.0, 1.0, 1.0, 0.0], [1, 4], &Default::default())
    }

    #[test]
    fn test_attention_ignores_padded_keys() {
        let device = Default::default();
        let attention = MultiHeadAttentionConfig::new(D_MODEL)
            .with_n_head(2)
            .with_d_k(4)
            .with_d_v(3)
            .init::<TestBackend>(&device);

        let input = float_tensor::<TestBackend, 3>(values(4 * D_MODEL, 2), [1, 4, D_MODEL], &device);

        let (output, attn) = attention.forward(
            input.clone(),
            input.clone(),
            input,
            Some(key_padding_mask(mask(), 2, 4)),
        );

        assert_eq!(output.dims(), [1, 4, D_MODEL]);
        assert_eq!(attn.dims(), [1, 2, 4, 4]);

        let attn = to_vec(attn);
        for row in attn.chunks(4) {
            assert!(row[3].abs() < 1e-12);
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_encoder_is_blind_to_padding_content() {
        let device = Default::default();
        let encoder = EncoderConfig::new(D_MODEL, 6)
            .with_n_layers(2)
            .with_n_head(2)
            .with_d_k(4)
            .with_d_v(4)
            .init::<TestBackend>(&device);

        let mut raw = values(4 * D_MODEL, 4);
        let a = to_vec(encoder.forward(
            float_tensor::<TestBackend, 3>(raw.clone(), [1, 4, D_MODEL], &device),
            mask(),
        ));

        for value in raw[3 * D_MODEL..].iter_mut() {
            *value += 5.0;
        }
        let b = to_vec(encoder.forward(
            float_tensor::<TestBackend, 3>(raw, [1, 4, D_MODEL], &device),
            mask(),
        ));

        for (x, y) in a[..3 * D_MODEL].iter().zip(&b[..3 * D_MODEL]) {
            assert!((x - y).abs() < 1e-5);
        }

        // Padding is zeroed in the output
        assert!(a[3 * D_MODEL..].iter().all(|v| *v == 0.0));
    }
}
