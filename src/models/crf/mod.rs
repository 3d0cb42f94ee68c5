//! Linear-chain CRF output layers.
//!
//! Every head turns word-level features into a `[batch_size, seq_length, n_tags, n_tags]` tensor
//! of potentials, where `scores[b, l, i, j]` is the score of moving from tag `i` at position
//! `l - 1` to tag `j` at position `l`. Position 0 is always entered from the start tag.

/// CRF negative log-likelihood
pub mod loss;

/// Viterbi decoding
pub mod decode;

use burn::{
    config::Config,
    module::{Module, Param},
    nn::Linear,
    tensor::{backend::Backend, Tensor},
};

use super::xavier_linear;

pub use decode::CrfDecoder;
pub use loss::{CrfLoss, CrfLossConfig};

/// Configuration for a CRF head
#[derive(Config, Debug)]
pub struct CrfConfig {
    /// Width of the incoming word features
    pub hidden_dim: usize,

    /// Number of tags, including the start and end tags
    pub tagset_size: usize,

    /// Predict every transition score directly from the features (`n_tags * n_tags` outputs).
    /// When disabled, features only produce emission scores and a shared transition matrix is
    /// learned.
    #[config(default = true)]
    pub large: bool,
}

impl CrfConfig {
    /// Initialize a CRF head
    pub fn init<B: Backend>(&self, device: &B::Device) -> Crf<B> {
        let n_outputs = if self.large {
            self.tagset_size * self.tagset_size
        } else {
            self.tagset_size
        };

        let hidden2tag = xavier_linear(self.hidden_dim, n_outputs, device);

        let transitions = (!self.large).then(|| {
            Param::from_tensor(Tensor::zeros(
                [self.tagset_size, self.tagset_size],
                device,
            ))
        });

        Crf {
            hidden2tag,
            transitions,
            tagset_size: self.tagset_size,
        }
    }
}

/// A CRF head
#[derive(Module, Debug)]
pub struct Crf<B: Backend> {
    /// Projection from word features to transition (large) or emission (small) scores
    pub hidden2tag: Linear<B>,

    /// Learned `[from, to]` transition matrix, only present for small heads
    pub transitions: Option<Param<Tensor<B, 2>>>,

    /// Number of tags
    pub tagset_size: usize,
}

impl<B: Backend> Crf<B> {
    /// Compute `[batch_size, seq_length, n_tags, n_tags]` potentials from `[batch_size, seq_length,
    /// hidden_dim]` features
    pub fn forward(&self, feats: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch_size, seq_length, _] = feats.dims();
        let n_tags = self.tagset_size;

        let scores = self.hidden2tag.forward(feats);

        match &self.transitions {
            None => scores.reshape([batch_size, seq_length, n_tags, n_tags]),
            Some(transitions) => {
                let emissions = scores
                    .reshape([batch_size, seq_length, 1, n_tags])
                    .repeat(2, n_tags);

                let transitions = transitions
                    .val()
                    .reshape([1, 1, n_tags, n_tags])
                    .repeat(0, batch_size)
                    .repeat(1, seq_length);

                emissions + transitions
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use crate::utils::tensors::{float_tensor, to_vec};

    use super::*;

    pub type TestBackend = NdArray<f32>;

    /// Deterministic pseudo-random values in [-1, 1)
    pub fn values(n: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);

        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);

                ((state >> 33) as f32 / (1u64 << 31) as f32) * 2.0 - 1.0
            })
            .collect()
    }

    /// Score of a tag path through flattened `[seq_length, n_tags, n_tags]` potentials of one
    /// sentence, entering from `start` and leaving into `end` after the last tag
    pub fn path_score(
        scores: &[f32],
        n_tags: usize,
        path: &[usize],
        start: usize,
        end: usize,
    ) -> f32 {
        let at = |l: usize, from: usize, to: usize| scores[(l * n_tags + from) * n_tags + to];

        let mut score = at(0, start, path[0]);
        for l in 1..path.len() {
            score += at(l, path[l - 1], path[l]);
        }

        score + at(path.len(), path[path.len() - 1], end)
    }

    /// Every tag path of the given length
    pub fn all_paths(n_tags: usize, length: usize) -> Vec<Vec<usize>> {
        (0..n_tags.pow(length as u32))
            .map(|mut code| {
                (0..length)
                    .map(|_| {
                        let tag = code % n_tags;
                        code /= n_tags;
                        tag
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_large_crf_shape() {
        let device = Default::default();
        let crf = CrfConfig::new(6, 4).init::<TestBackend>(&device);

        let feats = float_tensor::<TestBackend, 3>(values(2 * 3 * 6, 1), [2, 3, 6], &device);

        assert!(crf.transitions.is_none());
        assert_eq!(crf.forward(feats).dims(), [2, 3, 4, 4]);
    }

    #[test]
    fn test_small_crf_adds_transitions_to_emissions() {
        let device = Default::default();
        let mut crf = CrfConfig::new(2, 3)
            .with_large(false)
            .init::<TestBackend>(&device);

        let transitions = values(9, 3);
        crf.transitions = Some(Param::from_tensor(float_tensor::<TestBackend, 2>(
            transitions.clone(),
            [3, 3],
            &device,
        )));

        let feats = float_tensor::<TestBackend, 3>(vec![0.3, -0.7], [1, 1, 2], &device);

        let emissions = to_vec(crf.hidden2tag.forward(feats.clone()));
        let scores = to_vec(crf.forward(feats));

        assert_eq!(scores.len(), 9);
        for from in 0..3 {
            for to in 0..3 {
                let expected = emissions[to] + transitions[from * 3 + to];
                assert!((scores[from * 3 + to] - expected).abs() < 1e-5);
            }
        }
    }
}
