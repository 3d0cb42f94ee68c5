use burn::tensor::{backend::Backend, Tensor};
use derive_new::new;

use crate::utils::tensors::to_ids;

/// Viterbi decoder for CRF potentials
#[derive(new, Clone, Debug)]
pub struct CrfDecoder {
    /// Number of tags, including the start and end tags
    pub tagset_size: usize,

    /// The tag every sentence is entered from
    pub start_tag: usize,

    /// The tag every sentence leaves into
    pub end_tag: usize,
}

impl CrfDecoder {
    /// Find the best tag path of every sentence.
    ///
    /// `scores` is `[batch_size, seq_length, n_tags, n_tags]` and `mask` is `1.0` on every scored
    /// position, including the trailing transition into the end tag. Each returned path has
    /// `seq_length - 1` tags; positions past a sentence's end decode to the end tag.
    pub fn decode<B: Backend>(&self, scores: Tensor<B, 4>, mask: Tensor<B, 2>) -> Vec<Vec<usize>> {
        let [batch_size, seq_length, n_tags, _] = scores.dims();

        if seq_length < 2 {
            return vec![Vec::new(); batch_size];
        }

        let mut forward_scores = scores
            .clone()
            .slice([
                0..batch_size,
                0..1,
                self.start_tag..self.start_tag + 1,
                0..n_tags,
            ])
            .reshape([batch_size, n_tags]);

        let mut back_points = Vec::with_capacity(seq_length - 1);

        for idx in 1..seq_length {
            let step = scores
                .clone()
                .slice([0..batch_size, idx..idx + 1, 0..n_tags, 0..n_tags])
                .reshape([batch_size, n_tags, n_tags]);

            let values = step
                + forward_scores
                    .reshape([batch_size, n_tags, 1])
                    .repeat(2, n_tags);

            let (best, best_from) = values.max_dim_with_indices(1);
            forward_scores = best.reshape([batch_size, n_tags]);

            // Padding always points back to the end tag, so backtracking walks through it
            let padding = mask
                .clone()
                .slice([0..batch_size, idx..idx + 1])
                .repeat(1, n_tags)
                .equal_elem(0.0);

            back_points.push(
                best_from
                    .reshape([batch_size, n_tags])
                    .mask_fill(padding, self.end_tag as i64),
            );
        }

        let last = back_points.len() - 1;
        let mut pointer = back_points[last]
            .clone()
            .slice([0..batch_size, self.end_tag..self.end_tag + 1]);

        let mut decoded = vec![pointer.clone()];

        for back_point in back_points[..last].iter().rev() {
            pointer = back_point.clone().gather(1, pointer);
            decoded.push(pointer.clone());
        }

        decoded.reverse();

        to_ids(Tensor::cat(decoded, 1))
            .chunks(seq_length - 1)
            .map(|path| path.to_vec())
            .collect()
    }
}
