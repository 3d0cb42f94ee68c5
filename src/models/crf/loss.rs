use burn::{
    config::Config,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::utils::tensors::log_sum_exp;

/// Configuration for the CRF negative log-likelihood
#[derive(Config, Debug)]
pub struct CrfLossConfig {
    /// Number of tags, including the start and end tags
    pub tagset_size: usize,

    /// The tag every sentence is entered from
    pub start_tag: usize,

    /// The tag every sentence leaves into
    pub end_tag: usize,

    /// Divide the summed loss by the batch size
    #[config(default = false)]
    pub average_batch: bool,
}

impl CrfLossConfig {
    /// Initialize the loss
    pub fn init(&self) -> CrfLoss {
        CrfLoss {
            tagset_size: self.tagset_size,
            start_tag: self.start_tag,
            end_tag: self.end_tag,
            average_batch: self.average_batch,
        }
    }
}

/// Negative log-likelihood of gold tag paths under a linear-chain CRF.
///
/// Targets encode each step as `from * n_tags + to`. The mask is `1.0` on every scored
/// position, which includes the trailing transition into the end tag.
#[derive(Clone, Debug)]
pub struct CrfLoss {
    tagset_size: usize,
    start_tag: usize,
    end_tag: usize,
    average_batch: bool,
}

impl CrfLoss {
    /// Compute the loss over a batch: `sum(log Z) - sum(gold)`
    pub fn forward<B: Backend>(
        &self,
        scores: Tensor<B, 4>,
        targets: Tensor<B, 2, Int>,
        mask: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let [batch_size, _, _, _] = scores.dims();

        let gold = self.gold_scores(scores.clone(), targets, mask.clone());
        let partition = self.log_partition(scores, mask);

        let loss = (partition - gold).sum();

        if self.average_batch {
            loss.div_scalar(batch_size as f32)
        } else {
            loss
        }
    }

    /// Score of the target path of every sentence, `[batch_size]`
    pub fn gold_scores<B: Backend>(
        &self,
        scores: Tensor<B, 4>,
        targets: Tensor<B, 2, Int>,
        mask: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let [batch_size, seq_length, n_tags, _] = scores.dims();

        let energy = scores
            .reshape([batch_size, seq_length, n_tags * n_tags])
            .gather(2, targets.reshape([batch_size, seq_length, 1]))
            .reshape([batch_size, seq_length]);

        (energy * mask).sum_dim(1).reshape([batch_size])
    }

    /// Log of the partition function of every sentence, `[batch_size]`
    pub fn log_partition<B: Backend>(&self, scores: Tensor<B, 4>, mask: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch_size, seq_length, n_tags, _] = scores.dims();
        debug_assert_eq!(n_tags, self.tagset_size);

        let mut partition = scores
            .clone()
            .slice([
                0..batch_size,
                0..1,
                self.start_tag..self.start_tag + 1,
                0..n_tags,
            ])
            .reshape([batch_size, n_tags]);

        for idx in 1..seq_length {
            let step = scores
                .clone()
                .slice([0..batch_size, idx..idx + 1, 0..n_tags, 0..n_tags])
                .reshape([batch_size, n_tags, n_tags]);

            let values = step + partition.clone().reshape([batch_size, n_tags, 1]).repeat(2, n_tags);
            let next = log_sum_exp(values, 1).reshape([batch_size, n_tags]);

            // Padding leaves the running partition untouched
            let scored = mask
                .clone()
                .slice([0..batch_size, idx..idx + 1])
                .repeat(1, n_tags)
                .equal_elem(1.0);

            partition = partition.mask_where(scored, next);
        }

        partition
            .slice([0..batch_size, self.end_tag..self.end_tag + 1])
            .reshape([batch_size])
    }
}
