use burn::{
    tensor::{backend::Backend, Tensor},
    train::metric::{Adaptor, LossInput},
};
use derive_new::new;

/// Training output adapted for the loss metric
#[derive(new)]
pub struct Output<B: Backend> {
    /// The loss that is optimized
    pub loss: Tensor<B, 1>,

    /// The CRF negative log-likelihood alone
    pub crf_loss: Tensor<B, 1>,

    /// The summed forward and backward word prediction losses, when co-training
    pub lm_loss: Option<Tensor<B, 1>>,
}

impl<B: Backend> Adaptor<LossInput<B>> for Output<B> {
    fn adapt(&self) -> LossInput<B> {
        LossInput::new(self.loss.clone())
    }
}
