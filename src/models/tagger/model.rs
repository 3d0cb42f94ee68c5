use burn::{
    module::{Module, Param},
    nn::{loss::CrossEntropyLossConfig, Dropout, Embedding, Linear},
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    models::{
        attention::Encoder,
        crf::{Crf, CrfDecoder, CrfLossConfig},
        highway::{CharHighways, Highway},
        lstm::StackedLstm,
        ModelError,
    },
    pipelines::sequence_labeling::{batcher::Infer, Output, Train},
    utils::tensors::select_positions,
};

/// Self-attention word encoder over `[word embedding ; char features ; position encoding]`
#[derive(Module, Debug)]
pub struct AttentionEncoder<B: Backend> {
    /// Frozen sinusoid position table
    pub position_enc: Embedding<B>,

    /// Self-attention layers
    pub encoder: Encoder<B>,

    /// Projection to the CRF input width
    pub fc: Linear<B>,
}

impl<B: Backend> AttentionEncoder<B> {
    /// Encode `[batch_size, seq_length, word_dim + 2 * char_hidden_dim]` features
    pub fn forward(
        &self,
        word_input: Tensor<B, 3>,
        word_positions: Tensor<B, 2, Int>,
        word_mask: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let positions = self.position_enc.forward(word_positions);

        let output = self
            .encoder
            .forward(Tensor::cat(vec![word_input, positions], 2), word_mask);

        self.fc.forward(output)
    }
}

/// LSTM-CRF tagger with one CRF head per corpus
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    /// Character embeddings
    pub char_embeds: Embedding<B>,

    /// Left-to-right character LSTM
    pub forw_char_lstm: StackedLstm<B>,

    /// Character LSTM over the reversed stream
    pub back_char_lstm: StackedLstm<B>,

    /// Word embeddings
    pub word_embeds: Embedding<B>,

    /// Bidirectional word LSTM, absent when words are encoded with self-attention
    pub word_lstm: Option<StackedLstm<B>>,

    /// Self-attention word encoder
    pub attention: Option<AttentionEncoder<B>>,

    /// CRF heads, one per corpus
    pub crfs: Vec<Crf<B>>,

    /// Highway projections of the character features
    pub highways: Option<CharHighways<B>>,

    /// Word prediction head shared by both language models
    pub word_lm_out: Linear<B>,

    /// Dropout
    pub dropout: Dropout,

    /// Hidden size of each character LSTM
    pub char_hidden_dim: usize,

    /// Number of CRF tags
    pub tagset_size: usize,

    /// CRF start tag
    pub start_tag: usize,

    /// CRF end tag
    pub end_tag: usize,

    /// Add the word prediction losses to the CRF loss
    pub co_train: bool,

    /// Weight of the word prediction losses
    pub lm_weight: f64,

    /// Average the CRF loss over the batch
    pub average_batch: bool,
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// Compute `[batch_size, seq_length, n_tags, n_tags]` CRF potentials, each sentence scored by
    /// the head of its corpus
    pub fn forward(&self, input: Infer<B>) -> Tensor<B, 4> {
        let (forw_states, back_states) = self.char_states(&input);

        self.crf_scores(&input, forw_states, back_states)
    }

    /// Forward language model logits, `[batch_size * n_positions, in_doc_words]`, for the states
    /// of `chars` at `positions`
    pub fn word_lm_forward(
        &self,
        chars: Tensor<B, 2, Int>,
        positions: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let states = self.char_lstm(&self.forw_char_lstm, chars);

        self.word_lm(states, positions, self.highways.as_ref().map(|h| &h.forw2word))
    }

    /// Backward language model logits over the reversed character stream
    pub fn word_lm_backward(
        &self,
        chars: Tensor<B, 2, Int>,
        positions: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let states = self.char_lstm(&self.back_char_lstm, chars);

        self.word_lm(states, positions, self.highways.as_ref().map(|h| &h.back2word))
    }

    /// Defines forward pass for training
    pub fn forward_loss(&self, item: Train<B>) -> Output<B> {
        let Train {
            input,
            targets,
            lm_targets,
        } = item;

        let (forw_states, back_states) = self.char_states(&input);

        let scores = self.crf_scores(&input, forw_states.clone(), back_states.clone());

        let crf_loss = CrfLossConfig::new(self.tagset_size, self.start_tag, self.end_tag)
            .with_average_batch(self.average_batch)
            .init()
            .forward(scores, targets, input.mask.clone());

        let [batch_size, seq_length] = lm_targets.dims();

        if !self.co_train || seq_length < 2 {
            return Output::new(crf_loss.clone(), crf_loss, None);
        }

        let n = batch_size * (seq_length - 1);
        let cross_entropy = CrossEntropyLossConfig::new().init(&lm_targets.device());

        // The state after word i predicts word i + 1
        let forw_logits = self.word_lm(
            forw_states,
            input.forw_positions.slice([0..batch_size, 0..seq_length - 1]),
            self.highways.as_ref().map(|h| &h.forw2word),
        );
        let lm_forward = cross_entropy.forward(
            forw_logits,
            lm_targets
                .clone()
                .slice([0..batch_size, 1..seq_length])
                .reshape([n]),
        );

        // The reversed state that has read word i + 1 predicts word i
        let back_logits = self.word_lm(
            back_states,
            input.back_positions.slice([0..batch_size, 1..seq_length]),
            self.highways.as_ref().map(|h| &h.back2word),
        );
        let lm_backward = cross_entropy.forward(
            back_logits,
            lm_targets
                .slice([0..batch_size, 0..seq_length - 1])
                .reshape([n]),
        );

        let lm_loss = lm_forward + lm_backward;
        let loss = crf_loss.clone() + lm_loss.clone().mul_scalar(self.lm_weight);

        Output::new(loss, crf_loss, Some(lm_loss))
    }

    /// Viterbi label ids of every sentence, one per word
    pub fn decode(&self, input: Infer<B>) -> Vec<Vec<usize>> {
        let lengths = input.lengths.clone();
        let mask = input.mask.clone();

        let decoder = CrfDecoder::new(self.tagset_size, self.start_tag, self.end_tag);

        decoder
            .decode(self.forward(input), mask)
            .into_iter()
            .zip(lengths)
            .map(|(mut path, length)| {
                path.truncate(length);
                path
            })
            .collect()
    }

    /// Replace the word embeddings with pre-trained `[vocab_size, word_dim]` weights
    pub fn load_pretrained_word_embedding(
        mut self,
        weights: Tensor<B, 2>,
    ) -> Result<Self, ModelError> {
        let expected = self.word_embeds.weight.val().dims();
        let found = weights.dims();

        if expected != found {
            return Err(ModelError::EmbeddingShape { expected, found });
        }

        self.word_embeds.weight = Param::from_tensor(weights);

        Ok(self)
    }

    fn char_lstm(&self, lstm: &StackedLstm<B>, chars: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let embeds = self.dropout.forward(self.char_embeds.forward(chars));

        lstm.forward(embeds)
    }

    /// Character LSTM states over both streams, `[batch_size, char_length, char_hidden_dim]`
    fn char_states(&self, input: &Infer<B>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        (
            self.char_lstm(&self.forw_char_lstm, input.forw_chars.clone()),
            self.char_lstm(&self.back_char_lstm, input.back_chars.clone()),
        )
    }

    fn word_lm(
        &self,
        states: Tensor<B, 3>,
        positions: Tensor<B, 2, Int>,
        highway: Option<&Highway<B>>,
    ) -> Tensor<B, 2> {
        let [batch_size, n_positions] = positions.dims();

        let selected = self
            .dropout
            .forward(select_positions(states, positions))
            .reshape([batch_size * n_positions, self.char_hidden_dim]);

        let features = match highway {
            Some(highway) => self.dropout.forward(highway.forward(selected)),
            None => selected,
        };

        self.word_lm_out.forward(features)
    }

    /// Word features fed to the CRF heads, `[batch_size, seq_length, word_hidden_dim]`
    fn word_features(
        &self,
        input: &Infer<B>,
        forw_states: Tensor<B, 3>,
        back_states: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let forw = select_positions(forw_states, input.forw_positions.clone());
        let back = select_positions(back_states, input.back_positions.clone());

        let chars = self.dropout.forward(Tensor::cat(vec![forw, back], 2));
        let chars = match &self.highways {
            Some(highways) => self.dropout.forward(highways.fb2char.forward(chars)),
            None => chars,
        };

        let words = self
            .dropout
            .forward(self.word_embeds.forward(input.words.clone()));
        let word_input = Tensor::cat(vec![words, chars], 2);

        match (&self.attention, &self.word_lstm) {
            (Some(attention), _) => attention.forward(
                word_input,
                input.word_positions.clone(),
                input.word_mask.clone(),
            ),
            (None, Some(word_lstm)) => self.dropout.forward(word_lstm.forward(word_input)),
            (None, None) => unreachable!("a tagger always has a word encoder"),
        }
    }

    fn crf_scores(
        &self,
        input: &Infer<B>,
        forw_states: Tensor<B, 3>,
        back_states: Tensor<B, 3>,
    ) -> Tensor<B, 4> {
        let features = self.word_features(input, forw_states, back_states);
        let [batch_size, seq_length, _] = features.dims();
        let n_tags = self.tagset_size;

        // Every head scores the whole batch, the one-hot file mask keeps each sentence's own head
        self.crfs
            .iter()
            .enumerate()
            .map(|(file_no, crf)| {
                let weight = input
                    .file_mask
                    .clone()
                    .slice([0..batch_size, file_no..file_no + 1])
                    .reshape([batch_size, 1, 1, 1])
                    .repeat(1, seq_length)
                    .repeat(2, n_tags)
                    .repeat(3, n_tags);

                crf.forward(features.clone()) * weight
            })
            .reduce(|acc, scores| acc + scores)
            .unwrap_or_else(|| {
                Tensor::zeros([batch_size, seq_length, n_tags, n_tags], &features.device())
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use crate::{
        datasets::Sentence,
        models::tagger::Config,
        pipelines::sequence_labeling::{
            vocab::{PAD_CHAR, SEP_CHAR, UNK_CHAR},
            Batcher, Vocab,
        },
        utils::tensors::{float_tensor, to_vec},
    };

    use super::*;

    type TestBackend = NdArray<f32>;

    pub fn vocab() -> Vocab {
        Vocab::new(
            ["<eof>", "<unk>", "ab", "c", "dd"].map(String::from).to_vec(),
            vec![PAD_CHAR, SEP_CHAR, UNK_CHAR, 'a', 'b', 'c', 'd'],
            ["B", "E", "S", "<start>", "<pad>"].map(String::from).to_vec(),
            4,
            false,
        )
    }

    pub fn config(word_level_attention: bool) -> Config {
        Config::from_vocab(&vocab(), 2)
            .with_char_dim(4)
            .with_char_hidden_dim(3)
            .with_word_dim(4)
            .with_word_hidden_dim(6)
            .with_n_head(2)
            .with_d_k(3)
            .with_d_v(3)
            .with_max_seq_len(8)
            .with_highway(true)
            .with_word_level_attention(word_level_attention)
    }

    pub fn sentences() -> Vec<Sentence> {
        let sentence = |words: &[&str], labels: &[&str], file_no| {
            Sentence::new(
                words.iter().map(|w| w.to_string()).collect(),
                labels.iter().map(|l| l.to_string()).collect(),
                file_no,
            )
        };

        vec![
            sentence(&["ab", "c", "dd"], &["B", "E", "S"], 0),
            sentence(&["ab", "c", "dd"], &["B", "E", "S"], 1),
            sentence(&["c"], &["S"], 0),
        ]
    }

    fn batcher() -> Batcher<TestBackend> {
        Batcher::new(Arc::new(vocab()), 2, 8, Default::default())
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();

        for attention in [false, true] {
            let model = config(attention).init::<TestBackend>(&device);
            let input: Infer<TestBackend> = batcher().batch(sentences());

            assert_eq!(model.forward(input).dims(), [3, 4, 5, 5]);
        }
    }

    #[test]
    fn test_sentences_use_their_corpus_head() {
        let model = config(false).init::<TestBackend>(&Default::default());
        let input: Infer<TestBackend> = batcher().batch(sentences());

        let scores = to_vec(model.forward(input));
        let sentence = 4 * 5 * 5;

        // The same words scored by two different heads
        assert_ne!(&scores[..sentence], &scores[sentence..2 * sentence]);

        // The same words and head give the same scores regardless of batch position
        let input: Infer<TestBackend> = batcher().batch(vec![sentences().remove(1)]);
        let alone = to_vec(model.forward(input));
        for (a, b) in alone.iter().zip(&scores[sentence..2 * sentence]) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_co_training_adds_language_model_loss() {
        let device = Default::default();
        let batch: Train<TestBackend> = batcher().batch(sentences());

        let model = config(false).init::<TestBackend>(&device);
        let output = model.forward_loss(batch.clone());

        let crf_loss = to_vec(output.crf_loss.clone())[0];
        let lm_loss = to_vec(output.lm_loss.clone().unwrap())[0];
        let loss = to_vec(output.loss)[0];

        assert!(crf_loss >= 0.0);
        assert!(lm_loss > 0.0);
        assert!((loss - crf_loss - lm_loss).abs() < 1e-3);

        let model = config(false)
            .with_co_train(false)
            .init::<TestBackend>(&device);
        let output = model.forward_loss(batch);

        assert!(output.lm_loss.is_none());
    }

    #[test]
    fn test_word_lm_logits_cover_in_doc_words() {
        let model = config(false).init::<TestBackend>(&Default::default());
        let input: Infer<TestBackend> = batcher().batch(sentences());

        let forw = model.word_lm_forward(input.forw_chars, input.forw_positions);
        let back = model.word_lm_backward(input.back_chars, input.back_positions);

        assert_eq!(forw.dims(), [3 * 4, 4]);
        assert_eq!(back.dims(), [3 * 4, 4]);
        assert!(to_vec(forw).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_decode_returns_one_label_per_word() {
        let model = config(true).init::<TestBackend>(&Default::default());
        let input: Infer<TestBackend> = batcher().batch(sentences());

        let paths = model.decode(input);

        assert_eq!(
            paths.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        assert!(paths.iter().flatten().all(|tag| *tag < 5));
    }

    #[test]
    fn test_pretrained_embedding_shape_is_checked() {
        let device = Default::default();
        let model = config(false).init::<TestBackend>(&device);

        let wrong = float_tensor::<TestBackend, 2>(vec![0.0; 5 * 3], [5, 3], &device);
        assert!(matches!(
            model.clone().load_pretrained_word_embedding(wrong),
            Err(ModelError::EmbeddingShape { .. })
        ));

        let weights = float_tensor::<TestBackend, 2>(vec![0.25; 5 * 4], [5, 4], &device);
        let model = model.load_pretrained_word_embedding(weights).unwrap();

        assert!(to_vec(model.word_embeds.weight.val())
            .iter()
            .all(|v| *v == 0.25));
    }
}
