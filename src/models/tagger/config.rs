use burn::{
    nn::{DropoutConfig, EmbeddingConfig, Initializer},
    tensor::backend::Backend,
};

use crate::{
    models::{
        attention::{position::position_embedding, EncoderConfig},
        crf::CrfConfig,
        highway::CharHighways,
        lstm::StackedLstmConfig,
        xavier_linear,
    },
    pipelines::sequence_labeling::Vocab,
};

use super::{AttentionEncoder, Model};

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    // -- Sizes taken from the vocabulary, see `Config::sized_for`
    /// Number of CRF tags, including the start and end tags
    #[config(default = 0)]
    pub tagset_size: usize,
    /// Number of characters
    #[config(default = 0)]
    pub char_size: usize,
    /// Number of words, including embedding-only words
    #[config(default = 0)]
    pub vocab_size: usize,
    /// Number of words predicted by the language model heads
    #[config(default = 0)]
    pub in_doc_words: usize,
    /// CRF start tag
    #[config(default = 0)]
    pub start_tag: usize,
    /// CRF end tag
    #[config(default = 0)]
    pub end_tag: usize,
    /// Number of labelled corpora, one CRF head each
    #[config(default = 1)]
    pub file_num: usize,
    // -- End sizes taken from the vocabulary

    /// Character embedding width
    #[config(default = 30)]
    pub char_dim: usize,

    /// Hidden size of each character LSTM
    #[config(default = 300)]
    pub char_hidden_dim: usize,

    /// Number of stacked character LSTM layers
    #[config(default = 1)]
    pub char_rnn_layers: usize,

    /// Word embedding width
    #[config(default = 100)]
    pub word_dim: usize,

    /// Width of the word features fed to the CRF (both LSTM directions together)
    #[config(default = 300)]
    pub word_hidden_dim: usize,

    /// Number of stacked word LSTM layers
    #[config(default = 1)]
    pub word_rnn_layers: usize,

    /// Dropout rate used throughout the model
    #[config(default = 0.55)]
    pub dropout: f64,

    /// Predict every transition score from the features instead of emissions plus a shared
    /// transition matrix
    #[config(default = true)]
    pub large_crf: bool,

    /// Project character features through highway blocks
    #[config(default = false)]
    pub highway: bool,

    /// Number of layers in each highway block
    #[config(default = 1)]
    pub highway_layers: usize,

    /// Encode words with self-attention instead of a bidirectional LSTM
    #[config(default = false)]
    pub word_level_attention: bool,

    /// Number of self-attention layers
    #[config(default = 1)]
    pub n_layers: usize,

    /// Number of attention heads
    #[config(default = 8)]
    pub n_head: usize,

    /// Query and key width per head
    #[config(default = 64)]
    pub d_k: usize,

    /// Value width per head
    #[config(default = 64)]
    pub d_v: usize,

    /// Longest sentence with a distinct position encoding
    #[config(default = 250)]
    pub max_seq_len: usize,

    /// Add the word prediction losses to the CRF loss
    #[config(default = true)]
    pub co_train: bool,

    /// Weight of the word prediction losses
    #[config(default = 1.0)]
    pub lm_weight: f64,

    /// Average the CRF loss over the batch instead of summing it
    #[config(default = false)]
    pub average_batch: bool,
}

impl Config {
    /// Start a default configuration sized for a vocabulary
    pub fn from_vocab(vocab: &Vocab, file_num: usize) -> Self {
        Self::new().sized_for(vocab, file_num)
    }

    /// Take the vocabulary sizes and the number of corpora, keeping every other option
    pub fn sized_for(self, vocab: &Vocab, file_num: usize) -> Self {
        self.with_tagset_size(vocab.tagset_size())
            .with_char_size(vocab.chars.len())
            .with_vocab_size(vocab.words.len())
            .with_in_doc_words(vocab.in_doc_words)
            .with_start_tag(vocab.start_tag())
            .with_end_tag(vocab.end_tag())
            .with_file_num(file_num)
    }

    /// Width of the self-attention features: word embedding, both character directions and the
    /// position encoding
    pub fn d_model(&self) -> usize {
        2 * self.word_dim + 2 * self.char_hidden_dim
    }

    /// Initialize the model
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let embedding = |n: usize, dim: usize| {
            let bias = (3.0 / dim as f64).sqrt();

            EmbeddingConfig::new(n, dim)
                .with_initializer(Initializer::Uniform {
                    min: -bias,
                    max: bias,
                })
                .init(device)
        };

        let char_lstm = StackedLstmConfig::new(self.char_dim, self.char_hidden_dim)
            .with_num_layers(self.char_rnn_layers)
            .with_dropout(self.dropout);

        let (word_lstm, attention) = if self.word_level_attention {
            let encoder = EncoderConfig::new(self.d_model(), self.word_hidden_dim)
                .with_n_layers(self.n_layers)
                .with_n_head(self.n_head)
                .with_d_k(self.d_k)
                .with_d_v(self.d_v)
                .with_dropout(self.dropout);

            let attention = AttentionEncoder {
                position_enc: position_embedding(self.max_seq_len + 1, self.word_dim, device),
                encoder: encoder.init(device),
                fc: xavier_linear(self.d_model(), self.word_hidden_dim, device),
            };

            (None, Some(attention))
        } else {
            let word_lstm = StackedLstmConfig::new(
                self.word_dim + 2 * self.char_hidden_dim,
                self.word_hidden_dim / 2,
            )
            .with_num_layers(self.word_rnn_layers)
            .with_dropout(self.dropout)
            .with_bidirectional(true);

            (Some(word_lstm.init(device)), None)
        };

        let crf = CrfConfig::new(self.word_hidden_dim, self.tagset_size).with_large(self.large_crf);

        let highways = self.highway.then(|| {
            CharHighways::new(
                self.char_hidden_dim,
                self.highway_layers,
                self.dropout,
                device,
            )
        });

        Model {
            char_embeds: embedding(self.char_size, self.char_dim),
            forw_char_lstm: char_lstm.init(device),
            back_char_lstm: char_lstm.init(device),
            word_embeds: embedding(self.vocab_size, self.word_dim),
            word_lstm,
            attention,
            crfs: (0..self.file_num).map(|_| crf.init(device)).collect(),
            highways,
            word_lm_out: xavier_linear(self.char_hidden_dim, self.in_doc_words, device),
            dropout: DropoutConfig::new(self.dropout).init(),
            char_hidden_dim: self.char_hidden_dim,
            tagset_size: self.tagset_size,
            start_tag: self.start_tag,
            end_tag: self.end_tag,
            co_train: self.co_train,
            lm_weight: self.lm_weight,
            average_batch: self.average_batch,
        }
    }
}
