use burn::LearningRate;

use crate::models::tagger;

/// Define configuration struct for the experiment
#[derive(burn::config::Config)]
pub struct Training {
    /// Labelled training corpora, one CRF head each
    pub train_files: Vec<String>,

    /// Development corpora, paired with the training corpora by position
    pub dev_files: Vec<String>,

    /// Test corpora, paired with the training corpora by position
    pub test_files: Vec<String>,

    /// Pre-trained word vectors in text format
    #[config(default = "None")]
    pub embedding_file: Option<String>,

    /// Where the config, vocabulary, checkpoints and trained model are written
    #[config(default = "\"artifacts\".to_string()")]
    pub artifact_dir: String,

    /// The model architecture; vocabulary sizes are filled in when training starts
    #[config(default = "tagger::Config::new()")]
    pub model: tagger::Config,

    /// Batch size
    #[config(default = 10)]
    pub batch_size: usize,

    /// Number of epochs
    #[config(default = 200)]
    pub num_epochs: usize,

    /// Adam epsilon
    #[config(default = 1e-8)]
    pub adam_epsilon: f32,

    /// Learning rate
    #[config(default = 1e-3)]
    pub learning_rate: LearningRate,

    /// Maximum L2 norm of the gradients
    #[config(default = 5.0)]
    pub clip_grad: f32,

    /// Minimum training frequency for a character to get its own id
    #[config(default = 5)]
    pub mini_count: usize,

    /// Lower-case words
    #[config(default = false)]
    pub caseless: bool,

    /// Only add embedding words that occur in the dev or test corpora to the vocabulary
    #[config(default = true)]
    pub shrink_embedding: bool,

    /// Random seed for the backend and for words missing from the embeddings
    #[config(default = 42)]
    pub seed: u64,
}
