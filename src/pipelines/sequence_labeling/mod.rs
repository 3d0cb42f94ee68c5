/// Vocabulary
pub mod vocab;

/// Batcher
pub mod batcher;

/// Sequence Labeling Items
pub mod item;

/// Training output
pub mod output;

/// Common config for Sequence Labeling
pub mod config;

/// Span extraction and scoring
pub mod evaluation;

/// Sequence Labeling Training
pub mod training;

/// Sequence Labeling Inference
pub mod inference;

pub use batcher::{Batcher, Infer, Train};
pub use evaluation::{evaluate, Evaluator, Scores};
pub use inference::infer;
pub use item::Item;
pub use output::Output;
pub use training::train;
pub use vocab::{Vocab, VocabBuilder, VocabError};
