//! LSTM-CRF tagger with character-level language model co-training

/// Model configuration
pub mod config;

/// Model definition
pub mod model;

/// Training and validation steps
pub mod train;

pub use config::Config;
pub use model::{AttentionEncoder, Model};
