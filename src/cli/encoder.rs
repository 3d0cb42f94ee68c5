use std::fmt::Display;

use crate::models::tagger;

/// The unique string token that identifies the word LSTM encoder
pub static LSTM: &str = "lstm";

/// The unique string token that identifies the self-attention encoder
pub static ATTENTION: &str = "attention";

/// Available word encoders
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub enum Encoder {
    /// Bidirectional word LSTM
    #[default]
    Lstm,

    /// Multi-head self-attention layers
    Attention,
}

impl Encoder {
    /// Select this encoder in a model configuration
    pub fn apply(&self, config: tagger::Config) -> tagger::Config {
        config.with_word_level_attention(*self == Encoder::Attention)
    }
}

impl TryFrom<&str> for Encoder {
    type Error = EncoderError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase() {
            v if v == LSTM => Ok(Encoder::Lstm),
            v if v == ATTENTION => Ok(Encoder::Attention),
            _ => Err(EncoderError::Unknown(value.to_string())),
        }
    }
}

impl Display for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Encoder::Lstm => LSTM,
            Encoder::Attention => ATTENTION,
        };

        write!(f, "{}", name)
    }
}

/// Encoder Error
#[derive(thiserror::Error, Debug)]
pub enum EncoderError {
    /// No encoder found for the given string
    #[error("no word encoder found for {0}, expected 'lstm' or 'attention'")]
    Unknown(String),
}
