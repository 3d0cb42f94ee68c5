/// CoNLL-formatted corpora
pub mod conll;

pub use conll::{Dataset, Sentence};

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// The corpus file couldn't be read
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A token line carries a word but no label column
    #[error("{path}:{line}: expected a word and a label, found {found:?}")]
    MissingLabel {
        /// The corpus file
        path: String,

        /// 1-based line number
        line: usize,

        /// The offending line
        found: String,
    },

    /// The corpus has no sentences
    #[error("no sentences found in {0}")]
    Empty(String),
}
