use std::{collections::HashMap, path::Path};

use burn::tensor::{backend::Backend, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{files::read_lines, tensors::float_tensor};

/// Errors raised while reading pre-trained word vectors
#[derive(thiserror::Error, Debug)]
pub enum EmbeddingError {
    /// The file could not be read
    #[error("unable to read embedding file: {0}")]
    Io(#[from] std::io::Error),

    /// A vector had a different width than the first one
    #[error("line {line}: expected {expected} values, found {found}")]
    Dimension {
        /// 1-based line number
        line: usize,
        /// Width of the first vector in the file
        expected: usize,
        /// Width found on this line
        found: usize,
    },

    /// A value could not be parsed as a float
    #[error("line {line}: invalid value {value:?}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// The offending token
        value: String,
    },

    /// No vectors were found
    #[error("no word vectors found")]
    Empty,
}

/// Pre-trained word vectors in the whitespace separated text format (`word v1 v2 ... vd`)
#[derive(Debug, Clone)]
pub struct Embeddings {
    /// Width of every vector
    pub dim: usize,

    /// Words in file order, so vocabularies built from them are deterministic
    pub words: Vec<String>,

    vectors: HashMap<String, Vec<f32>>,
}

impl Embeddings {
    /// Load vectors from a file
    pub async fn load<P: AsRef<Path>>(path: P, caseless: bool) -> Result<Self, EmbeddingError> {
        let lines = read_lines(path).await?;

        Self::parse(&lines, caseless)
    }

    /// Parse vectors from lines. A word2vec style `count dim` header is skipped, and when
    /// `caseless` is set the first vector seen for each lower-cased word wins.
    pub fn parse(lines: &[String], caseless: bool) -> Result<Self, EmbeddingError> {
        let mut dim = None;
        let mut words = Vec::new();
        let mut vectors = HashMap::new();

        for (i, line) in lines.iter().enumerate() {
            let mut fields = line.split_whitespace();

            let Some(word) = fields.next() else {
                continue;
            };

            let values = fields.collect::<Vec<_>>();

            if i == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                continue;
            }

            let vector = values
                .iter()
                .map(|value| {
                    value.parse::<f32>().map_err(|_| EmbeddingError::Parse {
                        line: i + 1,
                        value: value.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let expected = *dim.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(EmbeddingError::Dimension {
                    line: i + 1,
                    expected,
                    found: vector.len(),
                });
            }

            let word = if caseless {
                word.to_lowercase()
            } else {
                word.to_string()
            };

            if !vectors.contains_key(&word) {
                words.push(word.clone());
                vectors.insert(word, vector);
            }
        }

        match dim {
            Some(dim) if dim > 0 => Ok(Self {
                dim,
                words,
                vectors,
            }),
            _ => Err(EmbeddingError::Empty),
        }
    }

    /// Get the vector for a word
    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(|v| v.as_slice())
    }

    /// Build a `[vocab_size, dim]` weight matrix for an id-ordered vocabulary. Words without a
    /// pre-trained vector are drawn uniformly from `±sqrt(3 / dim)`.
    pub fn weights<B: Backend>(&self, vocab: &[String], seed: u64, device: &B::Device) -> Tensor<B, 2> {
        let mut rng = StdRng::seed_from_u64(seed);
        let bias = (3.0 / self.dim as f32).sqrt();

        let mut values = Vec::with_capacity(vocab.len() * self.dim);

        for word in vocab {
            match self.get(word) {
                Some(vector) => values.extend_from_slice(vector),
                None => values.extend((0..self.dim).map(|_| rng.gen_range(-bias..bias))),
            }
        }

        float_tensor::<B, 2>(values, [vocab.len(), self.dim], device)
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use crate::utils::tensors::to_vec;

    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_parse_skips_header_and_lowercases() {
        let embeddings =
            Embeddings::parse(&lines("2 3\nThe 0.1 0.2 0.3\nthe 1 1 1\ncat 0 0 1"), true).unwrap();

        assert_eq!(embeddings.dim, 3);
        assert_eq!(embeddings.words, vec!["the", "cat"]);
        assert_eq!(embeddings.get("the"), Some(&[0.1, 0.2, 0.3][..]));
    }

    #[test]
    fn test_parse_rejects_ragged_vectors() {
        let err = Embeddings::parse(&lines("a 1 2\nb 1"), false).unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::Dimension {
                line: 2,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_parse_rejects_bad_floats() {
        let err = Embeddings::parse(&lines("a 1 x"), false).unwrap_err();

        assert!(matches!(err, EmbeddingError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_weights_copy_known_vectors() {
        let device = Default::default();
        let embeddings = Embeddings::parse(&lines("cat 0.5 -0.5"), false).unwrap();

        let vocab = vec!["<eof>".to_string(), "cat".to_string()];
        let weights = to_vec(embeddings.weights::<NdArray<f32>>(&vocab, 7, &device));

        assert_eq!(&weights[2..], &[0.5, -0.5]);

        let bias = (3.0f32 / 2.0).sqrt();
        assert!(weights[..2].iter().all(|v| v.abs() <= bias));
    }
}
