use std::path::Path;

use burn::data::dataset::{self, InMemDataset};
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::{pipelines::sequence_labeling, utils::files::read_lines};

use super::DatasetError;

/// Marker line separating documents in CoNLL corpora
pub static DOC_START: &str = "-DOCSTART-";

/// A sentence with one label per word
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Sentence {
    /// The words of the sentence
    pub words: Vec<String>,

    /// The label of each word, empty for unlabelled input
    pub labels: Vec<String>,

    /// The corpus the sentence came from
    pub file_no: usize,
}

impl sequence_labeling::Item for Sentence {
    fn words(&self) -> &[String] {
        &self.words
    }

    fn class_labels(&self) -> Vec<&str> {
        self.labels.iter().map(String::as_str).collect()
    }

    fn file_no(&self) -> usize {
        self.file_no
    }
}

/// Parse CoNLL lines: one token per line with the word in the first column and the label in the
/// last, blank lines between sentences.
pub fn parse_conll(
    lines: &[String],
    path: &str,
    file_no: usize,
) -> Result<Vec<Sentence>, DatasetError> {
    let mut sentences = Vec::new();
    let mut words = Vec::new();
    let mut labels = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();

        if line.is_empty() {
            if !words.is_empty() {
                sentences.push(Sentence::new(
                    std::mem::take(&mut words),
                    std::mem::take(&mut labels),
                    file_no,
                ));
            }
            continue;
        }

        if line.starts_with(DOC_START) {
            continue;
        }

        let columns = line.split_whitespace().collect::<Vec<_>>();

        match (columns.first(), columns.last()) {
            (Some(word), Some(label)) if columns.len() > 1 => {
                words.push(word.to_string());
                labels.push(label.to_string());
            }
            _ => {
                return Err(DatasetError::MissingLabel {
                    path: path.to_string(),
                    line: i + 1,
                    found: line.to_string(),
                })
            }
        }
    }

    if !words.is_empty() {
        sentences.push(Sentence::new(words, labels, file_no));
    }

    Ok(sentences)
}

/// Parse unlabelled input, one whitespace-tokenized sentence per line
pub fn parse_raw(lines: &[String], file_no: usize) -> Vec<Sentence> {
    lines
        .iter()
        .map(|line| {
            line.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|words| !words.is_empty())
        .map(|words| Sentence::new(words, Vec::new(), file_no))
        .collect()
}

/// Read a CoNLL corpus, which must hold at least one sentence
pub async fn read_conll<P: AsRef<Path>>(
    path: P,
    file_no: usize,
) -> Result<Vec<Sentence>, DatasetError> {
    let path = path.as_ref();
    let lines = read_lines(path).await?;

    let sentences = parse_conll(&lines, &path.display().to_string(), file_no)?;

    if sentences.is_empty() {
        return Err(DatasetError::Empty(path.display().to_string()));
    }

    log::debug!(
        "Read {} sentences from {}",
        sentences.len(),
        path.display()
    );

    Ok(sentences)
}

/// Read unlabelled sentences
pub async fn read_raw<P: AsRef<Path>>(
    path: P,
    file_no: usize,
) -> Result<Vec<Sentence>, DatasetError> {
    let lines = read_lines(path).await?;

    Ok(parse_raw(&lines, file_no))
}

/// Read several corpora concurrently. The position of each path is its corpus index.
pub async fn read_corpora<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Vec<Sentence>>, DatasetError> {
    futures::future::try_join_all(
        paths
            .iter()
            .enumerate()
            .map(|(file_no, path)| read_conll(path, file_no)),
    )
    .await
}

/// An in-memory dataset of sentences
pub struct Dataset {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<Sentence>,
}

impl Dataset {
    /// Wrap already loaded sentences
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self {
            dataset: InMemDataset::new(sentences),
        }
    }
}

/// Implement the Dataset trait for sentence corpora
impl dataset::Dataset<Sentence> for Dataset {
    /// Returns a specific item from the dataset
    fn get(&self, index: usize) -> Option<Sentence> {
        self.dataset.get(index)
    }

    /// Returns the length of the dataset
    fn len(&self) -> usize {
        self.dataset.len()
    }
}

#[cfg(test)]
mod tests {
    use burn::data::dataset::Dataset as _;
    use pretty_assertions::assert_eq;

    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_multi_column_conll() {
        let corpus = lines(
            "-DOCSTART- -X- -X- O\n\
             \n\
             EU NNP B-NP S-ORG\n\
             rejects VBZ B-VP O\n\
             \n\
             \n\
             Peter NNP B-NP B-PER\n\
             Blackburn NNP I-NP E-PER\n",
        );

        let sentences = parse_conll(&corpus, "test.conll", 1).unwrap();

        assert_eq!(
            sentences,
            vec![
                Sentence::new(
                    vec!["EU".into(), "rejects".into()],
                    vec!["S-ORG".into(), "O".into()],
                    1
                ),
                Sentence::new(
                    vec!["Peter".into(), "Blackburn".into()],
                    vec!["B-PER".into(), "E-PER".into()],
                    1
                ),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_missing_label() {
        let corpus = lines("EU S-ORG\nrejects\n");

        let err = parse_conll(&corpus, "test.conll", 0).unwrap_err();

        assert!(matches!(err, DatasetError::MissingLabel { line: 2, .. }));
    }

    #[test]
    fn test_parse_raw_skips_blank_lines() {
        let sentences = parse_raw(&lines("EU rejects  German call\n\n  \nPeter\n"), 2);

        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].words, vec!["EU", "rejects", "German", "call"]);
        assert!(sentences[0].labels.is_empty());
        assert_eq!(sentences[1].file_no, 2);
    }

    #[tokio::test]
    async fn test_read_corpora_numbers_files() {
        let dir = std::env::temp_dir();
        let a = dir.join(format!("burn-tagger-a-{}.conll", std::process::id()));
        let b = dir.join(format!("burn-tagger-b-{}.conll", std::process::id()));
        tokio::fs::write(&a, "x O\n\ny O\n").await.unwrap();
        tokio::fs::write(&b, "z S-LOC\n").await.unwrap();

        let corpora = read_corpora(&[&a, &b]).await.unwrap();

        assert_eq!(corpora[0].len(), 2);
        assert_eq!(corpora[1][0].file_no, 1);

        let dataset = Dataset::new(corpora.concat());
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.get(2).map(|s| s.labels), Some(vec!["S-LOC".to_string()]));

        tokio::fs::remove_file(&a).await.unwrap();
        tokio::fs::remove_file(&b).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_conll_rejects_empty_corpus() {
        let path = std::env::temp_dir().join(format!("burn-tagger-empty-{}.conll", std::process::id()));
        tokio::fs::write(&path, "-DOCSTART- O\n\n").await.unwrap();

        let err = read_conll(&path, 0).await.unwrap_err();

        assert!(matches!(err, DatasetError::Empty(_)));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
