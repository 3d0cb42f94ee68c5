use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::utils::{classes::index_tokens, embeddings::Embeddings};

use super::Item;

/// End-of-sentence word, also used as word padding
pub static EOF_WORD: &str = "<eof>";

/// Unknown word
pub static UNK_WORD: &str = "<unk>";

/// Character padding
pub const PAD_CHAR: char = '\n';

/// Separator between words in a character stream
pub const SEP_CHAR: char = ' ';

/// Unknown character
pub const UNK_CHAR: char = '\u{0}';

/// Label every sentence is entered from
pub static START_LABEL: &str = "<start>";

/// Label every sentence leaves into, also used for padding
pub static PAD_LABEL: &str = "<pad>";

/// Vocabulary Error
#[derive(thiserror::Error, Debug)]
pub enum VocabError {
    /// The vocabulary file couldn't be read or written
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The vocabulary file is malformed
    #[error("invalid vocabulary file: {0}")]
    Json(#[from] serde_json::Error),

    /// A label outside the tag set
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
}

/// Word, character and label maps shared by the batcher and the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vocab {
    /// Words by id
    pub words: Vec<String>,

    /// Characters by id
    pub chars: Vec<char>,

    /// Labels by id, ending with the start and pad labels
    pub labels: Vec<String>,

    /// Number of leading words that occur in the training corpora
    pub in_doc_words: usize,

    /// Lower-case words before lookup
    pub caseless: bool,

    #[serde(skip)]
    word2id: HashMap<String, usize>,

    #[serde(skip)]
    char2id: HashMap<char, usize>,

    #[serde(skip)]
    label2id: HashMap<String, usize>,
}

/// Options for building a vocabulary from corpora
#[derive(Clone, Debug, new)]
pub struct VocabBuilder {
    /// Minimum training frequency for a character to get its own id
    pub mini_count: usize,

    /// Lower-case words
    pub caseless: bool,

    /// Only add embedding words that occur in the dev or test corpora
    pub shrink_embedding: bool,
}

impl VocabBuilder {
    /// Build the vocabulary. Words and characters come from `train`; labels come from every
    /// corpus so that dev and test sentences can always be encoded.
    pub fn build<I: Item>(
        &self,
        train: &[I],
        extra: &[I],
        embeddings: Option<&Embeddings>,
    ) -> Vocab {
        let normalize = |word: &str| {
            if self.caseless {
                word.to_lowercase()
            } else {
                word.to_string()
            }
        };

        let mut words = vec![EOF_WORD.to_string(), UNK_WORD.to_string()];
        let mut seen = words.iter().cloned().collect::<HashSet<_>>();

        for word in train.iter().flat_map(|item| item.words()) {
            let word = normalize(word);
            if seen.insert(word.clone()) {
                words.push(word);
            }
        }

        let in_doc_words = words.len();

        if let Some(embeddings) = embeddings {
            let wanted = self.shrink_embedding.then(|| {
                extra
                    .iter()
                    .flat_map(|item| item.words())
                    .map(|word| normalize(word))
                    .collect::<HashSet<_>>()
            });

            for word in &embeddings.words {
                let keep = wanted.as_ref().map_or(true, |wanted| wanted.contains(word));

                if keep && seen.insert(word.clone()) {
                    words.push(word.clone());
                }
            }
        }

        let mut char_counts = HashMap::<char, usize>::new();
        let mut char_order = Vec::new();

        for c in train.iter().flat_map(|item| item.words()).flat_map(|w| w.chars()) {
            let count = char_counts.entry(c).or_insert(0);
            if *count == 0 {
                char_order.push(c);
            }
            *count += 1;
        }

        let specials = [PAD_CHAR, SEP_CHAR, UNK_CHAR];

        let mut chars = specials.to_vec();
        chars.extend(
            char_order
                .into_iter()
                .filter(|c| char_counts[c] >= self.mini_count && !specials.contains(c)),
        );

        let mut labels = Vec::new();
        let mut seen_labels = HashSet::new();

        for label in train
            .iter()
            .chain(extra)
            .flat_map(|item| item.class_labels())
        {
            if seen_labels.insert(label.to_string()) {
                labels.push(label.to_string());
            }
        }

        labels.push(START_LABEL.to_string());
        labels.push(PAD_LABEL.to_string());

        Vocab::new(words, chars, labels, in_doc_words, self.caseless)
    }
}

impl Vocab {
    /// Create a vocabulary from id-ordered tokens
    pub fn new(
        words: Vec<String>,
        chars: Vec<char>,
        labels: Vec<String>,
        in_doc_words: usize,
        caseless: bool,
    ) -> Self {
        Self {
            words,
            chars,
            labels,
            in_doc_words,
            caseless,
            word2id: HashMap::new(),
            char2id: HashMap::new(),
            label2id: HashMap::new(),
        }
        .indexed()
    }

    fn indexed(mut self) -> Self {
        self.word2id = index_tokens(&self.words);
        self.char2id = index_tokens(&self.chars);
        self.label2id = index_tokens(&self.labels);
        self
    }

    /// Load a vocabulary saved with [`Vocab::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VocabError> {
        let reader = BufReader::new(File::open(path)?);
        let vocab: Self = serde_json::from_reader(reader)?;

        Ok(vocab.indexed())
    }

    /// Save the vocabulary as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), VocabError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;

        Ok(())
    }

    /// Word id, falling back to `<unk>`
    pub fn word_id(&self, word: &str) -> usize {
        let id = if self.caseless {
            self.word2id.get(&word.to_lowercase())
        } else {
            self.word2id.get(word)
        };

        id.copied().unwrap_or(self.unk_word())
    }

    /// Target of the word prediction heads, which only cover in-doc words
    pub fn lm_id(&self, word: &str) -> usize {
        match self.word_id(word) {
            id if id < self.in_doc_words => id,
            _ => self.unk_word(),
        }
    }

    /// Char id, falling back to the unknown char
    pub fn char_id(&self, c: char) -> usize {
        self.char2id.get(&c).copied().unwrap_or(self.unk_char())
    }

    /// Label id
    pub fn label_id(&self, label: &str) -> Result<usize, VocabError> {
        self.label2id
            .get(label)
            .copied()
            .ok_or_else(|| VocabError::UnknownLabel(label.to_string()))
    }

    /// Label for an id
    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// `<eof>` id
    pub fn eof_word(&self) -> usize {
        0
    }

    /// `<unk>` id
    pub fn unk_word(&self) -> usize {
        1
    }

    /// Id of the unknown char
    pub fn unk_char(&self) -> usize {
        2
    }

    /// CRF start tag
    pub fn start_tag(&self) -> usize {
        self.labels.len() - 2
    }

    /// CRF end tag
    pub fn end_tag(&self) -> usize {
        self.labels.len() - 1
    }

    /// Number of CRF tags, including the start and end tags
    pub fn tagset_size(&self) -> usize {
        self.labels.len()
    }
}
