use std::collections::HashSet;

use burn::{data::dataloader::batcher::Batcher as _, tensor::backend::Backend};
use serde::Serialize;

use crate::models::tagger::Model;

use super::{batcher::Infer, Batcher, Item, Vocab};

/// A labelled chunk covering words `start..end`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    /// Chunk type, the label without its `B-`/`I-`/`E-`/`S-` prefix
    pub label: String,

    /// First word
    pub start: usize,

    /// One past the last word
    pub end: usize,
}

/// Extract chunks from IOBES labels. BIO labels are read the same way, so `I-` after a chunk of
/// another type starts a new chunk and `E-`/`I-` without an opening `B-` are chunks of their own.
pub fn spans<S: AsRef<str>>(labels: &[S]) -> HashSet<Span> {
    let mut spans = HashSet::new();
    let mut current: Option<Span> = None;

    for (i, label) in labels.iter().enumerate() {
        let label = label.as_ref();
        let (prefix, base) = match (label.get(..2), label.get(2..)) {
            (Some(prefix), Some(base)) => (prefix, base),
            _ => ("", label),
        };

        match prefix {
            "B-" => {
                spans.extend(current.take());
                current = Some(Span::new(base, i));
            }
            "S-" => {
                spans.extend(current.take());
                spans.insert(Span::new(base, i));
            }
            "I-" => match current.as_mut() {
                Some(span) if span.label == base => span.end = i + 1,
                _ => {
                    spans.extend(current.take());
                    current = Some(Span::new(base, i));
                }
            },
            "E-" => match current.take() {
                Some(mut span) if span.label == base => {
                    span.end = i + 1;
                    spans.insert(span);
                }
                other => {
                    spans.extend(other);
                    spans.insert(Span::new(base, i));
                }
            },
            _ => spans.extend(current.take()),
        }
    }

    spans.extend(current);

    spans
}

impl Span {
    fn new(label: &str, start: usize) -> Self {
        Self {
            label: label.to_string(),
            start,
            end: start + 1,
        }
    }
}

/// Chunk and token scores
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Scores {
    /// Correct chunks over predicted chunks
    pub precision: f64,

    /// Correct chunks over gold chunks
    pub recall: f64,

    /// Harmonic mean of precision and recall
    pub f1: f64,

    /// Correct labels over words
    pub accuracy: f64,
}

/// Accumulates chunk and token counts over sentences
#[derive(Clone, Debug, Default)]
pub struct Evaluator {
    correct_spans: usize,
    guessed_spans: usize,
    gold_spans: usize,
    correct_tokens: usize,
    total_tokens: usize,
}

impl Evaluator {
    /// Count one sentence
    pub fn add<P: AsRef<str>, G: AsRef<str>>(&mut self, predicted: &[P], gold: &[G]) {
        let guessed = spans(predicted);
        let expected = spans(gold);

        self.correct_spans += guessed.intersection(&expected).count();
        self.guessed_spans += guessed.len();
        self.gold_spans += expected.len();

        self.correct_tokens += predicted
            .iter()
            .zip(gold)
            .filter(|(p, g)| p.as_ref() == g.as_ref())
            .count();
        self.total_tokens += gold.len();
    }

    /// Scores over every sentence added so far
    pub fn scores(&self) -> Scores {
        let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };

        let precision = ratio(self.correct_spans, self.guessed_spans);
        let recall = ratio(self.correct_spans, self.gold_spans);

        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Scores {
            precision,
            recall,
            f1,
            accuracy: ratio(self.correct_tokens, self.total_tokens),
        }
    }
}

/// Map decoded label ids back to labels
pub fn id_to_labels<'a>(vocab: &'a Vocab, path: &[usize]) -> Vec<&'a str> {
    path.iter()
        .map(|id| vocab.label(*id).unwrap_or("O"))
        .collect()
}

/// Tag labelled items with the model and score them against their labels
pub fn evaluate<B: Backend, I: Item>(
    model: &Model<B>,
    batcher: &Batcher<B>,
    items: &[I],
    batch_size: usize,
) -> Scores {
    let mut evaluator = Evaluator::default();

    for chunk in items.chunks(batch_size.max(1)) {
        let input: Infer<B> = batcher.batch(chunk.to_vec());

        for (path, item) in model.decode(input).iter().zip(chunk) {
            evaluator.add(
                id_to_labels(&batcher.vocab, path).as_slice(),
                item.class_labels().as_slice(),
            );
        }
    }

    evaluator.scores()
}
