use std::{fmt::Debug, sync::Arc};

use burn::{
    data::dataloader,
    tensor::{backend::Backend, Int, Tensor},
};
use derive_new::new;

use crate::utils::tensors::{float_tensor, pad_float_to, pad_to};

use super::{vocab::SEP_CHAR, Item, Vocab};

/// An inference batch for sequence labeling. Every word axis has one extra position past the
/// longest sentence, carrying the transition into the end tag.
#[derive(Debug, Clone, new)]
pub struct Infer<B: Backend> {
    /// Forward character streams: [batch_size, char_length]
    pub forw_chars: Tensor<B, 2, Int>,

    /// Reversed character streams: [batch_size, char_length]
    pub back_chars: Tensor<B, 2, Int>,

    /// Forward stream index summarizing each word: [batch_size, seq_length]
    pub forw_positions: Tensor<B, 2, Int>,

    /// Backward stream index summarizing each word: [batch_size, seq_length]
    pub back_positions: Tensor<B, 2, Int>,

    /// Word ids: [batch_size, seq_length]
    pub words: Tensor<B, 2, Int>,

    /// 1-based word positions, 0 past the sentence: [batch_size, seq_length]
    pub word_positions: Tensor<B, 2, Int>,

    /// `1.0` on real words: [batch_size, seq_length]
    pub word_mask: Tensor<B, 2>,

    /// `1.0` on every scored position, the words plus the end transition: [batch_size, seq_length]
    pub mask: Tensor<B, 2>,

    /// One-hot corpus index of each sentence: [batch_size, file_num]
    pub file_mask: Tensor<B, 2>,

    /// Number of words in each sentence
    pub lengths: Vec<usize>,
}

/// A training batch for sequence labeling
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Model input
    pub input: Infer<B>,

    /// Gold transitions encoded as `from * n_tags + to`: [batch_size, seq_length]
    pub targets: Tensor<B, 2, Int>,

    /// In-doc word ids predicted by the language model heads: [batch_size, seq_length]
    pub lm_targets: Tensor<B, 2, Int>,
}

/// Struct for batching sequence labeling items
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Word, char and label maps
    pub vocab: Arc<Vocab>,

    /// Number of corpora, one CRF head each
    pub file_num: usize,

    /// Size of the position table; longer sentences share the last position
    pub max_seq_len: usize,

    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> Batcher<B> {
    /// Encode the words of each item into model input
    fn encode<I: Item>(&self, items: &[I]) -> Infer<B> {
        let batch_size = items.len();
        let lengths = items
            .iter()
            .map(|item| item.words().len())
            .collect::<Vec<_>>();
        let seq_length = lengths.iter().copied().max().unwrap_or(0) + 1;

        let sep = self.vocab.char_id(SEP_CHAR);
        let eof = self.vocab.eof_word();

        let mut forw_chars = Vec::with_capacity(batch_size);
        let mut back_chars = Vec::with_capacity(batch_size);
        let mut forw_positions = Vec::with_capacity(batch_size);
        let mut back_positions = Vec::with_capacity(batch_size);
        let mut words = Vec::with_capacity(batch_size);
        let mut word_positions = Vec::with_capacity(batch_size);
        let mut word_mask = Vec::with_capacity(batch_size);
        let mut mask = Vec::with_capacity(batch_size);
        let mut file_mask = vec![0.0; batch_size * self.file_num];

        for (b, item) in items.iter().enumerate() {
            // ' ' w1 ' ' w2 ... ' ' wn ' '
            let mut stream = vec![sep];
            let mut forw = Vec::with_capacity(seq_length);
            let mut starts = Vec::with_capacity(seq_length);

            for word in item.words() {
                starts.push(stream.len() - 1);
                stream.extend(word.chars().map(|c| self.vocab.char_id(c)));
                forw.push(stream.len());
                stream.push(sep);
            }

            let last = stream.len() - 1;

            let mut back = starts.iter().map(|start| last - start).collect::<Vec<_>>();

            forw.push(last);
            back.push(0);

            back_chars.push(stream.iter().rev().copied().collect());
            forw_chars.push(stream);
            forw_positions.push(forw);
            back_positions.push(back);

            let mut ids = item
                .words()
                .iter()
                .map(|word| self.vocab.word_id(word))
                .collect::<Vec<_>>();
            ids.push(eof);
            words.push(ids);

            let n = lengths[b];

            word_positions.push((1..=n).map(|p| p.min(self.max_seq_len)).collect());
            word_mask.push(vec![1.0; n]);
            mask.push(vec![1.0; n + 1]);

            if item.file_no() < self.file_num {
                file_mask[b * self.file_num + item.file_no()] = 1.0;
            } else {
                log::warn!(
                    "Sentence from corpus {} has no CRF head ({} corpora)",
                    item.file_no(),
                    self.file_num
                );
            }
        }

        let char_length = forw_chars.iter().map(Vec::len).max().unwrap_or(0);
        let pad_char = 0;

        let device = &self.device;

        Infer {
            forw_chars: pad_to::<B>(pad_char, forw_chars, char_length, device),
            back_chars: pad_to::<B>(pad_char, back_chars, char_length, device),
            forw_positions: pad_to::<B>(0, forw_positions, seq_length, device),
            back_positions: pad_to::<B>(0, back_positions, seq_length, device),
            words: pad_to::<B>(eof, words, seq_length, device),
            word_positions: pad_to::<B>(0, word_positions, seq_length, device),
            word_mask: pad_float_to::<B>(0.0, word_mask, seq_length, device),
            mask: pad_float_to::<B>(0.0, mask, seq_length, device),
            file_mask: float_tensor::<B, 2>(file_mask, [batch_size, self.file_num], device),
            lengths,
        }
    }
}

/// Implement Batcher trait for Batcher struct for inference
impl<B: Backend, I: Item> dataloader::batcher::Batcher<I, Infer<B>> for Batcher<B> {
    /// Collects a vector of sequence labeling items into an inference batch
    fn batch(&self, items: Vec<I>) -> Infer<B> {
        self.encode(&items)
    }
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend, I: Item> dataloader::batcher::Batcher<I, Train<B>> for Batcher<B> {
    /// Collects a vector of sequence labeling items into a training batch
    fn batch(&self, items: Vec<I>) -> Train<B> {
        let input = self.encode(&items);
        let [_, seq_length] = input.words.dims();

        let n_tags = self.vocab.tagset_size();
        let start = self.vocab.start_tag();
        let end = self.vocab.end_tag();

        let mut targets = Vec::with_capacity(items.len());
        let mut lm_targets = Vec::with_capacity(items.len());

        for item in &items {
            let mut from = start;
            let mut transitions = Vec::with_capacity(seq_length);

            for label in item.class_labels() {
                let to = self.vocab.label_id(label).unwrap_or_else(|err| {
                    log::warn!("{err}, scoring it as padding");
                    end
                });

                transitions.push(from * n_tags + to);
                from = to;
            }
            transitions.push(from * n_tags + end);
            targets.push(transitions);

            let mut ids = item
                .words()
                .iter()
                .map(|word| self.vocab.lm_id(word))
                .collect::<Vec<_>>();
            ids.push(self.vocab.eof_word());
            lm_targets.push(ids);
        }

        Train {
            targets: pad_to::<B>(end * n_tags + end, targets, seq_length, &self.device),
            lm_targets: pad_to::<B>(self.vocab.eof_word(), lm_targets, seq_length, &self.device),
            input,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use crate::{
        datasets::Sentence,
        pipelines::sequence_labeling::vocab::{PAD_CHAR, UNK_CHAR},
        utils::tensors::{to_ids, to_vec},
    };

    use super::*;

    type TestBackend = NdArray<f32>;

    fn batcher() -> Batcher<TestBackend> {
        let vocab = Vocab::new(
            ["<eof>", "<unk>", "ab", "c"].map(String::from).to_vec(),
            vec![PAD_CHAR, SEP_CHAR, UNK_CHAR, 'a', 'b', 'c'],
            ["B", "E", "S", "<start>", "<pad>"].map(String::from).to_vec(),
            4,
            false,
        );

        Batcher::new(Arc::new(vocab), 2, 2, Default::default())
    }

    fn sentences() -> Vec<Sentence> {
        vec![
            Sentence::new(
                ["ab", "c", "d"].map(String::from).to_vec(),
                ["B", "E", "S"].map(String::from).to_vec(),
                1,
            ),
            Sentence::new(vec!["c".into()], vec!["S".into()], 0),
        ]
    }

    #[test]
    fn test_char_streams_and_positions() {
        let batch: Infer<TestBackend> = batcher().batch(sentences());

        // ' ' a b ' ' c ' ' d ' '
        assert_eq!(
            to_ids(batch.forw_chars),
            vec![1, 3, 4, 1, 5, 1, 2, 1, 1, 5, 1, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            to_ids(batch.back_chars),
            vec![1, 2, 1, 5, 1, 4, 3, 1, 1, 5, 1, 0, 0, 0, 0, 0]
        );

        // Separators after each word, then the final separator and padding
        assert_eq!(to_ids(batch.forw_positions), vec![3, 5, 7, 7, 2, 2, 0, 0]);
        // Separators after each reversed word, then the leading separator and padding
        assert_eq!(to_ids(batch.back_positions), vec![7, 4, 2, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_words_and_masks() {
        let batch: Infer<TestBackend> = batcher().batch(sentences());

        assert_eq!(to_ids(batch.words), vec![2, 3, 1, 0, 3, 0, 0, 0]);
        // Positions are clamped to the table size
        assert_eq!(to_ids(batch.word_positions), vec![1, 2, 2, 0, 1, 0, 0, 0]);
        assert_eq!(
            to_vec(batch.word_mask),
            vec![1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0]
        );
        assert_eq!(
            to_vec(batch.mask),
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(to_vec(batch.file_mask), vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(batch.lengths, vec![3, 1]);
    }

    #[test]
    fn test_targets_encode_transitions() {
        let batch: Train<TestBackend> = batcher().batch(sentences());

        // start=3, end=4, five tags
        assert_eq!(
            to_ids(batch.targets),
            vec![
                3 * 5,     // <start> -> B
                1,         // B -> E
                5 + 2,     // E -> S
                2 * 5 + 4, // S -> <pad>
                3 * 5 + 2, // <start> -> S
                2 * 5 + 4, // S -> <pad>
                4 * 5 + 4,
                4 * 5 + 4,
            ]
        );
        assert_eq!(to_ids(batch.lm_targets), vec![2, 3, 1, 0, 3, 0, 0, 0]);
    }
}
