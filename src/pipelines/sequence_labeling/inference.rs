use std::sync::Arc;

use burn::{
    config::Config as _,
    data::dataloader::batcher::Batcher as _,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::backend::Backend,
};

use crate::models::{tagger, ModelError};

use super::{batcher::Infer, evaluation::id_to_labels, Batcher, Item, Vocab};

/// Define inference function
pub fn infer<B: Backend, I: Item>(
    device: B::Device,  // Device on which to perform computation (e.g., CPU or CUDA device)
    artifact_dir: &str, // The directory holding a trained model
    items: Vec<I>,      // Sentences to tag
    batch_size: usize,  // Number of sentences decoded at once
) -> anyhow::Result<Vec<Vec<String>>> {
    // Load experiment configuration
    let config = tagger::Config::load(format!("{artifact_dir}/config.json").as_str())
        .map_err(|e| anyhow!("Unable to load config file: {}", e))?;

    let vocab = Vocab::load(format!("{artifact_dir}/vocab.json"))
        .map_err(|e| anyhow!("Unable to load vocabulary: {}", e))?;

    if let Some(item) = items.iter().find(|item| item.file_no() >= config.file_num) {
        return Err(ModelError::UnknownFile {
            file_no: item.file_no(),
            file_num: config.file_num,
        }
        .into());
    }

    // Load pre-trained model weights
    let record = CompactRecorder::new()
        .load(format!("{artifact_dir}/model").into(), &device)
        .map_err(|e| anyhow!("Unable to load trained model weights: {}", e))?;

    // Create model using loaded weights
    let model = config.init::<B>(&device).load_record(record);

    // Initialize batcher for batching samples
    let batcher = Batcher::<B>::new(Arc::new(vocab), config.file_num, config.max_seq_len, device);

    let mut labels = Vec::with_capacity(items.len());

    for chunk in items.chunks(batch_size.max(1)) {
        let input: Infer<B> = batcher.batch(chunk.to_vec());

        for path in model.decode(input) {
            labels.push(
                id_to_labels(&batcher.vocab, &path)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            );
        }
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::NdArray,
        config::Config as _,
        module::Module,
        record::{CompactRecorder, Recorder},
    };

    use crate::{datasets::Sentence, models::tagger::model::tests::{config, vocab}};

    use super::*;

    type TestBackend = NdArray<f32>;

    /// Write the artifacts of a freshly initialised two-corpus model
    fn artifacts(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("burn-tagger-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let dir = dir.display().to_string();

        let config = config(false);
        config.save(format!("{dir}/config.json")).unwrap();
        vocab().save(format!("{dir}/vocab.json")).unwrap();

        CompactRecorder::new()
            .record(
                config.init::<TestBackend>(&Default::default()).into_record(),
                format!("{dir}/model").into(),
            )
            .unwrap();

        dir
    }

    fn sentence(words: &[&str], file_no: usize) -> Sentence {
        Sentence::new(words.iter().map(|w| w.to_string()).collect(), Vec::new(), file_no)
    }

    #[test]
    fn test_infer_labels_every_word() {
        let dir = artifacts("infer");
        let labels = vocab().labels;

        let tagged = infer::<TestBackend, _>(
            Default::default(),
            &dir,
            vec![sentence(&["ab", "c", "dd"], 1), sentence(&["zz"], 0)],
            1,
        )
        .unwrap();

        assert_eq!(tagged.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 1]);
        assert!(tagged.iter().flatten().all(|label| labels.contains(label)));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_infer_rejects_unknown_corpus() {
        let dir = artifacts("infer-unknown");

        let err = infer::<TestBackend, _>(
            Default::default(),
            &dir,
            vec![sentence(&["ab"], 0), sentence(&["c"], 2)],
            10,
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::UnknownFile {
                file_no: 2,
                file_num: 2
            })
        ));

        std::fs::remove_dir_all(dir).ok();
    }
}
