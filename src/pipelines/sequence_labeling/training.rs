use std::sync::Arc;

use burn::{
    config::Config as _,
    data::dataloader::{DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::{AutodiffModule, Module},
    optim::AdamWConfig,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
    train::{
        metric::{CudaMetric, LearningRateMetric, LossMetric},
        LearnerBuilder,
    },
};
use serde::Serialize;

use crate::{
    datasets::{conll::read_corpora, Dataset},
    utils::{embeddings::Embeddings, files::ensure_dir, renderer::Simple},
};

use super::{
    evaluation::{evaluate, Scores},
    vocab::VocabBuilder,
    Batcher, Train,
};

/// Training Config
pub type Config = super::config::Training;

/// Scores of the trained model on one corpus
#[derive(Debug, Serialize)]
pub struct CorpusScores {
    /// The corpus index
    pub file_no: usize,

    /// Scores on the development corpus
    pub dev: Scores,

    /// Scores on the test corpus
    pub test: Scores,
}

/// Define train function
pub async fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>, // Devices on which to perform computation (e.g., CPU or CUDA devices)
    config: Config,          // Experiment configuration
    use_tui: bool,           // Render progress in the terminal UI instead of the log
) -> anyhow::Result<Vec<CorpusScores>> {
    let device = devices
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("No training device given"))?;

    let file_num = config.train_files.len();
    if file_num == 0 {
        return Err(anyhow!("At least one training corpus is required"));
    }
    if config.dev_files.len() != file_num || config.test_files.len() != file_num {
        return Err(anyhow!(
            "Expected {} dev and test corpora, found {} and {}",
            file_num,
            config.dev_files.len(),
            config.test_files.len()
        ));
    }

    let artifact_dir = config.artifact_dir.clone();
    ensure_dir(&artifact_dir).await?;

    let (train, dev, test) = tokio::try_join!(
        read_corpora(&config.train_files),
        read_corpora(&config.dev_files),
        read_corpora(&config.test_files),
    )
    .map_err(|e| anyhow!("Unable to read corpora: {}", e))?;

    let embeddings = match &config.embedding_file {
        Some(path) => Some(
            Embeddings::load(path, config.caseless)
                .await
                .map_err(|e| anyhow!("Unable to load word embeddings from {}: {}", path, e))?,
        ),
        None => None,
    };

    let train_items = train.concat();
    let dev_items = dev.concat();
    let extra_items = [dev_items.as_slice(), test.concat().as_slice()].concat();

    let vocab = VocabBuilder::new(config.mini_count, config.caseless, config.shrink_embedding)
        .build(&train_items, &extra_items, embeddings.as_ref());

    log::info!(
        "Vocabulary: {} words ({} in corpus), {} chars, {} labels",
        vocab.words.len(),
        vocab.in_doc_words,
        vocab.chars.len(),
        vocab.labels.len()
    );

    let model_config = config.model.clone().sized_for(&vocab, file_num);

    B::seed(config.seed);

    let mut model = model_config.init::<B>(&device);

    if let Some(embeddings) = &embeddings {
        let weights = embeddings.weights::<B>(&vocab.words, config.seed, &device);
        model = model.load_pretrained_word_embedding(weights)?;
    }

    // Save the configuration and the vocabulary before training so checkpoints can be restored
    config
        .save(format!("{artifact_dir}/training.json"))
        .map_err(|e| anyhow!("Unable to save training config: {}", e))?;
    model_config
        .save(format!("{artifact_dir}/config.json"))
        .map_err(|e| anyhow!("Unable to save model config: {}", e))?;
    vocab.save(format!("{artifact_dir}/vocab.json"))?;

    let vocab = Arc::new(vocab);

    // Initialize batchers for training and validation data
    let batcher_train = Batcher::<B>::new(
        vocab.clone(),
        file_num,
        model_config.max_seq_len,
        device.clone(),
    );
    let batcher_valid = Batcher::<B::InnerBackend>::new(
        vocab,
        file_num,
        model_config.max_seq_len,
        device.clone(),
    );

    let workers = std::thread::available_parallelism()?;

    // Initialize data loaders for training and validation data
    let dataloader_train: Arc<dyn DataLoader<Train<B>>> =
        DataLoaderBuilder::new(batcher_train)
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(workers.into())
            .build(Dataset::new(train_items));

    let dataloader_valid: Arc<dyn DataLoader<Train<B::InnerBackend>>> =
        DataLoaderBuilder::new(batcher_valid.clone())
            .batch_size(config.batch_size)
            .num_workers(workers.into())
            .build(Dataset::new(dev_items));

    // Initialize optimizer
    let optimizer = AdamWConfig::new()
        .with_epsilon(config.adam_epsilon)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(config.clip_grad)))
        .init();

    // Initialize learner
    let mut builder = LearnerBuilder::new(&artifact_dir)
        .metric_train(CudaMetric::new())
        .metric_valid(CudaMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .metric_train_numeric(LearningRateMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(devices)
        .num_epochs(config.num_epochs)
        .summary();

    if !use_tui {
        builder = builder.renderer(Simple::new());
    }

    let learner = builder.build(model, optimizer, config.learning_rate);

    // Train the model
    let model_trained = learner.fit(dataloader_train, dataloader_valid);

    CompactRecorder::new()
        .record(
            model_trained.clone().into_record(),
            format!("{artifact_dir}/model").into(),
        )
        .map_err(|e| anyhow!("Unable to save trained model: {}", e))?;

    let model_valid = model_trained.valid();

    let scores = dev
        .iter()
        .zip(&test)
        .enumerate()
        .map(|(file_no, (dev, test))| {
            let scores = CorpusScores {
                file_no,
                dev: evaluate(&model_valid, &batcher_valid, dev.as_slice(), config.batch_size),
                test: evaluate(&model_valid, &batcher_valid, test.as_slice(), config.batch_size),
            };

            log::info!(
                "Corpus {}: dev F1 {:.4} (accuracy {:.4}), test F1 {:.4} (accuracy {:.4})",
                file_no,
                scores.dev.f1,
                scores.dev.accuracy,
                scores.test.f1,
                scores.test.accuracy
            );

            scores
        })
        .collect::<Vec<_>>();

    save_scores(&artifact_dir, &scores)?;

    Ok(scores)
}

fn save_scores(artifact_dir: &str, scores: &[CorpusScores]) -> anyhow::Result<()> {
    let file = std::fs::File::create(format!("{artifact_dir}/scores.json"))?;
    serde_json::to_writer_pretty(file, scores)?;

    Ok(())
}
