//! Command line tool to train a tagger

use anyhow::anyhow;
use burn::{
    backend::{libtorch::LibTorchDevice, Autodiff, LibTorch},
    config::Config as _,
};
use burn_tagger::{
    cli::{split_list, Crf, Encoder},
    pipelines::sequence_labeling::{self, training::Config},
};
use pico_args::Arguments;

const HELP: &str = "\
Usage: train --train FILES --dev FILES --test FILES [OPTIONS]

Corpora are comma separated CoNLL files; the i-th dev and test files belong to the i-th training
file, and each training file gets its own CRF head.

Options:
  -h, --help           Print help
  --train              Training corpora
  --dev                Development corpora
  --test               Test corpora
  -c, --config         A training config (JSON) to start from
  -e, --embedding      Pre-trained word vectors in text format
  -o, --artifact-dir   Where the model and its vocabulary are written (defaults to 'artifacts')
  --encoder            Word encoder: 'lstm' or 'attention'
  --crf                CRF heads: 'large' or 'small'
  --highway            Project character features through highway layers
  --no-co-train        Train without the word prediction losses
  --caseless           Lower-case words
  -n, --num-epochs     Number of epochs to train for
  -b, --batch-size     Batch size
  --cpu                Train on the CPU instead of the first CUDA device
  --no-tui             Disable TUI
";

#[derive(Debug)]
struct Args {
    train: Option<String>,
    dev: Option<String>,
    test: Option<String>,
    config: Option<String>,
    embedding: Option<String>,
    artifact_dir: Option<String>,
    encoder: Option<String>,
    crf: Option<String>,
    highway: bool,
    co_train: bool,
    caseless: bool,
    num_epochs: Option<usize>,
    batch_size: Option<usize>,
    cpu: bool,
    use_tui: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            train: pargs.opt_value_from_str("--train")?,
            dev: pargs.opt_value_from_str("--dev")?,
            test: pargs.opt_value_from_str("--test")?,
            config: pargs.opt_value_from_str(["-c", "--config"])?,
            embedding: pargs.opt_value_from_str(["-e", "--embedding"])?,
            artifact_dir: pargs.opt_value_from_str(["-o", "--artifact-dir"])?,
            encoder: pargs.opt_value_from_str("--encoder")?,
            crf: pargs.opt_value_from_str("--crf")?,
            highway: pargs.contains("--highway"),
            co_train: !(pargs.contains("--no-co-train")),
            caseless: pargs.contains("--caseless"),
            num_epochs: pargs.opt_value_from_str(["-n", "--num-epochs"])?,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            cpu: pargs.contains("--cpu"),
            use_tui: !(pargs.contains("--no-tui")),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }

    /// Build the training config, starting from the config file when one is given
    fn config(&self) -> anyhow::Result<Config> {
        let corpora = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .map(split_list)
                .ok_or_else(|| anyhow!("Missing required argument: --{}", name))
        };

        let mut config = match &self.config {
            Some(path) => {
                Config::load(path).map_err(|e| anyhow!("Unable to load {}: {}", path, e))?
            }
            None => Config::new(
                corpora(&self.train, "train")?,
                corpora(&self.dev, "dev")?,
                corpora(&self.test, "test")?,
            ),
        };

        if self.config.is_some() {
            if let Ok(train) = corpora(&self.train, "train") {
                config.train_files = train;
            }
            if let Ok(dev) = corpora(&self.dev, "dev") {
                config.dev_files = dev;
            }
            if let Ok(test) = corpora(&self.test, "test") {
                config.test_files = test;
            }
        }

        if let Some(embedding) = &self.embedding {
            config.embedding_file = Some(embedding.clone());
        }

        if let Some(artifact_dir) = &self.artifact_dir {
            config.artifact_dir = artifact_dir.clone();
        }

        if let Some(encoder) = &self.encoder {
            config.model = Encoder::try_from(encoder.as_str())?.apply(config.model);
        }

        if let Some(crf) = &self.crf {
            config.model = Crf::try_from(crf.as_str())?.apply(config.model);
        }

        if self.highway {
            config.model.highway = true;
        }

        if !self.co_train {
            config.model.co_train = false;
        }

        if self.caseless {
            config.caseless = true;
        }

        if let Some(num_epochs) = self.num_epochs {
            config.num_epochs = num_epochs;
        }

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let config = args.config()?;

    let device = if args.cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    let scores =
        sequence_labeling::train::<Autodiff<LibTorch>>(vec![device], config, args.use_tui).await?;

    for corpus in scores {
        println!(
            "corpus {}: dev F1 {:.4}, test F1 {:.4}",
            corpus.file_no, corpus.dev.f1, corpus.test.f1
        );
    }

    Ok(())
}
