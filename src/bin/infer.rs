//! Command line tool to tag sentences with a trained model

use anyhow::{anyhow, Result};
use burn::backend::{libtorch::LibTorchDevice, LibTorch};
use burn_tagger::{datasets::conll::read_raw, pipelines::sequence_labeling::infer};
use pico_args::Arguments;

const HELP: &str = "\
Usage: infer ARTIFACT_DIR INPUT [OPTIONS]

Arguments:
  ARTIFACT_DIR         The directory written by 'train'
  INPUT                A file with one whitespace tokenized sentence per line

Options:
  -h, --help           Print help
  -f, --file-no        The corpus whose CRF head tags the input (defaults to 0)
  -b, --batch-size     Number of sentences decoded at once (defaults to 50)
  --cpu                Run on the CPU instead of the first CUDA device
";

#[derive(Debug)]
struct Args {
    /// Prints the usage menu
    help: bool,

    /// The directory holding the trained model
    artifact_dir: String,

    /// The sentences to tag
    input: String,

    /// The corpus head to use
    file_no: usize,

    /// Sentences per batch
    batch_size: usize,

    /// Run on the CPU
    cpu: bool,
}

fn parse_args() -> Result<Args> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        return Ok(Args {
            help: true,
            artifact_dir: String::new(),
            input: String::new(),
            file_no: 0,
            batch_size: 0,
            cpu: false,
        });
    }

    let args = Args {
        help: false,
        file_no: pargs
            .opt_value_from_str(["-f", "--file-no"])?
            .unwrap_or(0),
        batch_size: pargs
            .opt_value_from_str(["-b", "--batch-size"])?
            .unwrap_or(50),
        cpu: pargs.contains("--cpu"),
        artifact_dir: pargs.free_from_str().map_err(|e| match e {
            pico_args::Error::MissingArgument => anyhow!("Missing required argument: ARTIFACT_DIR"),
            _ => anyhow!("{}", e),
        })?,
        input: pargs.free_from_str().map_err(|e| match e {
            pico_args::Error::MissingArgument => anyhow!("Missing required argument: INPUT"),
            _ => anyhow!("{}", e),
        })?,
    };

    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = parse_args()?;

    if args.help {
        println!("{}", HELP);
        return Ok(());
    }

    let device = if args.cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    let sentences = read_raw(&args.input, args.file_no)
        .await
        .map_err(|e| anyhow!("Unable to read {}: {}", args.input, e))?;

    log::info!("Tagging {} sentences", sentences.len());

    // Get model predictions
    let labels = infer::<LibTorch, _>(
        device,
        &args.artifact_dir,
        sentences.clone(),
        args.batch_size,
    )?;

    // Print out each word with its predicted label
    for (sentence, labels) in sentences.iter().zip(labels) {
        let tagged = sentence
            .words
            .iter()
            .zip(labels)
            .map(|(word, label)| format!("{word}/{label}"))
            .collect::<Vec<_>>();

        println!("{}", tagged.join(" "));
    }

    Ok(())
}
