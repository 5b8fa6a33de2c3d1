// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   (no command) — run the experiment with default settings
//   train        — same, with overridable hyperparameters
//   evaluate     — score a saved checkpoint on validation data

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "mnist-pi",
    version,
    about = "Train a dropout MLP on permutation-invariant MNIST, keeping the best network."
)]
pub struct Cli {
    /// Defaults to `train` with every flag at its default
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Some(Commands::Train(args))    => run_train(args),
            Some(Commands::Evaluate(args)) => run_evaluate(args),
            None                           => run_train(TrainArgs::default()),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::{TrainUseCase, VALIDATION_ACCURACY};

    let report = TrainUseCase::new(args.into()).execute()?;
    tracing::info!("Trained for {} epochs", report.epochs());
    tracing::debug!(
        "Best validation accuracy by epoch: {:?}",
        report.log.running_max(VALIDATION_ACCURACY)
    );

    println!("The training took {:.4} seconds.", report.elapsed_secs);
    match report.best_accuracy {
        Some(best) => println!("Best validation accuracy: {best}"),
        None       => println!("Best validation accuracy: n/a (no epochs run)"),
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.into()).execute()?;
    println!("Validation samples: {}", report.samples);
    println!("Validation loss: {:.4}", report.loss);
    println!("Validation accuracy: {}", report.accuracy);
    Ok(())
}
