// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — trains a labeler and checkpoints every epoch
//   2. `evaluate` — reloads a model directory and scores one split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

use crate::application::{
    evaluate_use_case::{EvaluateSettings, EvaluateUseCase},
    train_use_case::{TrainSettings, TrainUseCase},
};

/// The main CLI struct. clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "srl",
    version = "0.1.0",
    about = "Train and evaluate a syntax-agnostic semantic role labeler."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let settings = TrainSettings {
        args:         (&args).into(),
        model_dir:    args.model_dir.clone(),
        data_root:    args.locations.data_root.clone(),
        output_root:  args.locations.output_root.clone(),
        eval_command: args.locations.eval_command(),
    };
    tracing::info!("Training into '{}'", settings.model_dir.display());

    let rows = TrainUseCase::new(settings).execute()?;

    println!("\nTraining complete.");
    for m in &rows {
        match m.f1 {
            Some(f1) => println!(
                "  epoch {:>3}  train {:.4}  dev {:.4}  labeled F1 {:.2}  unlabeled F1 {:.2}",
                m.epoch, m.train_loss, m.valid_loss, f1.labeled, f1.unlabeled
            ),
            None => println!(
                "  epoch {:>3}  train {:.4}  dev {:.4}",
                m.epoch, m.train_loss, m.valid_loss
            ),
        }
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let settings = EvaluateSettings {
        model_dir:       args.model_dir,
        split:           args.split.into(),
        restrict_labels: args.restrict_labels,
        data_root:       args.locations.data_root.clone(),
        output_root:     args.locations.output_root.clone(),
        eval_command:    args.locations.eval_command(),
    };

    let report = EvaluateUseCase::new(settings).execute()?;

    println!("\nSplit:           {}", report.split);
    println!("Loss:            {:.4}", report.loss);
    println!("Predictions:     {}", report.predictions.display());
    if let Some(f1) = report.f1 {
        println!("Labeled F1:      {:.2}", f1.labeled);
        println!("Unlabeled F1:    {:.2}", f1.unlabeled);
    }
    Ok(())
}
