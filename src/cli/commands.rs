// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enums)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::args::SrlArgs;
use crate::domain::Split;
use crate::infra::scorer::DEFAULT_EVAL_COMMAND;
use crate::ml::optim::OptimizerKind;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a role labeler and checkpoint it every epoch
    Train(TrainArgs),

    /// Score a trained model directory on one split
    Evaluate(EvaluateArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitArg {
    Train,
    Dev,
    Test,
    Ood,
}

impl From<SplitArg> for Split {
    fn from(s: SplitArg) -> Self {
        match s {
            SplitArg::Train => Split::Train,
            SplitArg::Dev   => Split::Dev,
            SplitArg::Test  => Split::Test,
            SplitArg::Ood   => Split::Ood,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerArg {
    Adam,
    Adadelta,
}

impl From<OptimizerArg> for OptimizerKind {
    fn from(o: OptimizerArg) -> Self {
        match o {
            OptimizerArg::Adam     => OptimizerKind::Adam,
            OptimizerArg::Adadelta => OptimizerKind::Adadelta,
        }
    }
}

/// Flags shared by both subcommands.
#[derive(Args, Debug, Clone)]
pub struct Locations {
    /// Root of the data/{language}/... tree
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    /// Predictions are written under {output_root}/predictions/
    #[arg(long, default_value = "output")]
    pub output_root: PathBuf,

    /// Scorer invoked as `<command> <gold> <system>`
    #[arg(long, default_value = DEFAULT_EVAL_COMMAND)]
    pub eval_command: String,

    /// Skip the external scorer
    #[arg(long)]
    pub no_eval: bool,
}

impl Locations {
    pub fn eval_command(&self) -> Option<String> {
        (!self.no_eval).then(|| self.eval_command.clone())
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory for checkpoints, args.json, vocabs.json and metrics.csv
    #[arg(long, default_value = "model")]
    pub model_dir: PathBuf,

    #[command(flatten)]
    pub locations: Locations,

    /// Corpus language (selects data/{language}/)
    #[arg(long, default_value = "eng")]
    pub language: String,

    #[arg(long, default_value_t = 89)]
    pub seed: u64,

    /// Predicate instances per batch
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 100)]
    pub word_embed_size: usize,

    /// Width of the pretrained word vectors
    #[arg(long, default_value_t = 100)]
    pub pretrained_embed_size: usize,

    #[arg(long, default_value_t = 16)]
    pub pos_embed_size: usize,

    #[arg(long, default_value_t = 100)]
    pub lemma_embed_size: usize,

    /// Lemma embedding used by the role scorer
    #[arg(long, default_value_t = 128)]
    pub output_lemma_embed_size: usize,

    #[arg(long, default_value_t = 128)]
    pub role_embed_size: usize,

    /// Width of contextual vectors; 0 disables them
    #[arg(long, default_value_t = 0)]
    pub context_embed_size: usize,

    #[arg(long, default_value_t = 16)]
    pub stag_embed_size: usize,

    #[arg(long, default_value_t = 50)]
    pub stag_feature_embed_size: usize,

    /// LSTM state size per direction
    #[arg(long, default_value_t = 512)]
    pub state_size: usize,

    /// Stacked bidirectional layers
    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    #[arg(long)]
    pub use_highway_lstm: bool,

    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    #[arg(long, default_value_t = 0.0)]
    pub recurrent_dropout: f64,

    /// Disable frequency-based word dropout
    #[arg(long)]
    pub no_word_dropout: bool,

    /// Word dropout strength: p = alpha / (freq + alpha)
    #[arg(long, default_value_t = 0.25)]
    pub alpha: f64,

    #[arg(long, value_enum, default_value_t = OptimizerArg::Adam)]
    pub optimizer: OptimizerArg,

    /// Score only roles licensed by each predicate lemma
    #[arg(long)]
    pub restrict_labels: bool,

    #[arg(long)]
    pub use_stags: bool,

    /// Add frozen supertag feature vectors (needs --use-stags)
    #[arg(long)]
    pub use_stag_features: bool,

    #[arg(long, default_value = "ud")]
    pub stag_type: String,

    /// Directory under data/{language}/srl/ holding supertag files
    #[arg(long, default_value = "pred")]
    pub stags_dir: String,
}

/// Convert CLI TrainArgs into the persisted SrlArgs.
/// The application layer never sees clap types.
impl From<&TrainArgs> for SrlArgs {
    fn from(a: &TrainArgs) -> Self {
        SrlArgs {
            language:      a.language.clone(),
            seed:          a.seed,
            batch_size:    a.batch_size,
            epochs:        a.epochs,
            learning_rate: a.learning_rate,

            word_embed_size:         a.word_embed_size,
            pretrained_embed_size:   a.pretrained_embed_size,
            pos_embed_size:          a.pos_embed_size,
            lemma_embed_size:        a.lemma_embed_size,
            output_lemma_embed_size: a.output_lemma_embed_size,
            role_embed_size:         a.role_embed_size,
            context_embed_size:      a.context_embed_size,
            stag_embed_size:         a.stag_embed_size,
            stag_feature_embed_size: a.stag_feature_embed_size,

            state_size:        a.state_size,
            num_layers:        a.num_layers,
            use_highway_lstm:  a.use_highway_lstm,
            dropout:           a.dropout,
            recurrent_dropout: a.recurrent_dropout,
            use_word_dropout:  !a.no_word_dropout,
            alpha:             a.alpha,

            optimizer:       a.optimizer.into(),
            restrict_labels: a.restrict_labels,

            use_stags:         a.use_stags,
            use_stag_features: a.use_stag_features,
            stag_type:         a.stag_type.clone(),
            stags_dir:         a.stags_dir.clone(),
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory written by `train`
    pub model_dir: PathBuf,

    /// Split to label
    #[arg(value_enum)]
    pub split: SplitArg,

    /// Only predict roles licensed by each predicate lemma
    #[arg(long)]
    pub restrict_labels: bool,

    #[command(flatten)]
    pub locations: Locations,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_srl_args() {
        let cli = Cli::try_parse_from(["srl", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(SrlArgs::from(&args), SrlArgs::default());
        assert_eq!(args.locations.eval_command().as_deref(), Some(DEFAULT_EVAL_COMMAND));
    }

    #[test]
    fn test_evaluate_parses_split_and_flag() {
        let cli = Cli::try_parse_from(["srl", "evaluate", "runs/m1", "ood", "--restrict-labels", "--no-eval"])
            .unwrap();
        let Commands::Evaluate(args) = cli.command else { panic!("expected evaluate") };
        assert_eq!(Split::from(args.split), Split::Ood);
        assert!(args.restrict_labels);
        assert_eq!(args.locations.eval_command(), None);
    }

    #[test]
    fn test_unknown_split_is_rejected() {
        assert!(Cli::try_parse_from(["srl", "evaluate", "m", "valid"]).is_err());
    }

    #[test]
    fn test_optimizer_flag() {
        let cli = Cli::try_parse_from(["srl", "train", "--optimizer", "adadelta", "--no-word-dropout"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let srl = SrlArgs::from(&args);
        assert_eq!(srl.optimizer, OptimizerKind::Adadelta);
        assert!(!srl.use_word_dropout);
    }
}
