// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Seed the backend                     (Layer 5 - ml)
//   Step 2: Load vocabularies                    (Layer 3 - domain)
//   Step 3: Save args + vocabs beside the model  (Layer 6 - infra)
//   Step 4: Build the model from vector tables   (Layer 5 / 6)
//   Step 5: Wire producer, embedder and scorer   (Layer 4 / 6)
//   Step 6: Run the epoch loop                   (Layer 5 - ml)
//
// Each epoch:
//   train → dev evaluation on model.valid() → score → checkpoint
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    module::AutodiffModule,
    optim::Optimizer,
    tensor::backend::AutodiffBackend,
};
use std::path::PathBuf;

use crate::application::{args::SrlArgs, resources};
use crate::domain::{traits::PredictionScorer, Split};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    model::SrlModel,
    optim::{adadelta, adam, OptimizerKind},
    trainer::SrlTrainer,
};

/// Backend used by the command-line binary.
type TrainBackend = Autodiff<Wgpu>;

// ─── Training Settings ────────────────────────────────────────────────────────
/// Everything a training run needs beyond the persisted hyper-parameters.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub args:         SrlArgs,
    pub model_dir:    PathBuf,
    /// Root of the `data/{language}/...` tree
    pub data_root:    PathBuf,
    /// Predictions go to `{output_root}/predictions/dev.txt`
    pub output_root:  PathBuf,
    /// External scorer; dev F1 is skipped when absent
    pub eval_command: Option<String>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    settings: TrainSettings,
}

impl TrainUseCase {
    pub fn new(settings: TrainSettings) -> Self {
        Self { settings }
    }

    /// Train on the GPU backend. Returns one metrics row per epoch.
    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let device = WgpuDevice::default();
        self.execute_on::<TrainBackend>(&device)
    }

    /// Execute the full training pipeline end to end on any autodiff backend.
    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<Vec<EpochMetrics>> {
        let s    = &self.settings;
        let args = &s.args;
        args.validate()?;

        // ── Step 1: Seed ──────────────────────────────────────────────────────
        B::seed(args.seed);

        // ── Step 2: Vocabularies ──────────────────────────────────────────────
        let vocabs = resources::load_vocabs(&s.data_root, &args.language)?;

        // ── Step 3: Persist what evaluate needs to rebuild the model ─────────
        let ckpt = CheckpointManager::create(&s.model_dir)?;
        ckpt.save_args(args)?;
        ckpt.save_vocabs(&vocabs)?;

        // ── Step 4: Model ─────────────────────────────────────────────────────
        let pretrained    = resources::pretrained_matrix(args, &vocabs, &s.data_root)?;
        let stag_features = resources::stag_feature_matrix(args, &vocabs, &s.data_root)?;
        let config = args.model_config(&vocabs);
        let model  = config.init_with::<B>(&pretrained, stag_features.as_ref(), device)?;
        tracing::info!(
            "Model: {} layers of {} units, {} roles",
            config.num_layers, config.state_size, config.num_roles
        );

        // ── Step 5: Producer, embedder, scorer ────────────────────────────────
        let mut trainer = resources::build_trainer(args, vocabs, &s.data_root, args.restrict_labels)?;
        let scorer      = resources::scorer(s.eval_command.as_deref())?;
        let logger      = MetricsLogger::new(&s.model_dir)?;

        let run = EpochRun {
            settings: s,
            ckpt:     &ckpt,
            logger:   &logger,
            scorer:   scorer.as_deref(),
        };

        // ── Step 6: Epoch loop ────────────────────────────────────────────────
        match args.optimizer {
            OptimizerKind::Adam => {
                run.epochs(&mut trainer, model, adam::<B, SrlModel<B>>(), device)
            }
            OptimizerKind::Adadelta => {
                run.epochs(&mut trainer, model, adadelta::<B, SrlModel<B>>(), device)
            }
        }
    }
}

/// Per-run collaborators borrowed by the epoch loop.
struct EpochRun<'a> {
    settings: &'a TrainSettings,
    ckpt:     &'a CheckpointManager,
    logger:   &'a MetricsLogger,
    scorer:   Option<&'a dyn PredictionScorer>,
}

impl EpochRun<'_> {
    fn epochs<B, O>(
        &self,
        trainer:   &mut SrlTrainer,
        mut model: SrlModel<B>,
        mut optim: O,
        device:    &B::Device,
    ) -> Result<Vec<EpochMetrics>>
    where
        B: AutodiffBackend,
        O: Optimizer<SrlModel<B>, B>,
    {
        let args      = &self.settings.args;
        let dev_out   = resources::predictions_path(&self.settings.output_root, Split::Dev);
        let dev_gold  = resources::corpus_producer(args, &self.settings.data_root).files(Split::Dev).corpus;
        let mut best  = f64::INFINITY;
        let mut rows  = Vec::with_capacity(args.epochs);

        for epoch in 1..=args.epochs {
            tracing::info!("Epoch {}/{}", epoch, args.epochs);

            let (next, train_loss) =
                trainer.run_training_epoch(model, &mut optim, args.learning_rate, device)?;
            model = next;

            // Dropout-free pass on the inner backend
            let valid_loss = trainer.run_testing_epoch(&model.valid(), Split::Dev, &dev_out, device)?;

            let f1 = match self.scorer {
                Some(scorer) => Some(scorer.score(&dev_gold, &dev_out)?),
                None => None,
            };

            let metrics = EpochMetrics::new(epoch, train_loss, valid_loss, f1);
            if metrics.is_improvement(best) {
                best = valid_loss;
                tracing::info!("New best dev loss {:.4}", best);
            }
            match f1 {
                Some(f1) => tracing::info!(
                    "Epoch {} | train loss {:.4} | dev loss {:.4} | labeled F1 {:.2} | unlabeled F1 {:.2}",
                    epoch, train_loss, valid_loss, f1.labeled, f1.unlabeled
                ),
                None => tracing::info!(
                    "Epoch {} | train loss {:.4} | dev loss {:.4}",
                    epoch, train_loss, valid_loss
                ),
            }

            self.ckpt.save_model(&model, epoch)?;
            self.logger.log(&metrics)?;
            rows.push(metrics);
        }

        tracing::info!("Training complete. Checkpoints in '{}'", self.ckpt.dir().display());
        Ok(rows)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::resources::tests::write_toy_data;
    use burn::backend::NdArray;
    use std::{fs, path::Path};

    type TestAutodiffBackend = Autodiff<NdArray>;

    /// Settings small enough to train on the toy corpus in a test.
    pub(crate) fn tiny_settings(root: &Path, optimizer: OptimizerKind) -> TrainSettings {
        TrainSettings {
            args: SrlArgs {
                seed:                    5,
                batch_size:              2,
                epochs:                  2,
                learning_rate:           0.01,
                word_embed_size:         4,
                pretrained_embed_size:   3,
                pos_embed_size:          2,
                lemma_embed_size:        2,
                output_lemma_embed_size: 3,
                role_embed_size:         3,
                state_size:              4,
                num_layers:              1,
                optimizer,
                ..SrlArgs::default()
            },
            model_dir:    root.join("model"),
            data_root:    root.join("data"),
            output_root:  root.join("output"),
            eval_command: None,
        }
    }

    #[test]
    fn test_training_run_writes_model_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = tiny_settings(dir.path(), OptimizerKind::Adam);
        write_toy_data(&settings.data_root, "eng");

        let rows = TrainUseCase::new(settings.clone())
            .execute_on::<TestAutodiffBackend>(&Default::default())
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.train_loss.is_finite() && r.valid_loss.is_finite()));
        assert!(rows.iter().all(|r| r.f1.is_none()));

        let ckpt = CheckpointManager::open(&settings.model_dir).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
        assert_eq!(ckpt.load_args().unwrap(), settings.args);

        let metrics = fs::read_to_string(settings.model_dir.join("metrics.csv")).unwrap();
        assert_eq!(metrics.lines().count(), 3);

        let predictions = fs::read_to_string(settings.output_root.join("predictions/dev.txt")).unwrap();
        assert_eq!(predictions.lines().count(), 2);
    }

    #[test]
    fn test_adadelta_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = tiny_settings(dir.path(), OptimizerKind::Adadelta);
        settings.args.epochs = 1;
        write_toy_data(&settings.data_root, "eng");

        let rows = TrainUseCase::new(settings)
            .execute_on::<TestAutodiffBackend>(&Default::default())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].train_loss.is_finite());
    }

    #[cfg(unix)]
    #[test]
    fn test_scorer_runs_every_epoch() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("eval.sh");
        fs::write(&script, "#!/bin/sh\necho 'Labeled F1: 42.0'\necho 'Unlabeled F1: 50.0'\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut settings = tiny_settings(dir.path(), OptimizerKind::Adam);
        settings.eval_command = Some(script.to_string_lossy().into_owned());
        write_toy_data(&settings.data_root, "eng");

        let rows = TrainUseCase::new(settings)
            .execute_on::<TestAutodiffBackend>(&Default::default())
            .unwrap();
        for row in rows {
            let f1 = row.f1.unwrap();
            assert_eq!((f1.labeled, f1.unlabeled), (42.0, 50.0));
        }
    }

    #[test]
    fn test_missing_vocabularies_fail_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let settings = tiny_settings(dir.path(), OptimizerKind::Adam);
        let result = TrainUseCase::new(settings.clone()).execute_on::<TestAutodiffBackend>(&Default::default());
        assert!(result.is_err());
        assert!(!settings.model_dir.join("args.json").exists());
    }
}
