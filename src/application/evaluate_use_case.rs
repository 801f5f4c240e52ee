// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores a trained model directory on one split:
//
//   Step 1: Read args.json (language defaults to "eng") and
//           vocabs.json; supertags always come from "pred"
//   Step 2: Rebuild the architecture and load the weights
//   Step 3: One evaluation epoch → output/predictions/{split}.txt
//   Step 4: Run the external scorer on gold vs. predictions
//
// The evaluation epoch never updates weights, so this runs on
// the plain (non-autodiff) backend.

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Wgpu},
    prelude::*,
};
use std::path::PathBuf;

use crate::application::{args::DEFAULT_STAGS_DIR, resources};
use crate::domain::{traits::F1Scores, Split};
use crate::infra::checkpoint::CheckpointManager;

// ─── Evaluation Settings ──────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct EvaluateSettings {
    pub model_dir:       PathBuf,
    pub split:           Split,
    /// Restrict predicted roles to those licensed by each predicate,
    /// in addition to whatever the model was trained with
    pub restrict_labels: bool,
    pub data_root:       PathBuf,
    pub output_root:     PathBuf,
    pub eval_command:    Option<String>,
}

/// What one evaluation produced.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub split:       Split,
    pub loss:        f64,
    pub predictions: PathBuf,
    pub f1:          Option<F1Scores>,
}

// ─── EvaluateUseCase ──────────────────────────────────────────────────────────
pub struct EvaluateUseCase {
    settings: EvaluateSettings,
}

impl EvaluateUseCase {
    pub fn new(settings: EvaluateSettings) -> Self {
        Self { settings }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let device = WgpuDevice::default();
        self.execute_on::<Wgpu>(&device)
    }

    pub fn execute_on<B: Backend>(&self, device: &B::Device) -> Result<EvaluationReport> {
        let s = &self.settings;

        // ── Step 1: Saved configuration ───────────────────────────────────────
        let ckpt     = CheckpointManager::open(&s.model_dir)?;
        let mut args = ckpt.load_args()?;
        args.stags_dir = DEFAULT_STAGS_DIR.to_string();
        let vocabs   = ckpt.load_vocabs()?;
        let restrict = args.restrict_labels || s.restrict_labels;
        tracing::info!(
            "Evaluating '{}' on {} ({}, restrict_labels={})",
            s.model_dir.display(), s.split, args.language, restrict
        );

        // ── Step 2: Model ─────────────────────────────────────────────────────
        let model = ckpt.load_model(args.model_config(&vocabs).init::<B>(device), device)?;

        // ── Step 3: Evaluation epoch ──────────────────────────────────────────
        let mut trainer = resources::build_trainer(&args, vocabs, &s.data_root, restrict)?;
        let predictions = resources::predictions_path(&s.output_root, s.split);
        let loss = trainer.run_testing_epoch(&model, s.split, &predictions, device)?;
        tracing::info!("{} loss: {:.4}", s.split, loss);

        // ── Step 4: Scorer ────────────────────────────────────────────────────
        let gold = resources::corpus_producer(&args, &s.data_root).files(s.split).corpus;
        let f1 = match resources::scorer(s.eval_command.as_deref())? {
            Some(scorer) => Some(scorer.score(&gold, &predictions)?),
            None => None,
        };

        Ok(EvaluationReport { split: s.split, loss, predictions, f1 })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        resources::tests::write_toy_data,
        train_use_case::{tests::tiny_settings, TrainUseCase},
    };
    use crate::ml::optim::OptimizerKind;
    use burn::backend::{Autodiff, NdArray};
    use std::{fs, path::Path};

    fn trained_model(root: &Path) -> PathBuf {
        let settings = tiny_settings(root, OptimizerKind::Adam);
        write_toy_data(&settings.data_root, "eng");
        TrainUseCase::new(settings.clone())
            .execute_on::<Autodiff<NdArray>>(&Default::default())
            .unwrap();
        settings.model_dir
    }

    fn settings(root: &Path, model_dir: PathBuf, split: Split, restrict: bool) -> EvaluateSettings {
        EvaluateSettings {
            model_dir,
            split,
            restrict_labels: restrict,
            data_root:       root.join("data"),
            output_root:     root.join("output"),
            eval_command:    None,
        }
    }

    #[test]
    fn test_evaluates_saved_model_on_requested_split() {
        let dir       = tempfile::tempdir().unwrap();
        let model_dir = trained_model(dir.path());

        let report = EvaluateUseCase::new(settings(dir.path(), model_dir, Split::Test, false))
            .execute_on::<NdArray>(&Default::default())
            .unwrap();

        assert_eq!(report.split, Split::Test);
        assert!(report.loss.is_finite());
        assert!(report.f1.is_none());
        assert!(report.predictions.ends_with("predictions/test.txt"));
        assert_eq!(fs::read_to_string(&report.predictions).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_restrict_flag_limits_roles() {
        let dir       = tempfile::tempdir().unwrap();
        let model_dir = trained_model(dir.path());

        let report = EvaluateUseCase::new(settings(dir.path(), model_dir, Split::Ood, true))
            .execute_on::<NdArray>(&Default::default())
            .unwrap();

        let text  = fs::read_to_string(&report.predictions).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        for role in first["predicates"][0]["roles"].as_array().unwrap() {
            assert!(["_", "A0", "A1"].contains(&role.as_str().unwrap()));
        }
    }

    #[test]
    fn test_args_without_language_still_load() {
        let dir       = tempfile::tempdir().unwrap();
        let model_dir = trained_model(dir.path());

        let path = model_dir.join("args.json");
        let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("language");
        fs::write(&path, json.to_string()).unwrap();

        let report = EvaluateUseCase::new(settings(dir.path(), model_dir, Split::Dev, false))
            .execute_on::<NdArray>(&Default::default());
        assert!(report.is_ok());
    }

    #[test]
    fn test_missing_model_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = EvaluateUseCase::new(settings(dir.path(), dir.path().join("none"), Split::Dev, false))
            .execute_on::<NdArray>(&Default::default());
        assert!(result.is_err());
    }
}
