// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:        the epoch number (1, 2, 3, ...)
//   - train_loss:   mean cross-entropy over training batches
//   - valid_loss:   mean cross-entropy over dev batches
//   - labeled_f1:   scorer's labeled F1 on dev (percent)
//   - unlabeled_f1: scorer's unlabeled F1 on dev (percent)
//
// Output file: {model_dir}/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,valid_loss,labeled_f1,unlabeled_f1
//   1,0.412300,0.398100,61.250000,70.430000
//   2,0.301900,0.322400,67.800000,75.010000
//
// When no scorer ran the F1 columns are left empty.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::F1Scores;

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub valid_loss: f64,
    pub f1:         Option<F1Scores>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, valid_loss: f64, f1: Option<F1Scores>) -> Self {
        Self { epoch, train_loss, valid_loss, f1 }
    }

    /// Returns true if this epoch improved over the previous best valid_loss
    pub fn is_improvement(&self, best_valid_loss: f64) -> bool {
        self.valid_loss < best_valid_loss
    }

    fn csv_row(&self) -> String {
        let (labeled, unlabeled) = match self.f1 {
            Some(f1) => (format!("{:.6}", f1.labeled), format!("{:.6}", f1.unlabeled)),
            None     => (String::new(), String::new()),
        };
        format!(
            "{},{:.6},{:.6},{},{}",
            self.epoch, self.train_loss, self.valid_loss, labeled, unlabeled
        )
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        // Header only for a new file, so reruns append
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,valid_loss,labeled_f1,unlabeled_f1")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
