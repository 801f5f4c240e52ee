// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What lives in a model directory:
//   1. Model weights (.mpk.gz file) — all learned parameters
//   2. latest_epoch.json            — which epoch was last saved
//   3. args.json                    — hyper-parameters (SrlArgs)
//   4. vocabs.json                  — vocabularies the model was built on
//
// args.json and vocabs.json together are enough to rebuild the
// exact architecture before the weights are loaded into it.
//
// File naming convention:
//   {model_dir}/
//     model_epoch_1.mpk.gz
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json
//     args.json
//     vocabs.json
//     metrics.csv            ← written by MetricsLogger

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::args::SrlArgs;
use crate::domain::vocab::Vocabs;
use crate::ml::model::SrlModel;

const LATEST_EPOCH: &str = "latest_epoch.json";
const ARGS:         &str = "args.json";
const VOCABS:       &str = "vocabs.json";

/// Manages saving and loading of everything in one model directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Manager for an existing or new directory; creates it if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Manager for a directory that must already exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        anyhow::ensure!(dir.is_dir(), "Model directory '{}' does not exist", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save model weights for a given epoch and move the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &SrlModel<B>, epoch: usize) -> Result<()> {
        // Recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_json(LATEST_EPOCH, &epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest weights into `model`, which must have the
    /// architecture they were saved from.
    pub fn load_model<B: Backend>(&self, model: SrlModel<B>, device: &B::Device) -> Result<SrlModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_args(&self, args: &SrlArgs) -> Result<()> {
        self.write_json(ARGS, args)
    }

    /// Read args.json. A record without `language` gets the default
    /// language; any other missing field is an error.
    pub fn load_args(&self) -> Result<SrlArgs> {
        self.read_json(ARGS)
    }

    pub fn save_vocabs(&self, vocabs: &Vocabs) -> Result<()> {
        self.write_json(VOCABS, vocabs)
    }

    pub fn load_vocabs(&self) -> Result<Vocabs> {
        self.read_json(VOCABS)
    }

    /// Epoch number stored in latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_json(LATEST_EPOCH)
            .context("No checkpoint found. Have you run 'train' first?")
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Malformed '{}'", path.display()))
    }
}
