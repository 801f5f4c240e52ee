// ============================================================
// Layer 5 — Train / Eval Loop
// ============================================================
// One SrlTrainer per model instance. It owns two batch caches,
// each filled from the BatchProducer the first time it is
// needed and reused by every later epoch:
//
//   training_batches   Unloaded ──first training epoch──► Loaded(train)
//   testing_batches    Unloaded ──first testing epoch───► Loaded(split)
//
// Training epoch (Mode::Train, dropout on):
//   forward → loss → backward (stdout silenced) → clip → step
//
// Testing epoch (Mode::Eval, dropout off):
//   forward → loss → argmax roles attached to the parent
//   sentences → every parent written once, in first-seen order
//
// Key Burn insight:
//   - Training runs on the Autodiff backend
//   - model.valid() gives the same weights on the inner backend,
//     which is what the testing epoch is called with

use anyhow::{bail, ensure, Context, Result};
use burn::{
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{
    collections::HashSet,
    fs,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::{debug, info};

use crate::data::producer::{BatchProducer, LoadedSplit};
use crate::domain::{sentence::Sentence, traits::ContextualEmbedder, vocab::Vocabs, Split};
use crate::infra::silence::silenced;
use crate::ml::{
    mode::Mode,
    model::{SrlInputs, SrlModel},
};

/// How often (in batches) the running loss is reported.
const REPORT_EVERY: usize = 10;

// ─── BatchCache ───────────────────────────────────────────────────────────────
/// Lazily loaded batch list for one split.
#[derive(Debug, Default)]
pub enum BatchCache {
    #[default]
    Unloaded,
    Loaded { split: Split, data: LoadedSplit },
}

impl BatchCache {
    pub fn is_loaded(&self) -> bool {
        matches!(self, BatchCache::Loaded { .. })
    }

    /// Return the cached split, asking `producer` for it on first use.
    /// A cache only ever holds the split it was first loaded with.
    pub fn get_or_load(
        &mut self,
        split:      Split,
        producer:   &dyn BatchProducer,
        batch_size: usize,
        vocabs:     &Vocabs,
    ) -> Result<&mut LoadedSplit> {
        match self {
            BatchCache::Loaded { split: cached, .. } => ensure!(
                *cached == split,
                "batch cache already holds the {cached} split, cannot serve {split}"
            ),
            BatchCache::Unloaded => {
                info!("Loading {} batches...", split);
                let data = producer
                    .produce(split, batch_size, vocabs)
                    .with_context(|| format!("Failed to produce {split} batches"))?;
                info!("Loaded {} {} batches", data.num_batches(), split);
                *self = BatchCache::Loaded { split, data };
            }
        }
        match self {
            BatchCache::Loaded { data, .. } => Ok(data),
            BatchCache::Unloaded => bail!("{split} batches failed to load"),
        }
    }
}

// ─── SrlTrainer ───────────────────────────────────────────────────────────────
pub struct SrlTrainer {
    producer:         Box<dyn BatchProducer>,
    embedder:         Option<Box<dyn ContextualEmbedder>>,
    vocabs:           Vocabs,
    batch_size:       usize,
    restrict_labels:  bool,
    training_batches: BatchCache,
    testing_batches:  BatchCache,
}

impl SrlTrainer {
    pub fn new(
        producer:        Box<dyn BatchProducer>,
        vocabs:          Vocabs,
        batch_size:      usize,
        restrict_labels: bool,
    ) -> Self {
        Self {
            producer,
            embedder: None,
            vocabs,
            batch_size,
            restrict_labels,
            training_batches: BatchCache::Unloaded,
            testing_batches:  BatchCache::Unloaded,
        }
    }

    pub fn with_embedder(mut self, embedder: Box<dyn ContextualEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// One pass over the training split. Returns the updated model and
    /// the mean batch loss.
    pub fn run_training_epoch<B, O>(
        &mut self,
        mut model:     SrlModel<B>,
        optim:         &mut O,
        learning_rate: f64,
        device:        &B::Device,
    ) -> Result<(SrlModel<B>, f64)>
    where
        B: AutodiffBackend,
        O: Optimizer<SrlModel<B>, B>,
    {
        let num_roles = self.vocabs.labels.size();
        let embedder  = self.embedder.as_deref();
        let loaded    = self.training_batches.get_or_load(
            Split::Train,
            self.producer.as_ref(),
            self.batch_size,
            &self.vocabs,
        )?;
        let total_batches = loaded.num_batches();
        ensure!(total_batches > 0, "the training split produced no batches");

        let mut total_loss = 0.0f64;
        for (i, (_, batch)) in loaded.batches.iter().enumerate() {
            batch
                .validate(self.batch_size, num_roles)
                .with_context(|| format!("Training batch {i} is malformed"))?;
            let inputs = SrlInputs::<B>::from_batch(batch, embedder, device)?;
            model.check_inputs(&inputs)?;

            let (loss, _) = model.forward_loss(&inputs, Mode::Train);
            total_loss += loss.clone().into_scalar().elem::<f64>();

            // Backward pass, then the clipped update
            let grads = silenced(|| GradientsParams::from_grads(loss.backward(), &model))?;
            model = optim.step(learning_rate, model, grads);

            if i % REPORT_EVERY == 0 {
                info!(
                    "{}/{}    loss: {:.4}    batch_size: {}",
                    i, total_batches, total_loss / (i + 1) as f64, batch.batch_size
                );
            }
        }

        Ok((model, total_loss / total_batches as f64))
    }

    /// One pass over `split` without dropout. Predictions are attached to
    /// the parent sentences, which are written to `output` one per line.
    /// Returns the mean batch loss.
    pub fn run_testing_epoch<B: Backend>(
        &mut self,
        model:  &SrlModel<B>,
        split:  Split,
        output: &Path,
        device: &B::Device,
    ) -> Result<f64> {
        let num_roles = self.vocabs.labels.size();
        let embedder  = self.embedder.as_deref();
        let LoadedSplit { sentences, batches } = self.testing_batches.get_or_load(
            split,
            self.producer.as_ref(),
            self.batch_size,
            &self.vocabs,
        )?;
        let total_batches = batches.len();
        ensure!(total_batches > 0, "the {split} split produced no batches");

        sentences.iter_mut().for_each(|s| s.clear_predictions());

        let mut total_loss = 0.0f64;
        let mut seen       = HashSet::new();
        let mut parents    = Vec::new();

        for (i, (instances, batch)) in batches.iter().enumerate() {
            batch
                .validate(self.batch_size, num_roles)
                .with_context(|| format!("{split} batch {i} is malformed"))?;
            let inputs = SrlInputs::<B>::from_batch(batch, embedder, device)?;
            model.check_inputs(&inputs)?;

            let (loss, output) = model.forward_loss(&inputs, Mode::Eval);
            total_loss += loss.into_scalar().elem::<f64>();

            let probabilities = output
                .probabilities
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;
            let row = batch.seq_len * num_roles;

            // Padding rows past `instances.len()` are ignored
            for (b, instance) in instances.iter().enumerate() {
                let sentence = sentences
                    .get_mut(instance.parent)
                    .with_context(|| format!("instance refers to missing sentence {}", instance.parent))?;
                sentence.add_predictions(
                    instance,
                    &probabilities[b * row..(b + 1) * row],
                    &self.vocabs.labels,
                    self.restrict_labels,
                )?;
                if seen.insert(instance.parent) {
                    parents.push(instance.parent);
                }
            }

            if i % REPORT_EVERY == 0 {
                info!("{}/{}    loss: {:.4}", i, total_batches, total_loss / (i + 1) as f64);
            }
        }

        write_predictions(output, parents.iter().map(|&p| &sentences[p]))?;
        info!("Wrote predictions to {}", output.display());

        Ok(total_loss / total_batches as f64)
    }
}

fn write_predictions<'a>(
    path:      &Path,
    sentences: impl Iterator<Item = &'a Sentence>,
) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("Cannot create prediction file '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    let mut count = 0usize;
    for sentence in sentences {
        writeln!(w, "{sentence}")?;
        count += 1;
    }
    w.flush()?;
    debug!("Wrote {} sentences to '{}'", count, path.display());
    Ok(())
}
