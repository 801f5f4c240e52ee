// ============================================================
// Layer 4 — Batch Producer
// ============================================================
// Turns a corpus split into the fixed-size batches the model
// consumes, together with the predicate instances each batch
// row belongs to.
//
// Every predicate of every sentence becomes one instance, in
// corpus order. Instances are grouped batch_size at a time.
// The model's batch size is fixed, so a short final group is
// padded by repeating its last item; the instance list of that
// group still names only the real instances, which is how
// predictions for the repeated rows get discarded.

use anyhow::{ensure, Result};
use burn::data::dataloader::batcher::Batcher;
use std::path::PathBuf;

use crate::data::batcher::{SrlBatch, SrlBatcher, SrlItem};
use crate::data::corpus::{read_split, SplitFiles};
use crate::domain::sentence::{PredicateInstance, Sentence};
use crate::domain::vocab::Vocabs;
use crate::domain::Split;

/// A fully loaded split: the parent sentence arena plus batches whose
/// instances index into it.
#[derive(Debug, Clone)]
pub struct LoadedSplit {
    pub sentences: Vec<Sentence>,
    pub batches:   Vec<(Vec<PredicateInstance>, SrlBatch)>,
}

impl LoadedSplit {
    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }
}

// ─── BatchProducer ────────────────────────────────────────────────────────────
/// Source of batches for a split. Invoked at most once per split
/// by the training loop, which caches the result.
pub trait BatchProducer {
    fn produce(&self, split: Split, batch_size: usize, vocabs: &Vocabs) -> Result<LoadedSplit>;
}

// ─── CorpusBatchProducer ──────────────────────────────────────────────────────
/// Produces batches from the on-disk corpus layout (see `corpus.rs`).
#[derive(Debug, Clone)]
pub struct CorpusBatchProducer {
    pub data_root: PathBuf,
    pub language:  String,
    /// `(stags_dir, stag_type)` when supertags are read
    pub stags:     Option<(String, String)>,
}

impl CorpusBatchProducer {
    pub fn new(data_root: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self { data_root: data_root.into(), language: language.into(), stags: None }
    }

    pub fn with_stags(mut self, stags_dir: impl Into<String>, stag_type: impl Into<String>) -> Self {
        self.stags = Some((stags_dir.into(), stag_type.into()));
        self
    }

    pub fn files(&self, split: Split) -> SplitFiles {
        SplitFiles::resolve(
            &self.data_root,
            &self.language,
            split,
            self.stags.as_ref().map(|(d, t)| (d.as_str(), t.as_str())),
        )
    }
}

impl BatchProducer for CorpusBatchProducer {
    fn produce(&self, split: Split, batch_size: usize, vocabs: &Vocabs) -> Result<LoadedSplit> {
        let sentences = read_split(&self.files(split))?;
        batch_sentences(sentences, batch_size, vocabs)
    }
}

/// Group every predicate instance of `sentences` into padded batches.
pub fn batch_sentences(
    sentences:  Vec<Sentence>,
    batch_size: usize,
    vocabs:     &Vocabs,
) -> Result<LoadedSplit> {
    ensure!(batch_size > 0, "batch size must be positive");

    let instances: Vec<(PredicateInstance, SrlItem)> = sentences
        .iter()
        .enumerate()
        .flat_map(|(parent, sentence)| {
            (0..sentence.predicates.len()).map(move |predicate| (parent, predicate))
        })
        .map(|(parent, predicate)| build_item(&sentences, parent, predicate, vocabs))
        .collect();

    let batcher = SrlBatcher::new(vocabs.labels.size());
    let batches = instances
        .chunks(batch_size)
        .map(|group| {
            let mut items: Vec<SrlItem> = group.iter().map(|(_, item)| item.clone()).collect();
            if let Some(last) = items.last().cloned() {
                items.resize(batch_size, last);
            }
            let insts = group.iter().map(|(inst, _)| inst.clone()).collect();
            (insts, batcher.batch(items))
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Batched {} predicate instances into {} batches",
        instances.len(),
        batches.len()
    );
    Ok(LoadedSplit { sentences, batches })
}

/// Map one (sentence, predicate) pair to ids.
fn build_item(
    sentences: &[Sentence],
    parent:    usize,
    predicate: usize,
    vocabs:    &Vocabs,
) -> (PredicateInstance, SrlItem) {
    let sentence = &sentences[parent];
    let pred     = &sentence.predicates[predicate];
    let len      = sentence.len();
    let lemma_id = vocabs.lemmas.idx(&pred.lemma);
    let words: Vec<usize> = sentence.forms.iter().map(|w| vocabs.words.idx(w)).collect();
    let role_mask = vocabs.role_mask(&pred.lemma);

    let item = SrlItem {
        tokens: sentence.forms.clone(),
        freqs:  words.iter().map(|&w| vocabs.words.freq(w)).collect(),
        words,
        pos:    sentence.pos.iter().map(|p| vocabs.pos.idx(p)).collect(),
        lemmas: (0..len).map(|t| if t == pred.position { lemma_id } else { 0 }).collect(),
        stags:  if sentence.stags.is_empty() {
            vec![0; len]
        } else {
            sentence.stags.iter().map(|s| vocabs.stags.idx(s)).collect()
        },
        labels: (0..len)
            .map(|t| pred.roles.get(t).map_or(0, |r| vocabs.labels.idx(r)))
            .collect(),
        pred:          lemma_id,
        pred_position: pred.position,
        role_mask:     role_mask.clone(),
    };

    let instance = PredicateInstance { parent, predicate, seq_len: len, role_mask };
    (instance, item)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::sentence::Predicate;
    use crate::domain::vocab::Vocab;
    use std::collections::HashMap;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    pub(crate) fn toy_vocabs() -> Vocabs {
        let mut licensed = HashMap::new();
        licensed.insert("eat.01".to_string(), strings(&["_", "A0", "A1"]));
        Vocabs {
            words:  Vocab::with_freqs(strings(&["John", "ate", "apples", "Mary", "runs", "fast"]), vec![3, 5, 1, 2, 4, 0]),
            pos:    Vocab::new(["NNP", "VBD", "NNS", "VBZ", "RB"]),
            lemmas: Vocab::new(["eat.01", "run.01", "apple.01"]),
            labels: Vocab::new(["_", "A0", "A1", "AM-MNR"]),
            stags:  Vocab::new(["N", "V"]),
            licensed_roles: licensed,
        }
    }

    pub(crate) fn toy_sentences() -> Vec<Sentence> {
        vec![
            Sentence::new(
                strings(&["John", "ate", "apples"]),
                strings(&["john", "eat", "apple"]),
                strings(&["NNP", "VBD", "NNS"]),
                vec![
                    Predicate { position: 1, lemma: "eat.01".into(), roles: strings(&["A0", "_", "A1"]) },
                    Predicate { position: 2, lemma: "apple.01".into(), roles: strings(&["_", "_", "_"]) },
                ],
            ),
            Sentence::new(
                strings(&["Mary", "runs", "fast", "."]),
                strings(&["mary", "run", "fast", "."]),
                strings(&["NNP", "VBZ", "RB", "."]),
                vec![Predicate {
                    position: 1,
                    lemma:    "run.01".into(),
                    roles:    strings(&["A0", "_", "AM-MNR", "_"]),
                }],
            ),
        ]
    }

    #[test]
    fn test_one_instance_per_predicate() {
        let split = batch_sentences(toy_sentences(), 2, &toy_vocabs()).unwrap();
        assert_eq!(split.num_batches(), 2);

        let (first, batch) = &split.batches[0];
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].parent, 0);
        assert_eq!(first[1].parent, 0);
        assert_eq!(batch.batch_size, 2);
        assert_eq!(batch.pred_positions, vec![1, 2]);
    }

    #[test]
    fn test_short_final_group_is_padded_to_batch_size() {
        let split = batch_sentences(toy_sentences(), 2, &toy_vocabs()).unwrap();
        let (insts, batch) = &split.batches[1];
        assert_eq!(insts.len(), 1);
        assert_eq!(batch.batch_size, 2);
        assert_eq!(batch.preds[0], batch.preds[1]);
        batch.validate(2, 6).unwrap();
    }

    #[test]
    fn test_items_carry_ids_and_frequencies() {
        let vocabs = toy_vocabs();
        let split  = batch_sentences(toy_sentences(), 3, &vocabs).unwrap();
        let (_, batch) = &split.batches[0];
        let l = batch.seq_len;

        assert_eq!(batch.words[0], vocabs.words.idx("John") as i32);
        assert_eq!(batch.freqs[0], 3);
        // lemma id only at the predicate position
        assert_eq!(batch.lemmas[1], vocabs.lemmas.idx("eat.01") as i32);
        assert_eq!(batch.lemmas[0], 0);
        // restricted mask for eat.01, full mask for run.01
        assert_eq!(batch.labels_mask[vocabs.labels.idx("AM-MNR")], 0.0);
        assert!(batch.labels_mask[2 * 6..].iter().all(|&m| m == 1.0));
        assert_eq!(batch.labels[2 * l + 2], vocabs.labels.idx("AM-MNR") as i32);
    }
}
