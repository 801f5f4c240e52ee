// ============================================================
// Layer 4 — SRL Batcher
// ============================================================
// Implements Burn's Batcher trait to stack one group of
// predicate instances into a padded, batch-first SrlBatch.
//
// How batching works here:
//   Input:  Vec of N SrlItems with lengths l_1 … l_N
//   Output: SrlBatch with per-token fields of shape [N, L]
//           where L = max(l_i), per-sentence fields of shape [N]
//           and the role mask of shape [N, num_roles]
//
// Padding uses id 0 (<PAD>) for every categorical field and
// the empty string for the raw tokens handed to the
// contextual embedder.
//
// The batch stays on the host; the ML layer turns it into
// tensors on whatever device it runs on.

use anyhow::{ensure, Result};
use burn::data::dataloader::batcher::Batcher;

// ─── SrlItem ──────────────────────────────────────────────────────────────────
/// One (sentence, predicate) instance, already mapped to ids.
#[derive(Debug, Clone, PartialEq)]
pub struct SrlItem {
    pub tokens:        Vec<String>,
    pub words:         Vec<usize>,
    pub freqs:         Vec<u32>,
    pub pos:           Vec<usize>,
    /// Lemma id at the predicate position, 0 everywhere else
    pub lemmas:        Vec<usize>,
    pub stags:         Vec<usize>,
    pub labels:        Vec<usize>,
    pub pred:          usize,
    pub pred_position: usize,
    pub role_mask:     Vec<f32>,
}

impl SrlItem {
    pub fn seq_len(&self) -> usize {
        self.tokens.len()
    }
}

// ─── SrlBatch ─────────────────────────────────────────────────────────────────
/// A batch of predicate instances ready for the model.
/// Every flat vector is row-major with batch as the leading dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct SrlBatch {
    pub batch_size: usize,
    /// Padded length L
    pub seq_len:    usize,
    pub num_roles:  usize,

    /// Raw token strings: [batch_size][seq_len]
    pub tokens: Vec<Vec<String>>,

    /// Per-token fields: [batch_size * seq_len]
    pub words:  Vec<i32>,
    pub freqs:  Vec<i32>,
    pub pos:    Vec<i32>,
    pub lemmas: Vec<i32>,
    pub stags:  Vec<i32>,
    pub labels: Vec<i32>,

    /// Per-sentence fields: [batch_size]
    pub preds:          Vec<i32>,
    pub pred_positions: Vec<i32>,
    pub seq_lengths:    Vec<i32>,

    /// Role validity: [batch_size * num_roles]
    pub labels_mask: Vec<f32>,
}

impl SrlBatch {
    /// Reject a batch the model was not built for. Any failure here is
    /// fatal for the run; there is no attempt to repair the batch.
    pub fn validate(&self, batch_size: usize, num_roles: usize) -> Result<()> {
        ensure!(
            self.batch_size == batch_size,
            "batch holds {} instances but the model was built for {}",
            self.batch_size, batch_size
        );
        ensure!(
            self.num_roles == num_roles,
            "role mask is {} wide but the label vocabulary has {} roles",
            self.num_roles, num_roles
        );

        let cells = self.batch_size * self.seq_len;
        for (name, field) in [
            ("words", &self.words),
            ("freqs", &self.freqs),
            ("pos", &self.pos),
            ("lemmas", &self.lemmas),
            ("stags", &self.stags),
            ("labels", &self.labels),
        ] {
            ensure!(field.len() == cells, "{name} has {} cells, expected {cells}", field.len());
        }
        for (name, field) in [
            ("preds", &self.preds),
            ("pred_positions", &self.pred_positions),
            ("seq_lengths", &self.seq_lengths),
        ] {
            ensure!(
                field.len() == self.batch_size,
                "{name} has {} entries, expected {}",
                field.len(), self.batch_size
            );
        }
        ensure!(
            self.labels_mask.len() == self.batch_size * self.num_roles,
            "labels_mask has {} cells, expected {}",
            self.labels_mask.len(), self.batch_size * self.num_roles
        );
        ensure!(self.tokens.len() == self.batch_size, "tokens has {} rows", self.tokens.len());

        for (i, (&pos, &len)) in self.pred_positions.iter().zip(&self.seq_lengths).enumerate() {
            ensure!(
                0 <= pos && pos < len && len as usize <= self.seq_len,
                "instance {i}: predicate position {pos}, length {len}, padded length {}",
                self.seq_len
            );
        }
        Ok(())
    }

    pub fn seq_lengths_usize(&self) -> Vec<usize> {
        self.seq_lengths.iter().map(|&l| l as usize).collect()
    }
}

// ─── SrlBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SrlBatcher {
    /// Width of every role mask (size of the label vocabulary)
    pub num_roles: usize,
}

impl SrlBatcher {
    pub fn new(num_roles: usize) -> Self {
        Self { num_roles }
    }
}

impl Batcher<SrlItem, SrlBatch> for SrlBatcher {
    /// Pad every item to the longest one and flatten row by row.
    fn batch(&self, items: Vec<SrlItem>) -> SrlBatch {
        let batch_size = items.len();
        let seq_len    = items.iter().map(SrlItem::seq_len).max().unwrap_or(0);

        // Pad a per-token id field to seq_len with zeros
        let pad = |field: &dyn Fn(&SrlItem) -> &[usize]| -> Vec<i32> {
            items
                .iter()
                .flat_map(|item| {
                    let ids = field(item);
                    (0..seq_len).map(move |t| ids.get(t).map_or(0, |&x| x as i32))
                })
                .collect()
        };

        let tokens = items
            .iter()
            .map(|item| {
                let mut row = item.tokens.clone();
                row.resize(seq_len, String::new());
                row
            })
            .collect();

        let freqs = items
            .iter()
            .flat_map(|item| {
                (0..seq_len).map(move |t| item.freqs.get(t).map_or(0, |&f| f as i32))
            })
            .collect();

        let labels_mask = items
            .iter()
            .flat_map(|item| {
                (0..self.num_roles).map(move |r| item.role_mask.get(r).copied().unwrap_or(0.0))
            })
            .collect();

        SrlBatch {
            batch_size,
            seq_len,
            num_roles: self.num_roles,
            tokens,
            words:  pad(&|i| i.words.as_slice()),
            freqs,
            pos:    pad(&|i| i.pos.as_slice()),
            lemmas: pad(&|i| i.lemmas.as_slice()),
            stags:  pad(&|i| i.stags.as_slice()),
            labels: pad(&|i| i.labels.as_slice()),
            preds:          items.iter().map(|i| i.pred as i32).collect(),
            pred_positions: items.iter().map(|i| i.pred_position as i32).collect(),
            seq_lengths:    items.iter().map(|i| i.seq_len() as i32).collect(),
            labels_mask,
        }
    }
}
