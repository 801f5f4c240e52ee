// ============================================================
// Layer 3 — Vocabularies
// ============================================================
// Symbol tables for every categorical feature the model reads:
// words, parts of speech, lemmas, role labels and supertags.
//
// Conventions shared by every table:
//   id 0 → <PAD>  (padding positions, and "no lemma" for
//                  non-predicate tokens)
//   id 1 → <UNK>  (out-of-vocabulary symbols, word dropout)
//
// Vocabularies are built by an external tool and arrive as
// JSON. Only the ordered symbol list (plus optional word
// frequencies) is stored; the reverse index is rebuilt on load.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const PAD: &str = "<PAD>";
pub const UNK: &str = "<UNK>";

/// What a vocabulary looks like on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabRecord {
    symbols: Vec<String>,
    #[serde(default)]
    freqs: Vec<u32>,
}

/// Bidirectional id ↔ symbol table. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "VocabRecord", into = "VocabRecord")]
pub struct Vocab {
    symbols: Vec<String>,
    freqs:   Vec<u32>,
    index:   HashMap<String, usize>,
    unk_idx: usize,
}

impl From<VocabRecord> for Vocab {
    fn from(record: VocabRecord) -> Self {
        Vocab::with_freqs(record.symbols, record.freqs)
    }
}

impl From<Vocab> for VocabRecord {
    fn from(vocab: Vocab) -> Self {
        VocabRecord { symbols: vocab.symbols, freqs: vocab.freqs }
    }
}

impl Vocab {
    /// Build a table from symbols in id order. `<PAD>` always ends up
    /// at id 0 and `<UNK>` at id 1, whether or not the caller listed them.
    pub fn new<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        Self::with_freqs(symbols.into_iter().map(Into::into).collect(), Vec::new())
    }

    /// Same as [`Vocab::new`] with a per-symbol corpus frequency table
    /// aligned to the symbols as given.
    pub fn with_freqs(symbols: Vec<String>, freqs: Vec<u32>) -> Self {
        let mut pad  = (PAD.to_string(), 0);
        let mut unk  = (UNK.to_string(), 0);
        let mut rest = Vec::with_capacity(symbols.len());

        for (i, s) in symbols.into_iter().enumerate() {
            let freq = freqs.get(i).copied().unwrap_or(0);
            if s == PAD {
                pad = (s, freq);
            } else if s == UNK {
                unk = (s, freq);
            } else {
                rest.push((s, freq));
            }
        }

        let (all, table): (Vec<String>, Vec<u32>) =
            [pad, unk].into_iter().chain(rest).unzip();

        let index: HashMap<String, usize> = all
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();

        Self { symbols: all, freqs: table, index, unk_idx: 1 }
    }

    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    pub fn unk_idx(&self) -> usize {
        self.unk_idx
    }

    /// Id of `symbol`, or the unknown id.
    pub fn idx(&self, symbol: &str) -> usize {
        self.index.get(symbol).copied().unwrap_or(self.unk_idx)
    }

    pub fn get(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub fn symbol(&self, idx: usize) -> Option<&str> {
        self.symbols.get(idx).map(String::as_str)
    }

    /// Corpus frequency of the symbol with id `idx` (0 when unrecorded).
    pub fn freq(&self, idx: usize) -> u32 {
        self.freqs.get(idx).copied().unwrap_or(0)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

/// Every vocabulary the model needs, plus the table of roles
/// each predicate lemma licenses (used for label restriction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabs {
    pub words:  Vocab,
    pub pos:    Vocab,
    pub lemmas: Vocab,
    pub labels: Vocab,
    pub stags:  Vocab,
    #[serde(default)]
    pub licensed_roles: HashMap<String, Vec<String>>,
}

impl Vocabs {
    /// 1.0 for every role `lemma` licenses, 0.0 elsewhere.
    /// A lemma without an entry licenses every role.
    pub fn role_mask(&self, lemma: &str) -> Vec<f32> {
        let n = self.labels.size();
        match self.licensed_roles.get(lemma) {
            None => vec![1.0; n],
            Some(roles) => {
                let mut mask = vec![0.0; n];
                for role in roles {
                    if let Some(i) = self.labels.get(role) {
                        mask[i] = 1.0;
                    }
                }
                mask
            }
        }
    }
}
