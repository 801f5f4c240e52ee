// ============================================================
// Layer 6 — Vector Tables
// ============================================================
// Reads externally trained vectors from plain text, one word
// per line:
//
//   word v1 v2 … vn
//
// An optional word2vec-style header line ("count dim") is
// skipped. Every vector must have the same width.
//
// A table is used two ways:
//   - aligned to a vocabulary, giving the initial pretrained
//     word matrix (or the supertag feature matrix)
//   - as a ContextualEmbedder keyed on surface forms
//
// File layout:
//   data/{language}/embeddings/
//     pretrained.txt                 ← word vectors
//     context.txt                    ← per-form context vectors
//     stag_features_{stag_type}.txt  ← supertag feature vectors

use anyhow::{ensure, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Normal;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{embedding::EmbeddingMatrix, traits::ContextualEmbedder, vocab::Vocab};

/// Standard deviation of rows drawn for words without a vector.
const MISSING_ROW_STD: f32 = 0.01;

pub fn pretrained_path(data_root: &Path, language: &str) -> PathBuf {
    data_root.join(language).join("embeddings").join("pretrained.txt")
}

pub fn context_path(data_root: &Path, language: &str) -> PathBuf {
    data_root.join(language).join("embeddings").join("context.txt")
}

pub fn stag_features_path(data_root: &Path, language: &str, stag_type: &str) -> PathBuf {
    data_root
        .join(language)
        .join("embeddings")
        .join(format!("stag_features_{stag_type}.txt"))
}

#[derive(Debug, Clone)]
pub struct VectorTable {
    dim:     usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl VectorTable {
    /// Table with no vectors; every lookup misses.
    pub fn empty(dim: usize) -> Self {
        Self { dim, vectors: HashMap::new() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vectors from '{}'", path.display()))?;
        let table = Self::parse(&text)
            .with_context(|| format!("Malformed vector file '{}'", path.display()))?;
        tracing::info!(
            "Loaded {} vectors of width {} from '{}'",
            table.len(), table.dim, path.display()
        );
        Ok(table)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut dim     = None;
        let mut vectors = HashMap::new();

        for (n, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else { continue };
            let rest: Vec<&str> = fields.collect();

            // "count dim" header
            if n == 0 && rest.len() == 1 && word.parse::<usize>().is_ok() && rest[0].parse::<usize>().is_ok() {
                continue;
            }

            let values = rest
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<f32>, _>>()
                .with_context(|| format!("line {}: non-numeric value", n + 1))?;
            ensure!(!values.is_empty(), "line {}: '{}' has no values", n + 1, word);

            let width = *dim.get_or_insert(values.len());
            ensure!(
                values.len() == width,
                "line {}: expected {} values, found {}",
                n + 1, width, values.len()
            );
            vectors.insert(word.to_string(), values);
        }

        let dim = dim.context("no vectors found")?;
        Ok(Self { dim, vectors })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(Vec::as_slice)
    }

    /// One row per vocabulary id. Padding (id 0) is all zeros; symbols
    /// without a vector get a small seeded Gaussian row.
    pub fn vocab_matrix(&self, vocab: &Vocab, seed: u64) -> Result<EmbeddingMatrix> {
        let normal = Normal::new(0.0f32, MISSING_ROW_STD)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = Vec::with_capacity(vocab.size() * self.dim);
        let mut found  = 0usize;

        for (id, symbol) in vocab.symbols().iter().enumerate() {
            match self.get(symbol) {
                _ if id == 0 => values.extend(std::iter::repeat(0.0).take(self.dim)),
                Some(v) => {
                    values.extend_from_slice(v);
                    found += 1;
                }
                None => values.extend((0..self.dim).map(|_| rng.sample(normal))),
            }
        }
        tracing::debug!("{} of {} vocabulary symbols have vectors", found, vocab.size());
        EmbeddingMatrix::new(vocab.size(), self.dim, values)
    }
}

impl ContextualEmbedder for VectorTable {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, tokens: &[Vec<String>], seq_lengths: &[usize]) -> Result<Vec<f32>> {
        ensure!(
            tokens.len() == seq_lengths.len(),
            "{} token rows but {} lengths",
            tokens.len(), seq_lengths.len()
        );
        let seq_len = tokens.iter().map(Vec::len).max().unwrap_or(0);
        let mut out = vec![0.0f32; tokens.len() * seq_len * self.dim];

        for (b, (row, &len)) in tokens.iter().zip(seq_lengths).enumerate() {
            ensure!(len <= row.len(), "row {b}: length {len} exceeds {} tokens", row.len());
            for (t, token) in row.iter().take(len).enumerate() {
                if let Some(v) = self.get(token) {
                    let at = (b * seq_len + t) * self.dim;
                    out[at..at + self.dim].copy_from_slice(v);
                }
            }
        }
        Ok(out)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "3 2\nthe 0.1 0.2\ncat 1.0 -1.0\nsat 0.5 0.5\n";

    #[test]
    fn test_parse_skips_header() {
        let table = VectorTable::parse(TEXT).unwrap();
        assert_eq!(table.dim(), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("cat"), Some(&[1.0, -1.0][..]));
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        assert!(VectorTable::parse("a 1 2\nb 3\n").is_err());
        assert!(VectorTable::parse("a 1 x\n").is_err());
        assert!(VectorTable::parse("").is_err());
    }

    #[test]
    fn test_vocab_matrix_alignment() {
        let table = VectorTable::parse(TEXT).unwrap();
        let vocab = Vocab::new(["cat", "dog"]);
        let m = table.vocab_matrix(&vocab, 5).unwrap();

        assert_eq!(m.rows(), vocab.size());
        assert_eq!(m.row(0), &[0.0, 0.0]);
        assert_eq!(m.row(vocab.idx("cat")), &[1.0, -1.0]);
        let dog = m.row(vocab.idx("dog"));
        assert!(dog.iter().all(|v| v.abs() < 0.1));
        // seeded
        assert_eq!(m, table.vocab_matrix(&vocab, 5).unwrap());
    }

    #[test]
    fn test_contextual_embedding_zeroes_padding() {
        let table  = VectorTable::parse(TEXT).unwrap();
        let tokens = vec![
            vec!["the".to_string(), "cat".to_string(), "".to_string()],
            vec!["cat".to_string(), "sat".to_string(), "the".to_string()],
        ];
        let out = table.embed(&tokens, &[2, 3]).unwrap();
        assert_eq!(out.len(), 2 * 3 * 2);
        assert_eq!(&out[0..4], &[0.1, 0.2, 1.0, -1.0]);
        assert_eq!(&out[4..6], &[0.0, 0.0]);
        assert_eq!(&out[10..12], &[0.1, 0.2]);
    }
}
