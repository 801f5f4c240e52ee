// ============================================================
// Layer 3 — Sentence Domain Types
// ============================================================
// A `Sentence` is one full corpus sentence. It may contain
// several predicates, and the model labels each of them in a
// separate pass, so every predicate becomes its own
// `PredicateInstance` pointing back at the parent sentence.
//
// Parents live in an arena (`Vec<Sentence>`) owned by whoever
// loaded the split; an instance stores the parent's index.
// Predictions flow back as:
//
//   probabilities (seq_len × num_roles) ─► argmax per token
//       ─► role column stored on the parent for that predicate
//
// Once every instance of a parent has been scored, the parent
// is written out as a single JSON line.

use std::fmt;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::vocab::Vocab;

/// One predicate of a sentence together with its gold role column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Token index of the predicate
    pub position: usize,
    /// Predicate lemma (sense), the key for lemma embeddings and licensed roles
    pub lemma: String,
    /// Gold role per token ("_" where the token fills no role)
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A complete corpus sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub forms:  Vec<String>,
    pub lemmas: Vec<String>,
    pub pos:    Vec<String>,
    #[serde(default)]
    pub stags:  Vec<String>,
    pub predicates: Vec<Predicate>,

    /// Predicted role column per predicate, filled during evaluation
    #[serde(skip)]
    predicted: Vec<Option<Vec<String>>>,
}

/// The (parent sentence, predicate) pair the model actually scores.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateInstance {
    /// Index of the parent in the sentence arena
    pub parent: usize,
    /// Index into `parent.predicates`
    pub predicate: usize,
    /// True (unpadded) sequence length
    pub seq_len: usize,
    /// 1.0 for roles licensed by the predicate lemma
    pub role_mask: Vec<f32>,
}

/// Serialised form: the sentence with predicted roles in place of gold ones.
#[derive(Serialize)]
struct PredictionRecord<'a> {
    forms:      &'a [String],
    lemmas:     &'a [String],
    pos:        &'a [String],
    predicates: Vec<Predicate>,
}

impl Sentence {
    pub fn new(
        forms:      Vec<String>,
        lemmas:     Vec<String>,
        pos:        Vec<String>,
        predicates: Vec<Predicate>,
    ) -> Self {
        let predicted = vec![None; predicates.len()];
        Self { forms, lemmas, pos, stags: Vec::new(), predicates, predicted }
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn predicted(&self, predicate: usize) -> Option<&[String]> {
        self.predicted.get(predicate)?.as_deref()
    }

    /// Drop all attached predictions ahead of a new evaluation pass.
    pub fn clear_predictions(&mut self) {
        self.predicted = vec![None; self.predicates.len()];
    }

    /// Attach the role column for `instance.predicate`.
    ///
    /// `probabilities` is the instance's row-major `(rows, num_roles)`
    /// slice of the batch output; only the first `seq_len` rows are read.
    /// With `restrict_labels` the argmax only considers roles set in
    /// the instance's role mask (all roles when the mask is empty).
    pub fn add_predictions(
        &mut self,
        instance:        &PredicateInstance,
        probabilities:   &[f32],
        labels:          &Vocab,
        restrict_labels: bool,
    ) -> Result<()> {
        let num_roles = labels.size();
        ensure!(
            instance.predicate < self.predicates.len(),
            "predicate {} out of range for a sentence with {} predicates",
            instance.predicate, self.predicates.len()
        );
        ensure!(
            probabilities.len() >= instance.seq_len * num_roles,
            "expected at least {} probabilities, got {}",
            instance.seq_len * num_roles, probabilities.len()
        );

        if self.predicted.len() != self.predicates.len() {
            self.predicted.resize(self.predicates.len(), None);
        }
        ensure!(
            self.predicted[instance.predicate].is_none(),
            "predictions for predicate {} were already attached in this pass",
            instance.predicate
        );

        let allowed: Vec<bool> = if restrict_labels
            && instance.role_mask.len() == num_roles
            && instance.role_mask.iter().any(|&m| m > 0.0)
        {
            instance.role_mask.iter().map(|&m| m > 0.0).collect()
        } else {
            vec![true; num_roles]
        };

        let column = probabilities
            .chunks(num_roles)
            .take(instance.seq_len)
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .filter(|(r, _)| allowed[*r])
                    .fold((0, f32::NEG_INFINITY), |best, (r, &p)| {
                        if p > best.1 { (r, p) } else { best }
                    })
                    .0;
                labels.symbol(best).unwrap_or("_").to_string()
            })
            .collect();

        self.predicted[instance.predicate] = Some(column);
        Ok(())
    }
}

impl fmt::Display for Sentence {
    /// One JSON line; unscored predicates are written with an all-"_" column.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicates = self
            .predicates
            .iter()
            .enumerate()
            .map(|(i, p)| Predicate {
                position: p.position,
                lemma:    p.lemma.clone(),
                roles:    self
                    .predicted(i)
                    .map(<[String]>::to_vec)
                    .unwrap_or_else(|| vec!["_".to_string(); self.len()]),
            })
            .collect();

        let record = PredictionRecord {
            forms:  &self.forms,
            lemmas: &self.lemmas,
            pos:    &self.pos,
            predicates,
        };
        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        f.write_str(&line)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn sentence() -> Sentence {
        Sentence::new(
            strings(&["John", "ate", "apples"]),
            strings(&["john", "eat", "apple"]),
            strings(&["NNP", "VBD", "NNS"]),
            vec![Predicate {
                position: 1,
                lemma:    "eat.01".into(),
                roles:    strings(&["A0", "_", "A1"]),
            }],
        )
    }

    // labels: <PAD>, <UNK>, _, A0, A1
    fn labels() -> Vocab {
        Vocab::new(["_", "A0", "A1"])
    }

    #[test]
    fn test_add_predictions_takes_argmax_per_token() {
        let mut s = sentence();
        let inst  = PredicateInstance {
            parent: 0, predicate: 0, seq_len: 3, role_mask: vec![1.0; 5],
        };
        #[rustfmt::skip]
        let probs = [
            0.0, 0.0, 0.1, 0.8, 0.1,
            0.0, 0.0, 0.9, 0.0, 0.1,
            0.0, 0.0, 0.2, 0.1, 0.7,
            // padding row, never read
            0.9, 0.0, 0.0, 0.0, 0.1,
        ];
        s.add_predictions(&inst, &probs, &labels(), false).unwrap();
        assert_eq!(s.predicted(0).unwrap(), strings(&["A0", "_", "A1"]).as_slice());
    }

    #[test]
    fn test_restricted_argmax_skips_unlicensed_roles() {
        let mut s = sentence();
        let inst  = PredicateInstance {
            parent: 0, predicate: 0, seq_len: 1,
            role_mask: vec![0.0, 0.0, 1.0, 0.0, 1.0],
        };
        let probs = [0.0, 0.0, 0.1, 0.8, 0.1];
        s.add_predictions(&inst, &probs, &labels(), true).unwrap();
        assert_eq!(s.predicted(0).unwrap()[0], "_");
    }

    #[test]
    fn test_second_attachment_is_rejected() {
        let mut s = sentence();
        let inst  = PredicateInstance {
            parent: 0, predicate: 0, seq_len: 1, role_mask: vec![1.0; 5],
        };
        let probs = [0.0, 0.0, 1.0, 0.0, 0.0];
        s.add_predictions(&inst, &probs, &labels(), false).unwrap();
        assert!(s.add_predictions(&inst, &probs, &labels(), false).is_err());

        s.clear_predictions();
        assert!(s.add_predictions(&inst, &probs, &labels(), false).is_ok());
    }

    #[test]
    fn test_display_is_one_json_line() {
        let s    = sentence();
        let line = s.to_string();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["predicates"][0]["roles"][0], "_");
        assert_eq!(value["forms"][2], "apples");
    }
}
