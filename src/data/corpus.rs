// ============================================================
// Layer 4 — Corpus Reader
// ============================================================
// Reads the three files that describe one split:
//
//   data/{lang}/srl/{split}.jsonl
//       one JSON sentence per line with gold predicates/roles
//   data/{lang}/srl/pred/{split}_predicates.txt
//       one line per sentence: "position:lemma" items naming
//       the predicates the model must label
//   data/{lang}/srl/{stags_dir}/{split}_stags_{stag_type}.txt
//       one line per sentence of whitespace-separated supertags
//       (only read when supertags are enabled)
//
// The predicate file decides which predicates are scored;
// gold roles are looked up in the corpus by position and
// default to "_" when the corpus has no entry for it.

use anyhow::{bail, ensure, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::sentence::{Predicate, Sentence};
use crate::domain::Split;

/// Resolved input paths for one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFiles {
    pub corpus:     PathBuf,
    pub predicates: PathBuf,
    pub stags:      Option<PathBuf>,
}

impl SplitFiles {
    /// Resolve the conventional layout under `data_root`.
    /// `stags` is `Some((stags_dir, stag_type))` when supertags are enabled.
    pub fn resolve(
        data_root: &Path,
        language:  &str,
        split:     Split,
        stags:     Option<(&str, &str)>,
    ) -> Self {
        let base = data_root.join(language).join("srl");
        Self {
            corpus:     base.join(format!("{split}.jsonl")),
            predicates: base.join("pred").join(format!("{split}_predicates.txt")),
            stags:      stags.map(|(dir, kind)| {
                base.join(dir).join(format!("{split}_stags_{kind}.txt"))
            }),
        }
    }
}

/// Load every sentence of a split with its predicates (and supertags).
pub fn read_split(files: &SplitFiles) -> Result<Vec<Sentence>> {
    let corpus = read_to_string(&files.corpus)?;
    let mut sentences = Vec::new();
    for (n, line) in corpus.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let sentence: Sentence = serde_json::from_str(line).with_context(|| {
            format!("{}:{}: malformed sentence", files.corpus.display(), n + 1)
        })?;
        check_columns(&sentence)
            .with_context(|| format!("{}:{}", files.corpus.display(), n + 1))?;
        sentences.push(sentence);
    }

    let predicate_lines = read_lines(&files.predicates, sentences.len())?;
    for (n, (sentence, line)) in sentences.iter_mut().zip(&predicate_lines).enumerate() {
        sentence.predicates = parse_predicates(line, sentence)
            .with_context(|| format!("{}:{}", files.predicates.display(), n + 1))?;
        sentence.clear_predictions();
    }

    if let Some(path) = &files.stags {
        let stag_lines = read_lines(path, sentences.len())?;
        for (n, (sentence, line)) in sentences.iter_mut().zip(&stag_lines).enumerate() {
            let tags: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            ensure!(
                tags.len() == sentence.len(),
                "{}:{}: {} supertags for {} tokens",
                path.display(), n + 1, tags.len(), sentence.len()
            );
            sentence.stags = tags;
        }
    }

    tracing::debug!(
        "Read {} sentences from '{}'",
        sentences.len(),
        files.corpus.display()
    );
    Ok(sentences)
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))
}

/// Read a one-line-per-sentence side file; blank lines are kept.
fn read_lines(path: &Path, expected: usize) -> Result<Vec<String>> {
    let text  = read_to_string(path)?;
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    ensure!(
        lines.len() == expected,
        "'{}' has {} lines but the corpus has {} sentences",
        path.display(), lines.len(), expected
    );
    Ok(lines)
}

fn check_columns(sentence: &Sentence) -> Result<()> {
    ensure!(!sentence.is_empty(), "sentence has no tokens");
    let n = sentence.len();
    ensure!(
        sentence.lemmas.len() == n && sentence.pos.len() == n,
        "forms/lemmas/pos lengths differ ({}/{}/{})",
        n, sentence.lemmas.len(), sentence.pos.len()
    );
    for p in &sentence.predicates {
        ensure!(p.position < n, "predicate at {} in a {n}-token sentence", p.position);
        ensure!(
            p.roles.is_empty() || p.roles.len() == n,
            "predicate at {} has {} roles for {n} tokens",
            p.position, p.roles.len()
        );
    }
    Ok(())
}

/// Parse "position:lemma" items, attaching gold roles from the corpus.
fn parse_predicates(line: &str, sentence: &Sentence) -> Result<Vec<Predicate>> {
    line.split_whitespace()
        .map(|item| {
            let Some((position, lemma)) = item.split_once(':') else {
                bail!("expected position:lemma, found '{item}'");
            };
            let position: usize = position
                .parse()
                .with_context(|| format!("bad predicate position in '{item}'"))?;
            ensure!(
                position < sentence.len(),
                "predicate position {position} in a {}-token sentence",
                sentence.len()
            );

            let roles = sentence
                .predicates
                .iter()
                .find(|p| p.position == position && !p.roles.is_empty())
                .map(|p| p.roles.clone())
                .unwrap_or_else(|| vec!["_".to_string(); sentence.len()]);

            Ok(Predicate { position, lemma: lemma.to_string(), roles })
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = concat!(
        r#"{"forms":["John","ate","apples"],"lemmas":["john","eat","apple"],"pos":["NNP","VBD","NNS"],"predicates":[{"position":1,"lemma":"eat.01","roles":["A0","_","A1"]}]}"#,
        "\n",
        r#"{"forms":["Rain"],"lemmas":["rain"],"pos":["NN"],"predicates":[]}"#,
        "\n",
    );

    fn write_split(dir: &Path, predicates: &str, stags: Option<&str>) -> SplitFiles {
        let files = SplitFiles::resolve(
            dir, "eng", Split::Dev, stags.map(|_| ("pred", "ud")),
        );
        fs::create_dir_all(files.predicates.parent().unwrap()).unwrap();
        fs::write(&files.corpus, CORPUS).unwrap();
        fs::write(&files.predicates, predicates).unwrap();
        if let (Some(path), Some(text)) = (&files.stags, stags) {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        files
    }

    #[test]
    fn test_resolves_conventional_paths() {
        let files = SplitFiles::resolve(Path::new("data"), "eng", Split::Test, Some(("pred", "ud")));
        assert_eq!(files.corpus, PathBuf::from("data/eng/srl/test.jsonl"));
        assert_eq!(files.predicates, PathBuf::from("data/eng/srl/pred/test_predicates.txt"));
        assert_eq!(files.stags, Some(PathBuf::from("data/eng/srl/pred/test_stags_ud.txt")));
    }

    #[test]
    fn test_reads_predicates_and_gold_roles() {
        let dir   = tempfile::tempdir().unwrap();
        let files = write_split(dir.path(), "1:eat.01 2:apple.01\n\n", None);

        let sentences = read_split(&files).unwrap();
        assert_eq!(sentences.len(), 2);
        let preds = &sentences[0].predicates;
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].roles, vec!["A0", "_", "A1"]);
        assert_eq!(preds[1].roles, vec!["_", "_", "_"]);
        assert!(sentences[1].predicates.is_empty());
    }

    #[test]
    fn test_reads_supertags() {
        let dir   = tempfile::tempdir().unwrap();
        let files = write_split(dir.path(), "1:eat.01\n\n", Some("N V N\nN\n"));
        let sentences = read_split(&files).unwrap();
        assert_eq!(sentences[0].stags, vec!["N", "V", "N"]);
    }

    #[test]
    fn test_missing_predicate_file_is_fatal() {
        let dir   = tempfile::tempdir().unwrap();
        let files = write_split(dir.path(), "1:eat.01\n\n", None);
        fs::remove_file(&files.predicates).unwrap();
        assert!(read_split(&files).is_err());
    }

    #[test]
    fn test_empty_sentence_is_fatal() {
        let dir   = tempfile::tempdir().unwrap();
        let files = write_split(dir.path(), "1:eat.01\n\n", None);
        let empty = r#"{"forms":[],"lemmas":[],"pos":[],"predicates":[]}"#;
        fs::write(&files.corpus, format!("{CORPUS}{empty}\n")).unwrap();

        let err = read_split(&files).unwrap_err();
        assert!(format!("{err:#}").contains("no tokens"));
    }

    #[test]
    fn test_out_of_range_predicate_is_fatal() {
        let dir   = tempfile::tempdir().unwrap();
        let files = write_split(dir.path(), "7:eat.01\n\n", None);
        assert!(read_split(&files).is_err());
    }
}
