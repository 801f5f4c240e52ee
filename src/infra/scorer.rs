// ============================================================
// Layer 6 — External Evaluation Script
// ============================================================
// Runs the scorer as `<command…> <gold> <system>` and reads
// the two figures it prints:
//
//   Labeled F1:    81.23
//   Unlabeled F1:  88.40
//
// The call is synchronous and never retried. A non-zero exit
// status or missing figure is an error.

use anyhow::{bail, ensure, Context, Result};
use std::{path::Path, process::Command};

use crate::domain::traits::{F1Scores, PredictionScorer};

pub const DEFAULT_EVAL_COMMAND: &str = "eval/eval.sh";

#[derive(Debug, Clone)]
pub struct EvalScript {
    program: String,
    args:    Vec<String>,
}

impl EvalScript {
    /// `command` is split on whitespace: the first word is the program,
    /// the rest are passed before the two file paths.
    pub fn new(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().context("empty evaluation command")?;
        Ok(Self { program, args: words.collect() })
    }
}

impl PredictionScorer for EvalScript {
    fn score(&self, gold: &Path, system: &Path) -> Result<F1Scores> {
        tracing::info!("Running evaluation script '{}'", self.program);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(gold)
            .arg(system)
            .output()
            .with_context(|| format!("Cannot run evaluation script '{}'", self.program))?;

        ensure!(
            output.status.success(),
            "evaluation script exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        parse_scores(&String::from_utf8_lossy(&output.stdout))
    }
}

pub fn parse_scores(stdout: &str) -> Result<F1Scores> {
    let mut labeled   = None;
    let mut unlabeled = None;

    for line in stdout.lines().map(str::trim) {
        let slot = if line.starts_with("Labeled F1") {
            &mut labeled
        } else if line.starts_with("Unlabeled F1") {
            &mut unlabeled
        } else {
            continue;
        };
        let value = line
            .split(|c: char| c == ':' || c == '=' || c.is_whitespace())
            .filter_map(|w| w.trim_end_matches('%').parse::<f64>().ok())
            .last()
            .with_context(|| format!("no number in '{line}'"))?;
        *slot = Some(value);
    }

    match (labeled, unlabeled) {
        (Some(labeled), Some(unlabeled)) => Ok(F1Scores { labeled, unlabeled }),
        _ => bail!("evaluation output did not report both labeled and unlabeled F1"),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores() {
        let out = "SYSTEM\n  Labeled F1:    81.23\n  Unlabeled F1:  88.40\n";
        assert_eq!(parse_scores(out).unwrap(), F1Scores { labeled: 81.23, unlabeled: 88.40 });
    }

    #[test]
    fn test_parse_scores_requires_both() {
        assert!(parse_scores("Labeled F1: 80.0\n").is_err());
        assert!(parse_scores("Labeled F1: n/a\nUnlabeled F1: 1.0\n").is_err());
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(EvalScript::new("   ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_script_with_gold_and_system() {
        use std::os::unix::fs::PermissionsExt;

        let dir    = tempfile::tempdir().unwrap();
        let script = dir.path().join("eval.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\n[ -n \"$1\" ] && [ -n \"$2\" ] || exit 2\necho 'Labeled F1: 70.5'\necho 'Unlabeled F1: 75'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scorer = EvalScript::new(script.to_str().unwrap()).unwrap();
        let scores = scorer.score(Path::new("gold.jsonl"), Path::new("sys.txt")).unwrap();
        assert_eq!(scores, F1Scores { labeled: 70.5, unlabeled: 75.0 });
    }
}
