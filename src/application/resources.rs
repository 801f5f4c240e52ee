// ============================================================
// Layer 2 — Shared Wiring
// ============================================================
// Both use cases assemble the same collaborators from SrlArgs
// and a data root:
//
//   vocabularies       data/{lang}/vocabs.json
//   batch producer     data/{lang}/srl/...
//   context embedder   data/{lang}/embeddings/context.txt
//   vector tables      data/{lang}/embeddings/*.txt
//   scorer             external evaluation command

use anyhow::{ensure, Context, Result};
use std::{fs, path::Path};

use crate::application::args::SrlArgs;
use crate::data::producer::CorpusBatchProducer;
use crate::domain::{
    embedding::EmbeddingMatrix,
    traits::{ContextualEmbedder, PredictionScorer},
    vocab::Vocabs,
    Split,
};
use crate::infra::{
    embeddings::{context_path, pretrained_path, stag_features_path, VectorTable},
    scorer::EvalScript,
};
use crate::ml::trainer::SrlTrainer;

pub fn vocabs_path(data_root: &Path, language: &str) -> std::path::PathBuf {
    data_root.join(language).join("vocabs.json")
}

/// Where predictions for `split` are written.
pub fn predictions_path(output_root: &Path, split: Split) -> std::path::PathBuf {
    output_root.join("predictions").join(format!("{split}.txt"))
}

pub fn load_vocabs(data_root: &Path, language: &str) -> Result<Vocabs> {
    let path = vocabs_path(data_root, language);
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read vocabularies '{}'", path.display()))?;
    let vocabs: Vocabs = serde_json::from_str(&json)
        .with_context(|| format!("Malformed vocabularies '{}'", path.display()))?;
    tracing::info!(
        "Vocabularies: {} words, {} lemmas, {} roles",
        vocabs.words.size(), vocabs.lemmas.size(), vocabs.labels.size()
    );
    Ok(vocabs)
}

/// Initial pretrained word matrix. Without a vector file every row
/// is drawn at random.
pub fn pretrained_matrix(args: &SrlArgs, vocabs: &Vocabs, data_root: &Path) -> Result<EmbeddingMatrix> {
    let path  = pretrained_path(data_root, &args.language);
    let table = if path.exists() {
        VectorTable::load(&path)?
    } else {
        VectorTable::empty(args.pretrained_embed_size)
    };
    if table.is_empty() {
        tracing::warn!("No pretrained vectors at '{}', starting from random rows", path.display());
    }
    ensure!(
        table.dim() == args.pretrained_embed_size,
        "pretrained vectors have width {}, but pretrained_embed_size is {}",
        table.dim(), args.pretrained_embed_size
    );
    table.vocab_matrix(&vocabs.words, args.seed)
}

/// Frozen supertag feature matrix, when enabled.
pub fn stag_feature_matrix(
    args:      &SrlArgs,
    vocabs:    &Vocabs,
    data_root: &Path,
) -> Result<Option<EmbeddingMatrix>> {
    if !(args.use_stags && args.use_stag_features) {
        return Ok(None);
    }
    let table = VectorTable::load(&stag_features_path(data_root, &args.language, &args.stag_type))?;
    ensure!(
        table.dim() == args.stag_feature_embed_size,
        "supertag features have width {}, but stag_feature_embed_size is {}",
        table.dim(), args.stag_feature_embed_size
    );
    table.vocab_matrix(&vocabs.stags, args.seed).map(Some)
}

/// Contextual vectors, required whenever context_embed_size > 0.
pub fn context_embedder(args: &SrlArgs, data_root: &Path) -> Result<Option<Box<dyn ContextualEmbedder>>> {
    if args.context_embed_size == 0 {
        return Ok(None);
    }
    let table = VectorTable::load(&context_path(data_root, &args.language))?;
    ensure!(
        table.dim() == args.context_embed_size,
        "context vectors have width {}, but context_embed_size is {}",
        table.dim(), args.context_embed_size
    );
    Ok(Some(Box::new(table)))
}

pub fn corpus_producer(args: &SrlArgs, data_root: &Path) -> CorpusBatchProducer {
    let producer = CorpusBatchProducer::new(data_root, &args.language);
    match args.stag_files() {
        Some((dir, kind)) => producer.with_stags(dir, kind),
        None => producer,
    }
}

/// Train/eval loop over the on-disk corpus.
pub fn build_trainer(
    args:            &SrlArgs,
    vocabs:          Vocabs,
    data_root:       &Path,
    restrict_labels: bool,
) -> Result<SrlTrainer> {
    let producer = corpus_producer(args, data_root);
    let trainer  = SrlTrainer::new(Box::new(producer), vocabs, args.batch_size, restrict_labels);
    Ok(match context_embedder(args, data_root)? {
        Some(embedder) => trainer.with_embedder(embedder),
        None => trainer,
    })
}

pub fn scorer(eval_command: Option<&str>) -> Result<Option<Box<dyn PredictionScorer>>> {
    eval_command
        .map(|cmd| EvalScript::new(cmd).map(|s| Box::new(s) as Box<dyn PredictionScorer>))
        .transpose()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::producer::tests::{toy_sentences, toy_vocabs};
    use std::path::PathBuf;

    /// Write the toy corpus for every split plus its vocabularies
    /// under `root/{lang}`.
    pub(crate) fn write_toy_data(root: &Path, language: &str) {
        let srl = root.join(language).join("srl");
        fs::create_dir_all(srl.join("pred")).unwrap();
        let sentences = toy_sentences();
        for split in ["train", "dev", "test", "ood"] {
            let corpus: String = sentences
                .iter()
                .map(|s| serde_json::to_string(s).unwrap() + "\n")
                .collect();
            fs::write(srl.join(format!("{split}.jsonl")), corpus).unwrap();

            let preds: String = sentences
                .iter()
                .map(|s| {
                    s.predicates
                        .iter()
                        .map(|p| format!("{}:{}", p.position, p.lemma))
                        .collect::<Vec<_>>()
                        .join(" ")
                        + "\n"
                })
                .collect();
            fs::write(srl.join("pred").join(format!("{split}_predicates.txt")), preds).unwrap();
        }
        fs::write(
            vocabs_path(root, language),
            serde_json::to_string(&toy_vocabs()).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_load_vocabs_from_data_root() {
        let dir = tempfile::tempdir().unwrap();
        write_toy_data(dir.path(), "eng");
        let vocabs = load_vocabs(dir.path(), "eng").unwrap();
        assert_eq!(vocabs.labels.size(), toy_vocabs().labels.size());
        assert!(load_vocabs(dir.path(), "deu").is_err());
    }

    #[test]
    fn test_missing_pretrained_file_falls_back_to_random_rows() {
        let dir    = tempfile::tempdir().unwrap();
        let vocabs = toy_vocabs();
        let args   = SrlArgs { pretrained_embed_size: 3, ..SrlArgs::default() };
        let m = pretrained_matrix(&args, &vocabs, dir.path()).unwrap();
        assert_eq!((m.rows(), m.cols()), (vocabs.words.size(), 3));
    }

    #[test]
    fn test_pretrained_width_must_match() {
        let dir  = tempfile::tempdir().unwrap();
        let path = pretrained_path(dir.path(), "eng");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "ate 0.1 0.2\n").unwrap();

        let args = SrlArgs { pretrained_embed_size: 3, ..SrlArgs::default() };
        assert!(pretrained_matrix(&args, &toy_vocabs(), dir.path()).is_err());
    }

    #[test]
    fn test_context_vectors_are_required_when_enabled() {
        let dir  = tempfile::tempdir().unwrap();
        let args = SrlArgs { context_embed_size: 2, ..SrlArgs::default() };
        assert!(context_embedder(&args, dir.path()).is_err());
        assert!(context_embedder(&SrlArgs::default(), dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_predictions_path() {
        assert_eq!(
            predictions_path(Path::new("output"), Split::Ood),
            PathBuf::from("output/predictions/ood.txt")
        );
    }
}
