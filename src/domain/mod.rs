// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing what the labeler works on:
// vocabularies, sentences and their predicate instances, and
// the corpus splits. No burn types and no file I/O here.

pub mod embedding;

pub mod sentence;

pub mod traits;

pub mod vocab;

use std::fmt;

/// Corpus split selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Dev,
    Test,
    Ood,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Dev   => "dev",
            Split::Test  => "test",
            Split::Ood   => "ood",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
