use anyhow::{ensure, Result};

/// Dense row-major matrix of externally supplied vectors, one row per
/// vocabulary id (pretrained word vectors, precomputed supertag features).
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows:   usize,
    cols:   usize,
    values: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self> {
        ensure!(
            values.len() == rows * cols,
            "embedding matrix {rows}x{cols} needs {} values, got {}",
            rows * cols, values.len()
        );
        Ok(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[cfg(test)]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}
