// ============================================================
// Layer 5 — Orthogonal Initialisation
// ============================================================
// Role embeddings and both scorer projections start from a
// (semi-)orthogonal matrix: a Gaussian matrix whose rows (when
// rows ≤ cols) or columns (when rows ≥ cols) are made
// orthonormal with modified Gram-Schmidt.

use burn::{prelude::*, tensor::TensorData};
use rand::Rng;
use rand_distr::StandardNormal;

/// Row-major `rows × cols` matrix with orthonormal rows or columns,
/// whichever side is shorter.
pub fn orthogonal(rows: usize, cols: usize, rng: &mut impl Rng) -> Vec<f32> {
    let (long, short) = if rows >= cols { (rows, cols) } else { (cols, rows) };

    // `short` vectors of length `long`, orthonormalised in place
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(short);
    while basis.len() < short {
        let mut v: Vec<f64> = (0..long).map(|_| rng.sample(StandardNormal)).collect();
        for u in &basis {
            let dot: f64 = v.iter().zip(u).map(|(a, b)| a * b).sum();
            v.iter_mut().zip(u).for_each(|(a, b)| *a -= dot * b);
        }
        let norm = v.iter().map(|a| a * a).sum::<f64>().sqrt();
        // A draw (numerically) inside the span so far is redrawn
        if norm > 1e-6 {
            v.iter_mut().for_each(|a| *a /= norm);
            basis.push(v);
        }
    }

    let mut out = vec![0.0f32; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let v = if rows >= cols { basis[c][r] } else { basis[r][c] };
            out[r * cols + c] = v as f32;
        }
    }
    out
}

/// [`orthogonal`] as a float tensor on `device`.
pub fn orthogonal_tensor<B: Backend>(
    rows:   usize,
    cols:   usize,
    rng:    &mut impl Rng,
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(orthogonal(rows, cols, rng), [rows, cols]), device)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn gram(m: &[f32], rows: usize, cols: usize, by_rows: bool) -> Vec<Vec<f32>> {
        let n = if by_rows { rows } else { cols };
        let at = |i: usize, k: usize| if by_rows { m[i * cols + k] } else { m[k * cols + i] };
        let len = if by_rows { cols } else { rows };
        (0..n)
            .map(|i| (0..n).map(|j| (0..len).map(|k| at(i, k) * at(j, k)).sum()).collect())
            .collect()
    }

    fn assert_identity(g: &[Vec<f32>]) {
        for (i, row) in g.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-4, "gram[{i}][{j}] = {v}");
            }
        }
    }

    #[test]
    fn test_tall_matrix_has_orthonormal_columns() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = orthogonal(6, 3, &mut rng);
        assert_identity(&gram(&m, 6, 3, false));
    }

    #[test]
    fn test_wide_matrix_has_orthonormal_rows() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = orthogonal(3, 8, &mut rng);
        assert_identity(&gram(&m, 3, 8, true));
    }

    #[test]
    fn test_same_seed_same_matrix() {
        let a = orthogonal(4, 4, &mut StdRng::seed_from_u64(1));
        let b = orthogonal(4, 4, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }
}
