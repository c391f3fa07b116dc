//! L2 normalization of single embeddings and embedding matrices.

use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis};

/// L2 norm of a vector.
pub fn l2_norm(v: ArrayView1<'_, f32>) -> f32 {
    v.dot(&v).sqrt()
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize_in_place(mut v: ArrayViewMut1<'_, f32>) {
    let norm = l2_norm(v.view());
    if norm > 0.0 {
        v.mapv_inplace(|x| x / norm);
    }
}

/// Normalize every row of an `(n, dim)` matrix to unit length.
pub fn normalize_rows(matrix: &mut Array2<f32>) {
    for row in matrix.axis_iter_mut(Axis(0)) {
        l2_normalize_in_place(row);
    }
}
