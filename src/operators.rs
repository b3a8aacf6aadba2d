//! Vector primitives shared by the similarity indexes and the projection model.
//!
//! - `norm`, `dot` over dense slices
//! - `unit_vec`: normalise to length one, zero stays zero

/// Computes the Euclidean norm (L2) without allocating.
#[inline]
pub fn norm(a: &[f64]) -> f64 {
    a.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Dot product over the common prefix of `a` and `b`.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Returns `a` scaled to unit length. A zero (or non-finite norm) vector is
/// returned unchanged: normalisation has the zero vector as a fixed point.
pub fn unit_vec(a: &[f64]) -> Vec<f64> {
    let n = norm(a);
    if n > 0.0 && n.is_finite() {
        a.iter().map(|&x| x / n).collect()
    } else {
        a.to_vec()
    }
}
