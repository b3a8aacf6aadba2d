//! Sparse and dense document vectors.
//!
//! Every document and concept in this crate is a [`SparseVector`]: a list of
//! `(feature_id, weight)` pairs, sorted by feature id, with unique ids and
//! absent ids meaning weight zero. Arithmetic that needs every coordinate
//! (centroids, projection output before filtering) happens on a
//! [`DenseVector`] over a fixed feature dimensionality.
//!
//! The two are deliberately distinct types; conversions are explicit:
//!
//! ```
//! use conceptspace::core::SparseVector;
//!
//! let v = SparseVector::from_pairs(vec![(3, 2.0), (0, 1.0)]);
//! let dense = v.to_dense(4);
//! assert_eq!(dense.as_slice(), &[1.0, 0.0, 0.0, 2.0]);
//!
//! let back = dense.to_sparse(1e-12);
//! assert_eq!(back, v);
//! ```
//!
//! Conversion to dense form is bounded by the requested dimensionality:
//! feature ids at or beyond it are dropped.

use serde::{Deserialize, Serialize};

use crate::operators::{dot, norm, unit_vec};

/// Weighted feature vector keyed by non-negative feature id.
///
/// # Invariants
///
/// - entries are sorted by feature id, ascending
/// - feature ids are unique
/// - weights are never exactly zero
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a vector from arbitrary pairs.
    ///
    /// Pairs are sorted by feature id, repeated ids have their weights summed
    /// (bag-of-words semantics) and zero weights are dropped.
    ///
    /// ```
    /// use conceptspace::core::SparseVector;
    ///
    /// let v = SparseVector::from_pairs(vec![(2, 1.0), (1, 0.5), (2, 1.0), (7, 0.0)]);
    /// assert_eq!(v.as_pairs(), &[(1, 0.5), (2, 2.0)]);
    /// ```
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut raw: Vec<(usize, f64)> = pairs.into_iter().collect();
        raw.sort_by_key(|&(id, _)| id);

        let mut entries: Vec<(usize, f64)> = Vec::with_capacity(raw.len());
        for (id, w) in raw {
            match entries.last_mut() {
                Some(last) if last.0 == id => last.1 += w,
                _ => entries.push((id, w)),
            }
        }
        entries.retain(|&(_, w)| w != 0.0);

        Self { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn as_pairs(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Weight of `feature_id`, zero when absent.
    pub fn get(&self, feature_id: usize) -> f64 {
        self.entries
            .binary_search_by_key(&feature_id, |&(id, _)| id)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Largest feature id present, `None` for the empty vector.
    pub fn max_feature_id(&self) -> Option<usize> {
        self.entries.last().map(|&(id, _)| id)
    }

    /// Euclidean norm over the stored weights.
    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt()
    }

    /// Dot product against a dense slice; ids outside the slice count as zero.
    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|&(id, w)| dense.get(id).map(|d| w * d))
            .sum()
    }

    /// Dense form over `num_features` coordinates.
    ///
    /// Ids `>= num_features` are ignored.
    pub fn to_dense(&self, num_features: usize) -> DenseVector {
        let mut data = vec![0.0; num_features];
        for &(id, w) in &self.entries {
            if id < num_features {
                data[id] = w;
            }
        }
        DenseVector(data)
    }

    /// Copy scaled to unit length. The zero vector maps to itself.
    pub fn normalised(&self) -> SparseVector {
        let n = self.norm();
        if n == 0.0 || !n.is_finite() {
            return self.clone();
        }
        Self {
            entries: self.entries.iter().map(|&(id, w)| (id, w / n)).collect(),
        }
    }
}

impl FromIterator<(usize, f64)> for SparseVector {
    fn from_iter<T: IntoIterator<Item = (usize, f64)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

/// Fixed-length vector of feature weights.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseVector(Vec<f64>);

impl DenseVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    pub fn norm(&self) -> f64 {
        norm(&self.0)
    }

    pub fn dot(&self, other: &DenseVector) -> f64 {
        dot(&self.0, &other.0)
    }

    /// `self += scale * v`, ignoring ids outside this vector.
    pub fn add_sparse(&mut self, v: &SparseVector, scale: f64) {
        for (id, w) in v.iter() {
            if let Some(slot) = self.0.get_mut(id) {
                *slot += scale * w;
            }
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for x in self.0.iter_mut() {
            *x *= factor;
        }
    }

    /// Scales in place to unit length. A zero vector is left untouched.
    pub fn normalise(&mut self) {
        self.0 = unit_vec(&self.0);
    }

    /// Sparse form, keeping only entries with `|w| > eps`.
    pub fn to_sparse(&self, eps: f64) -> SparseVector {
        SparseVector {
            entries: self
                .0
                .iter()
                .enumerate()
                .filter(|(_, w)| w.abs() > eps)
                .map(|(id, &w)| (id, w))
                .collect(),
        }
    }
}

impl From<Vec<f64>> for DenseVector {
    fn from(data: Vec<f64>) -> Self {
        Self(data)
    }
}

/// Smallest dimensionality covering every feature id in `corpus`.
pub fn infer_num_features(corpus: &[SparseVector]) -> usize {
    corpus
        .iter()
        .filter_map(SparseVector::max_feature_id)
        .max()
        .map(|id| id + 1)
        .unwrap_or(0)
}
