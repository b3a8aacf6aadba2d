//! # conceptspace
//!
//! Concept-space reduction and semantic projection for content-based article
//! recommendation.
//!
//! A large corpus of candidate concept documents (e.g. one per Wikipedia
//! article, already weighted by TF-IDF or a topic model) is compressed by
//! [`clustering::MedoidClusterer`] into `k` representative documents. Their
//! unit vectors become the columns of the interpreter matrix of a
//! [`model::ConceptModel`], which projects any weighted term vector into a
//! sparse, unit-normalised concept vector.
//!
//! ```
//! use conceptspace::builder::ConceptModelBuilder;
//! use conceptspace::core::SparseVector;
//! use conceptspace::titles::DocumentTitles;
//!
//! let corpus = vec![
//!     SparseVector::from_pairs(vec![(0, 1.0), (1, 1.0)]),
//!     SparseVector::from_pairs(vec![(0, 1.0), (1, 0.8)]),
//!     SparseVector::from_pairs(vec![(2, 1.0), (3, 1.0)]),
//!     SparseVector::from_pairs(vec![(2, 0.9), (3, 1.0)]),
//! ];
//! let titles: DocumentTitles = ["a", "a'", "b", "b'"].into_iter().collect();
//!
//! let model = ConceptModelBuilder::new()
//!     .with_num_clusters(4)
//!     .build(&corpus, &titles)
//!     .unwrap();
//!
//! let concepts = model.project(&SparseVector::from_pairs(vec![(2, 1.0)]));
//! let norm: f64 = concepts.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
//! assert!((norm - 1.0).abs() < 1e-9);
//! ```

pub mod builder;
pub mod clustering;
pub mod core;
pub mod errors;
pub mod model;
pub mod operators;
pub mod similarity;
pub mod storage;
pub mod titles;

#[cfg(test)]
mod tests;
