//! Concept model: projection of weighted term vectors into concept space.
//!
//! The model keeps an interpreter matrix of shape `[num_features × num_concepts]`
//! whose columns are the unit-normalised medoid documents chosen by
//! [`MedoidClusterer`](crate::clustering::MedoidClusterer). Projecting a
//! document multiplies its weights against every column, normalises the
//! result to unit length and drops entries with `|w| <= 1e-12`.
//!
//! ```ignore
//! use conceptspace::model::ConceptModel;
//!
//! let model = ConceptModel::new(&tfidf_corpus, &titles, Some(15), None)?;
//! let concepts = model.project(&tfidf_doc);
//! for (title, weight) in model.get_concept_titles(concepts.iter())? {
//!     println!("{title} {weight:.3}");
//! }
//! model.save("/tmp/wiki.concepts")?;
//! let restored = ConceptModel::load("/tmp/wiki.concepts")?;
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;

use log::{debug, info};
use rayon::prelude::*;
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::builder::ConceptModelBuilder;
use crate::core::{DenseVector, SparseVector};
use crate::errors::{ConceptError, Result};
use crate::storage::{
    self, matrix_path, InterpreterMatrix, ModelMetadata, TrainingSummary, METADATA_VERSION,
};
use crate::titles::DocumentTitles;

/// Entries of a projected vector with `|w| <= PROJECTION_EPS` are dropped.
pub const PROJECTION_EPS: f64 = 1e-12;

/// Title used for concepts whose source title is empty.
pub const NO_TITLE: &str = "no title";

#[derive(Debug)]
pub struct ConceptModel {
    num_features: usize,
    titles: DocumentTitles,
    matrix: InterpreterMatrix,
    training: TrainingSummary,
}

impl ConceptModel {
    /// Trains a model on `corpus`, whose document `i` is named `titles[i]`.
    ///
    /// `num_clusters = None` keeps every document as a concept;
    /// `num_features = None` infers the feature count from the corpus.
    pub fn new(
        corpus: &[SparseVector],
        titles: &DocumentTitles,
        num_clusters: Option<usize>,
        num_features: Option<usize>,
    ) -> Result<Self> {
        let mut builder = ConceptModelBuilder::new();
        if let Some(k) = num_clusters {
            builder = builder.with_num_clusters(k);
        }
        if let Some(f) = num_features {
            builder = builder.with_num_features(f);
        }
        builder.build(corpus, titles)
    }

    /// Assembles a model from its medoid vectors (one per concept).
    pub(crate) fn from_medoids(
        medoid_vectors: &[SparseVector],
        titles: DocumentTitles,
        num_features: usize,
        training: TrainingSummary,
    ) -> Self {
        let num_concepts = medoid_vectors.len();
        let mut flat = Vec::with_capacity(num_features * num_concepts);
        for v in medoid_vectors {
            let mut column = v.to_dense(num_features);
            column.normalise();
            flat.extend(column.into_inner());
        }
        // Concept vectors are stored consecutively: column-major F × k.
        let matrix = DenseMatrix::from_iterator(flat.into_iter(), num_features, num_concepts, 1);

        Self {
            num_features,
            titles,
            matrix: InterpreterMatrix::InMemory(matrix),
            training,
        }
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_concepts(&self) -> usize {
        self.titles.len()
    }

    pub fn titles(&self) -> &DocumentTitles {
        &self.titles
    }

    pub fn concept_title(&self, concept_id: usize) -> Option<&str> {
        self.titles.get(concept_id)
    }

    pub fn training(&self) -> &TrainingSummary {
        &self.training
    }

    pub fn matrix(&self) -> &InterpreterMatrix {
        &self.matrix
    }

    pub fn is_memory_mapped(&self) -> bool {
        self.matrix.is_memory_mapped()
    }

    /// Projects one weighted vector into concept space.
    ///
    /// Feature ids `>= num_features` are ignored. The result has unit L2 norm
    /// unless it is zero, in which case it is empty.
    pub fn project(&self, vector: &SparseVector) -> SparseVector {
        let mut weights = vec![0.0; self.num_concepts()];
        for (feature_id, w) in vector.iter() {
            if feature_id < self.num_features {
                self.matrix.accumulate_row(feature_id, w, &mut weights);
            }
        }

        let mut concepts = DenseVector::from(weights);
        concepts.normalise();
        concepts.to_sparse(PROJECTION_EPS)
    }

    /// Lazily projects each vector of `corpus`, preserving order.
    pub fn project_corpus<'m, I>(&'m self, corpus: I) -> impl Iterator<Item = SparseVector> + 'm
    where
        I: IntoIterator,
        I::IntoIter: 'm,
        I::Item: Borrow<SparseVector>,
    {
        corpus.into_iter().map(move |v| self.project(v.borrow()))
    }

    /// Projects a whole in-memory batch in parallel, preserving order.
    pub fn project_all(&self, corpus: &[SparseVector]) -> Vec<SparseVector> {
        corpus.par_iter().map(|v| self.project(v)).collect()
    }

    /// Resolves concept ids to titles, keeping input order and weights.
    pub fn get_concept_titles<I>(&self, concepts: I) -> Result<Vec<(&str, f64)>>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        concepts
            .into_iter()
            .map(|(id, w)| {
                self.titles
                    .get(id)
                    .map(|title| (title, w))
                    .ok_or(ConceptError::UnknownConcept(id))
            })
            .collect()
    }

    /// Writes metadata to `path` and the matrix to `<path>.matrix`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mpath = matrix_path(path);
        info!(
            "Storing concept model to {} and {}",
            path.display(),
            mpath.display()
        );

        // both files are staged before either is replaced
        let metadata = self.metadata();
        let staged_meta = storage::stage(path, |out| metadata.write_to(out))?;
        let staged_matrix = storage::stage(&mpath, |out| self.matrix.write_to(out))?;
        storage::persist(staged_matrix, &mpath)?;
        storage::persist(staged_meta, path)
    }

    /// Loads a model saved with [`save`](Self::save); the matrix is memory-mapped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading concept model from {}", path.display());

        let meta = ModelMetadata::read(path)?;
        let matrix = InterpreterMatrix::open_mapped(matrix_path(path))?;

        let (rows, cols) = matrix.shape();
        if rows != meta.num_features {
            return Err(ConceptError::DimensionMismatch {
                expected: meta.num_features,
                got: rows,
            });
        }
        if cols != meta.num_concepts {
            return Err(ConceptError::DimensionMismatch {
                expected: meta.num_concepts,
                got: cols,
            });
        }

        debug!("Loaded {} concepts over {} features", cols, rows);
        Ok(Self {
            num_features: meta.num_features,
            titles: DocumentTitles::from(meta.concept_titles),
            matrix,
            training: meta.training,
        })
    }

    /// Reads only the metadata of a saved model; the matrix file is not opened.
    pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<ModelMetadata> {
        ModelMetadata::read(path)
    }

    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            version: METADATA_VERSION,
            num_features: self.num_features,
            num_concepts: self.num_concepts(),
            concept_titles: self.titles.as_slice().to_vec(),
            training: self.training.clone(),
        }
    }
}

impl fmt::Display for ConceptModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, title) in self.titles.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", title)?;
        }
        Ok(())
    }
}
