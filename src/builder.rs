use std::time::Duration;

use crate::clustering::{
    CancellationToken, ClusteringParams, MedoidClusterer, DEFAULT_MAX_ITERATIONS,
    MIN_CLUSTER_SIZE,
};
use crate::core::{infer_num_features, SparseVector};
use crate::errors::{ConceptError, Result};
use crate::model::{ConceptModel, NO_TITLE};
use crate::storage::TrainingSummary;
use crate::titles::DocumentTitles;

// Add logging
use log::{debug, info, trace};

pub struct ConceptModelBuilder {
    // Concept-space size; `None` keeps every document as a concept
    num_clusters: Option<usize>,
    // Feature dimensionality; `None` scans the corpus
    num_features: Option<usize>,

    // k-medoids loop
    max_iterations: usize,
    min_cluster_size: usize,
    workers: Option<usize>,
    seed: Option<u64>,

    // Long-running jobs
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl Default for ConceptModelBuilder {
    fn default() -> Self {
        debug!("Creating ConceptModelBuilder with default parameters");
        Self {
            num_clusters: None,
            num_features: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_cluster_size: MIN_CLUSTER_SIZE,
            workers: None,
            seed: None,
            cancel: None,
            timeout: None,
        }
    }
}

impl ConceptModelBuilder {
    pub fn new() -> Self {
        info!("Initializing new ConceptModelBuilder");
        Self::default()
    }

    /// Number of concepts to keep (the `k` of k-medoids).
    pub fn with_num_clusters(mut self, k: usize) -> Self {
        info!("Setting number of clusters: {}", k);
        self.num_clusters = Some(k);
        self
    }

    pub fn with_num_features(mut self, num_features: usize) -> Self {
        info!("Setting number of features: {}", num_features);
        self.num_features = Some(num_features);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        info!("Setting max iterations: {}", max_iterations);
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        info!("Setting min cluster size: {}", min_cluster_size);
        self.min_cluster_size = min_cluster_size;
        self
    }

    /// Size of the assignment worker pool. Does not change the result.
    pub fn with_workers(mut self, workers: usize) -> Self {
        info!("Setting workers: {}", workers);
        self.workers = Some(workers);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        info!("Setting seed: {}", seed);
        self.seed = Some(seed);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        info!("Setting clustering timeout: {:?}", timeout);
        self.timeout = Some(timeout);
        self
    }

    /// Clustering parameters this builder resolves to for a corpus of `n` documents.
    pub fn params(&self, n: usize) -> ClusteringParams {
        ClusteringParams {
            num_clusters: self.num_clusters.unwrap_or(n),
            max_iterations: self.max_iterations,
            min_cluster_size: self.min_cluster_size,
            workers: self.workers,
            seed: self.seed,
        }
    }

    /// Clusters `corpus` and builds the concept model from the medoids.
    ///
    /// Configuration errors (empty corpus, titles shorter than the corpus,
    /// zero features, bad `k`) are returned before any clustering work.
    pub fn build(self, corpus: &[SparseVector], titles: &DocumentTitles) -> Result<ConceptModel> {
        let n = corpus.len();
        if n == 0 {
            return Err(ConceptError::EmptyCorpus);
        }
        if titles.len() < n {
            return Err(ConceptError::TitleMismatch {
                titles: titles.len(),
                documents: n,
            });
        }

        let num_features = match self.num_features {
            Some(f) => f,
            None => {
                info!("Scanning corpus to determine the number of features");
                infer_num_features(corpus)
            }
        };
        if num_features == 0 {
            return Err(ConceptError::InvalidConfig(
                "corpus has no features".into(),
            ));
        }

        let params = self.params(n);
        info!(
            "Building concept model from {} documents, {} features, {} concepts",
            n, num_features, params.num_clusters
        );

        let mut clusterer = MedoidClusterer::new(corpus, num_features, params.clone())?;
        if let Some(token) = self.cancel {
            clusterer = clusterer.with_cancellation(token);
        }
        if let Some(timeout) = self.timeout {
            clusterer = clusterer.with_timeout(timeout);
        }
        let outcome = clusterer.cluster()?;

        let concept_titles: DocumentTitles = outcome
            .clusters
            .keys()
            .map(|&id| match titles.get(id) {
                Some(t) if !t.is_empty() => t.to_string(),
                _ => NO_TITLE.to_string(),
            })
            .collect();

        for (medoid, members) in &outcome.clusters {
            let member_titles: Vec<&str> = members
                .iter()
                .filter_map(|&m| titles.get(m))
                .collect();
            debug!(
                "{}: {}",
                titles.get(*medoid).unwrap_or(NO_TITLE),
                member_titles.join(", ")
            );
        }

        let medoid_vectors = clusterer.medoid_vectors(&outcome);
        trace!("Collected {} medoid vectors", medoid_vectors.len());

        let training = TrainingSummary {
            num_documents: n,
            params,
            iterations: outcome.iterations,
            converged: outcome.converged,
            seed: outcome.seed,
            fallback_medoids: outcome.fallback_medoids,
            reinitialised_clusters: outcome.reinitialised_clusters,
        };

        info!("Concept model build completed successfully");
        Ok(ConceptModel::from_medoids(
            &medoid_vectors,
            concept_titles,
            num_features,
            training,
        ))
    }
}
