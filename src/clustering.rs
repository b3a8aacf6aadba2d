//! k-medoids clustering under cosine similarity.
//!
//! Compresses a large corpus of concept documents into `k` representative
//! documents (medoids). This is the "k-means based" medoid variant: each
//! iteration computes the arithmetic centroid of a cluster and promotes the
//! real document closest to it.
//!
//! Loop:
//! 1. sample `k` distinct random medoids, index them
//! 2. assign every document to its most similar medoid (parallel, rayon pool)
//! 3. recompute medoids; degenerate clusters (fewer than `min_cluster_size`
//!    members) are re-seeded randomly
//! 4. repeat 2-3 until a recompute pass changes nothing or the budget is spent
//!
//! **DETERMINISTIC** for a fixed seed: the RNG only lives in the orchestrator,
//! assignment ties go to the lowest medoid id and centroid sums run in member
//! order, so the number of workers never changes the result.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{DenseVector, SparseVector};
use crate::errors::{ConceptError, Result};
use crate::similarity::{MatrixSimilarity, SimilarityIndex, SparseMatrixSimilarity};

/// Clusters with fewer members than this are re-seeded.
pub const MIN_CLUSTER_SIZE: usize = 2;

/// Default iteration budget.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Log target for events that degrade clustering quality without failing it.
pub const DEGRADATION_TARGET: &str = "conceptspace::degradation";

const PROGRESS_EVERY: usize = 1000;

/// Medoid document id -> member document ids (ascending, medoid included
/// when it is assigned to itself).
pub type Clusters = BTreeMap<usize, Vec<usize>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringParams {
    pub num_clusters: usize,
    pub max_iterations: usize,
    pub min_cluster_size: usize,
    /// Assignment pool size; `None` uses the detected parallelism.
    pub workers: Option<usize>,
    /// RNG seed; `None` draws one and reports it in the outcome.
    pub seed: Option<u64>,
}

impl ClusteringParams {
    pub fn new(num_clusters: usize) -> Self {
        Self {
            num_clusters,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_cluster_size: MIN_CLUSTER_SIZE,
            workers: None,
            seed: None,
        }
    }

    fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Cooperative cancellation flag, checked at every iteration boundary.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a clustering run.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusteringOutcome {
    pub clusters: Clusters,
    /// Recompute passes executed.
    pub iterations: usize,
    /// `true` when the last recompute pass changed no medoid.
    pub converged: bool,
    pub seed: u64,
    /// Centroids with no match in the corpus index, replaced by a random medoid.
    pub fallback_medoids: usize,
    /// Degenerate clusters re-seeded with a random medoid.
    pub reinitialised_clusters: usize,
}

impl ClusteringOutcome {
    /// Medoid ids, ascending.
    pub fn medoids(&self) -> Vec<usize> {
        self.clusters.keys().copied().collect()
    }

    /// Medoid of the cluster holding `doc_id`.
    pub fn cluster_of(&self, doc_id: usize) -> Option<usize> {
        self.clusters
            .iter()
            .find(|(_, members)| members.binary_search(&doc_id).is_ok())
            .map(|(&medoid, _)| medoid)
    }
}

#[derive(Default)]
struct RecomputeStats {
    fallback_medoids: usize,
    reinitialised_clusters: usize,
}

/// k-medoids clusterer over a borrowed corpus.
pub struct MedoidClusterer<'a> {
    corpus: &'a [SparseVector],
    corpus_index: SparseMatrixSimilarity,
    num_features: usize,
    params: ClusteringParams,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl<'a> MedoidClusterer<'a> {
    /// Validates the configuration and indexes the corpus.
    ///
    /// Fails fast on an empty corpus, a zero feature space, `k == 0`,
    /// `k > N`, a zero minimum cluster size or a zero-sized worker pool.
    pub fn new(
        corpus: &'a [SparseVector],
        num_features: usize,
        params: ClusteringParams,
    ) -> Result<Self> {
        let n = corpus.len();
        if n == 0 {
            return Err(ConceptError::EmptyCorpus);
        }
        if num_features == 0 {
            return Err(ConceptError::InvalidConfig(
                "number of features must be positive".into(),
            ));
        }
        if params.num_clusters == 0 || params.num_clusters > n {
            return Err(ConceptError::InvalidConfig(format!(
                "number of clusters must be in 1..={}, got {}",
                n, params.num_clusters
            )));
        }
        if params.min_cluster_size == 0 {
            return Err(ConceptError::InvalidConfig(
                "minimum cluster size must be positive".into(),
            ));
        }
        if params.workers == Some(0) {
            return Err(ConceptError::InvalidConfig(
                "worker pool needs at least one thread".into(),
            ));
        }

        info!(
            "Indexing {} documents over {} features for k-medoids (k={})",
            n, num_features, params.num_clusters
        );
        let corpus_index = SparseMatrixSimilarity::build(corpus, num_features);
        debug!("Corpus index holds {} non-zeros", corpus_index.nnz());

        Ok(Self {
            corpus,
            corpus_index,
            num_features,
            params,
            cancel: None,
            timeout: None,
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Wall-clock budget checked at iteration boundaries. Running out ends the
    /// loop like an exhausted iteration budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn params(&self) -> &ClusteringParams {
        &self.params
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Runs the clustering loop on a dedicated worker pool.
    pub fn cluster(&self) -> Result<ClusteringOutcome> {
        let seed = self.params.seed.unwrap_or_else(rand::random);
        let workers = self.params.resolved_workers();
        debug!("k-medoids seed={}, workers={}", seed, workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        pool.install(|| self.run(seed))
    }

    /// Unit-normalised vectors of the outcome's medoids, in medoid id order.
    pub fn medoid_vectors(&self, outcome: &ClusteringOutcome) -> Vec<SparseVector> {
        outcome
            .clusters
            .keys()
            .map(|&id| self.corpus_index.vector_by_id(id))
            .collect()
    }

    fn run(&self, seed: u64) -> Result<ClusteringOutcome> {
        let n = self.corpus.len();
        let k = self.params.num_clusters;

        if k == n {
            info!("k equals corpus size ({}); every document is its own medoid", n);
            return Ok(ClusteringOutcome {
                clusters: (0..n).map(|id| (id, vec![id])).collect(),
                iterations: 0,
                converged: true,
                seed,
                fallback_medoids: 0,
                reinitialised_clusters: 0,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let started = Instant::now();

        info!("Init random medoids");
        let mut medoids = rand::seq::index::sample(&mut rng, n, k).into_vec();
        medoids.sort_unstable();
        let mut medoid_index = self.build_medoid_index(&medoids);

        info!("Assign documents to random clusters");
        let mut clusters = self.assign(&medoids, &medoid_index);

        let mut stats = RecomputeStats::default();
        let mut changed = true;
        let mut iterations = 0;

        while changed && iterations < self.params.max_iterations {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    warn!("k-medoids cancelled before iteration #{}", iterations + 1);
                    return Err(ConceptError::Cancelled { iteration: iterations });
                }
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    warn!(
                        "k-medoids stopped by timeout ({:?}) after {} iterations",
                        timeout, iterations
                    );
                    break;
                }
            }

            iterations += 1;
            info!("Entering iteration #{}", iterations);

            info!("Recalculate medoids");
            let (next, did_change) = self.recalculate_medoids(&clusters, &mut rng, &mut stats);
            changed = did_change;
            if !changed {
                break;
            }

            medoids = next;
            medoid_index = self.build_medoid_index(&medoids);

            info!("Assign documents to new clusters");
            clusters = self.assign(&medoids, &medoid_index);
        }

        let converged = !changed;
        if converged {
            info!("Converged in {} iterations", iterations);
        } else {
            info!("May not have converged after {} iterations", iterations);
        }

        Ok(ClusteringOutcome {
            clusters,
            iterations,
            converged,
            seed,
            fallback_medoids: stats.fallback_medoids,
            reinitialised_clusters: stats.reinitialised_clusters,
        })
    }

    fn build_medoid_index(&self, medoids: &[usize]) -> MatrixSimilarity {
        let vectors: Vec<SparseVector> = medoids.iter().map(|&m| self.corpus[m].clone()).collect();
        MatrixSimilarity::build(&vectors, self.num_features)
    }

    /// Assigns every document to the medoid with the highest cosine score.
    ///
    /// Workers only read the medoid index; `(doc_id, medoid_position)` pairs
    /// are merged here once the parallel pass completes.
    fn assign(&self, medoids: &[usize], medoid_index: &MatrixSimilarity) -> Clusters {
        let positions: Vec<(usize, usize)> = self
            .corpus
            .par_iter()
            .enumerate()
            .map(|(doc_id, doc)| (doc_id, medoid_index.best_position(doc).unwrap_or(0)))
            .collect();

        let mut clusters: Clusters = medoids.iter().map(|&m| (m, Vec::new())).collect();
        for (doc_id, pos) in positions {
            if let Some(&medoid) = medoids.get(pos) {
                trace!("doc {} -> medoid {}", doc_id, medoid);
                clusters.entry(medoid).or_default().push(doc_id);
            }
        }
        clusters
    }

    /// Computes the next medoid set. Returns it (ascending, always `k` distinct
    /// ids) with a flag telling whether any medoid changed.
    fn recalculate_medoids(
        &self,
        clusters: &Clusters,
        rng: &mut ChaCha8Rng,
        stats: &mut RecomputeStats,
    ) -> (Vec<usize>, bool) {
        let mut claimed: BTreeSet<usize> = BTreeSet::new();
        let mut changed = false;

        for (count, (&medoid, members)) in clusters.iter().enumerate() {
            if count % PROGRESS_EVERY == 0 {
                info!(
                    "PROGRESS: recalculate medoid for cluster #{} (id {})",
                    count, medoid
                );
            }

            if members.len() < self.params.min_cluster_size {
                let replacement = self.random_unclaimed(rng, &claimed, Some(medoid));
                warn!(
                    target: DEGRADATION_TARGET,
                    "cluster {} has {} members (< {}); re-seeded with random medoid {}",
                    medoid,
                    members.len(),
                    self.params.min_cluster_size,
                    replacement
                );
                stats.reinitialised_clusters += 1;
                claimed.insert(replacement);
                changed = true;
                continue;
            }

            debug!("Find new centroid for cluster {}", medoid);
            let centroid = self.centroid(members);

            let new_medoid = match self.closest_unclaimed(&centroid, &claimed) {
                Some(id) => id,
                None => {
                    let id = self.random_unclaimed(rng, &claimed, None);
                    warn!(
                        target: DEGRADATION_TARGET,
                        "could not find best fit for centroid of cluster {}; using random medoid {}",
                        medoid, id
                    );
                    stats.fallback_medoids += 1;
                    id
                }
            };

            if new_medoid != medoid {
                changed = true;
            }
            claimed.insert(new_medoid);
        }

        (claimed.into_iter().collect(), changed)
    }

    /// Mean of the members' unit-normalised vectors.
    fn centroid(&self, members: &[usize]) -> SparseVector {
        // Sequential: summation order must not depend on the pool size.
        let mut acc = DenseVector::zeros(self.num_features);
        for &id in members {
            acc.add_sparse(&self.corpus_index.vector_by_id(id), 1.0);
        }
        if !members.is_empty() {
            acc.scale(1.0 / members.len() as f64);
        }
        acc.to_sparse(0.0)
    }

    /// Best corpus match for `centroid` not already claimed in this pass.
    fn closest_unclaimed(
        &self,
        centroid: &SparseVector,
        claimed: &BTreeSet<usize>,
    ) -> Option<usize> {
        self.corpus_index
            .top_k(centroid, claimed.len() + 1)
            .into_iter()
            .map(|(id, _)| id)
            .find(|id| !claimed.contains(id))
    }

    /// Uniform random document id outside `claimed` (and not `exclude`).
    ///
    /// `claimed` holds fewer than `k < N` ids here, so a free id always exists.
    fn random_unclaimed(
        &self,
        rng: &mut ChaCha8Rng,
        claimed: &BTreeSet<usize>,
        exclude: Option<usize>,
    ) -> usize {
        let n = self.corpus.len();
        loop {
            let id = rng.random_range(0..n);
            if !claimed.contains(&id) && Some(id) != exclude {
                return id;
            }
        }
    }
}
