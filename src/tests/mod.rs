mod test_clustering;
mod test_similarity;

use crate::clustering::ClusteringParams;

/// Seeded parameters so clustering tests are reproducible.
pub fn seeded_params(num_clusters: usize, seed: u64) -> ClusteringParams {
    ClusteringParams {
        seed: Some(seed),
        ..ClusteringParams::new(num_clusters)
    }
}
