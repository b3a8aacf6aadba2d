use thiserror::Error;

/// Errors surfaced by training, projection and persistence.
///
/// Recoverable conditions inside the clustering loop (degenerate clusters,
/// centroids without a match) never show up here; they are handled locally
/// and reported through `ClusteringOutcome`.
#[derive(Debug, Error)]
pub enum ConceptError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("document titles do not cover the corpus: {titles} titles for {documents} documents")]
    TitleMismatch { titles: usize, documents: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("unknown concept id {0}")]
    UnknownConcept(usize),

    #[error("corpus is empty")]
    EmptyCorpus,

    #[error("clustering cancelled at iteration {iteration}")]
    Cancelled { iteration: usize },

    #[error("worker pool error: {0}")]
    ThreadPool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid matrix file: {0}")]
    InvalidMatrixFile(String),

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),
}

impl From<serde_json::Error> for ConceptError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for ConceptError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConceptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConceptError::TitleMismatch {
            titles: 3,
            documents: 5,
        };
        assert!(err.to_string().contains("3 titles for 5 documents"));

        let err = ConceptError::Cancelled { iteration: 4 };
        assert!(err.to_string().contains("cancelled at iteration 4"));

        let err = ConceptError::UnknownConcept(17);
        assert!(err.to_string().contains("unknown concept id 17"));

        let err = ConceptError::UnsupportedVersion(9);
        assert!(err.to_string().contains("version: 9"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ConceptError = io.into();
        assert!(matches!(err, ConceptError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_json_error() {
        let json = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: ConceptError = json.into();
        assert!(matches!(err, ConceptError::Serialization(_)));
    }
}
