use std::sync::Arc;

use thiserror::Error;

/// Errors that end a compaction pass.
///
/// The iterator keeps the first error it hits and hands out clones of it on
/// every later call, so collaborator failures are wrapped in an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum CompactionError {
    /// A record carried a kind byte the iterator does not understand.
    #[error("corruption: invalid internal key kind {0}")]
    InvalidKind(u8),

    /// A DELSIZED payload was not a single well-formed uvarint.
    #[error("corruption: DELSIZED holds invalid value {0}")]
    InvalidDeleteSized(String),

    /// Any other malformed record, e.g. an undecodable range-key value.
    #[error("corruption: {0}")]
    Corruption(String),

    /// The merge operator failed.
    #[error("merge of key {key} failed: {cause:#}")]
    Merge { key: String, cause: Arc<anyhow::Error> },

    /// Releasing the resources of a merged value failed.
    #[error("value closer failed: {0:#}")]
    ValueCloser(Arc<anyhow::Error>),

    /// A deferred value could not be fetched.
    #[error("lazy value fetch failed: {0:#}")]
    LazyValue(Arc<anyhow::Error>),

    /// The upstream iterator stopped with an error.
    #[error("input iterator failed: {0:#}")]
    Input(Arc<anyhow::Error>),
}

impl CompactionError {
    /// Whether the error means the input data itself is damaged.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CompactionError::InvalidKind(_)
                | CompactionError::InvalidDeleteSized(_)
                | CompactionError::Corruption(_)
                | CompactionError::Merge { .. }
        )
    }

    pub(crate) fn merge(key: String, cause: anyhow::Error) -> Self {
        CompactionError::Merge {
            key,
            cause: Arc::new(cause),
        }
    }
}
