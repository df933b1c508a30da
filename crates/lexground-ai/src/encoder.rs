//! Query encoder seam.

use crate::EncodeError;

/// Maps a question into the corpus embedding space.
///
/// Implementations must be deterministic for a loaded model and must reject
/// empty or whitespace-only input with [`EncodeError::EmptyInput`] rather than
/// produce a vector for it.
pub trait QueryEncoder: Send + Sync {
    /// Name of the embedding model, used in logs and startup errors.
    fn model_name(&self) -> &str;

    /// Output dimensionality. Must equal the corpus dimensionality.
    fn dim(&self) -> usize;

    fn encode(&self, text: &str) -> Result<Vec<f32>, EncodeError>;
}

/// Shared guard for [`QueryEncoder::encode`] implementations.
pub fn ensure_non_empty(text: &str) -> Result<(), EncodeError> {
    if text.trim().is_empty() {
        Err(EncodeError::EmptyInput)
    } else {
        Ok(())
    }
}
