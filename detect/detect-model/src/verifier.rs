//! Read-only artifact verification.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::artifact::{ArtifactCandidate, HEADER_PROBE_LEN, ModelArtifactDescriptor};
use crate::error::VerificationError;

/// Storage the verifier probes.
///
/// Implementations must be read-only.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Size of the artifact in bytes, or `None` if it does not exist.
    async fn size(&self, path: &Path) -> io::Result<Option<u64>>;

    /// Up to `len` leading bytes of the artifact.
    async fn header(&self, path: &Path, len: usize) -> io::Result<Vec<u8>>;
}

/// Local filesystem store.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactStore;

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn size(&self, path: &Path) -> io::Result<Option<u64>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn header(&self, path: &Path, len: usize) -> io::Result<Vec<u8>> {
        let file = tokio::fs::File::open(path).await?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

/// An artifact that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// Candidate index.
    pub index: usize,
    /// Artifact location.
    pub path: PathBuf,
    /// Reported size in bytes.
    pub size_bytes: u64,
    /// When the checks passed.
    pub verified_at: Instant,
}

/// Checks reachability, approximate size and header signature.
#[derive(Clone)]
pub struct Verifier {
    store: Arc<dyn ArtifactStore>,
    size_tolerance: f64,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("size_tolerance", &self.size_tolerance)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    /// Creates a verifier with a fractional size tolerance (`0.10` = ±10%).
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>, size_tolerance: f64) -> Self {
        Self {
            store,
            size_tolerance,
        }
    }

    /// Verifies the primary artifact of `descriptor`.
    ///
    /// # Errors
    ///
    /// See [`Verifier::verify_candidate`].
    pub async fn verify(
        &self,
        descriptor: &ModelArtifactDescriptor,
    ) -> Result<Verified, VerificationError> {
        self.verify_candidate(descriptor, 0).await
    }

    /// Verifies candidate `index` of `descriptor`.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::Unreachable`] if the artifact is absent or the
    ///   probe fails
    /// - [`VerificationError::SizeMismatch`] if the size is outside tolerance
    /// - [`VerificationError::InvalidFormat`] if the header is wrong
    pub async fn verify_candidate(
        &self,
        descriptor: &ModelArtifactDescriptor,
        index: usize,
    ) -> Result<Verified, VerificationError> {
        let candidate = descriptor.candidate(index).ok_or_else(|| {
            VerificationError::unreachable(
                descriptor.path.clone(),
                format!("no candidate at index {index}"),
            )
        })?;
        let result = self.check(&candidate, descriptor).await;
        if let Err(e) = &result {
            warn!(path = %candidate.path.display(), fallback_index = index, error = %e, "Artifact verification failed");
        }
        result
    }

    async fn check(
        &self,
        candidate: &ArtifactCandidate<'_>,
        descriptor: &ModelArtifactDescriptor,
    ) -> Result<Verified, VerificationError> {
        let path = candidate.path;

        let size = match self.store.size(path).await {
            Ok(Some(size)) => size,
            Ok(None) => return Err(VerificationError::unreachable(path, "not found")),
            Err(e) => return Err(VerificationError::unreachable(path, e.to_string())),
        };

        if let Some(expected) = candidate.expected_size {
            if !within_tolerance(size, expected, self.size_tolerance) {
                return Err(VerificationError::size_mismatch(path, expected, size));
            }
        }

        let header = self
            .store
            .header(path, HEADER_PROBE_LEN)
            .await
            .map_err(|e| VerificationError::unreachable(path, e.to_string()))?;
        descriptor
            .format
            .check_header(&header, descriptor.format_version)
            .map_err(|reason| VerificationError::invalid_format(path, reason))?;

        debug!(path = %path.display(), size_bytes = size, "Artifact verified");
        Ok(Verified {
            index: candidate.index,
            path: path.to_path_buf(),
            size_bytes: size,
            verified_at: Instant::now(),
        })
    }
}

/// `|actual - expected| <= tolerance * expected`.
#[allow(clippy::cast_precision_loss)]
fn within_tolerance(actual: u64, expected: u64, tolerance: f64) -> bool {
    if expected == 0 {
        return actual == 0;
    }
    let deviation = actual.abs_diff(expected) as f64 / expected as f64;
    deviation <= tolerance
}
