//! `detect verify`: run the artifact checks used at engine start.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use detect_model::{FsArtifactStore, ModelArtifactDescriptor, Verifier};
use tracing::debug;

pub async fn run(
    path: &Path,
    expected_size: Option<u64>,
    tolerance: f64,
    format_version: u32,
) -> Result<()> {
    if !(0.0..1.0).contains(&tolerance) {
        bail!("tolerance must be in [0, 1), got {tolerance}");
    }

    // Zero skips the size check.
    let descriptor = ModelArtifactDescriptor::new(path, expected_size.unwrap_or(0))
        .with_format_version(format_version);
    debug!(path = %path.display(), tolerance, format_version, "Verifying artifact");
    let verifier = Verifier::new(Arc::new(FsArtifactStore), tolerance);

    match verifier.verify(&descriptor).await {
        Ok(verified) => {
            println!(
                "ok  {}  {} bytes",
                verified.path.display(),
                verified.size_bytes
            );
            Ok(())
        }
        Err(e) => {
            let kind = if e.is_corruption() {
                "corrupt"
            } else if e.is_transient() {
                "unreachable"
            } else {
                "invalid"
            };
            bail!("{kind}: {e}")
        }
    }
}
