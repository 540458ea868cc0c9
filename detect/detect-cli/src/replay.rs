//! `detect replay`: run still images through the engine.

use std::path::{Path, PathBuf};

use anyhow::Result;

#[cfg(feature = "onnx")]
pub async fn run(config: &Path, images: &[PathBuf], gpu: bool) -> Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use detect_engine::{DetectionEngine, EngineConfig, EngineRuntime};
    use detect_model::OnnxSessionFactory;
    use detect_types::{Capabilities, Frame};
    use tracing::info;

    let config = EngineConfig::from_json_file(config)?;
    let capabilities = if gpu {
        Capabilities::all()
    } else {
        Capabilities::portable_only()
    };
    let runtime = EngineRuntime::new(Arc::new(OnnxSessionFactory::default()))
        .with_capabilities(capabilities);
    let engine = DetectionEngine::new(config, runtime)?;
    engine.initialize().await?;

    for (id, path) in (0u64..).zip(images) {
        let rgba = image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        let frame = Frame::rgba(id, 0.0, rgba.into_raw(), width, height);

        let detections = engine.detect(&frame).await;
        let line = serde_json::json!({
            "image": path.display().to_string(),
            "detections": detections,
        });
        println!("{line}");
    }

    let metrics = engine.metrics();
    info!(
        frames = metrics.frames_seen,
        inferred = metrics.frames_inferred,
        failures = metrics.inference_failures,
        "Replay finished"
    );
    engine.dispose();
    Ok(())
}

#[cfg(not(feature = "onnx"))]
#[allow(clippy::unused_async)]
pub async fn run(_config: &Path, _images: &[PathBuf], _gpu: bool) -> Result<()> {
    anyhow::bail!("replay needs an inference runtime; rebuild with `--features onnx`")
}
