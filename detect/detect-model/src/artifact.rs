//! Model artifact descriptors and format signatures.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Number of header bytes read for the format check.
pub const HEADER_PROBE_LEN: usize = 16;

/// Highest ONNX IR version accepted by default; ONNX 1.18 exporters write 11.
pub const DEFAULT_ONNX_IR_VERSION: u32 = 11;

/// Binary format signature an artifact must carry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// ONNX protobuf: field 1 (`ir_version`) first, with a version in
    /// `1..=format_version`.
    #[default]
    Onnx,

    /// Fixed leading bytes.
    Magic(Vec<u8>),
}

impl ArtifactFormat {
    /// Checks a header prefix against this signature.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the header does not match.
    pub fn check_header(&self, header: &[u8], format_version: u32) -> Result<(), String> {
        let Some(&first) = header.first() else {
            return Err("empty header".to_string());
        };
        if first == b'<' || first == b'{' {
            return Err("artifact looks like a text document, not a model".to_string());
        }
        match self {
            Self::Onnx => check_onnx(header, format_version),
            Self::Magic(magic) => {
                if header.starts_with(magic) {
                    Ok(())
                } else {
                    Err(format!("expected magic {magic:02x?}"))
                }
            }
        }
    }
}

/// Protobuf key for field 1, wire type 0.
const ONNX_IR_VERSION_TAG: u8 = 0x08;

fn check_onnx(header: &[u8], format_version: u32) -> Result<(), String> {
    if header[0] != ONNX_IR_VERSION_TAG {
        return Err(format!(
            "expected ONNX ir_version tag 0x08, found 0x{:02x}",
            header[0]
        ));
    }
    let version = read_varint(&header[1..]).ok_or("truncated ir_version")?;
    if version == 0 || version > u64::from(format_version) {
        return Err(format!(
            "unsupported ONNX IR version {version} (supported 1..={format_version})"
        ));
    }
    Ok(())
}

fn read_varint(bytes: &[u8]) -> Option<u64> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().take(10).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

/// An alternative artifact tried after the primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackArtifact {
    /// Artifact location.
    pub path: PathBuf,

    /// Declared approximate size; `None` skips the size check.
    #[serde(default)]
    pub expected_approx_size_bytes: Option<u64>,
}

impl FallbackArtifact {
    /// A fallback with no declared size.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            expected_approx_size_bytes: None,
        }
    }

    /// Declares the approximate size.
    #[must_use]
    pub const fn with_size(mut self, bytes: u64) -> Self {
        self.expected_approx_size_bytes = Some(bytes);
        self
    }
}

/// Where the model lives and what it should look like.
///
/// Candidate index 0 is the primary artifact; index `i >= 1` is
/// `fallbacks[i - 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelArtifactDescriptor {
    /// Primary artifact location.
    pub path: PathBuf,

    /// Declared approximate size of the primary artifact; `0` skips the size check.
    pub expected_approx_size_bytes: u64,

    /// Highest accepted format version, [`DEFAULT_ONNX_IR_VERSION`] by
    /// default. Raise it for artifacts from newer exporters.
    pub format_version: u32,

    /// Ordered fallbacks.
    pub fallbacks: Vec<FallbackArtifact>,

    /// Header signature shared by every candidate.
    pub format: ArtifactFormat,
}

impl Default for ModelArtifactDescriptor {
    fn default() -> Self {
        Self {
            path: PathBuf::from("static/models/yolov8n.onnx"),
            expected_approx_size_bytes: 6_300_000,
            format_version: DEFAULT_ONNX_IR_VERSION,
            fallbacks: Vec::new(),
            format: ArtifactFormat::Onnx,
        }
    }
}

/// One resolved candidate of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCandidate<'a> {
    /// Index in candidate order.
    pub index: usize,
    /// Artifact location.
    pub path: &'a Path,
    /// Declared approximate size.
    pub expected_size: Option<u64>,
}

impl ModelArtifactDescriptor {
    /// Creates a descriptor for a primary artifact.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, expected_approx_size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            expected_approx_size_bytes,
            ..Self::default()
        }
    }

    /// Appends a fallback.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackArtifact) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    /// Sets the highest accepted format version.
    #[must_use]
    pub const fn with_format_version(mut self, version: u32) -> Self {
        self.format_version = version;
        self
    }

    /// Sets the header signature.
    #[must_use]
    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    /// Number of candidates, primary included.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        1 + self.fallbacks.len()
    }

    /// Resolves candidate `index`.
    #[must_use]
    pub fn candidate(&self, index: usize) -> Option<ArtifactCandidate<'_>> {
        if index == 0 {
            return Some(ArtifactCandidate {
                index,
                path: &self.path,
                expected_size: (self.expected_approx_size_bytes > 0)
                    .then_some(self.expected_approx_size_bytes),
            });
        }
        self.fallbacks.get(index - 1).map(|f| ArtifactCandidate {
            index,
            path: &f.path,
            expected_size: f.expected_approx_size_bytes,
        })
    }

    /// Returns `true` if the descriptor names a primary path.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.path.as_os_str().is_empty() && self.fallbacks.iter().all(|f| !f.path.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onnx_header_accepts_supported_ir() {
        let header = [0x08, 0x08, 0x12, 0x07];
        assert!(ArtifactFormat::Onnx.check_header(&header, 10).is_ok());
    }

    #[test]
    fn onnx_header_rejects_newer_ir() {
        let header = [0x08, 0x0b];
        let err = ArtifactFormat::Onnx.check_header(&header, 10).unwrap_err();
        assert!(err.contains("IR version 11"));
    }

    #[test]
    fn default_descriptor_accepts_current_exporters() {
        let descriptor = ModelArtifactDescriptor::default();
        let ir_11 = [0x08, 0x0b, 0x12, 0x07];
        assert!(descriptor.format.check_header(&ir_11, descriptor.format_version).is_ok());
        let ir_12 = [0x08, 0x0c];
        assert!(descriptor.format.check_header(&ir_12, descriptor.format_version).is_err());
    }

    #[test]
    fn onnx_header_rejects_html() {
        let err = ArtifactFormat::Onnx
            .check_header(b"<!DOCTYPE html>", 10)
            .unwrap_err();
        assert!(err.contains("text document"));
        assert!(ArtifactFormat::Onnx.check_header(b"{\"error\":1}", 10).is_err());
    }

    #[test]
    fn onnx_header_rejects_wrong_tag_and_truncation() {
        assert!(ArtifactFormat::Onnx.check_header(&[0x0a, 0x01], 10).is_err());
        assert!(ArtifactFormat::Onnx.check_header(&[0x08, 0x80], 10).is_err());
        assert!(ArtifactFormat::Onnx.check_header(&[], 10).is_err());
    }

    #[test]
    fn magic_header() {
        let format = ArtifactFormat::Magic(b"TFL3".to_vec());
        assert!(format.check_header(b"TFL3\x00\x00", 1).is_ok());
        assert!(format.check_header(b"PK\x03\x04", 1).is_err());
    }

    #[test]
    fn varint_multibyte() {
        assert_eq!(read_varint(&[0x96, 0x01]), Some(150));
        assert_eq!(read_varint(&[0x07]), Some(7));
    }

    #[test]
    fn candidate_indexing() {
        let descriptor = ModelArtifactDescriptor::new("primary.onnx", 6_000_000)
            .with_fallback(FallbackArtifact::new("small.onnx").with_size(3_000_000))
            .with_fallback(FallbackArtifact::new("tiny.onnx"));

        assert_eq!(descriptor.candidate_count(), 3);
        let primary = descriptor.candidate(0).unwrap();
        assert_eq!(primary.path, Path::new("primary.onnx"));
        assert_eq!(primary.expected_size, Some(6_000_000));
        assert_eq!(descriptor.candidate(1).unwrap().expected_size, Some(3_000_000));
        assert_eq!(descriptor.candidate(2).unwrap().expected_size, None);
        assert!(descriptor.candidate(3).is_none());
    }

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let json = r#"{"path": "m.onnx", "fallbacks": [{"path": "f.onnx"}]}"#;
        let descriptor: ModelArtifactDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.path, PathBuf::from("m.onnx"));
        assert_eq!(descriptor.format, ArtifactFormat::Onnx);
        assert_eq!(descriptor.fallbacks[0].expected_approx_size_bytes, None);
        assert!(descriptor.is_valid());
    }
}
