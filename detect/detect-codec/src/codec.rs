//! Fixed-geometry codec bound to one model input size.

use detect_types::{Frame, InputTensor, OptimizationStrategy, RawDetection, RawOutput};

use crate::decode::decode;
use crate::encode::encode;
use crate::error::{CodecError, DecodeError};

/// Encoder and decoder for a model with a fixed input size and class count.
///
/// # Example
///
/// ```
/// use detect_codec::FrameCodec;
/// use detect_types::{Frame, OptimizationStrategy};
///
/// let codec = FrameCodec::new((64, 64), 80);
/// let frame = Frame::rgba(0, 0.0, vec![0u8; 32 * 32 * 4], 32, 32);
/// let tensor = codec.encode(&frame, &OptimizationStrategy::default()).unwrap();
///
/// assert_eq!(tensor.as_array().shape(), &[1, 3, 64, 64]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    input_size: (u32, u32),
    num_classes: usize,
}

impl FrameCodec {
    /// Creates a codec for the given model input `(width, height)`.
    #[must_use]
    pub const fn new(input_size: (u32, u32), num_classes: usize) -> Self {
        Self {
            input_size,
            num_classes,
        }
    }

    /// Model input size.
    #[must_use]
    pub const fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    /// Number of classes the model scores.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Encodes `frame` at the model input size.
    ///
    /// # Errors
    ///
    /// See [`encode`].
    pub fn encode(
        &self,
        frame: &Frame,
        strategy: &OptimizationStrategy,
    ) -> Result<InputTensor, CodecError> {
        encode(frame, self.input_size, strategy)
    }

    /// Decodes `output` into candidates in the frame's pixel space.
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn decode(
        &self,
        output: &RawOutput,
        original_size: (u32, u32),
        strategy: &OptimizationStrategy,
    ) -> Result<Vec<RawDetection>, DecodeError> {
        decode(
            output,
            original_size,
            self.input_size,
            self.num_classes,
            strategy,
        )
    }
}
