//! Frame codec and detection post-processing.
//!
//! This crate sits between the camera and the model:
//!
//! - [`encode`] - Source frame to planar `[1, 3, H, W]` tensor, with the
//!   strategy's resolution reduction applied first
//! - [`decode`] - Raw `[1, rows, N]` output to [`RawDetection`]s in
//!   source-image pixel space
//! - [`suppress`] - Greedy class-agnostic non-maximum suppression
//! - [`PostProcessor`] - Labelling, category floors and the object cap
//!
//! # Output Layouts
//!
//! Two candidate record layouts are accepted, told apart by row count:
//!
//! | Rows | Layout | Confidence |
//! |------|--------|------------|
//! | `4 + C` | [`OutputLayout::AnchorFree`] | class score |
//! | `5 + C` | [`OutputLayout::WithObjectness`] | objectness × class score |
//!
//! # Example
//!
//! ```
//! use detect_codec::{FrameCodec, PostProcessor};
//! use detect_types::{LabelSet, OptimizationStrategy, RawOutput};
//!
//! // One candidate, two classes, anchor-free layout.
//! let output = RawOutput::from_shape_vec(
//!     &[1, 6, 1],
//!     vec![320.0, 320.0, 100.0, 100.0, 0.1, 0.9],
//! ).unwrap();
//!
//! let codec = FrameCodec::new((640, 640), 2);
//! let strategy = OptimizationStrategy::default();
//! let candidates = codec.decode(&output, (1280, 720), &strategy).unwrap();
//!
//! let post = PostProcessor::new(LabelSet::new(["bottle", "banana"]), 0.45);
//! let detections = post.process(candidates, &strategy);
//!
//! assert_eq!(detections.len(), 1);
//! assert_eq!(detections[0].class_name, "banana");
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod codec;
mod decode;
mod encode;
mod error;
mod postprocess;
mod suppress;

pub use codec::FrameCodec;
pub use decode::{BOX_ROWS, OutputLayout, decode};
pub use encode::{encode, reduced_size};
pub use error::{CodecError, DecodeError};
pub use postprocess::{CategoryFloors, PostProcessor};
pub use suppress::{Scored, suppress};
