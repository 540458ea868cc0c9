//! Raw model output to candidate detections.

use detect_types::{OptimizationStrategy, PixelBox, RawDetection, RawOutput};

use crate::error::DecodeError;

/// Number of box parameters at the head of every candidate record.
pub const BOX_ROWS: usize = 4;

/// Candidate record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `4 + C` rows; class scores are already final confidences.
    AnchorFree,
    /// `4 + 1 + C` rows; confidence is objectness times class score.
    WithObjectness,
}

impl OutputLayout {
    /// Detects the layout from the row count.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedOutput`] when `rows` matches neither
    /// layout for `num_classes` classes.
    pub fn detect(rows: usize, num_classes: usize) -> Result<Self, DecodeError> {
        if num_classes == 0 {
            return Err(DecodeError::malformed("model declares no classes"));
        }
        if rows == BOX_ROWS + num_classes {
            Ok(Self::AnchorFree)
        } else if rows == BOX_ROWS + 1 + num_classes {
            Ok(Self::WithObjectness)
        } else {
            Err(DecodeError::malformed(format!(
                "expected {} or {} rows for {num_classes} classes, got {rows}",
                BOX_ROWS + num_classes,
                BOX_ROWS + 1 + num_classes
            )))
        }
    }

    /// Row index of the first class score.
    #[must_use]
    pub const fn class_offset(&self) -> usize {
        match self {
            Self::AnchorFree => BOX_ROWS,
            Self::WithObjectness => BOX_ROWS + 1,
        }
    }
}

/// Decodes raw output into candidates in original-image pixel space.
///
/// Candidates whose combined confidence is below the strategy threshold,
/// or whose box is non-finite or empty after clipping, are dropped. Box
/// math stays in `f32` throughout.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedOutput`] if the output layout does not
/// match `num_classes`, or if either size is zero.
#[allow(clippy::cast_precision_loss)]
pub fn decode(
    output: &RawOutput,
    original_size: (u32, u32),
    input_size: (u32, u32),
    num_classes: usize,
    strategy: &OptimizationStrategy,
) -> Result<Vec<RawDetection>, DecodeError> {
    if input_size.0 == 0 || input_size.1 == 0 || original_size.0 == 0 || original_size.1 == 0 {
        return Err(DecodeError::malformed("zero image or input size"));
    }
    let layout = OutputLayout::detect(output.rows(), num_classes)?;
    let offset = layout.class_offset();
    let matrix = output.matrix();

    let (orig_w, orig_h) = (original_size.0 as f32, original_size.1 as f32);
    let ratio_x = orig_w / input_size.0 as f32;
    let ratio_y = orig_h / input_size.1 as f32;
    let threshold = strategy.confidence_threshold;

    let mut candidates = Vec::new();
    for column in matrix.columns() {
        let Some((class_id, class_score)) = argmax(column.iter().skip(offset).take(num_classes))
        else {
            continue;
        };
        let objectness = match layout {
            OutputLayout::AnchorFree => 1.0,
            OutputLayout::WithObjectness => column[BOX_ROWS],
        };
        let confidence = objectness * class_score;
        if !confidence.is_finite() || confidence < threshold {
            continue;
        }

        let bounding_box = PixelBox::from_center(
            column[0] * ratio_x,
            column[1] * ratio_y,
            column[2] * ratio_x,
            column[3] * ratio_y,
        );
        if !bounding_box.is_finite() {
            continue;
        }
        let bounding_box = bounding_box.clipped(orig_w, orig_h);
        if bounding_box.area() <= 0.0 {
            continue;
        }

        candidates.push(RawDetection::new(bounding_box, class_id, confidence));
    }

    Ok(candidates)
}

fn argmax<'a>(scores: impl Iterator<Item = &'a f32>) -> Option<(usize, f32)> {
    scores
        .copied()
        .enumerate()
        .filter(|(_, score)| score.is_finite())
        .fold(None, |best, (id, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((id, score)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Builds a `[1, rows, N]` output from per-candidate records.
    fn output(records: &[Vec<f32>]) -> RawOutput {
        let rows = records[0].len();
        let n = records.len();
        let mut flat = vec![0.0; rows * n];
        for (j, record) in records.iter().enumerate() {
            for (r, value) in record.iter().enumerate() {
                flat[r * n + j] = *value;
            }
        }
        RawOutput::from_shape_vec(&[1, rows, n], flat).unwrap()
    }

    #[test]
    fn layout_detection() {
        assert_eq!(OutputLayout::detect(84, 80), Ok(OutputLayout::AnchorFree));
        assert_eq!(
            OutputLayout::detect(85, 80),
            Ok(OutputLayout::WithObjectness)
        );
        assert!(OutputLayout::detect(7, 80).is_err());
        assert!(OutputLayout::detect(4, 0).is_err());
    }

    #[test]
    fn decode_objectness_layout_scales_to_original() {
        // cx, cy, w, h, obj, class0, class1
        let out = output(&[vec![320.0, 320.0, 64.0, 128.0, 0.9, 0.2, 0.8]]);
        let strategy = OptimizationStrategy::default();
        let dets = decode(&out, (1280, 960), (640, 640), 2, &strategy).unwrap();

        assert_eq!(dets.len(), 1);
        let d = dets[0];
        assert_eq!(d.class_id, 1);
        assert_relative_eq!(d.confidence, 0.72, epsilon = 1e-6);
        assert_relative_eq!(d.bounding_box.x, 576.0);
        assert_relative_eq!(d.bounding_box.y, 384.0);
        assert_relative_eq!(d.bounding_box.width, 128.0);
        assert_relative_eq!(d.bounding_box.height, 192.0);
    }

    #[test]
    fn decode_anchor_free_layout() {
        let out = output(&[vec![100.0, 100.0, 20.0, 20.0, 0.1, 0.95, 0.3]]);
        let dets = decode(&out, (640, 640), (640, 640), 3, &OptimizationStrategy::default())
            .unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_relative_eq!(dets[0].confidence, 0.95);
    }

    #[test]
    fn decode_drops_below_threshold() {
        let out = output(&[
            vec![50.0, 50.0, 10.0, 10.0, 0.6, 0.6],
            vec![80.0, 80.0, 10.0, 10.0, 1.0, 0.9],
        ]);
        let strategy = OptimizationStrategy::default().with_confidence_threshold(0.5);
        let dets = decode(&out, (640, 640), (640, 640), 1, &strategy).unwrap();
        assert_eq!(dets.len(), 1);
        assert!(dets.iter().all(|d| d.confidence >= 0.5));
    }

    #[test]
    fn decode_clips_to_image() {
        let out = output(&[vec![5.0, 5.0, 20.0, 20.0, 0.99]]);
        let dets = decode(&out, (640, 640), (640, 640), 1, &OptimizationStrategy::default())
            .unwrap();
        let b = dets[0].bounding_box;
        assert_relative_eq!(b.x, 0.0);
        assert_relative_eq!(b.y, 0.0);
        assert_relative_eq!(b.width, 15.0);
    }

    #[test]
    fn decode_skips_non_finite() {
        let out = output(&[
            vec![f32::NAN, 5.0, 20.0, 20.0, 0.99],
            vec![10.0, 10.0, 4.0, 4.0, f32::NAN],
        ]);
        let dets = decode(&out, (640, 640), (640, 640), 1, &OptimizationStrategy::default())
            .unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn decode_rejects_wrong_row_count() {
        let out = output(&[vec![0.0; 9]]);
        let err = decode(&out, (640, 640), (640, 640), 80, &OptimizationStrategy::default());
        assert!(matches!(err, Err(DecodeError::MalformedOutput { .. })));
    }

    #[test]
    fn argmax_keeps_first_on_ties() {
        let scores = [0.4, 0.7, 0.7, 0.1];
        assert_eq!(argmax(scores.iter()), Some((1, 0.7)));
        let empty: [f32; 0] = [];
        assert_eq!(argmax(empty.iter()), None);
    }
}
