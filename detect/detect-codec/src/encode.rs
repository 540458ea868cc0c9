//! Frame to tensor conversion.

use detect_types::{Frame, InputTensor, OptimizationStrategy, PixelFormat};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, Rgb, Rgba};
use ndarray::Array4;

use crate::error::CodecError;

/// Encodes a frame into a `[1, 3, H, W]` tensor.
///
/// When the strategy asks for a resolution reduction the frame is first
/// downscaled by that percentage, then resized to `target_size`. Pixel
/// values are scaled to `[0, 1]` and written channel-major. Alpha is
/// dropped.
///
/// # Errors
///
/// Returns [`CodecError::InvalidFrame`] if the buffer does not match the
/// frame's declared size and format, or [`CodecError::InvalidTargetSize`]
/// for a zero target dimension.
pub fn encode(
    frame: &Frame,
    target_size: (u32, u32),
    strategy: &OptimizationStrategy,
) -> Result<InputTensor, CodecError> {
    let (target_w, target_h) = target_size;
    if target_w == 0 || target_h == 0 {
        return Err(CodecError::invalid_target_size(target_w, target_h));
    }
    frame.validate()?;

    let (width, height) = frame.size;
    let pixels = frame.pixels.as_slice();
    let reduced = reduced_size(frame.size, strategy);

    let data = match frame.format {
        PixelFormat::Rgba8 => {
            let buffer = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(width, height, pixels)
                .ok_or_else(|| invalid_buffer(frame))?;
            planar(&buffer, reduced, target_size)
        }
        PixelFormat::Rgb8 => {
            let buffer = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(width, height, pixels)
                .ok_or_else(|| invalid_buffer(frame))?;
            planar(&buffer, reduced, target_size)
        }
    };

    Ok(InputTensor::new(data)?)
}

/// Source size after the strategy's resolution reduction.
///
/// Never smaller than one pixel in either dimension.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn reduced_size(size: (u32, u32), strategy: &OptimizationStrategy) -> (u32, u32) {
    if strategy.resolution_reduction_percent == 0 {
        return size;
    }
    let scale = strategy.scale_factor();
    let w = (size.0 as f32 * scale).round().max(1.0) as u32;
    let h = (size.1 as f32 * scale).round().max(1.0) as u32;
    (w, h)
}

fn invalid_buffer(frame: &Frame) -> CodecError {
    CodecError::InvalidFrame(detect_types::TypesError::data_size_mismatch(
        frame.expected_buffer_size(),
        frame.pixels.len(),
    ))
}

fn planar<P>(
    source: &ImageBuffer<P, &[u8]>,
    reduced: (u32, u32),
    target: (u32, u32),
) -> Array4<f32>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (target_w, target_h) = target;
    let resized = if reduced == source.dimensions() {
        imageops::resize(source, target_w, target_h, FilterType::Triangle)
    } else {
        let downscaled = imageops::resize(source, reduced.0, reduced.1, FilterType::Triangle);
        imageops::resize(&downscaled, target_w, target_h, FilterType::Triangle)
    };

    let mut data = Array4::<f32>::zeros((1, 3, target_h as usize, target_w as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let channels = pixel.channels();
        let (x, y) = (x as usize, y as usize);
        data[[0, 0, y, x]] = f32::from(channels[0]) / 255.0;
        data[[0, 1, y, x]] = f32::from(channels[1]) / 255.0;
        data[[0, 2, y, x]] = f32::from(channels[2]) / 255.0;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Frame {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Frame::rgba(1, 0.0, pixels, width, height)
    }

    #[test]
    fn encode_produces_planar_unit_range() {
        let frame = solid_rgba(32, 16, [255, 0, 51, 255]);
        let tensor = encode(&frame, (8, 8), &OptimizationStrategy::default()).unwrap();
        let data = tensor.as_array();

        assert_eq!(data.shape(), &[1, 3, 8, 8]);
        assert_relative_eq!(data[[0, 0, 3, 3]], 1.0);
        assert_relative_eq!(data[[0, 1, 3, 3]], 0.0);
        assert_relative_eq!(data[[0, 2, 3, 3]], 0.2, epsilon = 1e-6);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn encode_rgb_frame() {
        let pixels = [10u8, 20, 30].repeat(4 * 4);
        let frame = Frame::rgb(1, 0.0, pixels, 4, 4);
        let tensor = encode(&frame, (4, 4), &OptimizationStrategy::default()).unwrap();
        assert_relative_eq!(tensor.as_array()[[0, 2, 0, 0]], 30.0 / 255.0, epsilon = 1e-6);
    }

    #[test]
    fn encode_with_reduction_keeps_target_size() {
        let frame = solid_rgba(64, 48, [128, 128, 128, 255]);
        let strategy = OptimizationStrategy::default().with_resolution_reduction(50);
        let tensor = encode(&frame, (16, 16), &strategy).unwrap();
        assert_eq!(tensor.width(), 16);
        assert_eq!(tensor.height(), 16);
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let frame = Frame::rgba(1, 0.0, vec![0u8; 10], 4, 4);
        let err = encode(&frame, (4, 4), &OptimizationStrategy::default());
        assert!(matches!(err, Err(CodecError::InvalidFrame(_))));
    }

    #[test]
    fn encode_rejects_zero_target() {
        let frame = solid_rgba(4, 4, [0, 0, 0, 255]);
        let err = encode(&frame, (0, 640), &OptimizationStrategy::default());
        assert_eq!(err, Err(CodecError::invalid_target_size(0, 640)));
    }

    #[test]
    fn reduced_size_rounds_and_floors_at_one() {
        let s = OptimizationStrategy::default().with_resolution_reduction(25);
        assert_eq!(reduced_size((640, 480), &s), (480, 360));
        let s = OptimizationStrategy::default().with_resolution_reduction(90);
        assert_eq!(reduced_size((3, 3), &s), (1, 1));
        assert_eq!(
            reduced_size((640, 480), &OptimizationStrategy::default()),
            (640, 480)
        );
    }
}
