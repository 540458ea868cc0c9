//! Model input and output tensors.

use ndarray::{Array3, Array4, ArrayView2, Axis};

use crate::error::{Result, TypesError};

/// Planar RGB float tensor of shape `[1, 3, H, W]`, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    /// Wraps an array, checking it has shape `[1, 3, H, W]`.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidShape`] for any other shape.
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let shape = data.shape();
        if shape[0] != 1 || shape[1] != 3 || shape[2] == 0 || shape[3] == 0 {
            return Err(TypesError::invalid_shape("[1, 3, H, W]", shape));
        }
        Ok(Self { data })
    }

    /// An all-zero tensor of the given input size.
    ///
    /// Used as the synthetic self-test input.
    #[must_use]
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            data: Array4::zeros((1, 3, height.max(1) as usize, width.max(1) as usize)),
        }
    }

    /// Input width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.data.shape()[3]
    }

    /// Input height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.data.shape()[2]
    }

    /// Borrows the underlying array.
    #[must_use]
    pub const fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    /// Consumes the tensor, returning the array.
    #[must_use]
    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Raw model output of shape `[1, rows, N]`.
///
/// Row `r` holds attribute `r` of every candidate: four box parameters,
/// an optional objectness score, then one score per class.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    data: Array3<f32>,
}

impl RawOutput {
    /// Wraps an array, checking the batch dimension is 1.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidShape`] if the batch size is not 1.
    pub fn new(data: Array3<f32>) -> Result<Self> {
        if data.shape()[0] != 1 {
            return Err(TypesError::invalid_shape("[1, rows, N]", data.shape()));
        }
        Ok(Self { data })
    }

    /// Builds an output from a flat buffer and a runtime-reported shape.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidShape`] if the shape is not rank 3 with
    /// batch 1, or [`TypesError::DataSizeMismatch`] if the buffer length differs.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let [batch, rows, candidates] = shape else {
            return Err(TypesError::invalid_shape("[1, rows, N]", shape));
        };
        let expected = batch * rows * candidates;
        if data.len() != expected {
            return Err(TypesError::data_size_mismatch(expected, data.len()));
        }
        let array = Array3::from_shape_vec((*batch, *rows, *candidates), data)
            .map_err(|_| TypesError::invalid_shape("[1, rows, N]", shape))?;
        Self::new(array)
    }

    /// Number of attribute rows per candidate.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.shape()[1]
    }

    /// Number of candidates.
    #[must_use]
    pub fn candidates(&self) -> usize {
        self.data.shape()[2]
    }

    /// The `[rows, N]` matrix for the single batch entry.
    #[must_use]
    pub fn matrix(&self) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), 0)
    }

    /// Borrows the underlying array.
    #[must_use]
    pub const fn as_array(&self) -> &Array3<f32> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_accepts_contract_shape() {
        let t = InputTensor::new(Array4::zeros((1, 3, 32, 64))).unwrap();
        assert_eq!(t.width(), 64);
        assert_eq!(t.height(), 32);
    }

    #[test]
    fn input_rejects_wrong_channels() {
        assert!(InputTensor::new(Array4::zeros((1, 4, 8, 8))).is_err());
        assert!(InputTensor::new(Array4::zeros((2, 3, 8, 8))).is_err());
    }

    #[test]
    fn zeros_has_requested_size() {
        let t = InputTensor::zeros(640, 480);
        assert_eq!(t.as_array().shape(), &[1, 3, 480, 640]);
    }

    #[test]
    fn output_from_shape_vec() {
        let out = RawOutput::from_shape_vec(&[1, 6, 2], vec![0.0; 12]).unwrap();
        assert_eq!(out.rows(), 6);
        assert_eq!(out.candidates(), 2);
        assert_eq!(out.matrix().shape(), &[6, 2]);
    }

    #[test]
    fn output_rejects_bad_shapes() {
        assert!(matches!(
            RawOutput::from_shape_vec(&[1, 6], vec![0.0; 6]),
            Err(TypesError::InvalidShape { .. })
        ));
        assert!(matches!(
            RawOutput::from_shape_vec(&[1, 6, 2], vec![0.0; 5]),
            Err(TypesError::DataSizeMismatch { .. })
        ));
        assert!(RawOutput::from_shape_vec(&[2, 6, 2], vec![0.0; 24]).is_err());
    }
}
