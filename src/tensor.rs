use crate::{Error, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use std::ops::Sub;

/// Dense row-major tensor of `f64` values.
///
/// Activations are three-dimensional `(channel, row, column)` tensors, convolution
/// weights are four-dimensional `(out_channels, in_channels, kernel, kernel)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Flattened storage of tensor elements
    pub data: Vec<f64>,
    /// Extent of every dimension, outermost first
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Creates a one-dimensional tensor
    pub fn new(data: Vec<f64>) -> Self {
        let n = data.len();
        Tensor {
            data,
            shape: vec![n],
        }
    }

    /// Creates a new tensor with specified shape
    pub fn new_with_shape(data: Vec<f64>, shape: &[usize]) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Tensor {
            data,
            shape: shape.to_vec(),
        }
    }

    /// Creates a tensor from caller-provided data, checking that the element
    /// count matches the shape
    pub fn from_vec(data: Vec<f64>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::Shape(format!(
                "{} values cannot fill shape {:?} ({} elements)",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Tensor::new_with_shape(data, shape))
    }

    /// Creates a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Tensor {
            data: vec![0.0; shape.iter().product()],
            shape: shape.to_vec(),
        }
    }

    /// Creates a zero-filled tensor with same shape as self
    pub fn zeros_like(&self) -> Self {
        Tensor {
            data: vec![0.0; self.data.len()],
            shape: self.shape.clone(),
        }
    }

    /// Creates a tensor with values drawn from the standard normal distribution
    pub fn randn<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        let data: Vec<f64> = (0..shape.iter().product::<usize>())
            .map(|_| rng.sample(StandardNormal))
            .collect();
        Tensor::new_with_shape(data, shape)
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Interprets the shape as `(channels, height, width)`
    pub fn shape3(&self) -> Result<(usize, usize, usize)> {
        match self.shape[..] {
            [c, h, w] => Ok((c, h, w)),
            _ => Err(Error::Shape(format!(
                "expected a (channels, height, width) tensor, got shape {:?}",
                self.shape
            ))),
        }
    }

    /// Converts a flat offset into one index per dimension
    pub fn unravel_index(&self, mut offset: usize) -> Vec<usize> {
        let mut index = vec![0; self.shape.len()];
        for (slot, &extent) in index.iter_mut().zip(self.shape.iter()).rev() {
            *slot = offset % extent;
            offset /= extent;
        }
        index
    }

    /// Element-wise multiplication
    pub fn hadamard(mut self, other: &Tensor) -> Tensor {
        self.data
            .iter_mut()
            .zip(other.data.iter())
            .for_each(|(x, &y)| *x *= y);

        self
    }

    /// Softmax over every element of the tensor, shifted by the maximum for
    /// numerical stability
    pub fn softmax(&self) -> Tensor {
        let max_val = self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut data: Vec<f64> = self.data.iter().map(|&x| (x - max_val).exp()).collect();
        let sum: f64 = data.iter().sum();
        for val in data.iter_mut() {
            *val /= sum;
        }

        Tensor {
            data,
            shape: self.shape.clone(),
        }
    }

    /// Adds `padding` zeros on every spatial side of a `(C, H, W)` tensor
    pub fn pad2d(&self, padding: usize) -> Result<Tensor> {
        let (channels, height, width) = self.shape3()?;
        if padding == 0 {
            return Ok(self.clone());
        }

        let padded_height = height + 2 * padding;
        let padded_width = width + 2 * padding;

        let mut padded = vec![0.0; channels * padded_height * padded_width];

        // Copy data with padding
        for c in 0..channels {
            for h in 0..height {
                let in_offset = (c * height + h) * width;
                let out_offset = (c * padded_height + h + padding) * padded_width + padding;
                padded[out_offset..out_offset + width]
                    .copy_from_slice(&self.data[in_offset..in_offset + width]);
            }
        }

        Ok(Tensor::new_with_shape(
            padded,
            &[channels, padded_height, padded_width],
        ))
    }

    /// Strips a `padding`-wide border from every spatial side of a `(C, H, W)` tensor
    pub fn crop2d(&self, padding: usize) -> Result<Tensor> {
        let (channels, padded_height, padded_width) = self.shape3()?;
        if padding == 0 {
            return Ok(self.clone());
        }
        if padded_height < 2 * padding || padded_width < 2 * padding {
            return Err(Error::Shape(format!(
                "cannot crop {} from each side of a {}x{} tensor",
                padding, padded_height, padded_width
            )));
        }

        let height = padded_height - 2 * padding;
        let width = padded_width - 2 * padding;
        let mut cropped = Vec::with_capacity(channels * height * width);

        for c in 0..channels {
            for h in 0..height {
                let offset = (c * padded_height + h + padding) * padded_width + padding;
                cropped.extend_from_slice(&self.data[offset..offset + width]);
            }
        }

        Ok(Tensor::new_with_shape(cropped, &[channels, height, width]))
    }
}

// Element-wise subtraction implementation
impl<'a, 'b> Sub<&'b Tensor> for &'a Tensor {
    type Output = Tensor;

    fn sub(self, other: &'b Tensor) -> Tensor {
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();

        Tensor {
            data,
            shape: self.shape.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_close, assert_tensors_eq};

    #[test]
    fn test_tensor_creation() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(t.numel(), 3);
        assert_eq!(t.shape, vec![3]);

        let t2 = Tensor::new_with_shape(vec![1.0, 2.0, 3.0, 4.0], &[1, 2, 2]);
        assert_eq!(t2.numel(), 4);
        assert_eq!(t2.shape3().unwrap(), (1, 2, 2));
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let result = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]);
        assert!(matches!(result, Err(Error::Shape(_))));
    }

    #[test]
    fn test_shape3_rejects_four_dimensions() {
        let t = Tensor::zeros(&[1, 1, 2, 2]);
        assert!(matches!(t.shape3(), Err(Error::Shape(_))));
    }

    #[test]
    fn test_subtraction() {
        let a = Tensor::new_with_shape(vec![4.0, 5.0, 6.0, 7.0], &[1, 2, 2]);
        let b = Tensor::new_with_shape(vec![1.0, 2.0, 3.0, 4.0], &[1, 2, 2]);
        let result = &a - &b;
        assert_eq!(result.data, vec![3.0, 3.0, 3.0, 3.0]);
        assert_eq!(result.shape, vec![1, 2, 2]);
    }

    #[test]
    fn test_hadamard() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0]);
        let b = Tensor::new(vec![4.0, 5.0, 6.0]);
        let result = a.hadamard(&b);
        assert_eq!(result.data, vec![4.0, 10.0, 18.0]);
    }

    #[test]
    fn test_unravel_index() {
        let t = Tensor::zeros(&[2, 3, 4, 5]);
        assert_eq!(t.unravel_index(0), vec![0, 0, 0, 0]);
        assert_eq!(t.unravel_index(119), vec![1, 2, 3, 4]);
        // 1*60 + 1*20 + 2*5 + 3
        assert_eq!(t.unravel_index(93), vec![1, 1, 2, 3]);
    }

    #[test]
    fn test_softmax() {
        let t1 = Tensor::new_with_shape(vec![1.0, 2.0, 3.0], &[3, 1, 1]);
        let s1 = t1.softmax();
        assert_close(s1.data.iter().sum::<f64>(), 1.0, 1e-12);
        assert!(s1.data.iter().all(|&x| x > 0.0 && x < 1.0));
        assert!(s1.data[2] > s1.data[1] && s1.data[1] > s1.data[0]);

        let t2 = Tensor::new_with_shape(vec![1000.0, 1000.0], &[2, 1, 1]);
        let s2 = t2.softmax();
        assert_close(s2.data[0], 0.5, 1e-12);
        assert_close(s2.data[1], 0.5, 1e-12);

        let t3 = Tensor::new_with_shape(vec![-1000.0, -1000.0], &[2, 1, 1]);
        let s3 = t3.softmax();
        assert_close(s3.data[0], 0.5, 1e-12);
        assert_close(s3.data[1], 0.5, 1e-12);
    }

    #[test]
    fn test_padding_1() {
        // One channel, 2x2 input
        let input = Tensor::new_with_shape(
            vec![
                1.0, 2.0, //
                3.0, 4.0, //
            ],
            &[1, 2, 2],
        );

        let padded = input.pad2d(1).unwrap();

        let expected = Tensor::new_with_shape(
            vec![
                0.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 2.0, 0.0, //
                0.0, 3.0, 4.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, //
            ],
            &[1, 4, 4],
        );

        assert_tensors_eq(&padded, &expected);
    }

    #[test]
    fn test_padding_2() {
        // Two channels, 2x3 input
        let input = Tensor::new_with_shape(
            vec![
                1.0, 2.0, 3.0, //
                4.0, 5.0, 6.0, //
                ////////////////
                7.0, 8.0, 9.0, //
                10.0, 11.0, 12.0, //
            ],
            &[2, 2, 3],
        );

        let padded = input.pad2d(1).unwrap();

        let expected = Tensor::new_with_shape(
            vec![
                0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 2.0, 3.0, 0.0, //
                0.0, 4.0, 5.0, 6.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, //
                ///////////////////////////
                0.0, 0.0, 0.0, 0.0, 0.0, //
                0.0, 7.0, 8.0, 9.0, 0.0, //
                0.0, 10.0, 11.0, 12.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0, //
            ],
            &[2, 4, 5],
        );

        assert_tensors_eq(&padded, &expected);
    }

    #[test]
    fn test_crop_undoes_padding() {
        let input = Tensor::new_with_shape((0..18).map(|v| v as f64).collect(), &[2, 3, 3]);

        let padded = input.pad2d(2).unwrap();
        assert_eq!(padded.shape, vec![2, 7, 7]);

        let cropped = padded.crop2d(2).unwrap();
        assert_tensors_eq(&cropped, &input);
    }

    #[test]
    fn test_zero_padding_is_identity() {
        let input = Tensor::new_with_shape(vec![1.0, 2.0, 3.0, 4.0], &[1, 2, 2]);

        assert_tensors_eq(&input.pad2d(0).unwrap(), &input);
        assert_tensors_eq(&input.crop2d(0).unwrap(), &input);
    }

    #[test]
    fn test_crop_too_large() {
        let input = Tensor::zeros(&[1, 2, 2]);
        assert!(matches!(input.crop2d(2), Err(Error::Shape(_))));
    }
}
