use crate::{Error, LayerBackwardContext, LayerForwardContext, Result, Tensor};
use rand::distributions::Distribution;
use rand::{thread_rng, Rng};
use rand_distr::Normal;

/// Implements a fully-connected (dense) layer, `y = W x + b`.
///
/// The input is flattened, so any `(C, H, W)` tensor with `input_size` elements is
/// accepted. The output has shape `(output_size, 1, 1)`.
#[derive(Debug, Clone)]
pub struct Dense {
    /// Weight matrix, shape (output_size, input_size)
    pub weights: Tensor,
    /// Bias vector, shape (output_size)
    pub bias: Tensor,
    pub grad_weights: Tensor,
    pub grad_bias: Tensor,
}

#[derive(Debug)]
pub struct DenseForwardContext {
    pub input: Tensor,
}

#[derive(Debug)]
pub struct DenseBackwardContext {
    pub grad_weights: Tensor,
    pub grad_bias: Tensor,
}

impl Dense {
    pub fn new(input_size: usize, output_size: usize) -> Result<Self> {
        Self::new_with_rng(input_size, output_size, &mut thread_rng())
    }

    /// Creates a new dense layer with He initialization drawn from `rng`
    pub fn new_with_rng<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "dense layer needs positive sizes, got {} -> {}",
                input_size, output_size
            )));
        }

        let weight_scale = (2.0 / input_size as f64).sqrt();
        let normal =
            Normal::new(0.0, weight_scale).map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let weights = (0..input_size * output_size)
            .map(|_| normal.sample(rng))
            .collect();
        let weights = Tensor::new_with_shape(weights, &[output_size, input_size]);
        let bias = Tensor::zeros(&[output_size]);

        let grad_weights = weights.zeros_like();
        let grad_bias = bias.zeros_like();

        Ok(Dense {
            weights,
            bias,
            grad_weights,
            grad_bias,
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape[1]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape[0]
    }

    pub fn forward(&self, input: Tensor) -> Result<(Tensor, LayerForwardContext)> {
        let (rows, columns) = (self.output_size(), self.input_size());
        if input.numel() != columns {
            return Err(Error::Shape(format!(
                "dense layer expects {} input elements, got {} (shape {:?})",
                columns,
                input.numel(),
                input.shape
            )));
        }

        let mut output = self.bias.data.clone();
        for (row, out) in output.iter_mut().enumerate() {
            let weights_row = &self.weights.data[row * columns..(row + 1) * columns];
            *out += weights_row
                .iter()
                .zip(input.data.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        }

        Ok((
            Tensor::new_with_shape(output, &[rows, 1, 1]),
            LayerForwardContext::Dense(DenseForwardContext { input }),
        ))
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &DenseForwardContext,
    ) -> Result<(Tensor, LayerBackwardContext)> {
        let (rows, columns) = (self.output_size(), self.input_size());
        if grad_output.numel() != rows {
            return Err(Error::Shape(format!(
                "dense backward expects {} gradient elements, got {}",
                rows,
                grad_output.numel()
            )));
        }

        let mut grad_input = context.input.zeros_like();
        let mut grad_weights = vec![0.0; rows * columns];

        for (row, &delta) in grad_output.data.iter().enumerate() {
            for col in 0..columns {
                grad_input.data[col] += self.weights.data[row * columns + col] * delta;
                grad_weights[row * columns + col] = context.input.data[col] * delta;
            }
        }

        let grad_weights = Tensor::new_with_shape(grad_weights, &[rows, columns]);
        let grad_bias = Tensor::new_with_shape(grad_output.data, &[rows]);

        Ok((
            grad_input,
            LayerBackwardContext::Dense(DenseBackwardContext {
                grad_weights,
                grad_bias,
            }),
        ))
    }

    /// Overwrites the stored gradients with the ones from `context`
    pub fn store_grads(&mut self, context: &DenseBackwardContext) {
        self.grad_weights
            .data
            .copy_from_slice(&context.grad_weights.data);
        self.grad_bias.data.copy_from_slice(&context.grad_bias.data);
    }

    /// Returns references to learnable parameters
    pub fn get_parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.bias]
    }

    pub fn get_parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weights, &mut self.bias]
    }

    pub fn get_grads(&self) -> Vec<&Tensor> {
        vec![&self.grad_weights, &self.grad_bias]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_tensors_eq;

    fn fixed_dense() -> Dense {
        let mut dense = Dense::new(3, 2).unwrap();
        dense.weights = Tensor::new_with_shape(
            vec![
                1.0, 2.0, 3.0, //
                -1.0, 0.0, 1.0, //
            ],
            &[2, 3],
        );
        dense.bias = Tensor::new(vec![0.5, -0.5]);
        dense
    }

    #[test]
    fn test_dense_forward() {
        let dense = fixed_dense();
        let input = Tensor::new_with_shape(vec![1.0, 1.0, 2.0], &[3, 1, 1]);

        let (output, _) = dense.forward(input).unwrap();

        let expected = Tensor::new_with_shape(vec![9.5, 0.5], &[2, 1, 1]);
        assert_tensors_eq(&output, &expected);
    }

    #[test]
    fn test_dense_backward() {
        let dense = fixed_dense();
        let input = Tensor::new_with_shape(vec![1.0, 1.0, 2.0], &[1, 1, 3]);

        let (_, context) = dense.forward(input).unwrap();
        let context = match context {
            LayerForwardContext::Dense(context) => context,
            _ => panic!(),
        };

        let grad_output = Tensor::new_with_shape(vec![1.0, 2.0], &[2, 1, 1]);
        let (grad_input, backward_context) = dense.backward(grad_output, &context).unwrap();
        let DenseBackwardContext {
            grad_weights,
            grad_bias,
        } = match backward_context {
            LayerBackwardContext::Dense(ctx) => ctx,
            _ => panic!(),
        };

        // Input gradient keeps the input's shape
        let expected_grad_input = Tensor::new_with_shape(vec![-1.0, 2.0, 5.0], &[1, 1, 3]);
        let expected_grad_weights = Tensor::new_with_shape(
            vec![
                1.0, 1.0, 2.0, //
                2.0, 2.0, 4.0, //
            ],
            &[2, 3],
        );
        let expected_grad_bias = Tensor::new(vec![1.0, 2.0]);

        assert_tensors_eq(&grad_input, &expected_grad_input);
        assert_tensors_eq(&grad_weights, &expected_grad_weights);
        assert_tensors_eq(&grad_bias, &expected_grad_bias);
    }

    #[test]
    fn test_dense_rejects_wrong_input_size() {
        let dense = fixed_dense();
        let result = dense.forward(Tensor::zeros(&[1, 2, 2]));
        assert!(matches!(result, Err(Error::Shape(_))));
    }
}
