use crate::{Error, LayerBackwardContext, LayerForwardContext, Result, Tensor};

/// Implements the ReLU activation function.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

#[derive(Debug)]
pub struct ReLUForwardContext {
    /// Output of the forward pass, gates the gradient
    pub output: Tensor,
}

#[derive(Debug)]
pub struct ReLUBackwardContext {}

impl ReLU {
    pub fn new() -> Self {
        ReLU
    }

    pub fn forward(&self, input: Tensor) -> Result<(Tensor, LayerForwardContext)> {
        let mut output = input;

        for val in output.data.iter_mut() {
            *val = val.max(0.0);
        }

        Ok((
            output.clone(),
            LayerForwardContext::ReLU(ReLUForwardContext { output }),
        ))
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &ReLUForwardContext,
    ) -> Result<(Tensor, LayerBackwardContext)> {
        if grad_output.shape != context.output.shape {
            return Err(Error::Shape(format!(
                "relu backward expects gradient of shape {:?}, got {:?}",
                context.output.shape, grad_output.shape
            )));
        }

        let mut output = grad_output;

        // Gradient passes only where the activation was strictly positive
        for (grad, &activation) in output.data.iter_mut().zip(context.output.data.iter()) {
            if activation <= 0.0 {
                *grad = 0.0;
            }
        }

        Ok((
            output,
            LayerBackwardContext::ReLU(ReLUBackwardContext {}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_tensors_eq;

    fn unpack_forward(context: LayerForwardContext) -> ReLUForwardContext {
        match context {
            LayerForwardContext::ReLU(context) => context,
            _ => panic!(),
        }
    }

    #[test]
    fn test_relu_forward_1() {
        let input = Tensor::new_with_shape(vec![1.0, -2.0, 3.0, -4.0, 5.0, -6.0], &[1, 2, 3]);

        let (output, _) = ReLU::new().forward(input).unwrap();

        let expected = Tensor::new_with_shape(vec![1.0, 0.0, 3.0, 0.0, 5.0, 0.0], &[1, 2, 3]);
        assert_tensors_eq(&output, &expected);
    }

    #[test]
    fn test_relu_backward_1() {
        let input = Tensor::new_with_shape(vec![1.0, -2.0, 3.0, -4.0], &[1, 2, 2]);

        let relu = ReLU::new();
        let (_, context) = relu.forward(input).unwrap();
        let context = unpack_forward(context);

        let grad_output = Tensor::new_with_shape(vec![2.0, 2.0, -3.0, 2.0], &[1, 2, 2]);
        let (grad_input, _) = relu.backward(grad_output, &context).unwrap();

        let expected_grad = Tensor::new_with_shape(vec![2.0, 0.0, -3.0, 0.0], &[1, 2, 2]);
        assert_tensors_eq(&grad_input, &expected_grad);
    }

    #[test]
    fn test_relu_backward_zero_output_blocks_gradient() {
        // Exactly zero inputs produce a zero output, which blocks the gradient
        let input = Tensor::new_with_shape(vec![0.0, -0.0, 1e-300, -1e-300], &[4, 1, 1]);

        let relu = ReLU::new();
        let (output, context) = relu.forward(input).unwrap();
        assert_eq!(output.data, vec![0.0, 0.0, 1e-300, 0.0]);

        let context = unpack_forward(context);
        let grad_output = Tensor::new_with_shape(vec![1.0, 1.0, 1.0, 1.0], &[4, 1, 1]);
        let (grad_input, _) = relu.backward(grad_output, &context).unwrap();

        assert_eq!(grad_input.data, vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_relu_backward_rejects_wrong_shape() {
        let relu = ReLU::new();
        let (_, context) = relu.forward(Tensor::zeros(&[1, 2, 2])).unwrap();
        let context = unpack_forward(context);

        let result = relu.backward(Tensor::zeros(&[1, 1, 4]), &context);
        assert!(matches!(result, Err(Error::Shape(_))));
    }
}
