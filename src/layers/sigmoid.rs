use crate::{Error, LayerBackwardContext, LayerForwardContext, Result, Tensor};

/// Logistic sigmoid activation, `1 / (1 + e^-x)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

#[derive(Debug)]
pub struct SigmoidForwardContext {
    pub output: Tensor,
}

#[derive(Debug)]
pub struct SigmoidBackwardContext {}

impl Sigmoid {
    pub fn new() -> Self {
        Sigmoid
    }

    pub fn forward(&self, input: Tensor) -> Result<(Tensor, LayerForwardContext)> {
        let mut output = input;
        for val in output.data.iter_mut() {
            *val = 1.0 / (1.0 + (-*val).exp());
        }

        Ok((
            output.clone(),
            LayerForwardContext::Sigmoid(SigmoidForwardContext { output }),
        ))
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &SigmoidForwardContext,
    ) -> Result<(Tensor, LayerBackwardContext)> {
        if grad_output.shape != context.output.shape {
            return Err(Error::Shape(format!(
                "sigmoid backward expects gradient of shape {:?}, got {:?}",
                context.output.shape, grad_output.shape
            )));
        }

        // dy/dx = y * (1 - y)
        let mut derivative = context.output.clone();
        for y in derivative.data.iter_mut() {
            *y *= 1.0 - *y;
        }

        Ok((
            grad_output.hadamard(&derivative),
            LayerBackwardContext::Sigmoid(SigmoidBackwardContext {}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_close;

    #[test]
    fn test_sigmoid_forward() {
        let input = Tensor::new_with_shape(vec![0.0, 2.0, -2.0], &[3, 1, 1]);

        let (output, _) = Sigmoid::new().forward(input).unwrap();

        assert_close(output.data[0], 0.5, 1e-15);
        assert_close(output.data[1], 0.8807970779778823, 1e-15);
        assert_close(output.data[1] + output.data[2], 1.0, 1e-15);
    }

    #[test]
    fn test_sigmoid_backward() {
        let input = Tensor::new_with_shape(vec![0.0, 2.0], &[2, 1, 1]);

        let sigmoid = Sigmoid::new();
        let (_, context) = sigmoid.forward(input).unwrap();
        let context = match context {
            LayerForwardContext::Sigmoid(context) => context,
            _ => panic!(),
        };

        let grad_output = Tensor::new_with_shape(vec![4.0, 1.0], &[2, 1, 1]);
        let (grad_input, _) = sigmoid.backward(grad_output, &context).unwrap();

        let y = 0.8807970779778823;
        assert_close(grad_input.data[0], 1.0, 1e-15);
        assert_close(grad_input.data[1], y * (1.0 - y), 1e-15);
    }
}
