use crate::{Error, LayerBackwardContext, LayerForwardContext, Result, Tensor};

/// Softmax over every element of the input tensor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Softmax;

#[derive(Debug)]
pub struct SoftmaxForwardContext {
    pub output: Tensor,
}

#[derive(Debug)]
pub struct SoftmaxBackwardContext {}

impl Softmax {
    pub fn new() -> Self {
        Softmax
    }

    pub fn forward(&self, input: Tensor) -> Result<(Tensor, LayerForwardContext)> {
        let output = input.softmax();
        Ok((
            output.clone(),
            LayerForwardContext::Softmax(SoftmaxForwardContext { output }),
        ))
    }

    /// Jacobian-vector product, `dx_k = y_k * (g_k - sum_j g_j * y_j)`
    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &SoftmaxForwardContext,
    ) -> Result<(Tensor, LayerBackwardContext)> {
        if grad_output.shape != context.output.shape {
            return Err(Error::Shape(format!(
                "softmax backward expects gradient of shape {:?}, got {:?}",
                context.output.shape, grad_output.shape
            )));
        }

        let dot: f64 = grad_output
            .data
            .iter()
            .zip(context.output.data.iter())
            .map(|(g, y)| g * y)
            .sum();

        let mut grad_input = grad_output;
        for (g, &y) in grad_input.data.iter_mut().zip(context.output.data.iter()) {
            *g = y * (*g - dot);
        }

        Ok((
            grad_input,
            LayerBackwardContext::Softmax(SoftmaxBackwardContext {}),
        ))
    }
}
