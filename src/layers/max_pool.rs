use crate::{Error, LayerBackwardContext, LayerForwardContext, Result, Tensor};

/// Window side length and stride of the pooling layer
const POOL: usize = 2;

/// Implements 2x2 max pooling with stride 2.
/// Odd spatial sizes round up, the trailing window covering whatever rows or
/// columns remain.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxPool;

#[derive(Debug)]
pub struct MaxPoolForwardContext {
    /// 1.0 at every input position equal to its window maximum, 0.0 elsewhere.
    /// Tied maxima are all marked.
    pub mask: Tensor,
    pub output_shape: (usize, usize, usize),
}

#[derive(Debug)]
pub struct MaxPoolBackwardContext {}

impl MaxPool {
    pub fn new() -> Self {
        MaxPool
    }

    pub fn output_size(height: usize, width: usize) -> (usize, usize) {
        (height.div_ceil(POOL), width.div_ceil(POOL))
    }

    pub fn forward(&self, input: Tensor) -> Result<(Tensor, LayerForwardContext)> {
        let (channels, height, width) = input.shape3()?;
        let (out_height, out_width) = Self::output_size(height, width);

        let mut output_data = Vec::with_capacity(channels * out_height * out_width);
        let mut mask = input.zeros_like();

        for c in 0..channels {
            for i in 0..out_height {
                let rows = i * POOL..((i + 1) * POOL).min(height);
                for j in 0..out_width {
                    let cols = j * POOL..((j + 1) * POOL).min(width);

                    // Find maximum value in current pooling window
                    let mut max_val = f64::NEG_INFINITY;
                    for h in rows.clone() {
                        for w in cols.clone() {
                            max_val = max_val.max(input.data[(c * height + h) * width + w]);
                        }
                    }

                    // Mark every position holding the maximum
                    for h in rows.clone() {
                        for w in cols.clone() {
                            let idx = (c * height + h) * width + w;
                            if input.data[idx] == max_val {
                                mask.data[idx] = 1.0;
                            }
                        }
                    }

                    output_data.push(max_val);
                }
            }
        }

        let output = Tensor::new_with_shape(output_data, &[channels, out_height, out_width]);
        Ok((
            output,
            LayerForwardContext::MaxPool(MaxPoolForwardContext {
                mask,
                output_shape: (channels, out_height, out_width),
            }),
        ))
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &MaxPoolForwardContext,
    ) -> Result<(Tensor, LayerBackwardContext)> {
        if grad_output.shape3()? != context.output_shape {
            return Err(Error::Shape(format!(
                "max pool backward expects gradient of shape {:?}, got {:?}",
                context.output_shape, grad_output.shape
            )));
        }

        let (channels, height, width) = context.mask.shape3()?;
        let (_, out_height, out_width) = context.output_shape;

        // Every masked position receives the full gradient of its window
        let mut grad_input = context.mask.clone();
        for c in 0..channels {
            for h in 0..height {
                for w in 0..width {
                    let out_idx = (c * out_height + h / POOL) * out_width + w / POOL;
                    grad_input.data[(c * height + h) * width + w] *= grad_output.data[out_idx];
                }
            }
        }

        Ok((
            grad_input,
            LayerBackwardContext::MaxPool(MaxPoolBackwardContext {}),
        ))
    }
}
