use crate::{Error, LayerBackwardContext, LayerForwardContext, Result, Tensor};
use rand::distributions::Distribution;
use rand::{thread_rng, Rng};
use rand_distr::Normal;

/// Computes the output size of one spatial axis of a convolution,
/// `(input + 2 * padding - kernel) / stride + 1`.
///
/// A kernel larger than the padded input is always an error. When the stride
/// does not divide the remaining extent the result is floored, unless `strict`
/// is set, in which case it is an error.
pub fn conv_output_dim(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    strict: bool,
) -> Result<usize> {
    let padded = input + 2 * padding;
    if kernel > padded {
        return Err(Error::Shape(format!(
            "kernel {} does not fit padded input extent {}",
            kernel, padded
        )));
    }
    if stride == 0 {
        return Err(Error::Shape("stride must be positive".to_string()));
    }

    let span = padded - kernel;
    if strict && span % stride != 0 {
        return Err(Error::Shape(format!(
            "({} + 2*{} - {}) is not divisible by stride {}",
            input, padding, kernel, stride
        )));
    }

    Ok(span / stride + 1)
}

/// Implements a 2D convolutional layer (cross-correlation, no bias).
#[derive(Debug, Clone)]
pub struct Conv {
    /// Side length of the square kernel
    pub kernel_size: usize,
    /// Number of input channels
    pub in_channels: usize,
    /// Number of output channels
    pub out_channels: usize,
    /// Stride in both dimensions
    pub stride: usize,
    /// Zero padding on every spatial side
    pub padding: usize,
    /// Reject stride/padding combinations that would floor the output size
    pub strict: bool,
    /// Convolutional filters, shape (out_channels, in_channels, kernel, kernel)
    pub weights: Tensor,
    /// Weight gradient from the most recent stored backward pass
    pub grad_weights: Tensor,
}

#[derive(Debug)]
pub struct ConvForwardContext {
    /// Shape of the unpadded input
    pub input_shape: (usize, usize, usize),
    pub padded_input: Tensor,
}

#[derive(Debug)]
pub struct ConvBackwardContext {
    pub grad_weights: Tensor,
}

impl Conv {
    pub fn new(
        kernel_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        Self::new_with_rng(
            kernel_size,
            in_channels,
            out_channels,
            stride,
            padding,
            &mut thread_rng(),
        )
    }

    /// Creates a new Conv layer with He initialization drawn from `rng`
    pub fn new_with_rng<R: Rng + ?Sized>(
        kernel_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        padding: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if kernel_size == 0 || in_channels == 0 || out_channels == 0 || stride == 0 {
            return Err(Error::InvalidConfig(format!(
                "conv needs positive kernel, channels and stride, got k={} D={} C={} s={}",
                kernel_size, in_channels, out_channels, stride
            )));
        }

        let n = in_channels * kernel_size * kernel_size;
        let weight_scale = (2.0 / n as f64).sqrt();
        let normal =
            Normal::new(0.0, weight_scale).map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let shape = [out_channels, in_channels, kernel_size, kernel_size];
        let weights = (0..shape.iter().product::<usize>())
            .map(|_| normal.sample(rng))
            .collect();
        let weights = Tensor::new_with_shape(weights, &shape);
        let grad_weights = weights.zeros_like();

        Ok(Conv {
            kernel_size,
            in_channels,
            out_channels,
            stride,
            padding,
            strict: false,
            weights,
            grad_weights,
        })
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Replaces the filters, which must have shape (out_channels, in_channels, k, k)
    pub fn with_weights(mut self, weights: Tensor) -> Result<Self> {
        if weights.shape != self.weights.shape {
            return Err(Error::Shape(format!(
                "conv weights must have shape {:?}, got {:?}",
                self.weights.shape, weights.shape
            )));
        }
        self.weights = weights;
        Ok(self)
    }

    /// Output spatial size for an input of `height` x `width`
    pub fn output_size(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        let out_height = conv_output_dim(
            height,
            self.kernel_size,
            self.stride,
            self.padding,
            self.strict,
        )?;
        let out_width = conv_output_dim(
            width,
            self.kernel_size,
            self.stride,
            self.padding,
            self.strict,
        )?;
        Ok((out_height, out_width))
    }

    pub fn forward(&self, input: Tensor) -> Result<(Tensor, LayerForwardContext)> {
        let (channels, height, width) = input.shape3()?;
        if channels != self.in_channels {
            return Err(Error::Shape(format!(
                "conv expects {} input channels, got {}",
                self.in_channels, channels
            )));
        }

        let (out_height, out_width) = self.output_size(height, width)?;
        let padded_input = input.pad2d(self.padding)?;
        let (_, padded_height, padded_width) = padded_input.shape3()?;

        let k = self.kernel_size;
        let s = self.stride;
        let mut output = vec![0.0; self.out_channels * out_height * out_width];

        // Slide every filter over the padded input
        for c in 0..self.out_channels {
            for i in 0..out_height {
                for j in 0..out_width {
                    let mut sum = 0.0;
                    for d in 0..self.in_channels {
                        for di in 0..k {
                            let w_offset = ((c * self.in_channels + d) * k + di) * k;
                            let x_offset = (d * padded_height + i * s + di) * padded_width + j * s;
                            for dj in 0..k {
                                sum += self.weights.data[w_offset + dj]
                                    * padded_input.data[x_offset + dj];
                            }
                        }
                    }
                    output[(c * out_height + i) * out_width + j] = sum;
                }
            }
        }

        let output = Tensor::new_with_shape(output, &[self.out_channels, out_height, out_width]);
        Ok((
            output,
            LayerForwardContext::Conv(ConvForwardContext {
                input_shape: (channels, height, width),
                padded_input,
            }),
        ))
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &ConvForwardContext,
    ) -> Result<(Tensor, LayerBackwardContext)> {
        let (channels, height, width) = context.input_shape;
        let padded_shape = context.padded_input.shape3()?;
        let expected_padded = (
            self.in_channels,
            height + 2 * self.padding,
            width + 2 * self.padding,
        );
        if channels != self.in_channels || padded_shape != expected_padded {
            return Err(Error::State(format!(
                "conv with {} input channels and padding {} received a forward context \
                 for input {:?} padded to {:?}",
                self.in_channels, self.padding, context.input_shape, padded_shape
            )));
        }
        let (_, padded_height, padded_width) = padded_shape;
        let (out_height, out_width) = self.output_size(height, width)?;

        let expected = [self.out_channels, out_height, out_width];
        if grad_output.shape != expected {
            return Err(Error::Shape(format!(
                "conv backward expects gradient of shape {:?}, got {:?}",
                expected, grad_output.shape
            )));
        }

        let k = self.kernel_size;
        let s = self.stride;
        let mut grad_padded = vec![0.0; context.padded_input.numel()];
        let mut grad_weights = vec![0.0; self.weights.numel()];

        // Scatter every output gradient over its receptive field
        for c in 0..self.out_channels {
            for i in 0..out_height {
                for j in 0..out_width {
                    let delta = grad_output.data[(c * out_height + i) * out_width + j];
                    for d in 0..self.in_channels {
                        for di in 0..k {
                            let w_offset = ((c * self.in_channels + d) * k + di) * k;
                            let x_offset = (d * padded_height + i * s + di) * padded_width + j * s;
                            for dj in 0..k {
                                grad_padded[x_offset + dj] +=
                                    self.weights.data[w_offset + dj] * delta;
                                grad_weights[w_offset + dj] +=
                                    context.padded_input.data[x_offset + dj] * delta;
                            }
                        }
                    }
                }
            }
        }

        let grad_padded = Tensor::new_with_shape(
            grad_padded,
            &[self.in_channels, padded_height, padded_width],
        );
        let grad_input = grad_padded.crop2d(self.padding)?;
        let grad_weights = Tensor::new_with_shape(grad_weights, &self.weights.shape);

        Ok((
            grad_input,
            LayerBackwardContext::Conv(ConvBackwardContext { grad_weights }),
        ))
    }

    /// Overwrites the stored weight gradient with the one from `context`
    pub fn store_grads(&mut self, context: &ConvBackwardContext) {
        self.grad_weights.data.copy_from_slice(&context.grad_weights.data);
    }

    pub fn get_parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights]
    }

    pub fn get_parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weights]
    }

    pub fn get_grads(&self) -> Vec<&Tensor> {
        vec![&self.grad_weights]
    }
}
