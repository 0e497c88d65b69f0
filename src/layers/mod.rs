use crate::{Error, Result, Tensor};

mod conv;
mod dense;
mod max_pool;
mod relu;
mod sigmoid;
mod softmax;

pub use conv::{conv_output_dim, Conv, ConvBackwardContext, ConvForwardContext};
pub use dense::{Dense, DenseBackwardContext, DenseForwardContext};
pub use max_pool::{MaxPool, MaxPoolBackwardContext, MaxPoolForwardContext};
pub use relu::{ReLU, ReLUBackwardContext, ReLUForwardContext};
pub use sigmoid::{Sigmoid, SigmoidBackwardContext, SigmoidForwardContext};
pub use softmax::{Softmax, SoftmaxBackwardContext, SoftmaxForwardContext};

/// Available neural network layers
#[derive(Debug, Clone)]
pub enum Layer {
    Conv(Conv),
    Dense(Dense),
    MaxPool(MaxPool),
    ReLU(ReLU),
    Sigmoid(Sigmoid),
    Softmax(Softmax),
}

/// Layer-specific cache from the forward pass, consumed by the matching backward pass
#[derive(Debug)]
pub enum LayerForwardContext {
    Conv(ConvForwardContext),
    Dense(DenseForwardContext),
    MaxPool(MaxPoolForwardContext),
    ReLU(ReLUForwardContext),
    Sigmoid(SigmoidForwardContext),
    Softmax(SoftmaxForwardContext),
}

/// Layer-specific gradients produced by the backward pass
#[derive(Debug)]
pub enum LayerBackwardContext {
    Conv(ConvBackwardContext),
    Dense(DenseBackwardContext),
    MaxPool(MaxPoolBackwardContext),
    ReLU(ReLUBackwardContext),
    Sigmoid(SigmoidBackwardContext),
    Softmax(SoftmaxBackwardContext),
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Conv(_) => "conv",
            Layer::Dense(_) => "dense",
            Layer::MaxPool(_) => "max_pool",
            Layer::ReLU(_) => "relu",
            Layer::Sigmoid(_) => "sigmoid",
            Layer::Softmax(_) => "softmax",
        }
    }

    /// Performs forward pass through the layer
    /// Returns output tensor and context needed for backward pass
    pub fn forward(&self, input: Tensor) -> Result<(Tensor, LayerForwardContext)> {
        match self {
            Layer::Conv(conv) => conv.forward(input),
            Layer::Dense(dense) => dense.forward(input),
            Layer::MaxPool(maxpool) => maxpool.forward(input),
            Layer::ReLU(relu) => relu.forward(input),
            Layer::Sigmoid(sigmoid) => sigmoid.forward(input),
            Layer::Softmax(softmax) => softmax.forward(input),
        }
    }

    /// Performs backward pass through the layer
    /// Takes gradient from next layer and forward context,
    /// returns input gradient and backward context
    pub fn backward(
        &self,
        grad: Tensor,
        context: &LayerForwardContext,
    ) -> Result<(Tensor, LayerBackwardContext)> {
        match (self, context) {
            (Layer::Conv(conv), LayerForwardContext::Conv(context)) => conv.backward(grad, context),
            (Layer::Dense(dense), LayerForwardContext::Dense(context)) => {
                dense.backward(grad, context)
            }
            (Layer::MaxPool(maxpool), LayerForwardContext::MaxPool(context)) => {
                maxpool.backward(grad, context)
            }
            (Layer::ReLU(relu), LayerForwardContext::ReLU(context)) => relu.backward(grad, context),
            (Layer::Sigmoid(sigmoid), LayerForwardContext::Sigmoid(context)) => {
                sigmoid.backward(grad, context)
            }
            (Layer::Softmax(softmax), LayerForwardContext::Softmax(context)) => {
                softmax.backward(grad, context)
            }
            _ => Err(Error::State(format!(
                "{} layer received a forward context from a different layer",
                self.name()
            ))),
        }
    }

    /// Overwrites the layer's stored gradients with those from a backward pass
    pub fn store_grads(&mut self, context: &LayerBackwardContext) -> Result<()> {
        match (self, context) {
            (Layer::Conv(conv), LayerBackwardContext::Conv(context)) => conv.store_grads(context),
            (Layer::Dense(dense), LayerBackwardContext::Dense(context)) => {
                dense.store_grads(context)
            }
            (Layer::MaxPool(_), LayerBackwardContext::MaxPool(_))
            | (Layer::ReLU(_), LayerBackwardContext::ReLU(_))
            | (Layer::Sigmoid(_), LayerBackwardContext::Sigmoid(_))
            | (Layer::Softmax(_), LayerBackwardContext::Softmax(_)) => {}
            (layer, _) => {
                return Err(Error::State(format!(
                    "{} layer received a backward context from a different layer",
                    layer.name()
                )))
            }
        };
        Ok(())
    }

    /// Returns references to layer's trainable parameters
    pub fn get_parameters(&self) -> Vec<&Tensor> {
        match self {
            Layer::Conv(conv) => conv.get_parameters(),
            Layer::Dense(dense) => dense.get_parameters(),
            _ => vec![],
        }
    }

    /// Returns mutable references to layer's trainable parameters,
    /// in the same order as `get_parameters`
    pub fn get_parameters_mut(&mut self) -> Vec<&mut Tensor> {
        match self {
            Layer::Conv(conv) => conv.get_parameters_mut(),
            Layer::Dense(dense) => dense.get_parameters_mut(),
            _ => vec![],
        }
    }

    /// Returns the stored gradients, in the same order as `get_parameters`
    pub fn get_grads(&self) -> Vec<&Tensor> {
        match self {
            Layer::Conv(conv) => conv.get_grads(),
            Layer::Dense(dense) => dense.get_grads(),
            _ => vec![],
        }
    }
}
