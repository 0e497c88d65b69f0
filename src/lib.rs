pub mod args;
pub mod cost;
mod error;
pub mod gradient_check;
pub mod layers;
pub mod loss;
pub mod network;
pub mod scenario;
pub mod tensor;
pub mod test_utils;

pub use args::parse_arguments;
pub use cost::{conv_flops, conv_parameter_count, ResidualBlock};
pub use error::{Error, Result};
pub use gradient_check::{
    ensure_all_within_tolerance, GradCheckReport, GradientChecker, GradientMismatch,
};
pub use layers::{
    conv_output_dim,
    //
    Conv,
    ConvBackwardContext,
    ConvForwardContext,
    //
    Dense,
    DenseBackwardContext,
    DenseForwardContext,
    //
    Layer,
    LayerBackwardContext,
    LayerForwardContext,
    //
    MaxPool,
    MaxPoolBackwardContext,
    MaxPoolForwardContext,
    //
    ReLU,
    ReLUBackwardContext,
    ReLUForwardContext,
    //
    Sigmoid,
    SigmoidBackwardContext,
    SigmoidForwardContext,
    //
    Softmax,
    SoftmaxBackwardContext,
    SoftmaxForwardContext,
};
pub use loss::{LossContext, MseLoss};
pub use network::Network;
pub use scenario::{reference_network, run_scenario, ScenarioConfig};
pub use tensor::Tensor;
