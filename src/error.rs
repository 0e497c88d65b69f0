use crate::GradientMismatch;

/// Errors raised by layers, the loss and the gradient checker
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Parameters or tensors whose shapes do not fit together
    #[error("shape error: {0}")]
    Shape(String),

    /// Backward pass invoked without the context of a matching forward pass
    #[error("state error: {0}")]
    State(String),

    /// Analytic and numerical gradients disagree beyond the tolerance
    #[error("gradient check failed for {} element(s)", .mismatches.len())]
    Tolerance { mismatches: Vec<GradientMismatch> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
