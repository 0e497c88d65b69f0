use crate::{Error, MseLoss, Network, Result, Tensor};
use tracing::{debug, info, warn};

/// One parameter element whose analytic gradient disagrees with the numerical one
#[derive(Debug, Clone, PartialEq)]
pub struct GradientMismatch {
    /// Position of the layer in the network
    pub layer: usize,
    /// Position of the parameter tensor within the layer
    pub parameter: usize,
    /// Multi-dimensional index of the element inside the parameter tensor
    pub index: Vec<usize>,
    pub analytic: f64,
    pub numerical: f64,
}

impl GradientMismatch {
    pub fn abs_diff(&self) -> f64 {
        (self.analytic - self.numerical).abs()
    }
}

/// Outcome of checking one parameter tensor
#[derive(Debug, Clone)]
pub struct GradCheckReport {
    pub layer: usize,
    pub parameter: usize,
    /// Number of scalar elements checked
    pub checked: usize,
    /// Largest absolute difference over all checked elements
    pub max_abs_diff: f64,
    pub mismatches: Vec<GradientMismatch>,
}

impl GradCheckReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Turns recorded mismatches into an `Error::Tolerance`
    pub fn ensure_within_tolerance(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(Error::Tolerance {
                mismatches: self.mismatches,
            })
        }
    }
}

/// Turns the mismatches of every report into one `Error::Tolerance`
pub fn ensure_all_within_tolerance(reports: Vec<GradCheckReport>) -> Result<Vec<GradCheckReport>> {
    let mismatches: Vec<GradientMismatch> = reports
        .iter()
        .flat_map(|report| report.mismatches.iter().cloned())
        .collect();

    if mismatches.is_empty() {
        Ok(reports)
    } else {
        Err(Error::Tolerance { mismatches })
    }
}

/// Compares analytic parameter gradients against central differences,
/// `(L(w + epsilon) - L(w - epsilon)) / (2 * epsilon)`.
///
/// Every scalar parameter is perturbed independently and restored to its exact
/// original value afterwards. Mismatches are collected, never short-circuited.
#[derive(Debug, Clone, Copy)]
pub struct GradientChecker {
    /// Perturbation applied to each parameter
    pub epsilon: f64,
    /// Largest accepted absolute difference between the two gradients
    pub tolerance: f64,
}

impl Default for GradientChecker {
    fn default() -> Self {
        GradientChecker {
            epsilon: 1e-7,
            tolerance: 1e-7,
        }
    }
}

impl GradientChecker {
    pub fn new(epsilon: f64, tolerance: f64) -> Result<Self> {
        for (name, value) in [("epsilon", epsilon), ("tolerance", tolerance)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }
        Ok(GradientChecker { epsilon, tolerance })
    }

    /// Checks one parameter tensor of one layer
    ///
    /// # Arguments
    /// * `network` - Network holding the parameter, restored before returning
    /// * `loss` - Loss closing the forward pass
    /// * `input` - Network input
    /// * `target` - Loss target
    /// * `layer_index` - Position of the layer in the network
    /// * `parameter_index` - Position of the parameter tensor within the layer
    pub fn check_parameter(
        &self,
        network: &mut Network,
        loss: &MseLoss,
        input: &Tensor,
        target: &Tensor,
        layer_index: usize,
        parameter_index: usize,
    ) -> Result<GradCheckReport> {
        let analytic = analytic_gradient(
            network,
            loss,
            input,
            target,
            layer_index,
            parameter_index,
        )?;
        let count = analytic.numel();

        let mut mismatches = Vec::new();
        let mut max_abs_diff: f64 = 0.0;

        for offset in 0..count {
            let original = parameter_mut(network, layer_index, parameter_index)?.data[offset];

            parameter_mut(network, layer_index, parameter_index)?.data[offset] =
                original + self.epsilon;
            let loss_plus = evaluate(network, loss, input, target);

            parameter_mut(network, layer_index, parameter_index)?.data[offset] =
                original - self.epsilon;
            let loss_minus = evaluate(network, loss, input, target);

            parameter_mut(network, layer_index, parameter_index)?.data[offset] = original;

            let numerical = (loss_plus? - loss_minus?) / (2.0 * self.epsilon);
            let difference = (analytic.data[offset] - numerical).abs();
            max_abs_diff = max_abs_diff.max(difference);

            if difference > self.tolerance || difference.is_nan() {
                let mismatch = GradientMismatch {
                    layer: layer_index,
                    parameter: parameter_index,
                    index: analytic.unravel_index(offset),
                    analytic: analytic.data[offset],
                    numerical,
                };
                warn!(
                    layer = mismatch.layer,
                    parameter = mismatch.parameter,
                    index = ?mismatch.index,
                    analytic = mismatch.analytic,
                    numerical = mismatch.numerical,
                    "gradient mismatch"
                );
                mismatches.push(mismatch);
            }
        }

        debug!(
            layer = layer_index,
            parameter = parameter_index,
            checked = count,
            max_abs_diff,
            mismatches = mismatches.len(),
            "checked parameter"
        );

        Ok(GradCheckReport {
            layer: layer_index,
            parameter: parameter_index,
            checked: count,
            max_abs_diff,
            mismatches,
        })
    }

    /// Checks every parameter of every layer that has parameters
    pub fn check_network(
        &self,
        network: &mut Network,
        loss: &MseLoss,
        input: &Tensor,
        target: &Tensor,
    ) -> Result<Vec<GradCheckReport>> {
        let mut reports = Vec::new();

        for layer_index in 0..network.len() {
            let parameter_count = network
                .layer(layer_index)
                .map_or(0, |layer| layer.get_parameters().len());

            for parameter_index in 0..parameter_count {
                reports.push(self.check_parameter(
                    network,
                    loss,
                    input,
                    target,
                    layer_index,
                    parameter_index,
                )?);
            }
        }

        let checked: usize = reports.iter().map(|report| report.checked).sum();
        let failed: usize = reports.iter().map(|report| report.mismatches.len()).sum();
        let max_abs_diff = reports
            .iter()
            .map(|report| report.max_abs_diff)
            .fold(0.0, f64::max);
        info!(
            checked,
            failed,
            max_abs_diff,
            epsilon = self.epsilon,
            tolerance = self.tolerance,
            "gradient check finished"
        );

        Ok(reports)
    }
}

/// One forward pass plus loss
fn evaluate(network: &Network, loss: &MseLoss, input: &Tensor, target: &Tensor) -> Result<f64> {
    let (output, _) = network.forward(input.clone())?;
    let (value, _) = loss.forward(&output, target)?;
    Ok(value)
}

/// One forward and one backward pass; returns the stored gradient of the parameter
fn analytic_gradient(
    network: &mut Network,
    loss: &MseLoss,
    input: &Tensor,
    target: &Tensor,
    layer_index: usize,
    parameter_index: usize,
) -> Result<Tensor> {
    let (output, forward_contexts) = network.forward(input.clone())?;
    let (_, loss_context) = loss.forward(&output, target)?;
    let (_, backward_contexts) = network.backward(loss.backward(&loss_context), &forward_contexts)?;
    network.store_grads(&backward_contexts)?;

    let layer = network
        .layer(layer_index)
        .ok_or_else(|| missing_layer(layer_index))?;
    let grads = layer.get_grads();
    grads
        .get(parameter_index)
        .map(|grad| (*grad).clone())
        .ok_or_else(|| missing_parameter(layer_index, parameter_index))
}

fn parameter_mut(
    network: &mut Network,
    layer_index: usize,
    parameter_index: usize,
) -> Result<&mut Tensor> {
    network
        .layer_mut(layer_index)
        .ok_or_else(|| missing_layer(layer_index))?
        .get_parameters_mut()
        .into_iter()
        .nth(parameter_index)
        .ok_or_else(|| missing_parameter(layer_index, parameter_index))
}

fn missing_layer(layer_index: usize) -> Error {
    Error::InvalidConfig(format!("network has no layer {}", layer_index))
}

fn missing_parameter(layer_index: usize, parameter_index: usize) -> Error {
    Error::InvalidConfig(format!(
        "layer {} has no parameter {}",
        layer_index, parameter_index
    ))
}
