use crate::layers::{Conv, MaxPool, ReLU};
use crate::{GradCheckReport, GradientChecker, Layer, MseLoss, Network, Result, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Parameters of the reference gradient-check run
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// Seed for weights, input and target
    pub seed: u64,
    pub epsilon: f64,
    pub tolerance: f64,
    /// Height and width of the single-channel input
    pub size: usize,
    /// Reject convolution strides that would floor the output size
    pub strict: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let checker = GradientChecker::default();
        ScenarioConfig {
            seed: 0,
            epsilon: checker.epsilon,
            tolerance: checker.tolerance,
            size: 28,
            strict: false,
        }
    }
}

/// Conv(k=3,D=1,C=3,s=1,p=1) -> ReLU -> Conv(k=3,D=3,C=1,s=2,p=1) -> MaxPool -> ReLU
pub fn reference_network<R: Rng + ?Sized>(rng: &mut R, strict: bool) -> Result<Network> {
    let mut network = Network::new();
    network.add_layer(Layer::Conv(
        Conv::new_with_rng(3, 1, 3, 1, 1, rng)?.with_strict(strict),
    ));
    network.add_layer(Layer::ReLU(ReLU::new()));
    network.add_layer(Layer::Conv(
        Conv::new_with_rng(3, 3, 1, 2, 1, rng)?.with_strict(strict),
    ));
    network.add_layer(Layer::MaxPool(MaxPool::new()));
    network.add_layer(Layer::ReLU(ReLU::new()));
    Ok(network)
}

/// Builds the reference network, draws a random input and a random target of the
/// network's output shape, and checks every convolution weight.
///
/// Returns the per-parameter reports; mismatches are reported, not raised.
pub fn run_scenario(config: &ScenarioConfig) -> Result<Vec<GradCheckReport>> {
    let checker = GradientChecker::new(config.epsilon, config.tolerance)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut network = reference_network(&mut rng, config.strict)?;
    let input = Tensor::randn(&[1, config.size, config.size], &mut rng);

    let (output, _) = network.forward(input.clone())?;
    let target = Tensor::randn(&output.shape, &mut rng);
    let loss = MseLoss::for_shape(&output.shape)?;

    info!(
        seed = config.seed,
        input = ?input.shape,
        output = ?output.shape,
        normalization = loss.normalization(),
        "running gradient check"
    );

    checker.check_network(&mut network, &loss, &input, &target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ensure_all_within_tolerance, Error};

    #[test]
    fn test_default_scenario_passes() {
        let reports = run_scenario(&ScenarioConfig::default()).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|report| report.checked == 27));
        assert!(ensure_all_within_tolerance(reports).is_ok());
    }

    #[test]
    fn test_strict_scenario_rejects_floored_stride() {
        // (28 + 2 - 3) is odd, so the stride-2 convolution would floor
        let config = ScenarioConfig {
            strict: true,
            ..ScenarioConfig::default()
        };
        assert!(matches!(run_scenario(&config), Err(Error::Shape(_))));

        let config = ScenarioConfig {
            strict: true,
            size: 9,
            ..ScenarioConfig::default()
        };
        let reports = run_scenario(&config).unwrap();
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_invalid_checker_config() {
        let config = ScenarioConfig {
            epsilon: -1.0,
            ..ScenarioConfig::default()
        };
        assert!(matches!(run_scenario(&config), Err(Error::InvalidConfig(_))));
    }
}
