use crate::ScenarioConfig;
use clap::{error::ErrorKind, Parser};

/// Builds Conv -> ReLU -> Conv -> MaxPool -> ReLU -> MSE on a random input and
/// checks every convolution weight against central differences.
#[derive(Parser, Debug)]
#[command(name = "convgrad", version)]
struct Args {
    /// Seed for weights, input and target
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Perturbation applied to each weight
    #[arg(long, default_value_t = 1e-7, value_parser = validate_positive)]
    epsilon: f64,

    /// Largest accepted absolute gradient difference
    #[arg(long, default_value_t = 1e-7, value_parser = validate_positive)]
    tolerance: f64,

    /// Height and width of the single-channel input
    #[arg(long, default_value_t = 28, value_parser = validate_size)]
    size: usize,

    /// Reject convolution strides that would floor the output size
    #[arg(long)]
    strict: bool,
}

/// Validates that a value is a finite, strictly positive float
fn validate_positive(value: &str) -> Result<f64, clap::Error> {
    let parsed: f64 = value.parse().map_err(|_| {
        clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Not a number: {}\n", value),
        )
    })?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Must be finite and positive: {}\n", value),
        ));
    }
    Ok(parsed)
}

/// Validates the input size, which must survive a stride-2 conv and a 2x2 pool
fn validate_size(value: &str) -> Result<usize, clap::Error> {
    let parsed: usize = value.parse().map_err(|_| {
        clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Not a non-negative integer: {}\n", value),
        )
    })?;
    if parsed < 2 {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Input size must be at least 2: {}\n", value),
        ));
    }
    Ok(parsed)
}

/// Parses and validates command line arguments
pub fn parse_arguments() -> Result<ScenarioConfig, clap::Error> {
    let args = Args::try_parse()?;

    Ok(ScenarioConfig {
        seed: args.seed,
        epsilon: args.epsilon,
        tolerance: args.tolerance,
        size: args.size,
        strict: args.strict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["convgrad"]).unwrap();
        assert_eq!(args.seed, 0);
        assert_eq!(args.epsilon, 1e-7);
        assert_eq!(args.tolerance, 1e-7);
        assert_eq!(args.size, 28);
        assert!(!args.strict);
    }

    #[test]
    fn test_rejects_non_positive_epsilon() {
        let result = Args::try_parse_from(["convgrad", "--epsilon", "0"]);
        assert!(result.is_err());
        let result = Args::try_parse_from(["convgrad", "--tolerance", "-1e-3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_tiny_size() {
        assert!(Args::try_parse_from(["convgrad", "--size", "1"]).is_err());
        assert!(Args::try_parse_from(["convgrad", "--size", "9", "--strict"]).is_ok());
    }
}
