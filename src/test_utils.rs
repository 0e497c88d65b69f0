#[cfg(test)]
use crate::Tensor;
#[cfg(test)]
use approx::abs_diff_eq;
#[cfg(test)]
use rand::rngs::StdRng;
#[cfg(test)]
use rand::SeedableRng;

/// Asserts that two floating point values are approximately equal
///
/// # Arguments
/// * `a` - First value
/// * `b` - Second value
/// * `epsilon` - Maximum allowed difference
#[cfg(test)]
pub fn assert_close(a: f64, b: f64, epsilon: f64) {
    assert!(
        abs_diff_eq!(a, b, epsilon = epsilon),
        "{} and {} differ by more than {}",
        a,
        b,
        epsilon
    );
}

/// Asserts that two tensors are exactly equal in both shape and values
///
/// # Arguments
/// * `a` - First tensor
/// * `b` - Second tensor
#[cfg(test)]
pub fn assert_tensors_eq(a: &Tensor, b: &Tensor) {
    assert_eq!(a.shape, b.shape);
    for (x, y) in a.data.iter().zip(b.data.iter()) {
        assert_eq!(x, y)
    }
}

/// Deterministic RNG so random tensors are reproducible across runs
#[cfg(test)]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
