use crate::{Error, Result, Tensor};

/// Halved squared error normalized by a fixed constant,
/// `sum(0.5 * (prediction - target)^2) / N`.
///
/// `N` is usually the element count of the network output, but it is a free
/// parameter so losses stay comparable across output sizes.
#[derive(Debug, Clone, Copy)]
pub struct MseLoss {
    normalization: f64,
}

#[derive(Debug)]
pub struct LossContext {
    /// `(prediction - target) / N`, the gradient of the loss w.r.t. the prediction
    pub residual: Tensor,
}

impl MseLoss {
    pub fn new(normalization: f64) -> Result<Self> {
        if !normalization.is_finite() || normalization <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "loss normalization must be finite and positive, got {}",
                normalization
            )));
        }
        Ok(MseLoss { normalization })
    }

    /// Normalizes by the element count of `shape`
    pub fn for_shape(shape: &[usize]) -> Result<Self> {
        Self::new(shape.iter().product::<usize>() as f64)
    }

    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    pub fn forward(&self, prediction: &Tensor, target: &Tensor) -> Result<(f64, LossContext)> {
        if prediction.shape != target.shape {
            return Err(Error::Shape(format!(
                "prediction shape {:?} does not match target shape {:?}",
                prediction.shape, target.shape
            )));
        }

        let difference = prediction - target;
        let loss = difference.data.iter().map(|d| 0.5 * d * d).sum::<f64>() / self.normalization;

        let mut residual = difference;
        for val in residual.data.iter_mut() {
            *val /= self.normalization;
        }

        Ok((loss, LossContext { residual }))
    }

    /// Seed gradient for the backward chain
    pub fn backward(&self, context: &LossContext) -> Tensor {
        context.residual.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_close;

    #[test]
    fn test_loss_forward() {
        let prediction = Tensor::new_with_shape(vec![1.0, 2.0, 3.0, 4.0], &[1, 2, 2]);
        let target = Tensor::new_with_shape(vec![1.0, 0.0, 4.0, 1.0], &[1, 2, 2]);

        let loss = MseLoss::for_shape(&prediction.shape).unwrap();
        let (value, context) = loss.forward(&prediction, &target).unwrap();

        // 0.5 * (0 + 4 + 1 + 9) / 4
        assert_close(value, 1.75, 1e-15);
        assert_eq!(loss.backward(&context).data, vec![0.0, 0.5, -0.25, 0.75]);
    }

    #[test]
    fn test_loss_custom_normalization() {
        let prediction = Tensor::new_with_shape(vec![3.0, 1.0], &[2, 1, 1]);
        let target = Tensor::zeros(&[2, 1, 1]);

        let loss = MseLoss::new(10.0).unwrap();
        let (value, context) = loss.forward(&prediction, &target).unwrap();

        // 0.5 * (9 + 1) / 10
        assert_close(value, 0.5, 1e-15);
        assert_eq!(loss.backward(&context).data, vec![0.3, 0.1]);
    }

    #[test]
    fn test_loss_rejects_bad_normalization() {
        assert!(matches!(MseLoss::new(0.0), Err(Error::InvalidConfig(_))));
        assert!(matches!(MseLoss::new(f64::NAN), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_loss_rejects_shape_mismatch() {
        let loss = MseLoss::new(1.0).unwrap();
        let result = loss.forward(&Tensor::zeros(&[1, 2, 2]), &Tensor::zeros(&[1, 4, 1]));
        assert!(matches!(result, Err(Error::Shape(_))));
    }
}
