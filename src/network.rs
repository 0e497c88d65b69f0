use crate::{Error, Layer, LayerBackwardContext, LayerForwardContext, Result, Tensor};
use tracing::trace;

/// Ordered stack of layers.
///
/// Forward returns one context per layer; backward consumes them in reverse.
/// The network itself keeps no per-pass state, so independent forward/backward
/// cycles can run on the same network as long as each keeps its own contexts.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    pub fn new() -> Self {
        Network { layers: Vec::new() }
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    /// Performs forward pass through the network
    ///
    /// # Arguments
    /// * `input` - Input tensor
    ///
    /// # Returns
    /// Tuple of (output tensor, forward contexts needed for backward pass)
    pub fn forward(&self, input: Tensor) -> Result<(Tensor, Vec<LayerForwardContext>)> {
        let mut current = input;
        let mut contexts = Vec::with_capacity(self.layers.len());

        for (idx, layer) in self.layers.iter().enumerate() {
            let (output, context) = layer.forward(current)?;
            trace!(layer = idx, kind = layer.name(), shape = ?output.shape, "forward");
            current = output;
            contexts.push(context);
        }

        Ok((current, contexts))
    }

    /// Performs backward pass through the network
    ///
    /// # Arguments
    /// * `grad_output` - Gradient tensor from loss function
    /// * `forward_contexts` - Contexts saved during the matching forward pass
    ///
    /// # Returns
    /// Tuple of (input gradients, backward contexts ordered from the last layer to the first)
    pub fn backward(
        &self,
        grad_output: Tensor,
        forward_contexts: &[LayerForwardContext],
    ) -> Result<(Tensor, Vec<LayerBackwardContext>)> {
        if forward_contexts.len() != self.layers.len() {
            return Err(Error::State(format!(
                "backward needs {} forward contexts, got {}; run forward first",
                self.layers.len(),
                forward_contexts.len()
            )));
        }

        let mut current = grad_output;
        let mut contexts = Vec::with_capacity(self.layers.len());

        // Process through layers in reverse order
        for (idx, (layer, forward_context)) in self
            .layers
            .iter()
            .zip(forward_contexts.iter())
            .enumerate()
            .rev()
        {
            let (output, context) = layer.backward(current, forward_context)?;
            trace!(layer = idx, kind = layer.name(), shape = ?output.shape, "backward");
            current = output;
            contexts.push(context);
        }

        Ok((current, contexts))
    }

    /// Overwrites every layer's stored gradients with the results of a backward pass
    ///
    /// # Arguments
    /// * `backward_contexts` - Contexts as returned by `backward`, last layer first
    pub fn store_grads(&mut self, backward_contexts: &[LayerBackwardContext]) -> Result<()> {
        if backward_contexts.len() != self.layers.len() {
            return Err(Error::State(format!(
                "expected {} backward contexts, got {}",
                self.layers.len(),
                backward_contexts.len()
            )));
        }

        for (layer, context) in self.layers.iter_mut().zip(backward_contexts.iter().rev()) {
            layer.store_grads(context)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Conv, MaxPool, ReLU};
    use crate::test_utils::seeded_rng;
    use crate::MseLoss;

    fn small_network() -> Network {
        let mut rng = seeded_rng(1);
        let mut network = Network::new();
        network.add_layer(Layer::Conv(
            Conv::new_with_rng(3, 1, 2, 1, 1, &mut rng).unwrap(),
        ));
        network.add_layer(Layer::ReLU(ReLU::new()));
        network.add_layer(Layer::MaxPool(MaxPool::new()));
        network
    }

    #[test]
    fn test_forward_shapes() {
        let network = small_network();
        let (output, contexts) = network.forward(Tensor::zeros(&[1, 6, 6])).unwrap();

        assert_eq!(output.shape, vec![2, 3, 3]);
        assert_eq!(contexts.len(), 3);
    }

    #[test]
    fn test_backward_before_forward_is_state_error() {
        let network = small_network();
        let result = network.backward(Tensor::zeros(&[2, 3, 3]), &[]);
        assert!(matches!(result, Err(Error::State(_))));
    }

    #[test]
    fn test_backward_returns_input_shape_and_stores_grads() {
        let mut rng = seeded_rng(2);
        let mut network = small_network();
        let input = Tensor::randn(&[1, 6, 6], &mut rng);
        let target = Tensor::randn(&[2, 3, 3], &mut rng);

        let (output, forward_contexts) = network.forward(input).unwrap();
        let loss = MseLoss::for_shape(&output.shape).unwrap();
        let (_, loss_context) = loss.forward(&output, &target).unwrap();

        let (grad_input, backward_contexts) = network
            .backward(loss.backward(&loss_context), &forward_contexts)
            .unwrap();
        assert_eq!(grad_input.shape, vec![1, 6, 6]);
        assert_eq!(backward_contexts.len(), 3);

        network.store_grads(&backward_contexts).unwrap();
        let stored = network.layer(0).unwrap().get_grads()[0].clone();
        let computed = match &backward_contexts[2] {
            LayerBackwardContext::Conv(context) => context.grad_weights.clone(),
            _ => panic!(),
        };
        assert_eq!(stored, computed);
    }

    #[test]
    fn test_store_grads_rejects_wrong_count() {
        let mut network = small_network();
        assert!(matches!(network.store_grads(&[]), Err(Error::State(_))));
    }
}
