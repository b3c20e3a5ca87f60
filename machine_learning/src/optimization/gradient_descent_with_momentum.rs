use ml_core::{Result, Tensor};

use super::Optimizer;

/// Gradient descent with a velocity term accumulating past gradients.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f64,
    momentum: f64,
    velocity: Tensor,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `like` - A tensor with the shape and data type of the optimized parameter.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - Hyperparameter to the optimization algorithm.
    ///
    /// # Returns
    /// A new `GradientDescentWithMomentum` instance.
    pub fn new(like: &Tensor, learning_rate: f64, momentum: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: like.zeros_like(),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, grad: &Tensor, params: &mut Tensor, scale: f64) -> Result<()> {
        let mu = self.momentum;

        self.velocity.zip_mut_with(grad, |v, g| mu * v + scale * g)?;
        params.scaled_add(-self.learning_rate, &self.velocity)
    }

    fn reset(&mut self) {
        self.velocity.fill(0.);
    }
}

#[cfg(test)]
mod tests {
    use ml_core::Device;

    use super::*;

    #[test]
    fn velocity_accumulates_and_resets() {
        let mut params = Tensor::from_f64_vec(&[1], vec![0.], Device::Cpu).unwrap();
        let grad = Tensor::from_f64_vec(&[1], vec![1.], Device::Cpu).unwrap();
        let mut optimizer = GradientDescentWithMomentum::new(&params, 1., 0.5);

        optimizer.update_params(&grad, &mut params, 1.).unwrap();
        assert_eq!(params.values(), vec![-1.]);

        optimizer.update_params(&grad, &mut params, 1.).unwrap();
        assert_eq!(params.values(), vec![-2.5]);

        optimizer.reset();
        optimizer.update_params(&grad, &mut params, 1.).unwrap();
        assert_eq!(params.values(), vec![-3.5]);
    }
}
