use ml_core::{Result, Tensor};

use super::Optimizer;

/// Gradient descent optimization algorithm.
#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f64,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, grad: &Tensor, params: &mut Tensor, scale: f64) -> Result<()> {
        params.scaled_add(-self.learning_rate * scale, grad)
    }
}

#[cfg(test)]
mod tests {
    use ml_core::Device;

    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut params = Tensor::from_f32_vec(&[2], vec![1., -1.], Device::Cpu).unwrap();
        let grad = Tensor::from_f32_vec(&[2], vec![2., -4.], Device::Cpu).unwrap();

        let mut optimizer = GradientDescent::new(0.5);
        optimizer.update_params(&grad, &mut params, 1.).unwrap();
        assert_eq!(params.values(), vec![0., 1.]);

        optimizer.update_params(&grad, &mut params, 0.5).unwrap();
        assert_eq!(params.values(), vec![-0.5, 2.]);
    }
}
