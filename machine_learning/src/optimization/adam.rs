use ml_core::{Result, Tensor};

use super::Optimizer;

#[derive(Debug)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    beta1_t: f64,
    beta2_t: f64,
    v: Tensor,
    s: Tensor,
    epsilon: f64,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `like` - A tensor with the shape and data type of the optimized parameter.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(like: &Tensor, learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: like.zeros_like(),
            s: like.zeros_like(),
            epsilon,
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &Tensor, params: &mut Tensor, scale: f64) -> Result<()> {
        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        self.v
            .zip_mut_with(grad, |v, g| b1 * v + (1. - b1) * scale * g)?;
        self.s
            .zip_mut_with(grad, |s, g| b2 * s + (1. - b2) * (scale * g).powi(2))?;

        let mut direction = self.v.clone();
        direction.zip_mut_with(&self.s, |v, s| v / (s.sqrt() + eps))?;
        params.scaled_add(-step_size, &direction)
    }

    fn reset(&mut self) {
        self.beta1_t = 1.;
        self.beta2_t = 1.;
        self.v.fill(0.);
        self.s.fill(0.);
    }
}

#[cfg(test)]
mod tests {
    use ml_core::Device;

    use super::*;

    #[test]
    fn first_step_has_learning_rate_length() {
        let mut params = Tensor::from_f64_vec(&[2], vec![0., 0.], Device::Cpu).unwrap();
        let grad = Tensor::from_f64_vec(&[2], vec![4., -0.25], Device::Cpu).unwrap();
        let mut optimizer = Adam::new(&params, 0.1, 0.9, 0.999, 1e-12);

        optimizer.update_params(&grad, &mut params, 1.).unwrap();

        let values = params.values();
        assert!((values[0] + 0.1).abs() < 1e-6);
        assert!((values[1] - 0.1).abs() < 1e-6);
    }
}
