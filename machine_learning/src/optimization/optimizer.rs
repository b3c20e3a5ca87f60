use ml_core::{Result, Tensor};

/// Defines the strategy for updating a parameter based on its gradient.
pub trait Optimizer: Send {
    /// Updates the provided parameter using its gradient.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the parameter.
    /// * `params` - The parameter to update.
    /// * `scale` - The factor applied to `grad` before it's used.
    ///
    /// # Returns
    /// An error if `grad` and `params` don't share shape and data type.
    fn update_params(&mut self, grad: &Tensor, params: &mut Tensor, scale: f64) -> Result<()>;

    /// Clears any smoothed state accumulated by previous updates.
    fn reset(&mut self) {}
}
