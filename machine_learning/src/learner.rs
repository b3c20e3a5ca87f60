use ml_core::{GradientValue, Learner, Parameter, Result, find_gradient};
use serde::{Deserialize, Serialize};

use crate::optimization::Optimizer;

/// How a learning rate relates to the amount of samples of a minibatch.
///
/// Gradients are sums over the minibatch, a per-minibatch rate divides them by
/// the sample count first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningRateUnit {
    PerSample,
    #[default]
    PerMinibatch,
}

impl LearningRateUnit {
    fn gradient_scale(self, sample_count: usize) -> f64 {
        match self {
            LearningRateUnit::PerSample => 1.,
            LearningRateUnit::PerMinibatch => 1. / sample_count as f64,
        }
    }
}

/// A local learner running one `Optimizer` per parameter.
pub struct OptimizerLearner<O> {
    parameters: Vec<Parameter>,
    optimizers: Vec<O>,
    unit: LearningRateUnit,
    samples_seen: usize,
}

impl<O: Optimizer> OptimizerLearner<O> {
    /// Creates a new `OptimizerLearner`.
    ///
    /// # Arguments
    /// * `parameters` - The parameters this learner updates.
    /// * `unit` - How the learning rate is scaled by the minibatch size.
    /// * `factory` - Builds the optimizer of each parameter.
    ///
    /// # Returns
    /// A new `OptimizerLearner` instance.
    pub fn new<F>(parameters: Vec<Parameter>, unit: LearningRateUnit, factory: F) -> Self
    where
        F: FnMut(&Parameter) -> O,
    {
        let optimizers = parameters.iter().map(factory).collect();

        Self {
            parameters,
            optimizers,
            unit,
            samples_seen: 0,
        }
    }
}

impl<O: Optimizer> Learner for OptimizerLearner<O> {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn update(
        &mut self,
        gradients: &[GradientValue],
        sample_count: usize,
        _sweep_end: bool,
    ) -> Result<bool> {
        if sample_count == 0 {
            return Ok(false);
        }

        let scale = self.unit.gradient_scale(sample_count);

        for (parameter, optimizer) in self.parameters.iter().zip(&mut self.optimizers) {
            let grad = find_gradient(gradients, parameter)?;
            let mut value = parameter.value_mut();
            optimizer.update_params(grad, &mut value, scale)?;
        }

        self.samples_seen += sample_count;
        Ok(true)
    }

    fn reset_smoothed_gradients(&mut self) {
        self.optimizers.iter_mut().for_each(Optimizer::reset);
    }

    fn total_samples_seen(&self) -> usize {
        self.samples_seen
    }
}
