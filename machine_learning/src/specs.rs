use ml_core::{Learner, MlErr, Parameter, Result};
use serde::{Deserialize, Serialize};

use crate::{
    LearningRateUnit, OptimizerLearner,
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum},
};

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
    GradientDescent {
        learning_rate: f64,
    },
    GradientDescentWithMomentum {
        learning_rate: f64,
        momentum: f64,
    },
}

impl OptimizerSpec {
    /// Checks every hyperparameter is in its valid range.
    ///
    /// # Returns
    /// `InvalidHyperParameter` naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        let check = |name, value: f64, valid: bool| {
            if valid && value.is_finite() {
                Ok(())
            } else {
                Err(MlErr::InvalidHyperParameter { name, value })
            }
        };

        match *self {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                check("learning_rate", learning_rate, learning_rate > 0.)?;
                check("beta1", beta1, (0. ..1.).contains(&beta1))?;
                check("beta2", beta2, (0. ..1.).contains(&beta2))?;
                check("epsilon", epsilon, epsilon > 0.)
            }
            OptimizerSpec::GradientDescent { learning_rate } => {
                check("learning_rate", learning_rate, learning_rate > 0.)
            }
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => {
                check("learning_rate", learning_rate, learning_rate > 0.)?;
                check("momentum", momentum, (0. ..1.).contains(&momentum))
            }
        }
    }
}

/// Builds local learners from their specification.
#[derive(Debug, Clone, Copy)]
pub struct LearnerBuilder {
    unit: LearningRateUnit,
}

impl LearnerBuilder {
    /// Creates a new `LearnerBuilder`.
    ///
    /// # Arguments
    /// * `unit` - The learning rate unit of every built learner.
    pub fn new(unit: LearningRateUnit) -> Self {
        Self { unit }
    }

    /// Builds a learner updating `parameters` with the optimizer described by `spec`.
    ///
    /// # Arguments
    /// * `spec` - The optimizer specification.
    /// * `parameters` - The parameters the learner owns.
    ///
    /// # Returns
    /// A boxed learner or an error if the spec is invalid.
    pub fn build(&self, spec: &OptimizerSpec, parameters: Vec<Parameter>) -> Result<Box<dyn Learner>> {
        spec.validate()?;

        let learner: Box<dyn Learner> = match *spec {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Box::new(OptimizerLearner::new(parameters, self.unit, |p| {
                Adam::new(&p.value(), learning_rate, beta1, beta2, epsilon)
            })),
            OptimizerSpec::GradientDescent { learning_rate } => {
                Box::new(OptimizerLearner::new(parameters, self.unit, |_| {
                    GradientDescent::new(learning_rate)
                }))
            }
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => Box::new(OptimizerLearner::new(parameters, self.unit, |p| {
                GradientDescentWithMomentum::new(&p.value(), learning_rate, momentum)
            })),
        };

        Ok(learner)
    }
}
