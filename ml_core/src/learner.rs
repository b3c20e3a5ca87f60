use std::collections::HashSet;

use log::debug;

use crate::{GradientValue, MinibatchInfo, MlErr, Parameter, Result, Tensor};

/// A local optimizer that mutates its parameters in place from their gradients.
///
/// Implementations receive the whole gradient list of the round and pick the
/// gradients of their own parameters, so one list can be shared by every learner
/// of a `Learners` group.
pub trait Learner: Send {
    /// The parameters updated by this learner, in a stable order.
    fn parameters(&self) -> &[Parameter];

    /// Applies one update.
    ///
    /// # Arguments
    /// * `gradients` - The gradients of the round, a superset of this learner's parameters.
    /// * `sample_count` - The amount of samples the gradients were accumulated over.
    /// * `sweep_end` - Whether the round closes a pass over the data.
    ///
    /// # Returns
    /// `true` if the parameters were modified, `false` if the update was skipped.
    ///
    /// # Errors
    /// Returns `MissingGradient` if one of the learner's parameters has no gradient.
    fn update(
        &mut self,
        gradients: &[GradientValue],
        sample_count: usize,
        sweep_end: bool,
    ) -> Result<bool>;

    /// Clears accumulated optimizer state such as momentum buffers.
    fn reset_smoothed_gradients(&mut self);

    /// The amount of samples this learner has been updated with.
    fn total_samples_seen(&self) -> usize;
}

impl<T: Learner + ?Sized> Learner for Box<T> {
    fn parameters(&self) -> &[Parameter] {
        (**self).parameters()
    }

    fn update(
        &mut self,
        gradients: &[GradientValue],
        sample_count: usize,
        sweep_end: bool,
    ) -> Result<bool> {
        (**self).update(gradients, sample_count, sweep_end)
    }

    fn reset_smoothed_gradients(&mut self) {
        (**self).reset_smoothed_gradients();
    }

    fn total_samples_seen(&self) -> usize {
        (**self).total_samples_seen()
    }
}

/// Finds the gradient of `parameter` in `gradients`.
///
/// # Returns
/// The gradient tensor or a `MissingGradient` error.
pub fn find_gradient<'a>(gradients: &'a [GradientValue], parameter: &Parameter) -> Result<&'a Tensor> {
    gradients
        .iter()
        .find(|gv| gv.parameter == *parameter)
        .map(|gv| &gv.gradient)
        .ok_or_else(|| MlErr::MissingGradient {
            name: parameter.name().to_string(),
        })
}

/// The result of updating a `Learners` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnersUpdate {
    /// Whether any learner modified its parameters.
    pub applied: bool,
    /// The group's running sample counter after the update.
    pub total_samples_seen: usize,
}

/// An ordered group of local learners with disjoint parameter sets.
///
/// The parameter order of the group is the concatenation of every learner's
/// parameters, in learner order, and never changes after construction.
pub struct Learners {
    learners: Vec<Box<dyn Learner>>,
    parameters: Vec<Parameter>,
    total_samples_seen: usize,
}

impl Learners {
    /// Creates a new `Learners` group.
    ///
    /// # Arguments
    /// * `learners` - The learners, at least one of them must own a parameter.
    ///
    /// # Returns
    /// A new `Learners` instance or an error if the group is empty or a
    /// parameter is owned by more than one learner.
    pub fn new(learners: Vec<Box<dyn Learner>>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut parameters = Vec::new();

        for learner in &learners {
            for parameter in learner.parameters() {
                if !seen.insert(parameter.uid()) {
                    return Err(MlErr::DuplicateParameter {
                        name: parameter.name().to_string(),
                    });
                }

                parameters.push(parameter.clone());
            }
        }

        if parameters.is_empty() {
            return Err(MlErr::EmptyLearners);
        }

        Ok(Self {
            learners,
            parameters,
            total_samples_seen: 0,
        })
    }

    /// Creates a group holding a single learner.
    pub fn single<L: Learner + 'static>(learner: L) -> Result<Self> {
        Self::new(vec![Box::new(learner)])
    }

    /// The parameters of every learner in canonical order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }

    pub fn total_samples_seen(&self) -> usize {
        self.total_samples_seen
    }

    /// Updates every learner with the gradients of the round.
    ///
    /// Every learner is updated even after one of them reports a modification.
    ///
    /// # Arguments
    /// * `gradients` - One gradient per parameter of the group.
    /// * `info` - The minibatch the gradients were computed on.
    ///
    /// # Returns
    /// Whether any learner applied its update, together with the group's sample counter.
    pub fn update(
        &mut self,
        gradients: &[GradientValue],
        info: &MinibatchInfo,
    ) -> Result<LearnersUpdate> {
        let mut applied = false;

        for learner in &mut self.learners {
            applied |= learner.update(gradients, info.number_of_samples, info.at_end_of_sweep)?;
        }

        self.total_samples_seen += info.number_of_samples;
        debug!(samples = info.number_of_samples, applied = applied; "updated local learners");

        Ok(LearnersUpdate {
            applied,
            total_samples_seen: self.total_samples_seen,
        })
    }

    /// Resets the smoothed state of every learner.
    pub fn reset_smoothed_gradients(&mut self) {
        for learner in &mut self.learners {
            learner.reset_smoothed_gradients();
        }
    }
}
