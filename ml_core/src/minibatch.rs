use crate::Tensor;

/// Per-round metadata describing a worker's local minibatch.
///
/// Distributed learners rewrite the statistics in place with cross-worker sums, so
/// after an update the caller observes the aggregated values.
#[derive(Debug, Clone, Default)]
pub struct MinibatchInfo {
    pub at_end_of_data: bool,
    pub at_end_of_sweep: bool,
    pub number_of_samples: usize,
    pub training_loss_value: Option<Tensor>,
    pub eval_criterion_value: Option<Tensor>,
}

impl MinibatchInfo {
    /// Creates a new `MinibatchInfo`.
    ///
    /// # Arguments
    /// * `number_of_samples` - The amount of samples in the minibatch.
    /// * `training_loss_value` - The summed training loss of the minibatch.
    /// * `eval_criterion_value` - The summed evaluation criterion of the minibatch.
    ///
    /// # Returns
    /// A new `MinibatchInfo` instance not flagged as end of sweep nor end of data.
    pub fn new(
        number_of_samples: usize,
        training_loss_value: Tensor,
        eval_criterion_value: Tensor,
    ) -> Self {
        Self {
            at_end_of_data: false,
            at_end_of_sweep: false,
            number_of_samples,
            training_loss_value: Some(training_loss_value),
            eval_criterion_value: Some(eval_criterion_value),
        }
    }

    /// Returns `true` when the round carried no samples.
    pub fn is_empty(&self) -> bool {
        self.number_of_samples == 0
    }

    pub fn training_loss(&self) -> Option<f64> {
        self.training_loss_value
            .as_ref()
            .and_then(Tensor::scalar_value)
    }

    pub fn eval_criterion(&self) -> Option<f64> {
        self.eval_criterion_value
            .as_ref()
            .and_then(Tensor::scalar_value)
    }

    pub fn with_end_of_sweep(mut self, at_end_of_sweep: bool) -> Self {
        self.at_end_of_sweep = at_end_of_sweep;
        self
    }

    pub fn with_end_of_data(mut self, at_end_of_data: bool) -> Self {
        self.at_end_of_data = at_end_of_data;
        self
    }
}
