use ml_core::{DataType, Device, GradientValue, MinibatchInfo, Tensor};

use crate::{DistributedErr, Result};

/// The values a worker contributes to one aggregation round.
///
/// The collective is positional, so the order of the contributed tensors is
/// fixed here for every worker: the gradients in aggregation order, the
/// evaluation criterion, the training loss and finally the sample count as a
/// `Double` scalar on the host.
pub struct AggregationPayload<'a> {
    gradients: Vec<&'a mut Tensor>,
    eval_criterion: &'a mut Tensor,
    training_loss: &'a mut Tensor,
    sample_count: Tensor,
}

impl<'a> AggregationPayload<'a> {
    /// Creates a new `AggregationPayload` borrowing the round's values.
    ///
    /// # Arguments
    /// * `gradients` - The gradients, already in aggregation order.
    /// * `info` - The round's statistics, both loss and criterion must be present.
    ///
    /// # Returns
    /// A new `AggregationPayload` or `MissingStatistic` if a statistic is absent.
    pub fn new(gradients: &'a mut [GradientValue], info: &'a mut MinibatchInfo) -> Result<Self> {
        let MinibatchInfo {
            number_of_samples,
            training_loss_value,
            eval_criterion_value,
            ..
        } = info;

        let eval_criterion = eval_criterion_value
            .as_mut()
            .ok_or(DistributedErr::MissingStatistic {
                which: "evaluation criterion",
            })?;
        let training_loss = training_loss_value
            .as_mut()
            .ok_or(DistributedErr::MissingStatistic {
                which: "training loss",
            })?;

        Ok(Self {
            gradients: gradients.iter_mut().map(|gv| &mut gv.gradient).collect(),
            eval_criterion,
            training_loss,
            sample_count: Tensor::scalar(*number_of_samples as f64, DataType::Double, Device::Cpu),
        })
    }

    /// Every contributed tensor in aggregation order.
    pub fn values(&mut self) -> Vec<&mut Tensor> {
        let mut values: Vec<&mut Tensor> = self.gradients.iter_mut().map(|g| &mut **g).collect();
        values.push(&mut *self.eval_criterion);
        values.push(&mut *self.training_loss);
        values.push(&mut self.sample_count);
        values
    }

    /// The gradient tensors only.
    pub fn gradients_mut(&mut self) -> &mut [&'a mut Tensor] {
        &mut self.gradients
    }

    /// The criterion, the loss and the sample count, in aggregation order.
    pub fn statistics_mut(&mut self) -> [&mut Tensor; 3] {
        [
            &mut *self.eval_criterion,
            &mut *self.training_loss,
            &mut self.sample_count,
        ]
    }

    /// Reads the sample count back as an integer.
    ///
    /// # Returns
    /// `InvalidSampleCount` if the value is negative, not finite or fractional.
    pub fn aggregated_sample_count(&self) -> Result<usize> {
        let count = self.sample_count.scalar_value().unwrap_or(f64::NAN);

        if !count.is_finite() || count < 0. || count.fract() != 0. {
            return Err(DistributedErr::InvalidSampleCount(count));
        }

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{gradient, minibatch, param};

    #[test]
    fn values_follow_the_fixed_order() {
        let (a, b) = (param("a", &[0.]), param("b", &[0., 0.]));
        let mut gradients = vec![gradient(&a, &[1.]), gradient(&b, &[2., 3.])];
        let mut info = minibatch(7, 4., 5.);

        let mut payload = AggregationPayload::new(&mut gradients, &mut info).unwrap();
        let values: Vec<Vec<f64>> = payload.values().iter().map(|v| v.values()).collect();

        assert_eq!(
            values,
            vec![vec![1.], vec![2., 3.], vec![5.], vec![4.], vec![7.]]
        );

        let count = payload.statistics_mut()[2].clone();
        assert_eq!(count.data_type(), DataType::Double);
        assert_eq!(count.device(), Device::Cpu);
        assert_eq!(count.shape(), &[1]);
    }

    #[test]
    fn missing_statistic_is_reported() {
        let mut info = MinibatchInfo {
            number_of_samples: 1,
            ..Default::default()
        };

        let err = AggregationPayload::new(&mut [], &mut info).err().unwrap();
        assert_eq!(
            err,
            DistributedErr::MissingStatistic {
                which: "evaluation criterion"
            }
        );
    }

    #[test]
    fn fractional_sample_count_is_rejected() {
        let mut info = minibatch(2, 0., 0.);
        let mut payload = AggregationPayload::new(&mut [], &mut info).unwrap();

        assert_eq!(payload.aggregated_sample_count(), Ok(2));

        payload.statistics_mut()[2].fill(2.5);
        assert_eq!(
            payload.aggregated_sample_count(),
            Err(DistributedErr::InvalidSampleCount(2.5))
        );
    }
}
