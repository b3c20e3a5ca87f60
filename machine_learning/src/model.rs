use ml_core::{
    DataType, Device, GradientValue, MinibatchInfo, MlErr, Parameter, Result, Tensor,
};
use ndarray::{Array1, ArrayView1, Ix1};
use rand::Rng;

use crate::{dataset::Batch, initialization::ParamInitSpec};

/// A linear regression model `y = x · weights + bias` trained on the squared error.
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: Parameter,
    bias: Parameter,
}

impl LinearModel {
    /// Creates a new `LinearModel`.
    ///
    /// # Arguments
    /// * `features` - The amount of inputs.
    /// * `init` - How the weights are initialized, the bias always starts at zero.
    /// * `rng` - The random number generator used by `init`.
    ///
    /// # Returns
    /// A new `LinearModel` or an error if `init` is invalid.
    pub fn new<R: Rng>(features: usize, init: &ParamInitSpec, rng: &mut R) -> Result<Self> {
        let weights = init.generate(&[features], Device::Cpu, rng)?;
        let bias = Tensor::zeros(&[1], DataType::Float, Device::Cpu);

        Ok(Self {
            weights: Parameter::new("weights", weights),
            bias: Parameter::new("bias", bias),
        })
    }

    /// The trainable parameters, weights first.
    pub fn parameters(&self) -> Vec<Parameter> {
        vec![self.weights.clone(), self.bias.clone()]
    }

    /// Predicts the target of every sample of `batch`.
    pub fn predict(&self, batch: &Batch) -> Result<Array1<f32>> {
        let weights = self.weights.value();
        let bias = self.bias.value().scalar_value().unwrap_or(0.) as f32;

        let predictions = batch.features.dot(&as_vector(&weights)?) + bias;
        Ok(predictions)
    }

    /// Computes the gradients and statistics of `batch`.
    ///
    /// Gradients, loss and criterion are sums over the samples. The loss is half the
    /// squared error, the criterion the absolute error.
    ///
    /// # Arguments
    /// * `batch` - The samples, possibly none.
    ///
    /// # Returns
    /// One gradient per parameter and the minibatch statistics.
    pub fn gradients(&self, batch: &Batch) -> Result<(Vec<GradientValue>, MinibatchInfo)> {
        let errors = self.predict(batch)? - &batch.targets;

        let loss = errors.iter().map(|e| 0.5 * e * e).sum::<f32>();
        let criterion = errors.iter().map(|e| e.abs()).sum::<f32>();

        let weights_grad = batch.features.t().dot(&errors);
        let bias_grad = errors.sum();

        let gradients = vec![
            GradientValue::new(
                self.weights.clone(),
                Tensor::from_f32(weights_grad.into_dyn(), Device::Cpu),
            ),
            GradientValue::new(
                self.bias.clone(),
                Tensor::scalar(f64::from(bias_grad), DataType::Float, Device::Cpu),
            ),
        ];

        let info = MinibatchInfo::new(
            batch.len(),
            Tensor::scalar(f64::from(loss), DataType::Float, Device::Cpu),
            Tensor::scalar(f64::from(criterion), DataType::Float, Device::Cpu),
        );

        Ok((gradients, info))
    }

    /// Copies the current weights and bias.
    pub fn snapshot(&self) -> (Vec<f64>, f64) {
        let bias = self.bias.value().scalar_value().unwrap_or(0.);
        (self.weights.value().values(), bias)
    }
}

fn as_vector(tensor: &Tensor) -> Result<ArrayView1<'_, f32>> {
    let array = tensor.as_f32().ok_or(MlErr::DataTypeMismatch {
        got: tensor.data_type(),
        expected: DataType::Float,
    })?;

    array
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| MlErr::ShapeMismatch {
            what: "linear model weights",
            got: tensor.shape().to_vec(),
            expected: vec![tensor.size()],
        })
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn model(weight: f32) -> LinearModel {
        let mut rng = StdRng::seed_from_u64(0);
        LinearModel::new(1, &ParamInitSpec::Constant { value: weight }, &mut rng).unwrap()
    }

    #[test]
    fn gradients_are_summed_over_the_batch() {
        let model = model(1.);
        let batch = Batch {
            features: array![[1.], [2.]],
            targets: array![0., 0.],
        };

        let (gradients, info) = model.gradients(&batch).unwrap();

        assert_eq!(gradients[0].gradient.values(), vec![5.]);
        assert_eq!(gradients[1].gradient.values(), vec![3.]);
        assert_eq!(info.number_of_samples, 2);
        assert_eq!(info.training_loss(), Some(2.5));
        assert_eq!(info.eval_criterion(), Some(3.));
    }

    #[test]
    fn empty_batch_has_zero_gradients() {
        let model = model(1.);
        let batch = Batch {
            features: ndarray::Array2::zeros((0, 1)),
            targets: Array1::zeros(0),
        };

        let (gradients, info) = model.gradients(&batch).unwrap();

        assert!(info.is_empty());
        assert!(gradients.iter().all(|g| g.gradient.values().iter().all(|&v| v == 0.)));
    }
}
