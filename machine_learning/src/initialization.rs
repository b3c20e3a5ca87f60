use ml_core::{Device, MlErr, Result, Tensor};
use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

/// The specification of how a parameter's initial values are generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamInitSpec {
    Constant { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
}

impl Default for ParamInitSpec {
    fn default() -> Self {
        Self::Constant { value: 0. }
    }
}

impl ParamInitSpec {
    /// Generates a `Float` tensor following this spec.
    ///
    /// # Arguments
    /// * `shape` - The shape of the generated tensor.
    /// * `device` - The device of the generated tensor.
    /// * `rng` - The random number generator to sample from.
    ///
    /// # Returns
    /// The generated tensor or an error if the distribution is invalid.
    pub fn generate<R: Rng>(&self, shape: &[usize], device: Device, rng: &mut R) -> Result<Tensor> {
        let array = match *self {
            ParamInitSpec::Constant { value } => ArrayD::from_elem(IxDyn(shape), value),
            ParamInitSpec::Uniform { low, high } => {
                let distribution = Uniform::new(low, high).map_err(|_| {
                    MlErr::InvalidHyperParameter {
                        name: "high",
                        value: f64::from(high),
                    }
                })?;
                sample(shape, &distribution, rng)
            }
            ParamInitSpec::Normal { mean, std_dev } => {
                let distribution = Normal::new(mean, std_dev).map_err(|_| {
                    MlErr::InvalidHyperParameter {
                        name: "std_dev",
                        value: f64::from(std_dev),
                    }
                })?;
                sample(shape, &distribution, rng)
            }
        };

        Ok(Tensor::from_f32(array, device))
    }
}

fn sample<D, R>(shape: &[usize], distribution: &D, rng: &mut R) -> ArrayD<f32>
where
    D: Distribution<f32>,
    R: Rng,
{
    ArrayD::from_shape_simple_fn(IxDyn(shape), || distribution.sample(rng))
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn constant_fills_every_value() {
        let mut rng = StdRng::seed_from_u64(0);
        let tensor = ParamInitSpec::Constant { value: 0.5 }
            .generate(&[2, 2], Device::Cpu, &mut rng)
            .unwrap();

        assert_eq!(tensor.values(), vec![0.5; 4]);
    }

    #[test]
    fn uniform_stays_in_range_and_is_seeded() {
        let spec = ParamInitSpec::Uniform { low: -1., high: 1. };

        let a = spec.generate(&[64], Device::Cpu, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = spec.generate(&[64], Device::Cpu, &mut StdRng::seed_from_u64(7)).unwrap();

        assert_eq!(a, b);
        assert!(a.values().iter().all(|v| (-1. ..1.).contains(v)));
    }

    #[test]
    fn empty_range_is_rejected() {
        let spec = ParamInitSpec::Uniform { low: 1., high: 1. };
        let mut rng = StdRng::seed_from_u64(0);

        assert!(spec.generate(&[1], Device::Cpu, &mut rng).is_err());
    }
}
