use std::ops::Range;

use ml_core::{MlErr, Result};
use ndarray::{Array1, Array2, Axis, s};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// A set of samples for a single-output regression task.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f32>,
    targets: Array1<f32>,
}

/// A contiguous group of samples taken from a `Dataset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub features: Array2<f32>,
    pub targets: Array1<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `features` - One row per sample.
    /// * `targets` - One target per sample.
    ///
    /// # Returns
    /// A new `Dataset` or a `SizeMismatch` error if the sample counts differ.
    pub fn new(features: Array2<f32>, targets: Array1<f32>) -> Result<Self> {
        if features.nrows() != targets.len() {
            return Err(MlErr::SizeMismatch {
                what: "dataset targets",
                got: targets.len(),
                expected: features.nrows(),
            });
        }

        Ok(Self { features, targets })
    }

    /// Creates a dataset from rows whose last value is the target.
    ///
    /// # Arguments
    /// * `features` - The amount of feature columns.
    /// * `rows` - The samples, each with `features + 1` values.
    ///
    /// # Returns
    /// A new `Dataset` or a `SizeMismatch` error if a row has the wrong length.
    pub fn from_rows(features: usize, rows: &[Vec<f32>]) -> Result<Self> {
        let mut flat = Vec::with_capacity(rows.len() * features);
        let mut targets = Vec::with_capacity(rows.len());

        for row in rows {
            let Some((&target, values)) = row.split_last().filter(|_| row.len() == features + 1)
            else {
                return Err(MlErr::SizeMismatch {
                    what: "dataset row",
                    got: row.len(),
                    expected: features + 1,
                });
            };

            flat.extend_from_slice(values);
            targets.push(target);
        }

        let features = Array2::from_shape_vec((rows.len(), features), flat).map_err(|_| {
            MlErr::SizeMismatch {
                what: "dataset features",
                got: rows.len() * features,
                expected: rows.len() * features,
            }
        })?;

        Self::new(features, Array1::from_vec(targets))
    }

    /// Generates samples of a noisy linear relation `y = x · weights + bias + noise`.
    ///
    /// # Arguments
    /// * `samples` - The amount of samples.
    /// * `weights` - The true weights, one per feature.
    /// * `bias` - The true bias.
    /// * `noise` - The standard deviation of the gaussian noise added to the targets.
    /// * `rng` - The random number generator to sample from.
    ///
    /// # Returns
    /// A new `Dataset` or an error if `noise` is not a valid standard deviation.
    pub fn synthetic_linear<R: Rng>(
        samples: usize,
        weights: &[f32],
        bias: f32,
        noise: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let noise = Normal::new(0., noise).map_err(|_| MlErr::InvalidHyperParameter {
            name: "noise",
            value: f64::from(noise),
        })?;
        let inputs = Uniform::new_inclusive(-1f32, 1.).map_err(|_| MlErr::InvalidHyperParameter {
            name: "inputs",
            value: 1.,
        })?;

        let features = Array2::from_shape_simple_fn((samples, weights.len()), || inputs.sample(rng));
        let true_weights = Array1::from_vec(weights.to_vec());

        let mut targets = features.dot(&true_weights);
        targets.mapv_inplace(|y| y + bias + noise.sample(rng));

        Self::new(features, targets)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The amount of features per sample.
    pub fn features(&self) -> usize {
        self.features.ncols()
    }

    /// Takes every `workers`-th sample starting at `rank`.
    ///
    /// # Arguments
    /// * `workers` - The amount of shards.
    /// * `rank` - The shard to take.
    ///
    /// # Returns
    /// The samples of the shard, possibly none.
    pub fn shard(&self, workers: usize, rank: usize) -> Dataset {
        let indices: Vec<usize> = (rank..self.len()).step_by(workers.max(1)).collect();

        Dataset {
            features: self.features.select(Axis(0), &indices),
            targets: self.targets.select(Axis(0), &indices),
        }
    }

    /// Copies the samples in `range`, clamped to the dataset's length.
    pub fn batch(&self, range: Range<usize>) -> Batch {
        let end = range.end.min(self.len());
        let start = range.start.min(end);

        Batch {
            features: self.features.slice(s![start..end, ..]).to_owned(),
            targets: self.targets.slice(s![start..end]).to_owned(),
        }
    }
}
