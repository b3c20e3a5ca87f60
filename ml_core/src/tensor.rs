use ndarray::{ArrayD, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use crate::{Device, MlErr, Result};

/// Amount of elements from which element-wise operations are split across the rayon pool.
const PARALLEL_THRESHOLD: usize = 1 << 14;

/// The element type of a `Tensor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Float,
    Double,
}

#[derive(Debug, Clone, PartialEq)]
enum Storage {
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
}

/// A dense n-dimensional array of `f32` or `f64` values tagged with the device it belongs to.
///
/// Element-wise operations between tensors require the same shape and data type, the
/// device descriptor of the left-hand side is always kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: Storage,
    device: Device,
}

impl Tensor {
    /// Creates a new zero-filled `Tensor`.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the tensor.
    /// * `data_type` - The element type.
    /// * `device` - The device the tensor belongs to.
    ///
    /// # Returns
    /// A new `Tensor` instance.
    pub fn zeros(shape: &[usize], data_type: DataType, device: Device) -> Self {
        let storage = match data_type {
            DataType::Float => Storage::Float(ArrayD::zeros(IxDyn(shape))),
            DataType::Double => Storage::Double(ArrayD::zeros(IxDyn(shape))),
        };

        Self { storage, device }
    }

    /// Creates a single element tensor of shape `[1]`.
    ///
    /// # Arguments
    /// * `value` - The value of the only element.
    /// * `data_type` - The element type.
    /// * `device` - The device the tensor belongs to.
    ///
    /// # Returns
    /// A new `Tensor` instance.
    pub fn scalar(value: f64, data_type: DataType, device: Device) -> Self {
        let storage = match data_type {
            DataType::Float => Storage::Float(ArrayD::from_elem(IxDyn(&[1]), value as f32)),
            DataType::Double => Storage::Double(ArrayD::from_elem(IxDyn(&[1]), value)),
        };

        Self { storage, device }
    }

    /// Wraps an existing `f32` array.
    pub fn from_f32(array: ArrayD<f32>, device: Device) -> Self {
        Self {
            storage: Storage::Float(array),
            device,
        }
    }

    /// Wraps an existing `f64` array.
    pub fn from_f64(array: ArrayD<f64>, device: Device) -> Self {
        Self {
            storage: Storage::Double(array),
            device,
        }
    }

    /// Creates a `Float` tensor from a flat vector in row-major order.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the tensor.
    /// * `values` - The values, its length must match the product of `shape`.
    /// * `device` - The device the tensor belongs to.
    ///
    /// # Returns
    /// A new `Tensor` or a `SizeMismatch` error.
    pub fn from_f32_vec(shape: &[usize], values: Vec<f32>, device: Device) -> Result<Self> {
        let got = values.len();
        let array = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| {
            MlErr::SizeMismatch {
                what: "tensor values",
                got,
                expected: shape.iter().product(),
            }
        })?;

        Ok(Self::from_f32(array, device))
    }

    /// Creates a `Double` tensor from a flat vector in row-major order.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the tensor.
    /// * `values` - The values, its length must match the product of `shape`.
    /// * `device` - The device the tensor belongs to.
    ///
    /// # Returns
    /// A new `Tensor` or a `SizeMismatch` error.
    pub fn from_f64_vec(shape: &[usize], values: Vec<f64>, device: Device) -> Result<Self> {
        let got = values.len();
        let array = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| {
            MlErr::SizeMismatch {
                what: "tensor values",
                got,
                expected: shape.iter().product(),
            }
        })?;

        Ok(Self::from_f64(array, device))
    }

    /// Creates a zero-filled tensor with the same shape, data type and device as `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape(), self.data_type(), self.device)
    }

    pub fn shape(&self) -> &[usize] {
        match &self.storage {
            Storage::Float(array) => array.shape(),
            Storage::Double(array) => array.shape(),
        }
    }

    /// Returns the total amount of elements.
    pub fn size(&self) -> usize {
        match &self.storage {
            Storage::Float(array) => array.len(),
            Storage::Double(array) => array.len(),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self.storage {
            Storage::Float(_) => DataType::Float,
            Storage::Double(_) => DataType::Double,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match &self.storage {
            Storage::Float(array) => Some(array),
            Storage::Double(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match &self.storage {
            Storage::Double(array) => Some(array),
            Storage::Float(_) => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut ArrayD<f32>> {
        match &mut self.storage {
            Storage::Float(array) => Some(array),
            Storage::Double(_) => None,
        }
    }

    pub fn as_f64_mut(&mut self) -> Option<&mut ArrayD<f64>> {
        match &mut self.storage {
            Storage::Double(array) => Some(array),
            Storage::Float(_) => None,
        }
    }

    /// Returns the first element, which is the value of scalar tensors.
    pub fn scalar_value(&self) -> Option<f64> {
        match &self.storage {
            Storage::Float(array) => array.iter().next().map(|&v| f64::from(v)),
            Storage::Double(array) => array.iter().next().copied(),
        }
    }

    /// Copies every element, in logical order, widened to `f64`.
    pub fn values(&self) -> Vec<f64> {
        match &self.storage {
            Storage::Float(array) => array.iter().map(|&v| f64::from(v)).collect(),
            Storage::Double(array) => array.iter().copied().collect(),
        }
    }

    /// Overwrites every element, in logical order, with `values`.
    ///
    /// # Arguments
    /// * `values` - The new values, narrowed to the tensor's data type.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `values` doesn't hold exactly `size()` elements.
    pub fn assign_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "assigned values",
                got: values.len(),
                expected: self.size(),
            });
        }

        match &mut self.storage {
            Storage::Float(array) => array
                .iter_mut()
                .zip(values)
                .for_each(|(x, &v)| *x = v as f32),
            Storage::Double(array) => array
                .iter_mut()
                .zip(values)
                .for_each(|(x, &v)| *x = v),
        }

        Ok(())
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: f64) {
        match &mut self.storage {
            Storage::Float(array) => array.fill(value as f32),
            Storage::Double(array) => array.fill(value),
        }
    }

    /// Multiplies every element by `factor`.
    pub fn scale(&mut self, factor: f64) {
        match &mut self.storage {
            Storage::Float(array) => {
                let factor = factor as f32;
                array.mapv_inplace(|x| x * factor);
            }
            Storage::Double(array) => array.mapv_inplace(|x| x * factor),
        }
    }

    /// Checks that `other` has the same shape and data type as `self`.
    ///
    /// # Arguments
    /// * `other` - The tensor to compare against.
    ///
    /// # Returns
    /// A `DataTypeMismatch` or `ShapeMismatch` error if they differ.
    pub fn check_compatible(&self, other: &Tensor) -> Result<()> {
        if self.data_type() != other.data_type() {
            return Err(MlErr::DataTypeMismatch {
                got: other.data_type(),
                expected: self.data_type(),
            });
        }

        if self.shape() != other.shape() {
            return Err(MlErr::ShapeMismatch {
                what: "tensor",
                got: other.shape().to_vec(),
                expected: self.shape().to_vec(),
            });
        }

        Ok(())
    }

    /// Combines every element of `self` with the element of `other` at the same position.
    ///
    /// The arithmetic is done in `f64` and narrowed back, which is exact for the
    /// basic operations on `f32` values.
    ///
    /// # Arguments
    /// * `other` - A tensor with the same shape and data type.
    /// * `f` - Receives `(self, other)` and returns the new value for `self`.
    ///
    /// # Returns
    /// An error if the tensors are not compatible.
    pub fn zip_mut_with<F>(&mut self, other: &Tensor, f: F) -> Result<()>
    where
        F: Fn(f64, f64) -> f64 + Send + Sync,
    {
        self.check_compatible(other)?;
        let (got, expected) = (other.data_type(), self.data_type());

        match (&mut self.storage, &other.storage) {
            (Storage::Float(lhs), Storage::Float(rhs)) => {
                zip_apply(lhs, rhs, |x, y| *x = f(f64::from(*x), f64::from(y)) as f32)
            }
            (Storage::Double(lhs), Storage::Double(rhs)) => {
                zip_apply(lhs, rhs, |x, y| *x = f(*x, y))
            }
            _ => return Err(MlErr::DataTypeMismatch { got, expected }),
        }

        Ok(())
    }

    /// Element-wise `self += other`.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        self.zip_mut_with(other, |x, y| x + y)
    }

    /// Element-wise `self += alpha * other`.
    pub fn scaled_add(&mut self, alpha: f64, other: &Tensor) -> Result<()> {
        self.zip_mut_with(other, |x, y| x + alpha * y)
    }

    /// Copies the values of `other` into `self`, keeping `self`'s device.
    pub fn assign(&mut self, other: &Tensor) -> Result<()> {
        self.check_compatible(other)?;
        self.storage = other.storage.clone();
        Ok(())
    }
}

fn zip_apply<A, F>(lhs: &mut ArrayD<A>, rhs: &ArrayD<A>, f: F)
where
    A: Copy + Send + Sync,
    F: Fn(&mut A, A) + Send + Sync,
{
    let parallel = lhs.len() >= PARALLEL_THRESHOLD;
    let zip = Zip::from(lhs).and(rhs);

    if parallel {
        zip.par_for_each(|x, &y| f(x, y));
    } else {
        zip.for_each(|x, &y| f(x, y));
    }
}
