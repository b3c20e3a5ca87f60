use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{DataType, Device, Tensor};

static NEXT_UID: AtomicUsize = AtomicUsize::new(0);

struct ParameterInner {
    uid: usize,
    name: String,
    value: RwLock<Tensor>,
}

/// A named, trainable tensor shared between the model and the learners.
///
/// Cloning a `Parameter` clones the handle, not the value: every clone reads and
/// writes the same tensor. Two handles are equal iff they were cloned from the same
/// `Parameter::new` call.
#[derive(Clone)]
pub struct Parameter(Arc<ParameterInner>);

impl Parameter {
    /// Creates a new `Parameter`.
    ///
    /// # Arguments
    /// * `name` - A human readable name, used in logs and errors.
    /// * `value` - The initial value.
    ///
    /// # Returns
    /// A new `Parameter` instance with a process-unique identity.
    pub fn new(name: impl Into<String>, value: Tensor) -> Self {
        let inner = ParameterInner {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            value: RwLock::new(value),
        };

        Self(Arc::new(inner))
    }

    pub fn uid(&self) -> usize {
        self.0.uid
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Locks the value for reading.
    pub fn value(&self) -> RwLockReadGuard<'_, Tensor> {
        self.0.value.read()
    }

    /// Locks the value for writing.
    pub fn value_mut(&self) -> RwLockWriteGuard<'_, Tensor> {
        self.0.value.write()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.value().shape().to_vec()
    }

    pub fn data_type(&self) -> DataType {
        self.value().data_type()
    }

    pub fn device(&self) -> Device {
        self.value().device()
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.uid() == other.uid()
    }
}

impl Eq for Parameter {}

impl Hash for Parameter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid().hash(state);
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("uid", &self.uid())
            .field("name", &self.name())
            .field("shape", &self.shape())
            .finish()
    }
}

/// The gradient of a single parameter for one minibatch.
#[derive(Debug, Clone)]
pub struct GradientValue {
    pub parameter: Parameter,
    pub gradient: Tensor,
}

impl GradientValue {
    pub fn new(parameter: Parameter, gradient: Tensor) -> Self {
        Self {
            parameter,
            gradient,
        }
    }
}
