use std::{
    error::Error,
    fmt::{self, Display},
};

use crate::DataType;

/// The result type used across the core machine learning types.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The core machine learning error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    DataTypeMismatch {
        got: DataType,
        expected: DataType,
    },
    DuplicateParameter {
        name: String,
    },
    MissingGradient {
        name: String,
    },
    EmptyLearners,
    InvalidHyperParameter {
        name: &'static str,
        value: f64,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch for {what}: got {got}, expected {expected}"),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got:?}, expected {expected:?}"
            ),
            MlErr::DataTypeMismatch { got, expected } => {
                write!(f, "data type mismatch: got {got:?}, expected {expected:?}")
            }
            MlErr::DuplicateParameter { name } => {
                write!(f, "parameter '{name}' is handled by more than one learner")
            }
            MlErr::MissingGradient { name } => {
                write!(f, "no gradient was provided for parameter '{name}'")
            }
            MlErr::EmptyLearners => f.write_str("at least one learner with parameters is required"),
            MlErr::InvalidHyperParameter { name, value } => {
                write!(f, "invalid value {value} for hyperparameter '{name}'")
            }
        }
    }
}

impl Error for MlErr {}
