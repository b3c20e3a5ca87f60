use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Describes where a tensor's values are meant to live.
///
/// Storage is always host memory, the descriptor only travels with the tensor so
/// collectives and learners can keep values on the device they came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Gpu(usize),
}

impl Device {
    /// Returns `true` if this is the host device.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Gpu(ordinal) => write!(f, "gpu:{ordinal}"),
        }
    }
}
