use crate::{DistributedErr, Result};

/// Name of the capability providing the quantized and block momentum learners.
pub const PARALLEL_TRAINING: &str = "parallel-training";

/// The optional subsystems available to the learner constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub parallel_training: bool,
}

impl Capabilities {
    /// The capabilities compiled into this build.
    pub fn detect() -> Self {
        Self {
            parallel_training: cfg!(feature = "parallel-training"),
        }
    }

    /// This build's capabilities without the parallel training subsystem.
    pub fn without_parallel_training() -> Self {
        Self {
            parallel_training: false,
        }
    }

    /// Fails with `Unsupported` unless parallel training is available.
    ///
    /// # Arguments
    /// * `strategy` - The strategy being constructed, reported in the error.
    pub fn require_parallel_training(&self, strategy: &str) -> Result<()> {
        if self.parallel_training {
            return Ok(());
        }

        Err(DistributedErr::Unsupported {
            capability: PARALLEL_TRAINING,
            detail: format!("{strategy} is not supported in this build"),
        })
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capability_is_reported() {
        let err = Capabilities::without_parallel_training()
            .require_parallel_training("block momentum")
            .unwrap_err();

        assert_eq!(
            err,
            DistributedErr::Unsupported {
                capability: PARALLEL_TRAINING,
                detail: "block momentum is not supported in this build".into()
            }
        );
    }

    #[cfg(feature = "parallel-training")]
    #[test]
    fn default_build_has_parallel_training() {
        assert!(Capabilities::detect().require_parallel_training("x").is_ok());
    }
}
