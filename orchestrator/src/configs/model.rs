use machine_learning::initialization::ParamInitSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// `y = x · weights + bias`, the bias always starts at zero.
    Linear {
        features: usize,
        #[serde(default)]
        init: ParamInitSpec,
    },
}

impl ModelConfig {
    pub fn features(&self) -> usize {
        match self {
            ModelConfig::Linear { features, .. } => *features,
        }
    }
}
