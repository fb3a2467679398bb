use serde::{Deserialize, Serialize};

const fn default_float_tolerance() -> f64 {
    0.01
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DiffConfig {
    /// Numbers closer than this are treated as equal.
    #[serde(default = "default_float_tolerance")]
    pub float_tolerance: f64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            float_tolerance: default_float_tolerance(),
        }
    }
}
