//! Pipeline lifecycle state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state
///
/// `Unconfigured -> Configured -> Streaming`; `stop` returns to `Configured`,
/// `reset` returns any state to `Unconfigured`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Unconfigured,
    Configured,
    Streaming,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Unconfigured => "unconfigured",
            PipelineState::Configured => "configured",
            PipelineState::Streaming => "streaming",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
