//! Per-target streaming parameters

use serde::{Deserialize, Serialize};
use std::fmt;

/// How refinement advances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefinementMode {
    /// Only explicit refine/coarsen commands change the depth
    #[default]
    Manual,
    /// Every tick refines one level until complete
    Automatic,
}

impl fmt::Display for RefinementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefinementMode::Manual => f.write_str("manual"),
            RefinementMode::Automatic => f.write_str("automatic"),
        }
    }
}

/// Streaming parameters of one (view, representation) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingState {
    /// Refine and coarsen are ignored while locked
    pub locked: bool,
    /// Depth cap; `-1` is unbounded
    pub max_depth: i32,
    /// Refinement mode
    pub mode: RefinementMode,
}

impl StreamingState {
    /// Unlocked, unbounded, manual
    pub const fn new() -> Self {
        StreamingState {
            locked: false,
            max_depth: -1,
            mode: RefinementMode::Manual,
        }
    }

    /// Start from a configured depth cap
    pub const fn with_max_depth(max_depth: i32) -> Self {
        StreamingState {
            locked: false,
            max_depth,
            mode: RefinementMode::Manual,
        }
    }

    /// Depth cap as a limit; `None` when unbounded
    pub fn depth_limit(&self) -> Option<u32> {
        u32::try_from(self.max_depth).ok()
    }

    /// Whether refine and coarsen commands are accepted
    pub fn accepts_manual_commands(&self) -> bool {
        !self.locked && self.mode == RefinementMode::Manual
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::new()
    }
}
