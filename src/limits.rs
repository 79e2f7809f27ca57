//! Limits for schema checking
//!
//! Every recursive traversal in the checker is bounded twice: by a visited
//! set keyed on stable identifiers, and by the depth limit configured here.
//! The limits keep pathological raw models from exhausting the stack.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum depth of any recursive traversal (particle trees, derivation
    /// chains, attribute-group expansion)
    pub max_depth: usize,

    /// Maximum size of a first/last leaf set collected for UPA
    pub max_leaves: usize,

    /// Maximum number of diagnostics to keep (0 = unlimited)
    pub max_errors: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_leaves: 10_000,
            max_errors: 0,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_depth: 64,
            max_leaves: 1_000,
            max_errors: 100,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_depth: 4_096,
            max_leaves: 1_000_000,
            max_errors: 0,
        }
    }

    /// Check if a traversal depth is within limits
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            Err(Error::LimitExceeded(format!(
                "traversal depth {} exceeds maximum {}",
                depth, self.max_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a leaf-set size is within limits
    pub fn check_leaves(&self, count: usize) -> Result<()> {
        if count > self.max_leaves {
            Err(Error::LimitExceeded(format!(
                "leaf set of {} particles exceeds maximum {}",
                count, self.max_leaves
            )))
        } else {
            Ok(())
        }
    }

    /// Whether another diagnostic may be recorded
    pub fn accepts_error(&self, recorded: usize) -> bool {
        self.max_errors == 0 || recorded < self.max_errors
    }
}
