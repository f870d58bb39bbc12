//! Terminal dimensions.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Dimensions of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl Dimensions {
    /// Create new dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Create dimensions, rejecting a zero row or column count.
    pub fn checked(rows: u16, cols: u16) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        Ok(Self { rows, cols })
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}
