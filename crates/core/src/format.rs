//! Versioned response formats.
//!
//! A response format pairs the prompt template sent to the model with the section marker the
//! extractor splits the reply on. Both sides read the marker from here, so a template and its
//! parser cannot drift apart.

use crate::error::ConfigError;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// `Habits:` section header followed by blank-line separated habit blocks.
    #[default]
    V1,
    /// One `### Habit N: name` heading per habit.
    V2,
}

impl ResponseFormat {
    /// The literal text separating the general analysis from the habits.
    pub fn marker(&self) -> &'static str {
        match self {
            ResponseFormat::V1 => "Habits:",
            ResponseFormat::V2 => "### Habit",
        }
    }

    /// Whether every occurrence of the marker starts a new habit block.
    ///
    /// With `V1` the marker appears once and blocks are separated by blank lines.
    pub fn marker_delimits_blocks(&self) -> bool {
        matches!(self, ResponseFormat::V2)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::V1 => "v1",
            ResponseFormat::V2 => "v2",
        }
    }
}

impl FromStr for ResponseFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(ResponseFormat::V1),
            "v2" | "2" => Ok(ResponseFormat::V2),
            other => Err(ConfigError::InvalidValue {
                key: crate::constants::ENV_RESPONSE_FORMAT,
                message: format!("unknown response format {other:?} (expected v1 or v2)"),
            }),
        }
    }
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
