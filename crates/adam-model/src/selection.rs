use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeriveError;

/// Which extreme of the candidate pool wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Earliest qualifying value.
    First,
    /// Latest qualifying value.
    #[default]
    Last,
}

impl Selection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Selection {
    type Err = DeriveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            _ => Err(DeriveError::InvalidSelection(value.to_string())),
        }
    }
}
