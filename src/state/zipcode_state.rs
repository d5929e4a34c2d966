//! Per-postal-code crawl outcomes
//!
//! Every postal code in a run ends in exactly one of these states.

use std::fmt;

/// Final state of one postal code in a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZipcodeOutcome {
    /// At least one listing record was handed to the sink
    Populated,

    /// The region resolved but no listing record came out of it
    Empty,

    /// The region search returned no candidates for this postal code
    Unresolved,

    /// Retries were exhausted before any record was stored
    Blocked,
}

impl ZipcodeOutcome {
    /// Returns true if this postal code produced at least one record
    pub fn is_populated(&self) -> bool {
        matches!(self, Self::Populated)
    }

    /// Converts the outcome to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Populated => "populated",
            Self::Empty => "empty",
            Self::Unresolved => "unresolved",
            Self::Blocked => "blocked",
        }
    }

    /// Parses an outcome from its database string representation
    ///
    /// Returns None if the string doesn't match any known outcome.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "populated" => Some(Self::Populated),
            "empty" => Some(Self::Empty),
            "unresolved" => Some(Self::Unresolved),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// All outcomes, in reporting order
    pub fn all() -> [Self; 4] {
        [Self::Populated, Self::Empty, Self::Unresolved, Self::Blocked]
    }
}

impl fmt::Display for ZipcodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Populated => "Populated",
            Self::Empty => "Empty",
            Self::Unresolved => "Unresolved",
            Self::Blocked => "Blocked",
        };
        write!(f, "{}", s)
    }
}
