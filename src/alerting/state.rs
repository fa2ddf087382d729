use std::fmt;

use serde::{Deserialize, Serialize};

/// Alert state produced by an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    Ok,
    Warning,
    Critical,
    Pending,
    NoData,
}

impl AlertState {
    /// Whether this state ends a rule's evaluation cycle for the user
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertState::Ok | AlertState::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Ok => "OK",
            AlertState::Warning => "WARNING",
            AlertState::Critical => "CRITICAL",
            AlertState::Pending => "PENDING",
            AlertState::NoData => "NO_DATA",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(AlertState::Ok.is_terminal());
        assert!(AlertState::Critical.is_terminal());
        assert!(!AlertState::Pending.is_terminal());
        assert!(!AlertState::NoData.is_terminal());
        assert!(!AlertState::Warning.is_terminal());
    }

    #[test]
    fn test_serde_matches_display() {
        for state in [
            AlertState::Ok,
            AlertState::Warning,
            AlertState::Critical,
            AlertState::Pending,
            AlertState::NoData,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
    }
}
