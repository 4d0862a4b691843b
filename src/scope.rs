// src/scope.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity of a civic issue. Serialized as its numeric level (1..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScopeLevel {
    /// Neighbourhood / street level.
    Local = 1,
    /// City or state.
    Regional = 2,
    National = 3,
}

impl ScopeLevel {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ScopeLevel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ScopeLevel::Local),
            2 => Ok(ScopeLevel::Regional),
            3 => Ok(ScopeLevel::National),
            other => Err(format!("invalid scope level {other} (expected 1, 2 or 3)")),
        }
    }
}

impl From<ScopeLevel> for u8 {
    fn from(s: ScopeLevel) -> Self {
        s.level()
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeLevel::Local => "local",
            ScopeLevel::Regional => "regional",
            ScopeLevel::National => "national",
        };
        f.write_str(name)
    }
}

/// Accepts the level number or its name ("1" / "local", ...).
impl FromStr for ScopeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "local" => Ok(ScopeLevel::Local),
            "2" | "regional" => Ok(ScopeLevel::Regional),
            "3" | "national" => Ok(ScopeLevel::National),
            other => Err(format!("unknown scope {other:?} (expected local, regional or national)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_serde() {
        assert_eq!(serde_json::to_string(&ScopeLevel::Regional).unwrap(), "2");
        let s: ScopeLevel = serde_json::from_str("1").unwrap();
        assert_eq!(s, ScopeLevel::Local);
        assert!(serde_json::from_str::<ScopeLevel>("4").is_err());
    }

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("Regional".parse::<ScopeLevel>(), Ok(ScopeLevel::Regional));
        assert_eq!("1".parse::<ScopeLevel>(), Ok(ScopeLevel::Local));
        assert!("street".parse::<ScopeLevel>().is_err());
    }
}
