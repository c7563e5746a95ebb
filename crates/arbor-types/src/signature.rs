use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity and wall-clock time attached to a commit (author or committer).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Human-readable name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
}

impl Signature {
    /// Create a signature with an explicit timestamp.
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp_ms,
        }
    }

    /// Create a signature stamped with the current wall-clock time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::new(name, email, timestamp_ms)
    }

    /// Same identity, re-stamped with the current time.
    pub fn restamped(&self) -> Self {
        Self::now(self.name.clone(), self.email.clone())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Parses `Name <email>`; the timestamp is set to now.
impl FromStr for Signature {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = s
            .split_once('<')
            .ok_or_else(|| TypeError::InvalidSignature(s.to_string()))?;
        let email = rest
            .strip_suffix('>')
            .ok_or_else(|| TypeError::InvalidSignature(s.to_string()))?;
        if email.contains('<') || email.contains('>') {
            return Err(TypeError::InvalidSignature(s.to_string()));
        }
        Ok(Self::now(name.trim(), email.trim()))
    }
}
