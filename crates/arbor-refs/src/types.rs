//! Core reference type.

use std::fmt;
use std::str::FromStr;

use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::RefError;

/// Prefix that marks a symbolic reference in its text form.
pub const SYMREF_PREFIX: &str = "ref: ";

/// A named reference's value: either an object ID or another reference name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ref {
    /// Points straight at an object (normally a commit).
    Direct(ObjectId),
    /// Points at another reference by its full name.
    Symbolic(String),
}

impl Ref {
    /// The object this ref points at, if it is direct.
    pub fn target_id(&self) -> Option<ObjectId> {
        match self {
            Ref::Direct(id) => Some(*id),
            Ref::Symbolic(_) => None,
        }
    }

    /// The ref name this ref points at, if it is symbolic.
    pub fn symbolic_target(&self) -> Option<&str> {
        match self {
            Ref::Direct(_) => None,
            Ref::Symbolic(name) => Some(name),
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Ref::Symbolic(_))
    }
}

/// Text form: `<hex>` or `ref: <name>`.
impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Direct(id) => write!(f, "{id}"),
            Ref::Symbolic(name) => write!(f, "{SYMREF_PREFIX}{name}"),
        }
    }
}

impl FromStr for Ref {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(target) = s.strip_prefix(SYMREF_PREFIX) {
            let target = target.trim();
            if target.is_empty() {
                return Err(RefError::Corrupt {
                    name: s.to_string(),
                    reason: "empty symbolic target".into(),
                });
            }
            return Ok(Ref::Symbolic(target.to_string()));
        }
        ObjectId::from_hex(s)
            .map(Ref::Direct)
            .map_err(|e| RefError::Corrupt {
                name: s.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ObjectId {
        ObjectId::from_hash([0xab; 32])
    }

    #[test]
    fn text_form_roundtrip() {
        for r in [Ref::Direct(id()), Ref::Symbolic("refs/heads/main".into())] {
            let parsed: Ref = r.to_string().parse().unwrap();
            assert_eq!(parsed, r);
        }
    }

    #[test]
    fn parse_tolerates_trailing_newline() {
        let parsed: Ref = "ref: refs/heads/main\n".parse().unwrap();
        assert_eq!(parsed, Ref::Symbolic("refs/heads/main".into()));
        let parsed: Ref = format!("{}\n", id()).parse().unwrap();
        assert_eq!(parsed.target_id(), Some(id()));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!("nope".parse::<Ref>(), Err(RefError::Corrupt { .. })));
        assert!(matches!("ref: ".parse::<Ref>(), Err(RefError::Corrupt { .. })));
    }

    #[test]
    fn accessors() {
        let sym = Ref::Symbolic("refs/heads/dev".into());
        assert!(sym.is_symbolic());
        assert_eq!(sym.symbolic_target(), Some("refs/heads/dev"));
        assert_eq!(sym.target_id(), None);
        assert_eq!(Ref::Direct(id()).symbolic_target(), None);
    }
}
