//! Following symbolic reference chains down to an object ID.

use arbor_types::ObjectId;

use crate::error::{RefError, Result};
use crate::traits::RefStore;
use crate::types::Ref;

/// The conventional name of the current-checkout reference.
pub const HEAD: &str = "HEAD";

/// How many symbolic hops are followed before giving up.
pub const MAX_SYMREF_DEPTH: usize = 5;

/// The end of a symbolic chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRef {
    /// Name of the last reference in the chain (the one holding, or about to
    /// hold, a direct value).
    pub name: String,
    /// Its target, or `None` if that reference does not exist yet.
    pub target: Option<ObjectId>,
}

/// Follow `name` through symbolic indirection to its concrete reference.
///
/// A missing reference at the end of the chain is not an error: an unborn
/// branch (e.g. `HEAD -> refs/heads/main` before the first commit) peels to
/// `ResolvedRef { name: "refs/heads/main", target: None }`.
pub fn peel_ref<S: RefStore + ?Sized>(store: &S, name: &str) -> Result<ResolvedRef> {
    let mut current = name.to_string();
    let mut seen = vec![current.clone()];
    loop {
        match store.read_ref(&current)? {
            None => {
                return Ok(ResolvedRef {
                    name: current,
                    target: None,
                })
            }
            Some(Ref::Direct(id)) => {
                return Ok(ResolvedRef {
                    name: current,
                    target: Some(id),
                })
            }
            Some(Ref::Symbolic(next)) => {
                if seen.contains(&next) || seen.len() > MAX_SYMREF_DEPTH {
                    return Err(RefError::SymbolicLoop {
                        name: name.to_string(),
                        depth: seen.len(),
                    });
                }
                seen.push(next.clone());
                current = next;
            }
        }
    }
}

/// Resolve `name` to the object ID at the end of its chain.
///
/// Fails with [`RefError::NotFound`] naming the missing link if the chain
/// ends at a reference that does not exist.
pub fn resolve_ref<S: RefStore + ?Sized>(store: &S, name: &str) -> Result<ObjectId> {
    let resolved = peel_ref(store, name)?;
    resolved
        .target
        .ok_or(RefError::NotFound {
            name: resolved.name,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRefStore;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_hash([byte; 32])
    }

    fn sym(target: &str) -> Ref {
        Ref::Symbolic(target.to_string())
    }

    #[test]
    fn direct_ref_resolves_to_itself() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/heads/main", &Ref::Direct(id(1))).unwrap();
        assert_eq!(resolve_ref(&store, "refs/heads/main").unwrap(), id(1));
    }

    #[test]
    fn symbolic_chain_resolves() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/heads/main", &Ref::Direct(id(1))).unwrap();
        store.write_ref("refs/heads/alias", &sym("refs/heads/main")).unwrap();
        store.write_ref(HEAD, &sym("refs/heads/alias")).unwrap();

        let resolved = peel_ref(&store, HEAD).unwrap();
        assert_eq!(resolved.name, "refs/heads/main");
        assert_eq!(resolved.target, Some(id(1)));
        assert_eq!(resolve_ref(&store, HEAD).unwrap(), id(1));
    }

    #[test]
    fn unborn_branch_peels_without_target() {
        let store = InMemoryRefStore::new();
        store.write_ref(HEAD, &sym("refs/heads/main")).unwrap();
        let resolved = peel_ref(&store, HEAD).unwrap();
        assert_eq!(resolved.name, "refs/heads/main");
        assert_eq!(resolved.target, None);

        match resolve_ref(&store, HEAD) {
            Err(RefError::NotFound { name }) => assert_eq!(name, "refs/heads/main"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn cycle_is_detected() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/heads/a", &sym("refs/heads/b")).unwrap();
        store.write_ref("refs/heads/b", &sym("refs/heads/a")).unwrap();
        assert!(matches!(
            resolve_ref(&store, "refs/heads/a"),
            Err(RefError::SymbolicLoop { .. })
        ));
    }

    #[test]
    fn self_reference_is_a_loop() {
        let store = InMemoryRefStore::new();
        store.write_ref(HEAD, &sym(HEAD)).unwrap();
        assert!(matches!(
            peel_ref(&store, HEAD),
            Err(RefError::SymbolicLoop { .. })
        ));
    }

    #[test]
    fn overlong_chain_is_rejected() {
        let store = InMemoryRefStore::new();
        for i in 0..=MAX_SYMREF_DEPTH + 1 {
            store
                .write_ref(&format!("refs/chain/{i}"), &sym(&format!("refs/chain/{}", i + 1)))
                .unwrap();
        }
        assert!(matches!(
            peel_ref(&store, "refs/chain/0"),
            Err(RefError::SymbolicLoop { .. })
        ));
    }

    #[test]
    fn chain_at_max_depth_resolves() {
        let store = InMemoryRefStore::new();
        for i in 0..MAX_SYMREF_DEPTH {
            store
                .write_ref(&format!("refs/chain/{i}"), &sym(&format!("refs/chain/{}", i + 1)))
                .unwrap();
        }
        store
            .write_ref(&format!("refs/chain/{MAX_SYMREF_DEPTH}"), &Ref::Direct(id(4)))
            .unwrap();
        assert_eq!(resolve_ref(&store, "refs/chain/0").unwrap(), id(4));
    }
}
