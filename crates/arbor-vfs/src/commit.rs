//! Writing commit objects and advancing a reference to them.

use arbor_refs::{peel_ref, Ref, RefError, RefStore};
use arbor_store::{CommitObject, ObjectStore, ObjectStoreExt};
use arbor_types::{ObjectId, Signature};
use tracing::debug;

use crate::config::VfsConfig;
use crate::error::{VfsError, VfsResult};
use crate::observer::Observer;

/// Result of a successful commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit: ObjectId,
    pub tree: ObjectId,
    /// Previous target of the reference; `None` for the first commit.
    pub parent: Option<ObjectId>,
    /// Concrete reference that was moved, after symbolic indirection.
    pub reference: String,
    /// Compare-and-set attempts used, at least 1.
    pub attempts: u32,
}

/// Creates a commit on a tree and moves a reference to it.
///
/// The reference is peeled to its concrete target, a commit whose single
/// parent is that target is written, and the concrete reference is
/// compare-and-set from the parent to the new commit. A lost race re-reads
/// the reference and tries again, up to `max_retries` extra times.
///
/// The commit object is persisted before the reference moves. If the process
/// dies in between, or every attempt loses, the commit stays in the store
/// unreferenced. It is content-addressed and harmless.
pub struct CommitBuilder<'a> {
    store: &'a dyn ObjectStore,
    refs: &'a dyn RefStore,
    reference: String,
    max_retries: u32,
    expected_parent: Option<Option<ObjectId>>,
}

impl<'a> CommitBuilder<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        refs: &'a dyn RefStore,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            store,
            refs,
            reference: reference.into(),
            max_retries: VfsConfig::default().max_ref_update_retries,
            expected_parent: None,
        }
    }

    /// Builder for `config.reference` with its retry policy. Does not pin
    /// the parent: callers that track a base commit add
    /// [`CommitBuilder::require_parent`] themselves.
    pub fn from_config(
        store: &'a dyn ObjectStore,
        refs: &'a dyn RefStore,
        config: &VfsConfig,
    ) -> Self {
        Self::new(store, refs, config.reference.clone()).max_retries(config.max_ref_update_retries)
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Fail with [`VfsError::StaleBase`] unless the reference still points at
    /// `parent` (`None`: still unborn).
    pub fn require_parent(mut self, parent: Option<ObjectId>) -> Self {
        self.expected_parent = Some(parent);
        self
    }

    pub fn commit<O: ?Sized + Observer>(
        &self,
        tree: ObjectId,
        message: &str,
        author: &Signature,
        observer: &O,
    ) -> VfsResult<CommitOutcome> {
        let attempts = self.max_retries + 1;
        let mut name = self.reference.clone();
        for attempt in 1..=attempts {
            let head = peel_ref(self.refs, &self.reference)?;
            name = head.name;
            if let Some(expected) = self.expected_parent {
                if head.target != expected {
                    return Err(VfsError::StaleBase {
                        name,
                        expected: describe(expected),
                        actual: describe(head.target),
                    });
                }
            }

            let commit = CommitObject {
                tree,
                parents: head.target.into_iter().collect(),
                author: author.clone(),
                committer: author.clone(),
                message: message.to_string(),
            };
            let id = self.store.write_commit(&commit)?;
            observer.commit_created(&id, &tree, head.target.as_ref());

            let expected = head.target.map(Ref::Direct);
            match self
                .refs
                .compare_and_swap(&name, expected.as_ref(), &Ref::Direct(id))
            {
                Ok(()) => {
                    observer.ref_updated(&name, head.target.as_ref(), &id);
                    return Ok(CommitOutcome {
                        commit: id,
                        tree,
                        parent: head.target,
                        reference: name,
                        attempts: attempt,
                    });
                }
                Err(RefError::Conflict { .. } | RefError::Locked { .. }) => {
                    debug!(name = %name, attempt, "compare-and-set lost");
                    observer.ref_conflict(&name, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(VfsError::RefUpdateConflict { name, attempts })
    }
}

fn describe(target: Option<ObjectId>) -> String {
    target.map_or_else(|| "<unborn>".to_string(), |id| id.to_hex())
}
