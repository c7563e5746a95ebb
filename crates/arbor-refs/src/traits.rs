//! The [`RefStore`] trait defining the reference storage interface.

use crate::error::Result;
use crate::types::Ref;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`) and make each
/// operation atomic with respect to the others. Names are full reference
/// names (`HEAD`, `refs/heads/main`) and are validated on write.
pub trait RefStore: Send + Sync {
    /// Read a ref by its full name.
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<Ref>>;

    /// Create or overwrite a ref unconditionally.
    fn write_ref(&self, name: &str, reference: &Ref) -> Result<()>;

    /// Replace the ref's value with `new` only if its current value equals
    /// `expected` (`None` meaning "must not exist yet").
    ///
    /// Fails with [`RefError::Conflict`](crate::RefError::Conflict) when the
    /// current value differs.
    fn compare_and_swap(&self, name: &str, expected: Option<&Ref>, new: &Ref) -> Result<()>;

    /// Delete a ref by full name.
    ///
    /// Returns `Ok(true)` if the ref existed and was deleted, `Ok(false)` if
    /// it did not exist.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// List all refs whose full name starts with `prefix`, sorted by name.
    ///
    /// Pass `""` to list all refs. Pass `"refs/heads/"` for branches only.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Ref)>>;
}

/// Render an optional ref value for conflict messages.
pub(crate) fn describe(value: Option<&Ref>) -> String {
    value.map_or_else(|| "<none>".to_string(), Ref::to_string)
}
