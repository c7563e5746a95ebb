use std::cmp::Ordering;
use std::fmt;

use arbor_crypto::ContentHasher;
use arbor_types::{ObjectId, Signature};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// What a stored object holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// File bytes.
    Blob,
    /// One directory level.
    Tree,
    /// Root tree plus history.
    Commit,
}

impl ObjectKind {
    const ALL: [ObjectKind; 3] = [Self::Blob, Self::Tree, Self::Commit];

    /// Tag byte written ahead of loose objects on disk.
    pub fn type_byte(self) -> u8 {
        match self {
            Self::Blob => 1,
            Self::Tree => 2,
            Self::Commit => 3,
        }
    }

    pub fn from_type_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_byte() == byte)
    }

    /// Each kind hashes under its own domain, so equal bytes of different
    /// kinds never share an id.
    pub fn hasher(self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Tree => &ContentHasher::TREE,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded object as backends see it: opaque bytes tagged with a kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    /// `data.len()`, kept so backends can answer size queries from headers.
    pub size: u64,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Content address of this object.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }

    fn expect_kind(&self, kind: ObjectKind) -> StoreResult<()> {
        if self.kind == kind {
            return Ok(());
        }
        Err(StoreError::CorruptObject {
            id: self.compute_id(),
            reason: format!("expected {kind}, got {}", self.kind),
        })
    }

    fn decode_json<T: DeserializeOwned>(&self, kind: ObjectKind) -> StoreResult<T> {
        self.expect_kind(kind)?;
        serde_json::from_slice(&self.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

fn encode_json<T: Serialize>(kind: ObjectKind, value: &T) -> StoreResult<StoredObject> {
    let data = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(StoredObject::new(kind, data))
}

/// File content. Stored verbatim, so a blob's size is its byte length.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Blob)?;
        Ok(Self::new(obj.data.clone()))
    }
}

/// Kind of a tree entry, with git-compatible octal modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    Regular,
    Executable,
    Symlink,
    Directory,
}

impl EntryMode {
    const BITS: [(EntryMode, u32); 4] = [
        (Self::Regular, 0o100644),
        (Self::Executable, 0o100755),
        (Self::Symlink, 0o120000),
        (Self::Directory, 0o040000),
    ];

    pub fn mode_bits(&self) -> u32 {
        Self::BITS
            .iter()
            .find(|(mode, _)| mode == self)
            .map(|(_, bits)| *bits)
            .unwrap_or_default()
    }

    pub fn from_mode_bits(bits: u32) -> Option<Self> {
        Self::BITS.iter().find(|(_, b)| *b == bits).map(|(mode, _)| *mode)
    }

    /// File mode for a POSIX permission mask; any execute bit makes it
    /// executable.
    pub fn from_permissions(perm: u32) -> Self {
        if perm & 0o111 == 0 {
            Self::Regular
        } else {
            Self::Executable
        }
    }

    pub fn is_dir(&self) -> bool {
        *self == Self::Directory
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// One named child inside a [`Tree`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: EntryMode,
    /// Single path segment; never contains `/`.
    pub name: String,
    pub object_id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            object_id,
        }
    }
}

/// Compare two entry names, treating directories as if their name carried a
/// trailing `/`.
///
/// This places `a.txt` (0x2e) before directory `a` (`a/`, 0x2f) before `a0`
/// (0x30), which is the order a path-sorted flat listing would produce.
pub fn canonical_name_cmp(a: &str, a_is_dir: bool, b: &str, b_is_dir: bool) -> Ordering {
    let suffix = |dir: bool| if dir { Some(b'/') } else { None };
    a.bytes()
        .chain(suffix(a_is_dir))
        .cmp(b.bytes().chain(suffix(b_is_dir)))
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_name_cmp(
            &self.name,
            self.mode.is_dir(),
            &other.name,
            other.mode.is_dir(),
        )
        .then_with(|| self.mode.mode_bits().cmp(&other.mode.mode_bits()))
        .then_with(|| self.object_id.cmp(&other.object_id))
    }
}

/// Directory listing object.
///
/// The canonical encoding is the JSON form of the sorted entry list, so two
/// trees with the same entries always hash to the same ID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree; entries may arrive in any order.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        encode_json(ObjectKind::Tree, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode_json(ObjectKind::Tree)
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A commit: a root tree plus its parent linkage and authorship.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    pub tree: ObjectId,
    /// Empty for the first commit on a reference.
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl CommitObject {
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        encode_json(ObjectKind::Commit, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode_json(ObjectKind::Commit)
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }
}
