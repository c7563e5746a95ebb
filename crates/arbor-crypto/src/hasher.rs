use arbor_types::ObjectId;

/// BLAKE3 hasher bound to one object domain.
///
/// The digest covers `domain ":" len_le64 payload`. The domain keeps kinds
/// apart; the length prefix lets streamed payloads hash identically to
/// one-shot ones.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const BLOB: Self = Self { domain: "arbor-blob-v1" };
    pub const TREE: Self = Self { domain: "arbor-tree-v1" };
    pub const COMMIT: Self = Self { domain: "arbor-commit-v1" };

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut state = self.begin(data.len() as u64);
        state.update(data);
        ObjectId::from_hash(*state.finalize().as_bytes())
    }

    /// Incremental state for a payload of exactly `len` bytes.
    pub fn begin(&self, len: u64) -> blake3::Hasher {
        let mut state = blake3::Hasher::new();
        state
            .update(self.domain.as_bytes())
            .update(b":")
            .update(&len.to_le_bytes());
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finish(state: blake3::Hasher) -> ObjectId {
        ObjectId::from_hash(*state.finalize().as_bytes())
    }

    #[test]
    fn stable_across_calls() {
        let a = ContentHasher::TREE.hash(b"[]");
        let b = ContentHasher::TREE.hash(b"[]");
        assert_eq!(a, b);
        assert_ne!(a, ContentHasher::TREE.hash(b"[ ]"));
    }

    #[test]
    fn domains_never_collide() {
        let payload = b"fn main() {}";
        let ids = [
            ContentHasher::BLOB.hash(payload),
            ContentHasher::TREE.hash(payload),
            ContentHasher::COMMIT.hash(payload),
        ];
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[test]
    fn chunked_input_matches_one_shot() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut state = ContentHasher::BLOB.begin(payload.len() as u64);
        for chunk in payload.chunks(777) {
            state.update(chunk);
        }
        assert_eq!(finish(state), ContentHasher::BLOB.hash(&payload));
    }

    #[test]
    fn declared_length_is_part_of_the_digest() {
        let mut state = ContentHasher::BLOB.begin(3);
        state.update(b"ab");
        assert_ne!(finish(state), ContentHasher::BLOB.hash(b"ab"));
    }

    #[test]
    fn empty_payload_has_a_real_id() {
        assert!(!ContentHasher::BLOB.hash(b"").is_null());
        assert_ne!(ContentHasher::BLOB.hash(b""), ContentHasher::TREE.hash(b""));
    }
}
