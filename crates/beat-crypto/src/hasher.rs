use beat_types::BlockId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"beat-chunk-v1"`) that is
/// prepended to every hash computation. A chunk and a directory node with
/// identical bytes therefore produce different ids.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for raw file chunks.
    pub const CHUNK: Self = Self {
        domain: "beat-chunk-v1",
    };
    /// Hasher for file nodes (chunk lists).
    pub const FILE: Self = Self {
        domain: "beat-file-v1",
    };
    /// Hasher for directory nodes.
    pub const DIRECTORY: Self = Self {
        domain: "beat-dir-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> BlockId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        BlockId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected block ID.
    pub fn verify(&self, data: &[u8], expected: &BlockId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
