//! Content hashing for embedded-image dedup.

use xxhash_rust::xxh3::Xxh3;

use crate::primitives::ImageHash;

/// Hashes a byte slice in one call.
pub fn hash_bytes(data: &[u8]) -> ImageHash {
    ImageHash(xxhash_rust::xxh3::xxh3_64(data))
}

/// Incremental hasher for streamed image data, used when the image
/// comes off a bounded reader rather than as one in-memory buffer.
#[derive(Default)]
pub struct IncrementalHasher {
    state: Xxh3,
}

impl IncrementalHasher {
    pub fn new() -> Self {
        Self { state: Xxh3::new() }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.state.update(chunk);
    }

    pub fn finish(self) -> ImageHash {
        ImageHash(self.state.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_hash_matches_one_shot() {
        let data = b"some embedded image bytes";
        let mut incremental = IncrementalHasher::new();
        incremental.update(&data[..10]);
        incremental.update(&data[10..]);
        assert_eq!(incremental.finish(), hash_bytes(data));
    }
}
