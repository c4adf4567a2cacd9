// ==========================================
// Trip import engine - file content hash
// ==========================================
// Identity of an import file is its bytes: lowercase hex SHA-256.
// Name and partition play no part.
// ==========================================

use sha2::{Digest, Sha256};

pub struct FileHasher;

impl FileHasher {
    pub fn hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            FileHasher::hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_any_byte_change_changes_hash() {
        let a = FileHasher::hash(b"Trip ID,Date\nT1,2025-01-15\n");
        let b = FileHasher::hash(b"Trip ID,Date\nT1,2025-01-15");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
