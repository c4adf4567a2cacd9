// ==========================================
// Trip import engine - AliasRegistry trait
// ==========================================
// Storage for driver identities:
//   alias key (normalized)  -> canonical name
//   spelling (as observed)  -> alias key
// Serialization of writers vs readers is the resolver's job, not the registry's.
// ==========================================

use crate::repository::error::RepositoryResult;

// ==========================================
// AliasRegistry Trait
// ==========================================
// Implementors: MemoryAliasRegistry, SqliteAliasRegistry
pub trait AliasRegistry: Send + Sync {
    /// Canonical name registered for a normalized key
    fn lookup_canonical(&self, alias_key: &str) -> RepositoryResult<Option<String>>;

    /// Insert or re-point `alias_key`
    fn upsert_key(&mut self, alias_key: &str, canonical: &str) -> RepositoryResult<()>;

    /// Re-point every key currently mapped to `old_canonical`
    fn repoint_canonical(&mut self, old_canonical: &str, new_canonical: &str)
        -> RepositoryResult<usize>;

    /// Record an observed / registered spelling under a key (idempotent)
    fn add_spelling(&mut self, spelling: &str, alias_key: &str) -> RepositoryResult<()>;

    /// All spellings whose key maps to `canonical`, sorted
    fn spellings_for(&self, canonical: &str) -> RepositoryResult<Vec<String>>;
}
