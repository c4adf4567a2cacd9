// ==========================================
// Trip import engine - driver alias resolver
// ==========================================
// Responsibility: loosely formatted driver names -> one canonical identity
// Lookup key: lowercase, trimmed, internal whitespace collapsed
// Concurrency: single writer / many readers over the registry. An import
// plans its names under a read guard and registers them only after its
// trips are committed, so rejected rows and failed imports leave no trace.
// ==========================================

use crate::repository::alias_registry::AliasRegistry;
use crate::repository::error::RepositoryResult;
use crate::repository::memory_repo::MemoryAliasRegistry;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

/// Normalized lookup key for a driver spelling
pub fn alias_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn clean_spelling(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ==========================================
// AliasPlan
// ==========================================
/// Driver identities for one import, computed without touching the registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasPlan {
    canonical_names: Vec<String>,     // one per input spelling, same order
    new_keys: Vec<(String, String)>,  // alias key -> canonical, first seen in this import
    spellings: Vec<(String, String)>, // cleaned spelling -> alias key
}

impl AliasPlan {
    pub fn canonical_names(&self) -> &[String] {
        &self.canonical_names
    }
}

// ==========================================
// DriverAliasResolver
// ==========================================
pub struct DriverAliasResolver {
    registry: RwLock<Box<dyn AliasRegistry>>,
}

impl DriverAliasResolver {
    pub fn new(registry: Box<dyn AliasRegistry>) -> Self {
        Self {
            registry: RwLock::new(registry),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryAliasRegistry::new()))
    }

    /// Resolve one raw spelling, registering it first-seen-wins when unknown
    pub fn resolve(&self, raw: &str) -> RepositoryResult<String> {
        let mut registry = self.registry.write()?;
        resolve_locked(registry.as_mut(), raw)
    }

    /// Resolve an import's driver column without registering anything.
    ///
    /// Unknown keys resolve first-seen-wins within `raws`.
    ///
    /// # Returns
    /// - plan whose `canonical_names()` follow the order of `raws`
    pub fn plan(&self, raws: &[&str]) -> RepositoryResult<AliasPlan> {
        let registry = self.registry.read()?;
        let mut plan = AliasPlan::default();
        let mut pending: HashMap<String, String> = HashMap::new();

        for raw in raws {
            let cleaned = clean_spelling(raw);
            let key = alias_key(&cleaned);
            if key.is_empty() {
                plan.canonical_names.push(cleaned);
                continue;
            }

            let canonical = match registry.lookup_canonical(&key)? {
                Some(canonical) => canonical,
                None => match pending.get(&key) {
                    Some(canonical) => canonical.clone(),
                    None => {
                        pending.insert(key.clone(), cleaned.clone());
                        plan.new_keys.push((key.clone(), cleaned.clone()));
                        cleaned.clone()
                    }
                },
            };
            plan.spellings.push((cleaned, key));
            plan.canonical_names.push(canonical);
        }

        debug!(
            drivers = plan.canonical_names.len(),
            new_identities = plan.new_keys.len(),
            "driver names planned"
        );
        Ok(plan)
    }

    /// Register a committed import's spellings.
    ///
    /// A key registered by another import since `plan` keeps its canonical.
    pub fn apply(&self, plan: &AliasPlan) -> RepositoryResult<()> {
        let mut registry = self.registry.write()?;

        for (key, canonical) in &plan.new_keys {
            if registry.lookup_canonical(key)?.is_none() {
                registry.upsert_key(key, canonical)?;
            }
        }
        for (spelling, key) in &plan.spellings {
            registry.add_spelling(spelling, key)?;
        }
        Ok(())
    }

    /// Explicitly register `alias` as a spelling of `canonical`
    ///
    /// # Arguments
    /// - canonical: resolved first, so a variant of a known canonical works
    /// - alias: its key is pointed at the canonical, overriding any earlier
    ///   automatic mapping; if the alias was itself an identity, every
    ///   spelling that rolled up to it follows
    ///
    /// # Returns
    /// - the canonical name the alias now resolves to
    pub fn add_driver_alias(&self, canonical: &str, alias: &str) -> RepositoryResult<String> {
        let mut registry = self.registry.write()?;
        let registry = registry.as_mut();

        let target = resolve_locked(registry, canonical)?;

        let alias_clean = clean_spelling(alias);
        let key = alias_key(&alias_clean);
        if key.is_empty() || key == alias_key(canonical) {
            return Ok(target);
        }

        if let Some(previous) = registry.lookup_canonical(&key)? {
            if previous != target && alias_key(&previous) == key {
                let moved = registry.repoint_canonical(&previous, &target)?;
                info!(from = %previous, to = %target, moved, "driver identity merged");
            }
        }

        registry.upsert_key(&key, &target)?;
        registry.add_spelling(&alias_clean, &key)?;
        info!(canonical = %target, alias = %alias_clean, "driver alias registered");
        Ok(target)
    }

    /// Canonical name for a spelling; unknown spellings come back cleaned, unregistered
    pub fn get_canonical_driver_name(&self, alias: &str) -> RepositoryResult<String> {
        let registry = self.registry.read()?;
        let cleaned = clean_spelling(alias);
        Ok(registry
            .lookup_canonical(&alias_key(&cleaned))?
            .unwrap_or(cleaned))
    }

    /// Every spelling that resolves to `canonical` (itself included), sorted
    pub fn get_driver_aliases(&self, canonical: &str) -> RepositoryResult<Vec<String>> {
        let registry = self.registry.read()?;
        let cleaned = clean_spelling(canonical);
        let resolved = registry
            .lookup_canonical(&alias_key(&cleaned))?
            .unwrap_or(cleaned);
        registry.spellings_for(&resolved)
    }
}

fn resolve_locked(registry: &mut dyn AliasRegistry, raw: &str) -> RepositoryResult<String> {
    let cleaned = clean_spelling(raw);
    let key = alias_key(&cleaned);
    if key.is_empty() {
        return Ok(cleaned);
    }

    let canonical = match registry.lookup_canonical(&key)? {
        Some(canonical) => canonical,
        None => {
            registry.upsert_key(&key, &cleaned)?;
            cleaned.clone()
        }
    };
    registry.add_spelling(&cleaned, &key)?;
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_key_normalization() {
        assert_eq!(alias_key("  John   SMITH "), "john smith");
        assert_eq!(alias_key("john\tsmith"), "john smith");
    }

    #[test]
    fn test_first_seen_spelling_becomes_canonical() {
        let resolver = DriverAliasResolver::in_memory();

        assert_eq!(resolver.resolve("John Smith").unwrap(), "John Smith");
        assert_eq!(resolver.resolve("JOHN  SMITH").unwrap(), "John Smith");
        assert_eq!(resolver.resolve(" john smith ").unwrap(), "John Smith");

        assert_eq!(
            resolver.get_driver_aliases("john smith").unwrap(),
            vec![
                "JOHN SMITH".to_string(),
                "John Smith".to_string(),
                "john smith".to_string()
            ]
        );
    }

    #[test]
    fn test_explicit_alias() {
        let resolver = DriverAliasResolver::in_memory();
        resolver.resolve("John Smith").unwrap();

        let canonical = resolver.add_driver_alias("JOHN SMITH", "Johnny").unwrap();

        assert_eq!(canonical, "John Smith");
        assert_eq!(resolver.resolve("johnny").unwrap(), "John Smith");
        assert_eq!(
            resolver.get_canonical_driver_name("JOHNNY").unwrap(),
            "John Smith"
        );
    }

    #[test]
    fn test_explicit_alias_merges_existing_identity() {
        let resolver = DriverAliasResolver::in_memory();
        let plan = resolver.plan(&["John Smith", "Johnny", "JOHNNY"]).unwrap();
        resolver.apply(&plan).unwrap();

        resolver.add_driver_alias("John Smith", "Johnny").unwrap();

        assert_eq!(
            resolver.get_canonical_driver_name("johnny").unwrap(),
            "John Smith"
        );
        assert_eq!(
            resolver.get_driver_aliases("John Smith").unwrap(),
            vec![
                "JOHNNY".to_string(),
                "John Smith".to_string(),
                "Johnny".to_string()
            ]
        );
    }

    #[test]
    fn test_plan_registers_nothing_until_applied() {
        let resolver = DriverAliasResolver::in_memory();
        resolver.resolve("Jane Doe").unwrap();

        let plan = resolver
            .plan(&["JOHN SMITH", "jane doe", "John Smith", "   "])
            .unwrap();
        assert_eq!(
            plan.canonical_names(),
            &["JOHN SMITH", "Jane Doe", "JOHN SMITH", ""]
        );
        assert!(resolver.get_driver_aliases("JOHN SMITH").unwrap().is_empty());

        resolver.apply(&plan).unwrap();
        assert_eq!(
            resolver.get_canonical_driver_name("john smith").unwrap(),
            "JOHN SMITH"
        );
        assert_eq!(
            resolver.get_driver_aliases("Jane Doe").unwrap(),
            vec!["Jane Doe".to_string(), "jane doe".to_string()]
        );
    }

    #[test]
    fn test_apply_keeps_identity_registered_in_between() {
        let resolver = DriverAliasResolver::in_memory();
        let plan = resolver.plan(&["JOHN SMITH"]).unwrap();

        // another import committed first
        resolver.resolve("John Smith").unwrap();
        resolver.apply(&plan).unwrap();

        assert_eq!(
            resolver.get_canonical_driver_name("JOHN SMITH").unwrap(),
            "John Smith"
        );
    }

    #[test]
    fn test_unknown_name_is_not_registered_by_lookup() {
        let resolver = DriverAliasResolver::in_memory();

        assert_eq!(
            resolver.get_canonical_driver_name("  Jane   Doe ").unwrap(),
            "Jane Doe"
        );
        assert!(resolver.get_driver_aliases("Jane Doe").unwrap().is_empty());
    }
}
