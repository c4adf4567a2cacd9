// ==========================================
// Trip import engine - SQLite AliasRegistry
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::alias_registry::AliasRegistry;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct SqliteAliasRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAliasRegistry {
    /// Open (and initialize) the database at `db_path`
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Share an existing connection (schema must already exist)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl AliasRegistry for SqliteAliasRegistry {
    fn lookup_canonical(&self, alias_key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.conn.lock()?;
        let canonical = conn
            .query_row(
                "SELECT canonical_name FROM driver_alias WHERE alias_key = ?1",
                params![alias_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(canonical)
    }

    fn upsert_key(&mut self, alias_key: &str, canonical: &str) -> RepositoryResult<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO driver_alias (alias_key, canonical_name) VALUES (?1, ?2)
             ON CONFLICT(alias_key) DO UPDATE SET canonical_name = excluded.canonical_name",
            params![alias_key, canonical],
        )?;
        Ok(())
    }

    fn repoint_canonical(
        &mut self,
        old_canonical: &str,
        new_canonical: &str,
    ) -> RepositoryResult<usize> {
        let conn = self.conn.lock()?;
        let changed = conn.execute(
            "UPDATE driver_alias SET canonical_name = ?2 WHERE canonical_name = ?1",
            params![old_canonical, new_canonical],
        )?;
        Ok(changed)
    }

    fn add_spelling(&mut self, spelling: &str, alias_key: &str) -> RepositoryResult<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO driver_alias_spelling (spelling, alias_key) VALUES (?1, ?2)
             ON CONFLICT(spelling) DO UPDATE SET alias_key = excluded.alias_key",
            params![spelling, alias_key],
        )?;
        Ok(())
    }

    fn spellings_for(&self, canonical: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT s.spelling
             FROM driver_alias_spelling s
             JOIN driver_alias a ON a.alias_key = s.alias_key
             WHERE a.canonical_name = ?1
             ORDER BY s.spelling",
        )?;
        let spellings = stmt
            .query_map(params![canonical], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(spellings)
    }
}
