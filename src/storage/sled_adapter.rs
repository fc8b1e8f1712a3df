use std::path::Path;

use crate::KeyValueStore;
use crate::StorageError;
use crate::QUERY_CACHE_TREE;

/// Sled-backed [`KeyValueStore`]. Persisted query results live in a
/// dedicated tree so the database can be shared with other subsystems.
#[derive(Clone)]
pub struct SledKeyValueStore {
    tree: sled::Tree,
}

impl std::fmt::Debug for SledKeyValueStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledKeyValueStore")
            .field("tree_len", &self.tree.len())
            .finish()
    }
}

impl SledKeyValueStore {
    /// Open (or create) a database at `path` and its query-cache tree.
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Reuse an already opened database handle.
    pub fn from_db(db: sled::Db) -> std::result::Result<Self, StorageError> {
        let tree = db.open_tree(QUERY_CACHE_TREE)?;
        Ok(Self { tree })
    }

    pub fn flush(&self) -> std::result::Result<usize, StorageError> {
        self.tree.flush().map_err(StorageError::Sled)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tree.len()
    }
}

impl KeyValueStore for SledKeyValueStore {
    fn get_item(&self, id: &str) -> std::result::Result<Option<String>, StorageError> {
        match self.tree.get(id.as_bytes())? {
            Some(ivec) => match String::from_utf8(ivec.to_vec()) {
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(StorageError::NonUtf8Value { key: id.to_string() }),
            },
            None => Ok(None),
        }
    }

    fn set_item(&self, id: &str, value: &str) -> std::result::Result<(), StorageError> {
        self.tree.insert(id.as_bytes(), value.as_bytes())?;
        self.flush()?;
        Ok(())
    }
}
