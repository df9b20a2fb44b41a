use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::models::Entity;
use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),

    // Catalog constraint violations. The write transaction that raised one of
    // these is aborted, so no partial mutation is visible.
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },
    #[error("{entity} {id} still holds {images} image(s)")]
    InUse {
        entity: Entity,
        id: u64,
        images: usize,
    },
    #[error("{entity} {id} holds {images} image(s) and cannot change category")]
    Pinned {
        entity: Entity,
        id: u64,
        images: usize,
    },
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

/// Ownership index: parent id -> msgpack Vec of child ids
pub(crate) type IdIndex = TableDefinition<'static, u64, &'static [u8]>;

/// Entity table: id -> msgpack record
pub(crate) type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl Database {
    /// Open or create the catalog at the given file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Arc::new(RedbDatabase::create(path.as_ref())?);

        // Tables are created if absent; there is no migration step
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CATEGORIES)?;
            let _ = write_txn.open_table(SUBCATEGORIES)?;
            let _ = write_txn.open_table(IMAGES)?;
            let _ = write_txn.open_table(CATEGORY_NAMES)?;
            let _ = write_txn.open_table(IMAGE_FILENAMES)?;
            let _ = write_txn.open_table(CATEGORY_SUBCATEGORIES)?;
            let _ = write_txn.open_table(CATEGORY_IMAGES)?;
            let _ = write_txn.open_table(SUBCATEGORY_IMAGES)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    /// Run `f` inside one write transaction: commit on `Ok`, abort on `Err`.
    pub fn write<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&WriteTransaction) -> Result<T, DatabaseError>,
    {
        let write_txn = self.begin_write()?;
        match f(&write_txn) {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = write_txn.abort() {
                    tracing::error!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// Transaction helpers shared by the catalog modules
// ============================================================================

/// Allocate the next id of a sequence (ids start at 1).
pub(crate) fn next_id(txn: &WriteTransaction, sequence: &str) -> Result<u64, DatabaseError> {
    let mut table = txn.open_table(SEQUENCES)?;
    let next = table.get(sequence)?.map(|v| v.value()).unwrap_or(0) + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

/// Decode a record from any readable entity table.
pub(crate) fn load<R, T>(table: &T, id: u64) -> Result<Option<R>, DatabaseError>
where
    R: DeserializeOwned,
    T: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
        None => Ok(None),
    }
}

/// Decode every record of an entity table.
pub(crate) fn load_all<R, T>(table: &T) -> Result<Vec<R>, DatabaseError>
where
    R: DeserializeOwned,
    T: ReadableTable<u64, &'static [u8]>,
{
    let mut records = Vec::new();
    for result in table.iter()? {
        let (_, value) = result?;
        records.push(rmp_serde::from_slice(value.value())?);
    }
    Ok(records)
}

pub(crate) fn store<R: Serialize>(
    txn: &WriteTransaction,
    definition: RecordTable,
    id: u64,
    record: &R,
) -> Result<(), DatabaseError> {
    let data = rmp_serde::to_vec_named(record)?;
    let mut table = txn.open_table(definition)?;
    table.insert(id, data.as_slice())?;
    Ok(())
}

/// Child ids stored under `key` in an ownership index.
pub(crate) fn index_ids<T>(table: &T, key: u64) -> Result<Vec<u64>, DatabaseError>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    match table.get(key)? {
        Some(data) => Ok(rmp_serde::from_slice(data.value())?),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn index_add(
    txn: &WriteTransaction,
    index: IdIndex,
    key: u64,
    id: u64,
) -> Result<(), DatabaseError> {
    let mut table = txn.open_table(index)?;
    let mut ids = index_ids(&table, key)?;
    if !ids.contains(&id) {
        ids.push(id);
        let data = rmp_serde::to_vec(&ids)?;
        table.insert(key, data.as_slice())?;
    }
    Ok(())
}

pub(crate) fn index_remove(
    txn: &WriteTransaction,
    index: IdIndex,
    key: u64,
    id: u64,
) -> Result<(), DatabaseError> {
    let mut table = txn.open_table(index)?;
    let mut ids = index_ids(&table, key)?;
    let before = ids.len();
    ids.retain(|existing| *existing != id);
    if ids.is_empty() {
        table.remove(key)?;
    } else if ids.len() != before {
        let data = rmp_serde::to_vec(&ids)?;
        table.insert(key, data.as_slice())?;
    }
    Ok(())
}
