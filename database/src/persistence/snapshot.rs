use std::sync::PoisonError;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    consts::consts::TransactionId,
    database::table::{row::PersonRow, table::PersonTable},
};

use super::storage::{ReadBlobState, SharedStorage, StorageError, StorageResult};

#[derive(Debug)]
enum FileType {
    Metadata,
    Snapshot,
}

impl FileType {
    fn as_str(&self) -> &'static str {
        match self {
            FileType::Metadata => "metadata",
            FileType::Snapshot => "snapshot",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Metadata {
    pub current_transaction_id: TransactionId,
}

pub struct SnapshotManager {
    storage: SharedStorage,
}

impl SnapshotManager {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Loads the last snapshot into the table, returns the restored row count
    #[tracing::instrument(skip(self, table))]
    pub fn restore_snapshot(&self, table: &PersonTable) -> StorageResult<(usize, Metadata)> {
        let rows: Vec<PersonRow> = self.read_file(FileType::Snapshot)?;

        let snapshot_count = rows.len();

        table.restore_table(rows);

        let metadata: Metadata = self.read_file(FileType::Metadata)?;

        Ok((snapshot_count, metadata))
    }

    /// Persists every row, returns the persisted row count
    #[tracing::instrument(skip(self, table))]
    pub fn create_snapshot(
        &self,
        table: &PersonTable,
        transaction_id: TransactionId,
    ) -> StorageResult<usize> {
        let rows = table.rows();
        let row_count = rows.len();

        self.write_file(FileType::Snapshot, &rows)?;

        self.write_file(
            FileType::Metadata,
            &Metadata {
                current_transaction_id: transaction_id,
            },
        )?;

        Ok(row_count)
    }

    fn read_file<T: DeserializeOwned + Default>(&self, file_type: FileType) -> StorageResult<T> {
        let result = self
            .storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_blob(file_type.as_str())?;

        match result {
            ReadBlobState::Found(file_contents) => serde_json::from_slice(&file_contents)
                .map_err(|e| StorageError::UnableToDeserialize(file_type.as_str(), e)),
            ReadBlobState::NotFound => Ok(T::default()),
        }
    }

    fn write_file<T: Serialize>(&self, file_type: FileType, data: &T) -> StorageResult<()> {
        let serialized_bytes = serde_json::to_vec(data)
            .map_err(|e| StorageError::UnableToSerialize(file_type.as_str(), e))?;

        self.storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_blob(file_type.as_str(), &serialized_bytes)
    }
}
