use std::collections::HashMap;

use super::{ReadBlobState, Storage, StorageResult};

#[derive(Default)]
pub struct MemoryStorage {
    blobs: HashMap<String, Vec<u8>>,
    transaction_log: Vec<u8>,
}

impl Storage for MemoryStorage {
    fn init(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn write_blob(&mut self, path: &str, bytes: &[u8]) -> StorageResult<()> {
        self.blobs.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_blob(&self, path: &str) -> StorageResult<ReadBlobState> {
        Ok(match self.blobs.get(path) {
            Some(bytes) => ReadBlobState::Found(bytes.clone()),
            None => ReadBlobState::NotFound,
        })
    }

    fn transaction_write(&mut self, transaction: &[u8]) -> StorageResult<()> {
        self.transaction_log.extend_from_slice(transaction);
        Ok(())
    }

    fn transaction_sync(&self) -> StorageResult<()> {
        Ok(())
    }

    fn transaction_flush(&mut self) -> StorageResult<()> {
        self.transaction_log.clear();
        Ok(())
    }

    fn transaction_load(&mut self) -> StorageResult<String> {
        Ok(String::from_utf8_lossy(&self.transaction_log).into_owned())
    }
}
