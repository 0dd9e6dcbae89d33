use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::PoisonError;

use crate::consts::consts::TransactionId;
use crate::model::statement::Statement;

use super::storage::{SharedStorage, StorageError, StorageResult};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum TransactionStatus {
    Committed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionFileWriteMode {
    /// Writes the log and performs an fsync before the commit is acknowledged
    Sync,
    /// Writes the log, lets the OS buffer the writes
    OSBuffered,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionWriteMode {
    /// Writes the WAL to storage
    File(TransactionFileWriteMode),
    /// Used for testing purposes. Skips writing the WAL
    Off,
}

/// One line of the write-ahead log
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub statement: Statement,
    pub status: TransactionStatus,
}

pub struct TransactionWAL {
    write_mode: TransactionWriteMode,
    current_transaction_id: LocalClock,
    size: AtomicUsize,
    storage: SharedStorage,
}

impl TransactionWAL {
    pub fn new(write_mode: TransactionWriteMode, storage: SharedStorage) -> Self {
        Self {
            write_mode,
            current_transaction_id: LocalClock::new(),
            size: AtomicUsize::new(0),
            storage,
        }
    }

    /// Appends a committed mutation to the log. Callers must serialize commits so the
    /// log order matches the transaction id order.
    pub fn commit(&self, transaction_id: &TransactionId, statement: &Statement) -> StorageResult<()> {
        let file_write_mode = match &self.write_mode {
            TransactionWriteMode::File(mode) => mode,
            TransactionWriteMode::Off => {
                self.size.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
        };

        let transaction = Transaction {
            id: transaction_id.clone(),
            statement: statement.clone(),
            status: TransactionStatus::Committed,
        };

        let transaction_json_line = format!(
            "{}\n",
            serde_json::to_string(&transaction)
                .map_err(|e| StorageError::UnableToSerialize("transaction", e))?
        );

        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);

        storage.transaction_write(transaction_json_line.as_bytes())?;

        // Note: The observed speed of fsync is a few ms, OSBuffered skips it
        if file_write_mode == &TransactionFileWriteMode::Sync {
            storage.transaction_sync()?;
        }

        self.size.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    /// The current state has been snapshotted, the log can be emptied
    pub fn flush_transactions(&self) -> StorageResult<usize> {
        self.storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transaction_flush()?;

        Ok(self.size.swap(0, Ordering::SeqCst))
    }

    /// Reads every logged transaction. A final line that does not parse was torn by a crash
    /// mid-append, it was never acknowledged, so it is dropped and the log is cut back to the
    /// lines before it. Any other unreadable line is an error.
    pub fn restore(&self) -> StorageResult<Vec<Transaction>> {
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);

        let transactions_data = storage.transaction_load()?;

        let lines: Vec<&str> = transactions_data
            .lines()
            .filter(|line| !line.is_empty())
            .collect();

        let mut transactions: Vec<Transaction> = vec![];

        for (index, transaction_string) in lines.iter().enumerate() {
            match serde_json::from_str(transaction_string) {
                Ok(transaction) => transactions.push(transaction),
                Err(e) if index + 1 == lines.len() => {
                    log::warn!(
                        "⚠️  Dropping incomplete last transaction log line: {}",
                        e
                    );

                    let mut valid_prefix = String::new();

                    for line in &lines[..index] {
                        valid_prefix.push_str(line);
                        valid_prefix.push('\n');
                    }

                    storage.transaction_flush()?;
                    storage.transaction_write(valid_prefix.as_bytes())?;
                    storage.transaction_sync()?;
                }
                Err(e) => return Err(StorageError::UnableToDeserialize("transaction", e)),
            }
        }

        self.size.store(transactions.len(), Ordering::SeqCst);

        Ok(transactions)
    }

    pub fn get_increment_current_transaction_id(&self) -> TransactionId {
        self.current_transaction_id.get_timestamp()
    }

    pub fn get_current_transaction_id(&self) -> TransactionId {
        self.current_transaction_id.current()
    }

    /// Moves the clock forward so new transactions are numbered after `transaction_id`
    pub fn observe_transaction_id(&self, transaction_id: &TransactionId) {
        self.current_transaction_id.observe(transaction_id.to_number())
    }

    pub fn get_wal_size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct LocalClock {
    ts_sequence: AtomicUsize,
}

impl LocalClock {
    pub fn new() -> Self {
        Self {
            ts_sequence: AtomicUsize::new(0),
        }
    }

    fn get_timestamp(&self) -> TransactionId {
        TransactionId(self.ts_sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn current(&self) -> TransactionId {
        TransactionId(self.ts_sequence.load(Ordering::SeqCst))
    }

    fn observe(&self, value: usize) {
        self.ts_sequence.fetch_max(value, Ordering::SeqCst);
    }
}
