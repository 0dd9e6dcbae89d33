use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// New Type Pattern -- https://doc.rust-lang.org/rust-by-example/generics/new_types.html
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub usize);

impl TransactionId {
    pub fn new_first_transaction() -> Self {
        TransactionId(1)
    }

    pub fn increment(&self) -> TransactionId {
        TransactionId(self.0 + 1)
    }

    pub fn to_number(&self) -> usize {
        self.0
    }
}

impl Default for TransactionId {
    /// No transaction has been committed yet
    fn default() -> Self {
        TransactionId(0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque document identifier, assigned by the store when a document is created
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new() -> EntityId {
        EntityId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        EntityId::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId(value)
    }
}
