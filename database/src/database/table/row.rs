use serde::{Deserialize, Serialize};

use crate::{consts::consts::TransactionId, model::person::Person};

/// A stored person document together with the transaction that created it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PersonRow {
    pub person: Person,
    pub created_at: TransactionId,
}

impl PersonRow {
    pub fn new(person: Person, created_at: TransactionId) -> Self {
        PersonRow { person, created_at }
    }

    pub fn key(&self) -> String {
        self.person.id.to_string()
    }
}
