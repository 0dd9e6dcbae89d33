use crossbeam_skiplist::SkipMap;
use thiserror::Error;

use crate::{
    consts::consts::{EntityId, TransactionId},
    model::{
        person::Person,
        statement::{Statement, StatementResult},
    },
};

use super::row::PersonRow;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyErrors {
    // CRUD - CREATE
    #[error("Cannot create, record already exists: {0}")]
    CannotCreateWhenAlreadyExists(EntityId),
}

/// How to undo an applied mutation, used when the mutation cannot be persisted
#[derive(Debug, PartialEq)]
pub enum Rollback {
    RemoveRow(EntityId),
    RestoreRow(PersonRow),
    Nothing,
}

#[derive(Debug)]
pub struct Applied {
    pub result: StatementResult,
    pub rollback: Rollback,
}

type RowPrimaryKey = String;

pub struct PersonTable {
    pub person_rows: SkipMap<RowPrimaryKey, PersonRow>,
}

impl Default for PersonTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonTable {
    pub fn new() -> Self {
        Self {
            person_rows: SkipMap::new(),
        }
    }

    pub fn apply(
        &self,
        statement: Statement,
        transaction_id: &TransactionId,
    ) -> Result<Applied, ApplyErrors> {
        let applied = match statement {
            Statement::Add(person) => {
                let row = PersonRow::new(person.clone(), transaction_id.clone());

                // `get_or_insert` keeps the existing row if the key is taken, so a
                //  different value coming back means the id was already in use
                let entry = self.person_rows.get_or_insert(row.key(), row.clone());

                if entry.value() != &row {
                    return Err(ApplyErrors::CannotCreateWhenAlreadyExists(person.id));
                }

                Applied {
                    rollback: Rollback::RemoveRow(person.id.clone()),
                    result: StatementResult::Single(person),
                }
            }
            Statement::Remove(id) => match self.person_rows.remove(id.as_str()) {
                Some(entry) => Applied {
                    result: StatementResult::Removed(1),
                    rollback: Rollback::RestoreRow(entry.value().clone()),
                },
                None => Applied {
                    result: StatementResult::Removed(0),
                    rollback: Rollback::Nothing,
                },
            },
            Statement::List => Applied {
                result: StatementResult::List(self.list()),
                rollback: Rollback::Nothing,
            },
        };

        Ok(applied)
    }

    pub fn apply_rollback(&self, rollback: Rollback) {
        match rollback {
            Rollback::RemoveRow(id) => {
                self.person_rows.remove(id.as_str());
            }
            Rollback::RestoreRow(row) => {
                self.person_rows.insert(row.key(), row);
            }
            Rollback::Nothing => {}
        }
    }

    /// Every row, oldest first
    pub fn rows(&self) -> Vec<PersonRow> {
        let mut rows: Vec<PersonRow> = self
            .person_rows
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        rows
    }

    pub fn list(&self) -> Vec<Person> {
        self.rows().into_iter().map(|row| row.person).collect()
    }

    /// Used when restoring from a snapshot
    pub fn restore_table(&self, rows: Vec<PersonRow>) {
        for row in rows {
            self.person_rows.insert(row.key(), row);
        }
    }

    pub fn len(&self) -> usize {
        self.person_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.person_rows.is_empty()
    }
}
