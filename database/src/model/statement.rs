use serde::{Deserialize, Serialize};

use crate::consts::consts::EntityId;

use super::person::Person;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Statement {
    Add(Person),
    /// Removing a document that does not exist is not an error
    Remove(EntityId),
    /// Returns every Person, in creation order
    List,
}

impl Statement {
    pub fn is_query(&self) -> bool {
        !self.is_mutation()
    }

    pub fn is_mutation(&self) -> bool {
        match self {
            Statement::Add(_) | Statement::Remove(_) => true,
            Statement::List => false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum StatementResult {
    Single(Person),
    /// Number of documents removed, either 0 or 1
    Removed(usize),
    List(Vec<Person>),
}

impl StatementResult {
    pub fn single(self) -> Option<Person> {
        match self {
            StatementResult::Single(p) => Some(p),
            _ => None,
        }
    }

    pub fn removed(self) -> Option<usize> {
        match self {
            StatementResult::Removed(count) => Some(count),
            _ => None,
        }
    }

    pub fn list(self) -> Option<Vec<Person>> {
        match self {
            StatementResult::List(l) => Some(l),
            _ => None,
        }
    }
}
