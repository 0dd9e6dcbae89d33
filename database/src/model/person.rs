use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::consts::EntityId;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Person {
    pub id: EntityId,
    pub name: String,
    pub age: u32,
}

impl Person {
    pub fn new(name: String, age: u32) -> Self {
        Person {
            id: EntityId::new(),
            name,
            age,
        }
    }

    pub fn new_test() -> Self {
        Person {
            id: EntityId("1".to_string()),
            name: "Cristian".to_string(),
            age: 27,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersonFieldError {
    #[error("Name is required")]
    MissingName,

    #[error("Age is required")]
    MissingAge,

    #[error("Age must be a whole number, got: {0}")]
    AgeNotANumber(String),

    #[error("Age must be between 0 and {max}, got: {0}", max = u32::MAX)]
    AgeOutOfRange(String),
}

/// A person that has passed validation but has not been stored yet, so it has no id
#[derive(Clone, Debug, PartialEq)]
pub struct NewPerson {
    name: String,
    age: u32,
}

impl NewPerson {
    /// Validates raw (form) input. Every invalid field is reported, not only the first one.
    pub fn parse(name: Option<&str>, age: Option<&str>) -> Result<Self, Vec<PersonFieldError>> {
        let mut errors = vec![];

        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => {
                errors.push(PersonFieldError::MissingName);
                None
            }
        };

        let age = match age.map(str::trim) {
            Some(age) if !age.is_empty() => match parse_age(age) {
                Ok(age) => Some(age),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            _ => {
                errors.push(PersonFieldError::MissingAge);
                None
            }
        };

        match (name, age) {
            (Some(name), Some(age)) => Ok(NewPerson { name, age }),
            _ => Err(errors),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    /// Assigns a fresh id
    pub fn into_person(self) -> Person {
        Person::new(self.name, self.age)
    }
}

fn parse_age(age: &str) -> Result<u32, PersonFieldError> {
    let digits = age.strip_prefix(['-', '+']).unwrap_or(age);

    // A signed whole number that is simply too big for any integer type is still out of range
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PersonFieldError::AgeNotANumber(age.to_string()));
    }

    age.parse::<i128>()
        .ok()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| PersonFieldError::AgeOutOfRange(age.to_string()))
}
