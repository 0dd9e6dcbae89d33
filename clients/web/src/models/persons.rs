use database::{
    consts::consts::EntityId,
    database::request_manager::{RequestManager, RequestManagerError},
    model::person::{NewPerson, Person},
};
use thiserror::Error;

/// Any failure talking to the store. Callers are not expected to tell the causes apart.
#[derive(Error, Debug)]
#[error("Person store request failed: {0}")]
pub struct StoreError(#[from] RequestManagerError);

/// Person documents, read and written through an explicitly passed store handle
#[derive(Clone)]
pub struct Persons {
    request_manager: RequestManager,
}

impl Persons {
    pub fn new(request_manager: RequestManager) -> Self {
        Self { request_manager }
    }

    /// Every stored person, oldest first
    pub async fn find_all(&self) -> Result<Vec<Person>, StoreError> {
        Ok(self.request_manager.send_list().await?)
    }

    /// Stores the person and returns it with its assigned id
    pub async fn create(&self, new_person: NewPerson) -> Result<Person, StoreError> {
        Ok(self.request_manager.send_create(new_person).await?)
    }

    /// Deleting an id that does not exist is not an error
    pub async fn delete_by_id(&self, id: &EntityId) -> Result<(), StoreError> {
        let removed = self.request_manager.send_remove(id.clone()).await?;

        log::debug!("Deleted {} person(s) with id {}", removed, id);

        Ok(())
    }
}
