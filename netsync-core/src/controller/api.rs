//! The controller's object CRUD interface.
//!
//! The real REST client lives outside this crate; everything here talks to it
//! through `ControllerApi`.

use thiserror::Error;
use uuid::Uuid;

use super::objects::{ControllerObject, ObjectKind, TypedObject};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ObjectKind, id: Uuid },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: ObjectKind, id: Uuid },

    #[error("{kind} {id} refers to missing {missing} {missing_id}")]
    DanglingRef {
        kind: ObjectKind,
        id: Uuid,
        missing: ObjectKind,
        missing_id: Uuid,
    },

    #[error("{kind} {id} has no parent {parent}")]
    MissingParent {
        kind: ObjectKind,
        id: Uuid,
        parent: String,
    },

    #[error("{kind} {id} is still referenced")]
    InUse { kind: ObjectKind, id: Uuid },

    #[error("controller request failed: {0}")]
    Request(String),
}

/// Object store operations consumed from the controller.
pub trait ControllerApi {
    fn create(&mut self, object: &ControllerObject) -> Result<(), ControllerError>;

    /// Find by id. `Ok(None)` means the object does not exist.
    fn read(&mut self, kind: ObjectKind, id: Uuid)
        -> Result<Option<ControllerObject>, ControllerError>;

    fn update(&mut self, object: &ControllerObject) -> Result<(), ControllerError>;

    fn delete(&mut self, kind: ObjectKind, id: Uuid) -> Result<(), ControllerError>;

    fn find_by_name(
        &mut self,
        kind: ObjectKind,
        parent: &[String],
        name: &str,
    ) -> Result<Option<Uuid>, ControllerError>;

    /// Ids of every object of `kind` directly under `parent`.
    fn list(&mut self, kind: ObjectKind, parent: &[String]) -> Result<Vec<Uuid>, ControllerError>;
}

/// Typed helpers on top of `ControllerApi`.
pub trait ControllerApiExt: ControllerApi {
    fn fetch<T: TypedObject>(&mut self, id: Uuid) -> Result<Option<T>, ControllerError> {
        Ok(self.read(T::KIND, id)?.and_then(T::from_object))
    }

    fn create_typed<T: TypedObject>(&mut self, object: T) -> Result<(), ControllerError> {
        self.create(&object.into_object())
    }
}

impl<C: ControllerApi + ?Sized> ControllerApiExt for C {}
