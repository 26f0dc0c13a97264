use crate::cache::CacheError;
use crate::registry::StoreError;
use shared::EntityId;
use thiserror::Error;

/// Failure while stepping a single entity. The entity is left as it was.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("entity {id} reached a non-finite position or velocity")]
    NonFinite { id: EntityId },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("must authenticate first")]
    NotAuthenticated,
    #[error("session owns no player entity")]
    PlayerNotFound,
    #[error("entity id {id} is already in use")]
    IdInUse { id: EntityId },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("entity data encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}
