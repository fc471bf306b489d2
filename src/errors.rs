use thiserror::Error;

use crate::model::EntityType;

#[derive(Debug, Error)]
pub enum GraphStoreError {
    #[error("validation failed for {entity}: {detail}")]
    Validation { entity: EntityType, detail: String },
    #[error("{entity} not found: {detail}")]
    NotFound { entity: EntityType, detail: String },
    #[error("conflict on {entity}: {detail}")]
    Conflict { entity: EntityType, detail: String },
    #[error("unsupported operation on {entity}: {detail}")]
    Unsupported { entity: EntityType, detail: String },
    #[error("integrity violation on {entity}: {detail}")]
    Integrity { entity: EntityType, detail: String },
    #[error("store error: {0}")]
    Store(String),
    #[error("operation cancelled before commit")]
    Cancelled,
}

impl GraphStoreError {
    pub fn validation<T: Into<String>>(entity: EntityType, detail: T) -> Self {
        GraphStoreError::Validation {
            entity,
            detail: detail.into(),
        }
    }

    pub fn not_found<T: Into<String>>(entity: EntityType, detail: T) -> Self {
        GraphStoreError::NotFound {
            entity,
            detail: detail.into(),
        }
    }

    pub fn conflict<T: Into<String>>(entity: EntityType, detail: T) -> Self {
        GraphStoreError::Conflict {
            entity,
            detail: detail.into(),
        }
    }

    pub fn unsupported<T: Into<String>>(entity: EntityType, detail: T) -> Self {
        GraphStoreError::Unsupported {
            entity,
            detail: detail.into(),
        }
    }

    pub fn integrity<T: Into<String>>(entity: EntityType, detail: T) -> Self {
        GraphStoreError::Integrity {
            entity,
            detail: detail.into(),
        }
    }

    pub fn store<T: Into<String>>(msg: T) -> Self {
        GraphStoreError::Store(msg.into())
    }
}

/// Maps a rusqlite failure, surfacing unique-constraint violations as conflicts.
pub(crate) fn map_sqlite(entity: EntityType, err: rusqlite::Error) -> GraphStoreError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            return GraphStoreError::conflict(entity, err.to_string());
        }
    }
    GraphStoreError::store(err.to_string())
}
