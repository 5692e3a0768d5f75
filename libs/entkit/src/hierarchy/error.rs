use thiserror::Error;
use uuid::Uuid;

/// Module-local result type.
pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Typed error for the entity hierarchy helper.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("duplicate entity definition: {0}")]
    DuplicateEntity(String),

    #[error("entity '{entity}' declares unknown parent '{parent}'")]
    UnknownParent { entity: String, parent: String },

    #[error("parent cycle detected at entity: {0}")]
    CyclicHierarchy(String),

    #[error("entity '{0}' has no discriminator column")]
    NoDiscriminatorColumn(String),

    /// Remapping is only valid inside one class-table-inheritance group.
    #[error("cannot remap between different tables: '{from}' != '{to}'")]
    CrossTableRemap { from: String, to: String },

    #[error("parent entity not found: {0}")]
    ParentNotFound(Uuid),

    #[error("parent lookup returned more than one row for id {0}")]
    AmbiguousParent(Uuid),

    /// The host's identity cache refused to drop its stale instances.
    #[error("identity cache eviction failed: {0}")]
    Evict(#[source] anyhow::Error),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}
