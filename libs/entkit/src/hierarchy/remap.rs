//! In-place discriminator remapping.
//!
//! Changing a row's discriminator changes the concrete type it loads as
//! on the next query. The mapping framework does not support this
//! operation; the update goes straight to the row store, and any
//! instances the host still holds in memory become stale. Callers are
//! expected to discard and re-read their state afterwards.

use sea_orm::{ConnectionTrait, DatabaseBackend, FromQueryResult, JsonValue, Statement};
use tracing::{error, warn};
use uuid::Uuid;

use super::EntityHierarchy;
use super::error::{HierarchyError, HierarchyResult};

/// A persisted row whose concrete type is known to the registry.
///
/// The remap operations only need the registry name of the instance's
/// runtime type and its row identifier.
pub trait HierarchyInstance {
    /// Registry name of the instance's concrete entity.
    fn entity_name(&self) -> &str;
    /// Primary identifier of the row.
    fn id(&self) -> Uuid;
}

/// Hook into the host's first-level entity cache.
///
/// Before a discriminator is rewritten, every cached instance of the
/// affected hierarchy must be dropped so no caller keeps observing the
/// old type. Eviction failures abort the remap.
pub trait IdentityCache {
    /// Evict every cached instance belonging to `root_entity`'s
    /// hierarchy.
    ///
    /// # Errors
    /// Any error aborts the remap before the row is touched.
    fn evict(&self, root_entity: &str) -> anyhow::Result<()>;
}

/// For hosts without a first-level cache (`SeaORM` keeps none).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl IdentityCache for NoopCache {
    fn evict(&self, _root_entity: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Result of a remap call.
#[derive(Debug)]
pub enum RemapOutcome {
    /// Source and target resolve to the same discriminator; nothing was
    /// written.
    Unchanged,
    /// The discriminator was rewritten. The payload is the row re-read
    /// under the target type, or `None` when it can no longer be found.
    Remapped(Option<JsonValue>),
}

impl EntityHierarchy<'_> {
    /// Remap `from` to the most derived known subtype of its hierarchy.
    ///
    /// Returns [`RemapOutcome::Unchanged`] when the instance already is
    /// the best type; otherwise delegates to [`Self::remap_entity`].
    ///
    /// # Errors
    /// See [`Self::remap_entity`].
    pub async fn remap_to_best_type<C>(
        &self,
        conn: &C,
        cache: &impl IdentityCache,
        from: &impl HierarchyInstance,
    ) -> HierarchyResult<RemapOutcome>
    where
        C: ConnectionTrait,
    {
        let best = self.best_of_type(from.entity_name())?;
        if best == from.entity_name() {
            return Ok(RemapOutcome::Unchanged);
        }
        self.remap_entity(conn, cache, from, &best).await
    }

    /// Rewrite the discriminator of `from`'s row so future loads resolve
    /// it as `to`.
    ///
    /// Both entities must belong to one class-table-inheritance group
    /// (same physical table). Equal discriminators make the call a
    /// no-op. A failing update is logged and swallowed; the row then
    /// keeps its previous type, and the caller sees it in the reloaded
    /// payload.
    ///
    /// This is not an operation the mapping framework supports: any
    /// in-memory instance of the affected hierarchy is stale after this
    /// call and must be re-read.
    ///
    /// # Errors
    /// - [`HierarchyError::CrossTableRemap`] when the tables differ.
    /// - [`HierarchyError::NoDiscriminatorColumn`] when the source
    ///   hierarchy declares none.
    /// - [`HierarchyError::Evict`] when the identity cache cannot be
    ///   cleared.
    /// - [`HierarchyError::Db`] when the reload fails.
    pub async fn remap_entity<C>(
        &self,
        conn: &C,
        cache: &impl IdentityCache,
        from: &impl HierarchyInstance,
        to: &str,
    ) -> HierarchyResult<RemapOutcome>
    where
        C: ConnectionTrait,
    {
        let from_entity = from.entity_name();
        let from_discriminator = self.discriminator_for(from_entity)?;
        let to_discriminator = self.discriminator_for(to)?;
        if from_discriminator == to_discriminator {
            return Ok(RemapOutcome::Unchanged);
        }

        let from_meta = self.registry.meta(from_entity)?;
        let to_table = &self.registry.meta(to)?.table;
        if &from_meta.table != to_table {
            return Err(HierarchyError::CrossTableRemap {
                from: from_meta.table.clone(),
                to: to_table.clone(),
            });
        }
        let Some(column) = from_meta.discriminator_column.as_deref() else {
            return Err(HierarchyError::NoDiscriminatorColumn(from_entity.to_owned()));
        };
        let table = from_meta.table.as_str();
        let root = from_meta.root.as_str();

        if let Err(e) = cache.evict(root) {
            error!(root, error = %e, "identity cache eviction failed before remap");
            return Err(HierarchyError::Evict(e));
        }

        let backend = conn.get_database_backend();
        let id = from.id();
        let update = match backend {
            DatabaseBackend::MySql => {
                format!("UPDATE `{table}` SET `{column}` = ? WHERE `id` = ?")
            }
            _ => format!(r#"UPDATE "{table}" SET "{column}" = $1 WHERE "id" = $2"#),
        };
        if let Err(e) = conn
            .execute(Statement::from_sql_and_values(
                backend,
                &update,
                [to_discriminator.into(), id.into()],
            ))
            .await
        {
            warn!(
                table,
                %id,
                error = %e,
                "discriminator update failed; the row keeps its previous type"
            );
        }

        let select = match backend {
            DatabaseBackend::MySql => format!("SELECT * FROM `{table}` WHERE `id` = ?"),
            _ => format!(r#"SELECT * FROM "{table}" WHERE "id" = $1"#),
        };
        let row = conn
            .query_one(Statement::from_sql_and_values(backend, &select, [id.into()]))
            .await?;
        let reloaded = row
            .map(|row| JsonValue::from_query_result(&row, ""))
            .transpose()?;
        Ok(RemapOutcome::Remapped(reloaded))
    }
}
