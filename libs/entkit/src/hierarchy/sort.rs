//! Sibling position re-sequencing.

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use super::error::{HierarchyError, HierarchyResult};

/// Contract an entity must satisfy to take part in re-sequencing: an
/// identifier, a nullable parent reference, and a position column.
///
/// The contract is checked at compile time; an entity that cannot
/// supply these columns cannot be passed to [`sort_entities`].
pub trait TreeEntity: EntityTrait {
    fn id_col() -> Self::Column;
    fn parent_col() -> Self::Column;
    fn position_col() -> Self::Column;

    fn id_of(model: &Self::Model) -> Uuid;
    fn parent_of(model: &Self::Model) -> Option<Uuid>;
}

/// Re-sequence `item`'s sibling group so it lands right after the
/// sibling identified by `previous_id`, or at the front when
/// `previous_id` is `None`.
///
/// Every sibling is renumbered so the group's positions form a dense,
/// zero-based sequence. When `previous_id` matches no sibling, the item
/// is appended at the end. When the item currently has a parent whose
/// id differs from `parent_id`, it is re-attached first: to the entity
/// with `id = parent_id` (which must exist exactly once), or to the
/// root level when `parent_id` is `None`.
///
/// The moved item itself never takes part in the generic renumbering
/// walk; it is placed exactly once. All parent and position changes are
/// committed in a single transaction.
///
/// Two concurrent calls on the same sibling group are not serialized by
/// this function and can leave the group inconsistent; callers needing
/// that guarantee must serialize externally.
///
/// # Errors
/// - [`HierarchyError::ParentNotFound`] when `parent_id` matches no row.
/// - [`HierarchyError::AmbiguousParent`] when `parent_id` matches more
///   than one row.
/// - [`HierarchyError::Db`] for query or transaction failures.
pub async fn sort_entities<E, C>(
    conn: &C,
    item: &E::Model,
    previous_id: Option<Uuid>,
    parent_id: Option<Uuid>,
) -> HierarchyResult<()>
where
    E: TreeEntity,
    C: ConnectionTrait + TransactionTrait,
{
    let item_id = E::id_of(item);
    let mut parent = E::parent_of(item);
    let mut parent_changed = false;

    // Re-resolve the parent only when the item currently has one and it
    // differs from the requested target.
    if parent.is_some() && parent != parent_id {
        if let Some(target) = parent_id {
            let matches = E::find()
                .filter(E::id_col().eq(target))
                .order_by_asc(E::position_col())
                .all(conn)
                .await?;
            match matches.len() {
                0 => return Err(HierarchyError::ParentNotFound(target)),
                1 => {}
                _ => return Err(HierarchyError::AmbiguousParent(target)),
            }
        }
        parent = parent_id;
        parent_changed = true;
    }

    let siblings = match parent {
        Some(pid) => {
            E::find()
                .filter(E::parent_col().eq(pid))
                .order_by_asc(E::position_col())
                .all(conn)
                .await?
        }
        None => {
            E::find()
                .filter(E::parent_col().is_null())
                .order_by_asc(E::position_col())
                .all(conn)
                .await?
        }
    };

    let mut plan: Vec<(Uuid, i64)> = Vec::with_capacity(siblings.len() + 1);
    match previous_id {
        None => {
            plan.push((item_id, 0));
            let mut position = 1;
            for sibling in &siblings {
                let sibling_id = E::id_of(sibling);
                if sibling_id != item_id {
                    plan.push((sibling_id, position));
                    position += 1;
                }
            }
        }
        Some(previous) => {
            let mut position = 0;
            let mut placed = false;
            for sibling in &siblings {
                let sibling_id = E::id_of(sibling);
                if sibling_id == item_id {
                    continue;
                }
                plan.push((sibling_id, position));
                position += 1;
                if sibling_id == previous {
                    plan.push((item_id, position));
                    position += 1;
                    placed = true;
                }
            }
            if !placed {
                plan.push((item_id, position));
            }
        }
    }

    // One flush: the parent change and every new position land together.
    let txn = conn.begin().await?;
    if parent_changed {
        E::update_many()
            .col_expr(E::parent_col(), Expr::value(parent))
            .filter(E::id_col().eq(item_id))
            .exec(&txn)
            .await?;
    }
    for (id, position) in plan {
        E::update_many()
            .col_expr(E::position_col(), Expr::value(position))
            .filter(E::id_col().eq(id))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;
    Ok(())
}
