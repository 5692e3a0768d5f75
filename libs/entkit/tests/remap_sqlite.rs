#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Discriminator remapping against a real `SQLite` database.

use std::sync::Mutex;

use anyhow::anyhow;
use entkit::hierarchy::{
    EntityDef, EntityHierarchy, HierarchyError, HierarchyInstance, HierarchyRegistry,
    IdentityCache, NoopCache, RemapOutcome,
};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use uuid::Uuid;

struct Persisted {
    entity: &'static str,
    id: Uuid,
}

impl HierarchyInstance for Persisted {
    fn entity_name(&self) -> &str {
        self.entity
    }
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Default)]
struct RecordingCache {
    evicted: Mutex<Vec<String>>,
}

impl IdentityCache for RecordingCache {
    fn evict(&self, root_entity: &str) -> anyhow::Result<()> {
        self.evicted.lock().unwrap().push(root_entity.to_owned());
        Ok(())
    }
}

struct FailingCache;

impl IdentityCache for FailingCache {
    fn evict(&self, _root_entity: &str) -> anyhow::Result<()> {
        Err(anyhow!("cache is read-only"))
    }
}

fn registry() -> HierarchyRegistry {
    HierarchyRegistry::builder()
        .entity(
            EntityDef::new("Product", "product")
                .discriminator_column("type")
                .variant("product", "Product")
                .variant("custom", "CustomProduct"),
        )
        .entity(EntityDef::new("CustomProduct", "product").parent("Product"))
        .entity(
            EntityDef::new("Invoice", "invoice")
                .discriminator_column("type")
                .variant("invoice", "Invoice"),
        )
        .build()
        .unwrap()
}

async fn setup() -> DatabaseConnection {
    let conn = Database::connect("sqlite::memory:").await.unwrap();
    conn.execute_unprepared(
        "CREATE TABLE product (id BLOB NOT NULL, type TEXT NOT NULL, name TEXT NOT NULL)",
    )
    .await
    .unwrap();
    conn
}

async fn insert_product(conn: &DatabaseConnection, id: Uuid, discriminator: &str, name: &str) {
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        r#"INSERT INTO "product" ("id", "type", "name") VALUES ($1, $2, $3)"#,
        [id.into(), discriminator.into(), name.into()],
    ))
    .await
    .unwrap();
}

async fn stored_discriminator(conn: &DatabaseConnection, id: Uuid) -> String {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            r#"SELECT "type" FROM "product" WHERE "id" = $1"#,
            [id.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<String>("", "type").unwrap()
}

#[tokio::test]
async fn remaps_a_row_to_the_target_type() {
    let conn = setup().await;
    let registry = registry();
    let helper = EntityHierarchy::new(&registry);
    let id = Uuid::new_v4();
    insert_product(&conn, id, "product", "Widget").await;

    let outcome = helper
        .remap_entity(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "Product",
                id,
            },
            "CustomProduct",
        )
        .await
        .unwrap();

    match outcome {
        RemapOutcome::Remapped(Some(row)) => {
            assert_eq!(row["type"], "custom");
            assert_eq!(row["name"], "Widget");
        }
        other => panic!("expected a reloaded row, got {other:?}"),
    }
    assert_eq!(stored_discriminator(&conn, id).await, "custom");
}

#[tokio::test]
async fn equal_discriminators_make_the_call_a_noop() {
    let conn = setup().await;
    let registry = registry();
    let helper = EntityHierarchy::new(&registry);
    let id = Uuid::new_v4();
    insert_product(&conn, id, "product", "Widget").await;

    helper
        .remap_entity(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "Product",
                id,
            },
            "CustomProduct",
        )
        .await
        .unwrap();

    // The row now is a custom_product; asking for the same target again
    // resolves to equal discriminators and writes nothing.
    let outcome = helper
        .remap_entity(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "CustomProduct",
                id,
            },
            "CustomProduct",
        )
        .await
        .unwrap();

    assert!(matches!(outcome, RemapOutcome::Unchanged));
    assert_eq!(stored_discriminator(&conn, id).await, "custom");
}

#[tokio::test]
async fn remap_to_best_type_elevates_and_then_settles() {
    let conn = setup().await;
    let registry = registry();
    let helper = EntityHierarchy::new(&registry);
    let id = Uuid::new_v4();
    insert_product(&conn, id, "product", "Widget").await;

    let outcome = helper
        .remap_to_best_type(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "Product",
                id,
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RemapOutcome::Remapped(Some(_))));
    assert_eq!(stored_discriminator(&conn, id).await, "custom");

    let settled = helper
        .remap_to_best_type(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "CustomProduct",
                id,
            },
        )
        .await
        .unwrap();
    assert!(matches!(settled, RemapOutcome::Unchanged));
}

#[tokio::test]
async fn cross_table_remaps_are_rejected_without_writing() {
    let conn = setup().await;
    let registry = registry();
    let helper = EntityHierarchy::new(&registry);
    let id = Uuid::new_v4();
    insert_product(&conn, id, "product", "Widget").await;

    let err = helper
        .remap_entity(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "Product",
                id,
            },
            "Invoice",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HierarchyError::CrossTableRemap { .. }));
    assert_eq!(stored_discriminator(&conn, id).await, "product");
}

#[tokio::test]
async fn the_root_entity_is_evicted_before_the_update() {
    let conn = setup().await;
    let registry = registry();
    let helper = EntityHierarchy::new(&registry);
    let cache = RecordingCache::default();
    let id = Uuid::new_v4();
    insert_product(&conn, id, "custom", "Widget").await;

    helper
        .remap_entity(
            &conn,
            &cache,
            &Persisted {
                entity: "CustomProduct",
                id,
            },
            "Product",
        )
        .await
        .unwrap();

    assert_eq!(*cache.evicted.lock().unwrap(), vec!["Product".to_owned()]);
    assert_eq!(stored_discriminator(&conn, id).await, "product");
}

#[tokio::test]
async fn failing_evictions_abort_the_remap() {
    let conn = setup().await;
    let registry = registry();
    let helper = EntityHierarchy::new(&registry);
    let id = Uuid::new_v4();
    insert_product(&conn, id, "product", "Widget").await;

    let err = helper
        .remap_entity(
            &conn,
            &FailingCache,
            &Persisted {
                entity: "Product",
                id,
            },
            "CustomProduct",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HierarchyError::Evict(_)));
    assert_eq!(stored_discriminator(&conn, id).await, "product");
}

#[tokio::test]
async fn update_failures_degrade_to_a_reload_of_the_old_row() {
    let conn = setup().await;
    // The registry claims a discriminator column the table does not
    // have, so the direct update fails while the reload still works.
    let registry = HierarchyRegistry::builder()
        .entity(
            EntityDef::new("Gadget", "gadget")
                .discriminator_column("kind")
                .variant("a", "Gadget")
                .variant("b", "GadgetPro"),
        )
        .entity(EntityDef::new("GadgetPro", "gadget").parent("Gadget"))
        .build()
        .unwrap();
    let helper = EntityHierarchy::new(&registry);
    conn.execute_unprepared("CREATE TABLE gadget (id BLOB NOT NULL, name TEXT NOT NULL)")
        .await
        .unwrap();
    let id = Uuid::new_v4();
    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        r#"INSERT INTO "gadget" ("id", "name") VALUES ($1, $2)"#,
        [id.into(), "Thing".into()],
    ))
    .await
    .unwrap();

    let outcome = helper
        .remap_entity(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "Gadget",
                id,
            },
            "GadgetPro",
        )
        .await
        .unwrap();

    match outcome {
        RemapOutcome::Remapped(Some(row)) => assert_eq!(row["name"], "Thing"),
        other => panic!("expected a reloaded row, got {other:?}"),
    }
}

#[tokio::test]
async fn remapping_a_missing_row_reloads_nothing() {
    let conn = setup().await;
    let registry = registry();
    let helper = EntityHierarchy::new(&registry);

    let outcome = helper
        .remap_entity(
            &conn,
            &NoopCache,
            &Persisted {
                entity: "Product",
                id: Uuid::new_v4(),
            },
            "CustomProduct",
        )
        .await
        .unwrap();

    assert!(matches!(outcome, RemapOutcome::Remapped(None)));
}
