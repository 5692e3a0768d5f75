//! Build-time description of class-table-inheritance hierarchies.
//!
//! `SeaORM` has no runtime notion of entity inheritance, so the tree is
//! declared up front: every entity registers its table, its optional
//! parent, and (on hierarchy roots) the discriminator column and the
//! ordered discriminator map. The registry validates the declarations
//! once and is immutable afterwards.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{HierarchyError, HierarchyResult};

/// One entity declaration, as supplied by the host.
///
/// Derives `serde` traits so hierarchies can be declared in host
/// configuration files and fed through [`HierarchyRegistry::from_defs`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    /// Registry name of the entity. Namespaced names (`shop::Product`)
    /// are fine; labels are derived from the last path segment.
    pub name: String,
    /// Physical table the entity maps to.
    pub table: String,
    /// Direct parent entity, if any.
    #[serde(default)]
    pub parent: Option<String>,
    /// Explicit display label, overriding the derived one.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Column storing the discriminator value. Set on hierarchy roots.
    #[serde(default)]
    pub discriminator_column: Option<String>,
    /// Ordered `(discriminator value, entity name)` pairs. Set on
    /// hierarchy roots; iteration order is preserved and meaningful.
    #[serde(default)]
    pub discriminator_map: Vec<(String, String)>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            parent: None,
            display_name: None,
            discriminator_column: None,
            discriminator_map: Vec::new(),
        }
    }

    #[must_use]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn discriminator_column(mut self, column: impl Into<String>) -> Self {
        self.discriminator_column = Some(column.into());
        self
    }

    /// Append one entry to the discriminator map.
    #[must_use]
    pub fn variant(mut self, discriminator: impl Into<String>, entity: impl Into<String>) -> Self {
        self.discriminator_map
            .push((discriminator.into(), entity.into()));
        self
    }
}

/// Resolved, validated metadata of one registered entity.
#[derive(Debug, Clone)]
pub struct EntityMeta {
    pub name: String,
    pub table: String,
    pub parent: Option<String>,
    pub display_name: Option<String>,
    pub discriminator_column: Option<String>,
    pub discriminator_map: Vec<(String, String)>,
    /// Topmost ancestor of the entity (itself when it has no parent).
    pub root: String,
}

/// Immutable metadata provider for the hierarchy helper.
#[derive(Debug, Default)]
pub struct HierarchyRegistry {
    entities: HashMap<String, EntityMeta>,
}

impl HierarchyRegistry {
    #[must_use]
    pub fn builder() -> HierarchyRegistryBuilder {
        HierarchyRegistryBuilder { defs: Vec::new() }
    }

    /// Build a registry from deserialized definitions.
    ///
    /// # Errors
    /// Rejects duplicate names, unknown parents, and parent cycles.
    pub fn from_defs(defs: impl IntoIterator<Item = EntityDef>) -> HierarchyResult<Self> {
        let mut by_name: HashMap<String, EntityDef> = HashMap::new();
        let mut names: Vec<String> = Vec::new();
        for def in defs {
            if by_name.contains_key(&def.name) {
                return Err(HierarchyError::DuplicateEntity(def.name));
            }
            names.push(def.name.clone());
            by_name.insert(def.name.clone(), def);
        }

        let mut entities = HashMap::with_capacity(by_name.len());
        for name in names {
            let root = resolve_root(&by_name, &name)?;
            let def = &by_name[&name];
            entities.insert(
                name.clone(),
                EntityMeta {
                    name: def.name.clone(),
                    table: def.table.clone(),
                    parent: def.parent.clone(),
                    display_name: def.display_name.clone(),
                    discriminator_column: def.discriminator_column.clone(),
                    discriminator_map: def.discriminator_map.clone(),
                    root,
                },
            );
        }
        Ok(Self { entities })
    }

    /// Metadata of `entity`.
    ///
    /// # Errors
    /// Returns [`HierarchyError::UnknownEntity`] for unregistered names.
    pub fn meta(&self, entity: &str) -> HierarchyResult<&EntityMeta> {
        self.entities
            .get(entity)
            .ok_or_else(|| HierarchyError::UnknownEntity(entity.to_owned()))
    }

    /// Non-failing lookup, for best-effort paths.
    #[must_use]
    pub fn get(&self, entity: &str) -> Option<&EntityMeta> {
        self.entities.get(entity)
    }
}

/// Collects [`EntityDef`]s and validates them into a registry.
#[derive(Debug, Default)]
pub struct HierarchyRegistryBuilder {
    defs: Vec<EntityDef>,
}

impl HierarchyRegistryBuilder {
    #[must_use]
    pub fn entity(mut self, def: EntityDef) -> Self {
        self.defs.push(def);
        self
    }

    /// # Errors
    /// See [`HierarchyRegistry::from_defs`].
    pub fn build(self) -> HierarchyResult<HierarchyRegistry> {
        HierarchyRegistry::from_defs(self.defs)
    }
}

// Walk the parent chain to the top. The chain is bounded by the number
// of registered entities; revisiting a name means a cycle.
fn resolve_root(defs: &HashMap<String, EntityDef>, entity: &str) -> HierarchyResult<String> {
    let mut current = entity;
    let mut seen = vec![current];
    while let Some(parent) = defs
        .get(current)
        .and_then(|def| def.parent.as_deref())
    {
        if !defs.contains_key(parent) {
            return Err(HierarchyError::UnknownParent {
                entity: current.to_owned(),
                parent: parent.to_owned(),
            });
        }
        if seen.contains(&parent) {
            return Err(HierarchyError::CyclicHierarchy(parent.to_owned()));
        }
        seen.push(parent);
        current = parent;
    }
    Ok(current.to_owned())
}

static CAMEL_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("([a-z0-9])([A-Z])").expect("static regex should not panic")
});

/// Derive a human-readable label from an entity name: take the last
/// path segment, insert a space at every lowercase/digit-to-uppercase
/// transition, and lowercase the result (`CustomProduct` becomes
/// `custom product`).
pub(crate) fn humanize_entity_name(entity: &str) -> String {
    let short = entity.rsplit("::").next().unwrap_or(entity);
    CAMEL_BOUNDARY.replace_all(short, "$1 $2").to_lowercase()
}

// ===================== tests =====================
