//! Helpers for class-table-inheritance hierarchies.
//!
//! A [`HierarchyRegistry`] describes which entities share a table, how
//! they relate, and which discriminator value identifies each concrete
//! subtype. [`EntityHierarchy`] answers questions about that tree
//! (variants, best subtype, discriminators) and performs the two
//! mutating operations: discriminator remapping and sibling position
//! re-sequencing ([`sort_entities`]).
//!
//! The helper holds only the registry reference. Connections, caches,
//! and transactions are passed per call.

mod error;
mod registry;
mod remap;
mod sort;

pub use error::{HierarchyError, HierarchyResult};
pub use registry::{EntityDef, EntityMeta, HierarchyRegistry, HierarchyRegistryBuilder};
pub use remap::{HierarchyInstance, IdentityCache, NoopCache, RemapOutcome};
pub use sort::{TreeEntity, sort_entities};

use tracing::warn;

/// Read-side and remap operations over one [`HierarchyRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct EntityHierarchy<'r> {
    registry: &'r HierarchyRegistry,
}

impl<'r> EntityHierarchy<'r> {
    #[must_use]
    pub fn new(registry: &'r HierarchyRegistry) -> Self {
        Self { registry }
    }

    /// Return the concrete variants of `entity` as ordered
    /// `(entity name, label)` pairs, in discriminator-map order.
    ///
    /// Labels come from the variant's registered display name when it
    /// has one, otherwise from its humanized short name. Entries named
    /// in `exclude` are removed. Entities without a discriminator map
    /// (anything but a hierarchy root) yield an empty list.
    ///
    /// # Errors
    /// Returns [`HierarchyError::UnknownEntity`] for unregistered names.
    pub fn entity_variants(
        &self,
        entity: &str,
        exclude: Option<&[&str]>,
    ) -> HierarchyResult<Vec<(String, String)>> {
        let meta = self.registry.meta(entity)?;

        let mut variants = Vec::with_capacity(meta.discriminator_map.len());
        for (_, variant) in &meta.discriminator_map {
            let label = self
                .registry
                .get(variant)
                .and_then(|m| m.display_name.clone())
                .unwrap_or_else(|| registry::humanize_entity_name(variant));
            variants.push((variant.clone(), label));
        }

        if let Some(exclude) = exclude {
            variants.retain(|(name, _)| !exclude.contains(&name.as_str()));
        }
        Ok(variants)
    }

    /// Return the most derived known subtype of `entity`.
    ///
    /// With zero or one variants there is nothing to disambiguate and
    /// the input comes back unchanged. Otherwise the variant with the
    /// greatest inheritance depth wins; on equal depth the variant seen
    /// first in discriminator-map order is kept.
    ///
    /// # Errors
    /// Returns [`HierarchyError::UnknownEntity`] for unregistered names.
    pub fn best_of_type(&self, entity: &str) -> HierarchyResult<String> {
        let variants = self.entity_variants(entity, None)?;
        if variants.len() <= 1 {
            return Ok(entity.to_owned());
        }

        let mut top_depth = 0;
        let mut top_type = entity.to_owned();
        for (variant, _) in variants {
            let depth = self.inheritance_depth(&variant);
            if depth > top_depth {
                top_depth = depth;
                top_type = variant;
            }
        }
        Ok(top_type)
    }

    /// Physical table name of `entity`.
    ///
    /// # Errors
    /// Returns [`HierarchyError::UnknownEntity`] for unregistered names.
    pub fn table_name(&self, entity: &str) -> HierarchyResult<&str> {
        Ok(self.registry.meta(entity)?.table.as_str())
    }

    /// Root entity of `entity`'s hierarchy (itself when it has no
    /// parent).
    ///
    /// # Errors
    /// Returns [`HierarchyError::UnknownEntity`] for unregistered names.
    pub fn root_entity_name(&self, entity: &str) -> HierarchyResult<&str> {
        Ok(self.registry.meta(entity)?.root.as_str())
    }

    /// Discriminator value identifying `entity` inside its hierarchy.
    ///
    /// The entity's own discriminator map is consulted first, then the
    /// root entity's map. An empty string means the entity carries no
    /// discriminator, which is a valid state for hierarchy roots, not
    /// an error.
    ///
    /// # Errors
    /// Returns [`HierarchyError::UnknownEntity`] for unregistered names.
    pub fn discriminator_for(&self, entity: &str) -> HierarchyResult<String> {
        let meta = self.registry.meta(entity)?;
        if let Some(discriminator) = discriminator_in(meta, entity) {
            return Ok(discriminator);
        }

        let root = self.registry.meta(&meta.root)?;
        Ok(discriminator_in(root, entity).unwrap_or_default())
    }

    // Depth of the parent chain: a parentless entity counts 1, each
    // ancestor adds 1. Unregistered names rank at 0 so a stray map
    // entry never wins the best-of-type ranking.
    fn inheritance_depth(&self, entity: &str) -> usize {
        let Some(mut meta) = self.registry.get(entity) else {
            warn!(entity, "entity is not registered; ranking it at depth 0");
            return 0;
        };

        let mut depth = 1;
        while let Some(parent) = meta.parent.as_deref() {
            match self.registry.get(parent) {
                Some(parent_meta) => {
                    meta = parent_meta;
                    depth += 1;
                }
                None => {
                    warn!(entity, parent, "parent is not registered; ranking at depth 0");
                    return 0;
                }
            }
        }
        depth
    }
}

fn discriminator_in(meta: &EntityMeta, entity: &str) -> Option<String> {
    meta.discriminator_map
        .iter()
        .find(|(_, variant)| variant == entity)
        .map(|(discriminator, _)| discriminator.clone())
}

// ===================== tests =====================
