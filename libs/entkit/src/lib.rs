//! Entity hierarchy and result-pairing helpers on top of `SeaORM`.
//!
//! Two loosely related pieces live here:
//!
//! - [`pairs`] turns an executed SQL result set into a flat list or a
//!   key/value map, resolving the key and value columns from the result
//!   schema when the caller does not name them.
//! - [`hierarchy`] reasons about class-table-inheritance hierarchies
//!   described by a [`HierarchyRegistry`]: variant discovery with
//!   human-readable labels, best-subtype resolution, in-place
//!   discriminator remapping, and sibling position re-sequencing.
//!
//! The crate never owns a connection or a session. Every operation that
//! touches the database takes the caller's `&impl ConnectionTrait` (or
//! transaction) as a parameter, so the same registry can safely serve
//! concurrent call sites.
//!
//! # Example
//!
//! ```rust,no_run
//! use entkit::{EntityDef, EntityHierarchy, HierarchyRegistry};
//!
//! # fn main() -> Result<(), entkit::HierarchyError> {
//! let registry = HierarchyRegistry::builder()
//!     .entity(
//!         EntityDef::new("Product", "shop_product")
//!             .discriminator_column("type")
//!             .variant("product", "Product")
//!             .variant("custom", "CustomProduct"),
//!     )
//!     .entity(EntityDef::new("CustomProduct", "shop_product").parent("Product"))
//!     .build()?;
//!
//! let helper = EntityHierarchy::new(&registry);
//! assert_eq!(helper.best_of_type("Product")?, "CustomProduct");
//! # Ok(())
//! # }
//! ```

pub mod hierarchy;
pub mod pairs;

pub use hierarchy::{
    EntityDef, EntityHierarchy, EntityMeta, HierarchyError, HierarchyInstance, HierarchyRegistry,
    HierarchyResult, IdentityCache, NoopCache, RemapOutcome, TreeEntity, sort_entities,
};
pub use pairs::{Pairs, PairsError, PairsResult, query_pairs, to_pairs};
