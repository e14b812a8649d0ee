//! Property collector
//!
//! Queries walk the registry's object graph from a set of roots along
//! [`TraversalSpec`]s and report the requested properties of every reached
//! object. One-shot queries are paged behind continuation tokens; filters
//! turn the same queries into change subscriptions delivered by
//! [`PropertyCollector::wait_for_updates_ex`].
//!
//! ```ignore
//! let pc = PropertyCollector::new(registry.clone(), CollectorConfig::default());
//! let spec = PropertyFilterSpec::new()
//!     .prop(PropertySpec::new("VirtualMachine").path("runtime.powerState"))
//!     .object(ObjectSpec::new(root).skip(true).select(
//!         TraversalSpec::new("folder", "Folder", "childEntity")
//!             .select(SelectionSpec::named("folder")),
//!     ));
//! pc.create_filter(spec, false)?;
//! let initial = pc.wait_for_updates_ex("", WaitOptions::default()).await?;
//! ```

mod collector;
mod config;
mod content;
mod filter;
mod query;
mod resolve;
mod retrieve;
mod select;
mod update;

pub use collector::{PropertyCollector, INITIAL_VERSION};
pub use config::CollectorConfig;
pub use content::{DynamicProperty, MissingProperty, ObjectContent, RetrieveOptions, RetrieveResult};
pub use filter::PropertyFilter;
pub use query::{ObjectSpec, PropertyFilterSpec, PropertySpec, SelectionSpec, TraversalSpec};
pub use update::{ObjectUpdate, PropertyFilterUpdate, UpdateKind, UpdateSet, WaitOptions};
