//! strata-lib: engine of the strata build orchestrator.
//!
//! - `definitions`: the component graph, loaded from YAML documents
//! - `assembly`: recursive, cache-aware assembly of a component
//! - `cache`: write-once artifact archives keyed by component identity
//! - `sandbox`: per-component build directories, environment and execution
//! - `repos`: source trees from git mirrors

pub mod assembly;
pub mod buildsystem;
pub mod cache;
pub mod cache_lock;
pub mod consts;
pub mod definitions;
pub mod platform;
pub mod repos;
pub mod sandbox;
pub mod settings;
pub mod util;
