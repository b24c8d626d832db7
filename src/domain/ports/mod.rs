//! Port trait definitions (Hexagonal Architecture)
//!
//! The engine depends only on these traits; storage adapters implement them.

pub mod blueprint_store;

pub use blueprint_store::BlueprintStore;
