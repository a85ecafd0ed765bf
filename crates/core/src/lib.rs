//! `taskwell-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no scheduling or
//! runtime concerns): strongly-typed identifiers, the priority ordering
//! type, and the domain error model.

pub mod error;
pub mod id;
pub mod priority;

pub use error::{CoreError, CoreResult};
pub use id::TaskId;
pub use priority::Priority;
