//! Components Module
//!
//! Type-driven component resolution:
//! - Component contract and factories
//! - Registry keyed by declared type and port
//! - Typed slots that pick, or let the user pick, a component
//! - Built-in primitive editors and containers

pub mod types;
pub mod registry;
pub mod slot;
pub mod builtin;

pub use types::{Component, ComponentFactory, ComponentProps, Port};
pub use registry::ComponentRegistry;
pub use slot::{Candidate, SlotLayout, TypedSlot};
pub use builtin::{collect_values, register_builtins};
