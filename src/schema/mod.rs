//! Type Schema Module
//!
//! The backend describes every operation parameter and return value with a
//! `typing`-like schema string such as `typing.List[ssui.base.Image]`.
//! This module turns those strings into [`TypeNode`] trees that the
//! component resolver can match against.

pub mod node;
pub mod parser;

pub use node::TypeNode;
pub use parser::{parse, SchemaError, SchemaResult};
