//! Type Node
//!
//! Parsed representation of a type schema string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (possibly generic) type declared by the backend.
///
/// `typing.Dict[str, int]` becomes a node named `typing.Dict` with two leaf
/// arguments. Trees are plain data: they are built once by the parser and
/// only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeNode {
    /// Fully dotted type name, e.g. `ssui.base.Image`
    pub name: String,
    /// Generic arguments in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeNode>,
}

impl TypeNode {
    /// Create a node without generic arguments
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Create a node with generic arguments
    pub fn generic(name: impl Into<String>, args: Vec<TypeNode>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.args.is_empty()
    }

    /// Last dotted segment of the name (`typing.List` -> `List`)
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Maximum nesting depth, a leaf has depth 1
    pub fn depth(&self) -> usize {
        1 + self.args.iter().map(TypeNode::depth).max().unwrap_or(0)
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
