//! Component Types
//!
//! The contract between the resolver and the editors/previews it creates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::registry::ComponentRegistry;
use crate::schema::TypeNode;

/// Direction of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    /// Editor for an operation parameter
    Input,
    /// Preview for an operation result
    Output,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

impl FromStr for Port {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            other => Err(format!("unknown port '{}', expected 'input' or 'output'", other)),
        }
    }
}

/// A live editor or preview created by a [`ComponentFactory`].
///
/// `on_execute` yields the value that is sent to the backend when the user
/// runs an operation; `on_update` pushes a value (for example a streamed
/// partial result) into the component.
pub trait Component: Send {
    fn on_execute(&self) -> Option<Value>;

    fn on_update(&mut self, _data: &Value) {}
}

/// Everything a factory gets when it is asked to build a component
#[derive(Clone)]
pub struct ComponentProps {
    /// Generic arguments of the declared type (`[str, int]` for `Dict[str, int]`)
    pub type_args: Vec<TypeNode>,
    /// Port the component is created for
    pub port: Port,
    /// Registry used by containers to resolve nested slots
    pub registry: Arc<ComponentRegistry>,
}

impl fmt::Debug for ComponentProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentProps")
            .field("type_args", &self.type_args)
            .field("port", &self.port)
            .finish()
    }
}

type CreateFn = dyn Fn(ComponentProps) -> Box<dyn Component> + Send + Sync;

/// Named constructor for one kind of component
#[derive(Clone)]
pub struct ComponentFactory {
    /// Unique identity, also shown as the tab title
    pub name: String,
    /// Top-level type name this component handles, e.g. `typing.List`
    pub handled_type: String,
    /// Port this component serves
    pub port: Port,
    create: Arc<CreateFn>,
}

impl ComponentFactory {
    pub fn new<F>(
        name: impl Into<String>,
        handled_type: impl Into<String>,
        port: Port,
        create: F,
    ) -> Self
    where
        F: Fn(ComponentProps) -> Box<dyn Component> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handled_type: handled_type.into(),
            port,
            create: Arc::new(create),
        }
    }

    /// Instantiate a new component
    pub fn create(&self, props: ComponentProps) -> Box<dyn Component> {
        (self.create)(props)
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("name", &self.name)
            .field("handled_type", &self.handled_type)
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_round_trip() {
        assert_eq!("input".parse::<Port>().unwrap(), Port::Input);
        assert_eq!(Port::Output.to_string(), "output");
        assert!("sideways".parse::<Port>().is_err());
        assert_eq!(serde_json::to_string(&Port::Input).unwrap(), "\"input\"");
    }
}
