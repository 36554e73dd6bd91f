//! Typed Slot
//!
//! Resolves a declared type to the components that can edit or display it.
//! When several components match, the slot behaves as a tab strip: every
//! candidate stays instantiated and only the selected one receives
//! `on_execute` / `on_update`.

use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

use super::registry::ComponentRegistry;
use super::types::{Component, ComponentProps, Port};
use crate::schema::{self, SchemaResult, TypeNode};

/// How a slot presents its candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLayout {
    /// No registered component, a "not available" notice is shown
    Placeholder,
    /// Exactly one component, rendered directly
    Single,
    /// Several components, rendered as tabs
    Tabs,
}

/// One instantiated candidate component
pub struct Candidate {
    /// Factory name, used as the tab title
    pub name: String,
    instance: Box<dyn Component>,
}

impl Candidate {
    pub fn component(&self) -> &dyn Component {
        self.instance.as_ref()
    }
}

/// A slot for one declared type on one port
pub struct TypedSlot {
    declared: TypeNode,
    port: Port,
    candidates: Vec<Candidate>,
    active: usize,
}

impl TypedSlot {
    /// Parse `declared_type` and resolve it against the registry
    pub fn new(
        registry: &Arc<ComponentRegistry>,
        declared_type: &str,
        port: Port,
    ) -> SchemaResult<Self> {
        let node = schema::parse(declared_type)?;
        Ok(Self::from_node(registry, node, port))
    }

    /// Resolve an already parsed type
    pub fn from_node(registry: &Arc<ComponentRegistry>, declared: TypeNode, port: Port) -> Self {
        let factories = registry.get_by_type_and_port(&declared.name, port);

        if factories.is_empty() {
            warn!("No {} component available for {}", port, declared);
        } else {
            debug!(
                "Resolved {} ({}) to {} candidate(s)",
                declared,
                port,
                factories.len()
            );
        }

        let candidates = factories
            .iter()
            .map(|factory| Candidate {
                name: factory.name.clone(),
                instance: factory.create(ComponentProps {
                    type_args: declared.args.clone(),
                    port,
                    registry: registry.clone(),
                }),
            })
            .collect();

        Self {
            declared,
            port,
            candidates,
            active: 0,
        }
    }

    pub fn declared_type(&self) -> &TypeNode {
        &self.declared
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn layout(&self) -> SlotLayout {
        match self.candidates.len() {
            0 => SlotLayout::Placeholder,
            1 => SlotLayout::Single,
            _ => SlotLayout::Tabs,
        }
    }

    /// Text shown in place of a component when nothing matched
    pub fn placeholder_text(&self) -> Option<String> {
        if self.candidates.is_empty() {
            Some(format!("No {} component available for {}", self.port, self.declared))
        } else {
            None
        }
    }

    /// Candidate names in tab order
    pub fn candidate_names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Index of the selected candidate, `None` for a placeholder
    pub fn active_index(&self) -> Option<usize> {
        if self.candidates.is_empty() {
            None
        } else {
            Some(self.active)
        }
    }

    pub fn active_name(&self) -> Option<&str> {
        self.candidates.get(self.active).map(|c| c.name.as_str())
    }

    /// Select a candidate by index. Returns false if out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.candidates.len() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Select a candidate by factory name. Returns false if unknown.
    pub fn select_by_name(&mut self, name: &str) -> bool {
        match self.candidates.iter().position(|c| c.name == name) {
            Some(index) => self.select(index),
            None => false,
        }
    }
}

impl Component for TypedSlot {
    fn on_execute(&self) -> Option<Value> {
        self.candidates
            .get(self.active)
            .and_then(|c| c.instance.on_execute())
    }

    fn on_update(&mut self, data: &Value) {
        if let Some(candidate) = self.candidates.get_mut(self.active) {
            candidate.instance.on_update(data);
        }
    }
}

impl std::fmt::Debug for TypedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedSlot")
            .field("declared", &self.declared.to_string())
            .field("port", &self.port)
            .field("candidates", &self.candidate_names())
            .field("active", &self.active)
            .finish()
    }
}
