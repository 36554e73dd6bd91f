//! Built-in Components
//!
//! Editors for primitive types plus the `typing.List` / `typing.Dict`
//! containers. Containers build nested [`TypedSlot`]s from their generic
//! arguments, so any registered element type works without the registry or
//! the parser knowing about containers.

use log::{debug, warn};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::registry::ComponentRegistry;
use super::slot::TypedSlot;
use super::types::{Component, ComponentFactory, ComponentProps, Port};
use crate::schema::TypeNode;

/// Register every built-in component
pub fn register_builtins(registry: &ComponentRegistry) {
    registry.register_all(builtin_factories());
}

/// Built-in factories in their default tab order
pub fn builtin_factories() -> Vec<ComponentFactory> {
    vec![
        ComponentFactory::new("StringEditor", "str", Port::Input, |_| {
            Box::new(StringEditor::default())
        }),
        ComponentFactory::new("StringPreview", "str", Port::Output, |_| {
            Box::new(StringPreview::default())
        }),
        ComponentFactory::new("IntEditor", "int", Port::Input, |_| {
            Box::new(NumberEditor::integer())
        }),
        ComponentFactory::new("FloatEditor", "float", Port::Input, |_| {
            Box::new(NumberEditor::float())
        }),
        ComponentFactory::new("SwitchEditor", "bool", Port::Input, |_| {
            Box::new(SwitchEditor::default())
        }),
        ComponentFactory::new("ListContainer", "typing.List", Port::Input, |props| {
            Box::new(ListContainer::new(props))
        }),
        ComponentFactory::new("DictContainer", "typing.Dict", Port::Input, |props| {
            Box::new(DictContainer::new(props))
        }),
    ]
}

/// Free text editor
#[derive(Debug, Default)]
pub struct StringEditor {
    text: String,
}

impl Component for StringEditor {
    fn on_execute(&self) -> Option<Value> {
        Some(Value::String(self.text.clone()))
    }

    fn on_update(&mut self, data: &Value) {
        match data {
            Value::String(s) => self.text = s.clone(),
            Value::Null => self.text.clear(),
            other => self.text = other.to_string(),
        }
    }
}

/// Read-only display of a result value
#[derive(Debug, Default)]
pub struct StringPreview {
    shown: Option<String>,
}

impl StringPreview {
    pub fn shown(&self) -> Option<&str> {
        self.shown.as_deref()
    }
}

impl Component for StringPreview {
    fn on_execute(&self) -> Option<Value> {
        None
    }

    fn on_update(&mut self, data: &Value) {
        self.shown = Some(match data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
}

/// Numeric editor, either integral or floating point
#[derive(Debug)]
pub enum NumberEditor {
    Int(i64),
    Float(f64),
}

impl NumberEditor {
    pub fn integer() -> Self {
        Self::Int(0)
    }

    pub fn float() -> Self {
        Self::Float(0.0)
    }
}

fn parse_int(data: &Value) -> Option<i64> {
    match data {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| v.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn parse_float(data: &Value) -> Option<f64> {
    match data {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

impl Component for NumberEditor {
    fn on_execute(&self) -> Option<Value> {
        match *self {
            Self::Int(v) => Some(json!(v)),
            Self::Float(v) => Some(json!(v)),
        }
    }

    fn on_update(&mut self, data: &Value) {
        let updated = match self {
            Self::Int(value) => parse_int(data).map(|v| *value = v),
            Self::Float(value) => parse_float(data).map(|v| *value = v),
        };
        if updated.is_none() {
            warn!("Ignoring non-numeric update: {}", data);
        }
    }
}

/// On/off toggle
#[derive(Debug, Default)]
pub struct SwitchEditor {
    value: bool,
}

impl Component for SwitchEditor {
    fn on_execute(&self) -> Option<Value> {
        Some(Value::Bool(self.value))
    }

    fn on_update(&mut self, data: &Value) {
        if let Some(b) = data.as_bool() {
            self.value = b;
        }
    }
}

/// Variable-length list of nested slots for `typing.List[T]`
pub struct ListContainer {
    element: Option<TypeNode>,
    port: Port,
    registry: Arc<ComponentRegistry>,
    items: Vec<TypedSlot>,
}

impl ListContainer {
    pub fn new(props: ComponentProps) -> Self {
        let element = props.type_args.into_iter().next();
        if element.is_none() {
            warn!("List container created without an element type");
        }
        Self {
            element,
            port: props.port,
            registry: props.registry,
            items: Vec::new(),
        }
    }

    /// Append a fresh item slot, returns its index
    pub fn add_item(&mut self) -> Option<usize> {
        let element = self.element.clone()?;
        self.items
            .push(TypedSlot::from_node(&self.registry, element, self.port));
        Some(self.items.len() - 1)
    }

    pub fn remove_item(&mut self, index: usize) -> Option<TypedSlot> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn items(&self) -> &[TypedSlot] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [TypedSlot] {
        &mut self.items
    }
}

impl Component for ListContainer {
    fn on_execute(&self) -> Option<Value> {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|item| item.on_execute().unwrap_or(Value::Null))
            .collect();
        Some(json!({ "items": items }))
    }

    fn on_update(&mut self, data: &Value) {
        let Some(values) = data.as_array() else {
            warn!("List container expects an array update, got {}", data);
            return;
        };

        self.items.truncate(values.len());
        while self.items.len() < values.len() {
            if self.add_item().is_none() {
                return;
            }
        }

        debug!("List container updated with {} item(s)", values.len());
        for (item, value) in self.items.iter_mut().zip(values) {
            item.on_update(value);
        }
    }
}

/// Key/value pairs of nested slots for `typing.Dict[K, V]`
pub struct DictContainer {
    key_type: Option<TypeNode>,
    value_type: Option<TypeNode>,
    port: Port,
    registry: Arc<ComponentRegistry>,
    entries: Vec<(TypedSlot, TypedSlot)>,
}

impl DictContainer {
    pub fn new(props: ComponentProps) -> Self {
        let mut args = props.type_args.into_iter();
        let key_type = args.next();
        let value_type = args.next();
        if value_type.is_none() {
            warn!("Dict container created without key and value types");
        }
        Self {
            key_type,
            value_type,
            port: props.port,
            registry: props.registry,
            entries: Vec::new(),
        }
    }

    /// Append an empty entry, returns its index
    pub fn add_entry(&mut self) -> Option<usize> {
        let key = self.key_type.clone()?;
        let value = self.value_type.clone()?;
        self.entries.push((
            TypedSlot::from_node(&self.registry, key, self.port),
            TypedSlot::from_node(&self.registry, value, self.port),
        ));
        Some(self.entries.len() - 1)
    }

    pub fn remove_entry(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.entries.remove(index);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Component for DictContainer {
    fn on_execute(&self) -> Option<Value> {
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|(k, v)| {
                json!([
                    k.on_execute().unwrap_or(Value::Null),
                    v.on_execute().unwrap_or(Value::Null)
                ])
            })
            .collect();
        Some(json!({ "entries": entries }))
    }

    fn on_update(&mut self, data: &Value) {
        let Some(object) = data.as_object() else {
            warn!("Dict container expects an object update, got {}", data);
            return;
        };

        self.entries.clear();
        for (key, value) in object {
            let Some(index) = self.add_entry() else {
                return;
            };
            let (key_slot, value_slot) = &mut self.entries[index];
            key_slot.on_update(&Value::String(key.clone()));
            value_slot.on_update(value);
        }
    }
}

/// Collect the values of several named slots into one request body
pub fn collect_values<'a>(slots: impl IntoIterator<Item = (&'a str, &'a TypedSlot)>) -> Value {
    let mut body = Map::new();
    for (name, slot) in slots {
        body.insert(name.to_string(), slot.on_execute().unwrap_or(Value::Null));
    }
    Value::Object(body)
}
