//! Value model for the reconstruction-script serializer
//!
//! An explicit, introspection-agnostic description of a runtime value
//! graph. Structured objects carry statically-declared property
//! descriptors instead of being discovered by reflection, so the
//! serializer's algorithm never depends on an introspection mechanism.

use serde_json::Value;
use std::sync::Arc;

/// A runtime value as the serializer sees it.
///
/// Collection shapes (`Array`, `List`, `Map`, `PropertyBag`) must be
/// matched before the generic `Object` fallback; the generator's
/// dispatch preserves that order.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),

    /// Fixed-size array, rendered as one literal construction.
    Array(Vec<ScriptValue>),

    /// Growable collection, rendered as construction plus appends.
    List {
        type_name: String,
        items: Vec<ScriptValue>,
    },

    /// Ordered key-value map.
    Map {
        type_name: String,
        entries: Vec<(ScriptValue, ScriptValue)>,
    },

    /// String-only property map (special-cased, all entries inline).
    PropertyBag(Vec<(String, String)>),

    /// Structured object with declared properties.
    Object(ObjectValue),

    /// Identity-carrying node. Two `Shared` values cloned from the
    /// same `Arc` serialize as one definition plus alias references.
    Shared(Arc<ScriptValue>),
}

/// Declared shape of a structured object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    /// Type name emitted in the zero-argument construction.
    pub type_name: String,
    pub properties: Vec<Property>,
}

impl ObjectValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }
}

/// How a property is wired back onto a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Set through an accessor: `obj.setName(value);`
    Accessor,
    /// Set through a public field: `obj.name = value;`
    Field,
}

/// Read/write capability of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    /// Readable but not settable; value is computed, not wired back.
    ReadOnly,
    /// Settable but not readable; annotated, value unavailable.
    WriteOnly,
}

/// A property's value, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Value(ScriptValue),
    /// Read failed; serialization substitutes a placeholder comment
    /// and continues with the remaining properties.
    Unreadable(String),
}

/// One declared property of a structured object.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
    pub access: Access,
    pub value: PropertyValue,
}

impl Property {
    pub fn accessor(name: impl Into<String>, value: ScriptValue) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Accessor,
            access: Access::ReadWrite,
            value: PropertyValue::Value(value),
        }
    }

    pub fn field(name: impl Into<String>, value: ScriptValue) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Field,
            access: Access::ReadWrite,
            value: PropertyValue::Value(value),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    pub fn write_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Accessor,
            access: Access::WriteOnly,
            value: PropertyValue::Unreadable("write-only, cannot get value".to_string()),
        }
    }

    pub fn unreadable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Accessor,
            access: Access::ReadWrite,
            value: PropertyValue::Unreadable(reason.into()),
        }
    }
}

impl ScriptValue {
    /// Wrap a value in an identity-carrying node.
    pub fn shared(value: ScriptValue) -> Self {
        ScriptValue::Shared(Arc::new(value))
    }

    /// Bridge a wire value into the model.
    ///
    /// JSON is poorer than the model: integers become `Int` when they
    /// fit and `Long` otherwise, all floats become `Double`, and JSON
    /// objects become accessor-style read-write objects.
    pub fn from_json(value: &Value) -> ScriptValue {
        match value {
            Value::Null => ScriptValue::Null,
            Value::Bool(b) => ScriptValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if let Ok(small) = i32::try_from(i) {
                        ScriptValue::Int(small)
                    } else {
                        ScriptValue::Long(i)
                    }
                } else {
                    ScriptValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => ScriptValue::Str(s.clone()),
            Value::Array(items) => {
                ScriptValue::Array(items.iter().map(ScriptValue::from_json).collect())
            }
            Value::Object(map) => {
                // JSON objects carry no type identity; render them as a
                // string-keyed map rather than guessing a class.
                let entries = map
                    .iter()
                    .map(|(k, v)| (ScriptValue::Str(k.clone()), ScriptValue::from_json(v)))
                    .collect();
                ScriptValue::Map {
                    type_name: "java.util.LinkedHashMap".to_string(),
                    entries,
                }
            }
        }
    }
}
