//! Reconstruction-script generation
//!
//! Turns recorded values into scriptlets that rebuild equivalent
//! values at replay time. The value model ([`ScriptValue`]) captures
//! the type distinctions the script syntax cares about; the generator
//! walks it and emits declarations.

mod generator;
mod value;

pub use generator::{escape, ScriptletGenerator};
pub use value::{
    Access, ObjectValue, Property, PropertyKind, PropertyValue, ScriptValue,
};
