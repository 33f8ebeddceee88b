//! Reconstruction-script generation
//!
//! Turns a [`ScriptValue`] graph into an ordered sequence of
//! declaration and mutation statements that, executed in order,
//! rebuild an equivalent value graph. The emitted grammar is the
//! Java-flavored scripting form of the captured upstream ecosystem.
//!
//! Naming discipline: every recursive call derives the child variable
//! name from the parent name plus a field/index suffix, so sibling
//! fragments never collide within one top-level request.

use std::collections::HashMap;
use std::fmt::Write;

use super::value::{Access, PropertyKind, PropertyValue, ScriptValue};
use crate::record::{Invocation, Outcome};

/// Stateless-per-call script generator.
///
/// Each call to [`generate`](Self::generate) is independent; the
/// generator holds no shared mutable state and may be used from any
/// number of concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct ScriptletGenerator;

impl ScriptletGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Serialize `value` into a script fragment declaring `varname`.
    pub fn generate(&self, value: &ScriptValue, varname: &str) -> String {
        let mut state = GenState::default();
        let mut out = String::new();
        self.emit(&mut out, &mut state, value, varname, None);
        out
    }

    /// Serialize with an explicit type hint used for typed null
    /// declarations.
    pub fn generate_hinted(&self, value: &ScriptValue, varname: &str, type_hint: &str) -> String {
        let mut state = GenState::default();
        let mut out = String::new();
        self.emit(&mut out, &mut state, value, varname, Some(type_hint));
        out
    }

    /// Render one intercepted call as an executable-looking fragment:
    /// declarations for each argument, the call statement, and the
    /// reconstructed return value or the recorded fault.
    pub fn render_invocation(&self, invocation: &Invocation, index: u64) -> String {
        let prefix = format!("call{index}");
        let mut out = String::new();

        let target = match &invocation.target {
            Some(h) => format!("objects[\"{}\"]", h.as_str()),
            None => "target".to_string(),
        };

        let _ = writeln!(
            out,
            "// ---------- call {index}: {} ({} args)",
            invocation.method,
            invocation.arguments.len()
        );

        let mut arg_vars = Vec::new();
        for (i, arg) in invocation.arguments.iter().enumerate() {
            let var = format!("{prefix}_arg{i}");
            let value = ScriptValue::from_json(arg);
            out.push_str(&self.generate(&value, &var));
            arg_vars.push(var);
        }

        match &invocation.outcome {
            Outcome::Returned { value } => {
                let _ = writeln!(
                    out,
                    "Object {prefix}_result = {target}.{}({});",
                    invocation.method,
                    arg_vars.join(", ")
                );
                if !value.is_null() {
                    let reconstructed = ScriptValue::from_json(value);
                    let _ = writeln!(out, "// {prefix}_result reconstructs as:");
                    out.push_str(&self.generate(&reconstructed, &format!("{prefix}_expected")));
                }
            }
            Outcome::Fault { kind, message } => {
                let _ = writeln!(
                    out,
                    "{target}.{}({}); // raises fault {kind}: {}",
                    invocation.method,
                    arg_vars.join(", "),
                    message
                );
            }
        }

        out
    }

    fn emit(
        &self,
        out: &mut String,
        state: &mut GenState,
        value: &ScriptValue,
        varname: &str,
        type_hint: Option<&str>,
    ) {
        match value {
            ScriptValue::Null => match type_hint {
                Some(hint) => {
                    let _ = writeln!(out, "{hint} {varname} = null;");
                }
                None => {
                    let _ = writeln!(out, "{varname} = null;");
                }
            },
            ScriptValue::Bool(b) => {
                let _ = writeln!(out, "boolean {varname} = {b};");
            }
            ScriptValue::Byte(n) => {
                let _ = writeln!(out, "byte {varname} = {n};");
            }
            ScriptValue::Short(n) => {
                let _ = writeln!(out, "short {varname} = {n};");
            }
            ScriptValue::Int(n) => {
                let _ = writeln!(out, "int {varname} = {n};");
            }
            ScriptValue::Long(n) => {
                let _ = writeln!(out, "long {varname} = {};", suffixed(&n.to_string(), 'L'));
            }
            ScriptValue::Float(x) => {
                let _ = writeln!(out, "float {varname} = {};", suffixed(&fmt_float32(*x), 'f'));
            }
            ScriptValue::Double(x) => {
                let _ = writeln!(out, "double {varname} = {};", suffixed(&fmt_float(*x), 'd'));
            }
            ScriptValue::Char(c) => {
                let _ = writeln!(out, "char {varname} = {};", char_literal(*c));
            }
            ScriptValue::Str(s) => {
                let _ = writeln!(out, "String {varname} = {};", string_literal(s));
            }
            ScriptValue::Array(items) => self.emit_array(out, state, items, varname),
            ScriptValue::List { type_name, items } => {
                self.emit_list(out, state, type_name, items, varname)
            }
            ScriptValue::Map { type_name, entries } => {
                self.emit_map(out, state, type_name, entries, varname)
            }
            ScriptValue::PropertyBag(entries) => self.emit_property_bag(out, entries, varname),
            ScriptValue::Object(object) => self.emit_object(out, state, object, varname),
            ScriptValue::Shared(inner) => {
                let key = std::sync::Arc::as_ptr(inner) as usize;
                if let Some(existing) = state.seen.get(&key) {
                    let _ = writeln!(out, "Object {varname} = {existing}; /* shared reference */");
                } else {
                    state.seen.insert(key, varname.to_string());
                    self.emit(out, state, inner, varname, type_hint);
                }
            }
        }
    }

    fn emit_array(
        &self,
        out: &mut String,
        state: &mut GenState,
        items: &[ScriptValue],
        varname: &str,
    ) {
        for (i, item) in items.iter().enumerate() {
            self.emit(out, state, item, &format!("{varname}_element{i}"), Some("Object"));
        }

        let refs: Vec<String> = (0..items.len())
            .map(|i| format!("{varname}_element{i}"))
            .collect();
        let _ = writeln!(out, "Object[] {varname} = new Object[] {{ {} }};", refs.join(", "));
    }

    fn emit_list(
        &self,
        out: &mut String,
        state: &mut GenState,
        type_name: &str,
        items: &[ScriptValue],
        varname: &str,
    ) {
        for (i, item) in items.iter().enumerate() {
            self.emit(out, state, item, &format!("{varname}_element{i}"), Some("Object"));
        }

        let _ = writeln!(out, "{type_name} {varname} = new {type_name}();");
        for i in 0..items.len() {
            let _ = writeln!(out, "{varname}.add({varname}_element{i});");
        }
    }

    fn emit_map(
        &self,
        out: &mut String,
        state: &mut GenState,
        type_name: &str,
        entries: &[(ScriptValue, ScriptValue)],
        varname: &str,
    ) {
        let _ = writeln!(out, "{type_name} {varname} = new {type_name}();");

        for (i, (key, val)) in entries.iter().enumerate() {
            // Inline string literals directly; everything else goes
            // through a child variable first.
            if !matches!(key, ScriptValue::Str(_)) {
                self.emit(out, state, key, &format!("{varname}_key{i}"), None);
            }
            if !matches!(val, ScriptValue::Str(_)) {
                self.emit(out, state, val, &format!("{varname}_val{i}"), None);
            }

            let key_ref = match key {
                ScriptValue::Str(s) => string_literal(s),
                _ => format!("{varname}_key{i}"),
            };
            let val_ref = match val {
                ScriptValue::Str(s) => string_literal(s),
                _ => format!("{varname}_val{i}"),
            };
            let _ = writeln!(out, "{varname}.put({key_ref}, {val_ref});");
        }
    }

    fn emit_property_bag(&self, out: &mut String, entries: &[(String, String)], varname: &str) {
        let _ = writeln!(out, "java.util.Properties {varname} = new Properties();");
        for (name, value) in entries {
            let _ = writeln!(
                out,
                "{varname}.setProperty({}, {});",
                string_literal(name),
                string_literal(value)
            );
        }
    }

    fn emit_object(
        &self,
        out: &mut String,
        state: &mut GenState,
        object: &super::value::ObjectValue,
        varname: &str,
    ) {
        let type_name = &object.type_name;
        let _ = writeln!(out, "{type_name} {varname} = new {type_name}();");

        for property in &object.properties {
            let child = format!("{varname}_{}", property.name);

            let value = match &property.value {
                PropertyValue::Unreadable(reason) => {
                    let _ = writeln!(out, "/* {child} is {reason} */");
                    continue;
                }
                PropertyValue::Value(v) => v,
            };

            if property.access == Access::WriteOnly {
                let _ = writeln!(out, "/* {child} is write-only, cannot get value */");
                continue;
            }

            // Null properties are assigned directly, no recursion.
            if matches!(value, ScriptValue::Null) {
                match property.access {
                    Access::ReadOnly => {
                        let _ = writeln!(out, "/* {child} is read-only, value is null */");
                    }
                    _ => self.emit_assignment(out, varname, property, "null"),
                }
                continue;
            }

            self.emit(out, state, value, &child, None);

            if property.access == Access::ReadOnly {
                let _ = writeln!(out, "/* {child} is read-only, no setter */");
                continue;
            }

            self.emit_assignment(out, varname, property, &child);
        }
    }

    fn emit_assignment(
        &self,
        out: &mut String,
        varname: &str,
        property: &super::value::Property,
        value_ref: &str,
    ) {
        match property.kind {
            PropertyKind::Accessor => {
                let _ = writeln!(out, "{varname}.{}({value_ref});", setter_name(&property.name));
            }
            PropertyKind::Field => {
                let _ = writeln!(out, "{varname}.{} = {value_ref};", property.name);
            }
        }
    }
}

/// Per-top-level-call state: identity map from shared node to its
/// assigned variable name.
#[derive(Debug, Default)]
struct GenState {
    seen: HashMap<usize, String>,
}

/// Append a literal suffix unless the rendered value already carries it.
fn suffixed(rendered: &str, suffix: char) -> String {
    if rendered.contains(suffix) {
        rendered.to_string()
    } else {
        format!("{rendered}{suffix}")
    }
}

/// Format a float so integral values keep a decimal point (`1.0`, not
/// `1`), matching the target literal grammar.
fn fmt_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// `f32` formatted at its own precision; widening to `f64` first would
/// drag in garbage digits (`0.1f32` is not `0.1f64`).
fn fmt_float32(x: f32) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e7 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

fn setter_name(property: &str) -> String {
    let mut chars = property.chars();
    match chars.next() {
        Some(first) => format!("set{}{}", first.to_uppercase(), chars.as_str()),
        None => "set".to_string(),
    }
}

/// Escape a string for a double-quoted literal. Quote, backslash, and
/// control characters are neutralized so the emitted script stays
/// syntactically valid.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

fn string_literal(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

fn char_literal(c: char) -> String {
    match c {
        '\'' => "'\\''".to_string(),
        '\\' => "'\\\\'".to_string(),
        '\n' => "'\\n'".to_string(),
        '\r' => "'\\r'".to_string(),
        '\t' => "'\\t'".to_string(),
        c if (c as u32) < 0x20 || c == '\u{7f}' => format!("'\\u{:04x}'", c as u32),
        c => format!("'{c}'"),
    }
}
