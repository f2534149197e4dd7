//! Value types used in operation signatures.
//!
//! Proxy arguments and results travel as `serde_json::Value`; a
//! [`ValueType`] describes which values a parameter or return slot admits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    /// No value (`null`).
    Unit,
    /// `true` / `false`.
    Bool,
    /// Signed or unsigned integer.
    Integer,
    /// Any JSON number.
    Float,
    /// UTF-8 string.
    String,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Accepts every value.
    Any,
    /// Opaque caller-defined type, matched by name only.
    Named(TypeName),
}

/// Name of a caller-defined type.
///
/// Never empty, never padded with whitespace and never a built-in name or
/// alias, so its rendering always parses back to the same [`ValueType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(String);

impl TypeName {
    /// The name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueType {
    /// A caller-defined type. Fails for empty or padded names and for names
    /// that denote a built-in type (`int`, `void`, ...).
    pub fn named(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("empty type name".to_string());
        }
        if name.trim() != name {
            return Err(format!("type name `{}` has surrounding whitespace", name));
        }
        if builtin(&name).is_some() {
            return Err(format!("`{}` is a reserved type name", name));
        }
        Ok(Self::Named(TypeName(name)))
    }

    /// Canonical name used in rendered signatures and YAML.
    pub fn name(&self) -> &str {
        match self {
            Self::Unit => "unit",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
            Self::Named(name) => name.as_str(),
        }
    }

    /// Whether `value` can be passed where this type is declared.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Unit => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any | Self::Named(_) => true,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match builtin(trimmed) {
            Some(builtin) => Ok(builtin),
            None => Self::named(trimmed),
        }
    }
}

fn builtin(name: &str) -> Option<ValueType> {
    Some(match name {
        "unit" | "void" => ValueType::Unit,
        "bool" => ValueType::Bool,
        "integer" | "int" => ValueType::Integer,
        "float" | "number" => ValueType::Float,
        "string" => ValueType::String,
        "array" => ValueType::Array,
        "object" => ValueType::Object,
        "any" => ValueType::Any,
        _ => return None,
    })
}

impl TryFrom<String> for ValueType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.name().to_string()
    }
}

/// Render a parameter list as `a, b, c`.
pub fn render_types(types: &[ValueType]) -> String {
    types
        .iter()
        .map(ValueType::name)
        .collect::<Vec<_>>()
        .join(", ")
}
