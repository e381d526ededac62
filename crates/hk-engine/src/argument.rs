//! Typed, validated command arguments.

use std::fmt;
use std::sync::Arc;

use hk_core::{HkError, HkResult, Real, Value};

use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;

/// Declared type of an argument value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgType {
    String,
    Int,
    Float,
    Bool,
    Path,
    /// Index into a data block
    Point,
    Dict,
    /// Curve in the current playlist (`None` = current curve)
    Curve,
    /// Loaded playlist (`None` = current playlist)
    Playlist,
    /// Plugin-defined; passed through untouched.
    Custom(String),
}

impl ArgType {
    pub fn name(&self) -> &str {
        match self {
            ArgType::String => "string",
            ArgType::Int => "int",
            ArgType::Float => "float",
            ArgType::Bool => "bool",
            ArgType::Path => "path",
            ArgType::Point => "point",
            ArgType::Dict => "dict",
            ArgType::Curve => "curve",
            ArgType::Playlist => "playlist",
            ArgType::Custom(name) => name,
        }
    }

    fn is_textual(&self) -> bool {
        matches!(self, ArgType::String | ArgType::Path | ArgType::Custom(_))
    }
}

/// How many values an argument takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Count {
    One,
    Exactly(usize),
    /// Any number, including zero
    Variable,
}

/// Parse command-line text into a value of the given type.
///
/// `None` parses to `Value::Null` for every non-textual type.
pub fn from_string(text: &str, ty: &ArgType) -> HkResult<Value> {
    let conversion = |target: &'static str| HkError::Conversion {
        value: text.to_string(),
        target,
    };
    if text == "None" && !ty.is_textual() {
        return Ok(Value::Null);
    }
    match ty {
        ArgType::String | ArgType::Path | ArgType::Custom(_) => Ok(Value::String(text.to_string())),
        ArgType::Int | ArgType::Point | ArgType::Curve | ArgType::Playlist => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| conversion("int")),
        ArgType::Float => text
            .trim()
            .parse::<Real>()
            .map(Value::Float)
            .map_err(|_| conversion("float")),
        ArgType::Bool => match text.trim() {
            "True" | "true" | "yes" | "1" => Ok(Value::Bool(true)),
            "False" | "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(conversion("bool")),
        },
        ArgType::Dict => match serde_yaml::from_str::<serde_yaml::Value>(text).map(yaml_to_value) {
            Ok(v @ Value::Map(_)) => Ok(v),
            _ => Err(conversion("dict")),
        },
    }
}

/// YAML to `Value`, stringifying scalar mapping keys (`{-1: -0.5}`).
pub fn yaml_to_value(yaml: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match yaml {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(Real::NAN)),
        },
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::List(items.into_iter().map(yaml_to_value).collect()),
        Y::Mapping(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        Y::String(s) => s,
                        other => match yaml_to_value(other) {
                            Value::Float(x) => format_float(x),
                            scalar => scalar.to_string(),
                        },
                    };
                    (key, yaml_to_value(v))
                })
                .collect(),
        ),
        Y::Tagged(tagged) => yaml_to_value(tagged.value),
    }
}

/// Render a value the way `from_string` reads it back.
pub fn to_string(value: &Value, ty: &ArgType) -> String {
    match value {
        Value::Float(x) => format_float(*x),
        Value::List(items) => items
            .iter()
            .map(|v| to_string(v, ty))
            .collect::<Vec<_>>()
            .join(","),
        Value::Map(_) => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| value.to_string()),
        other => other.to_string(),
    }
}

/// Shortest round-trip digits, laid out as Python's `repr(float)` does:
/// `3.0`, `0.1`, `1e-05`, `1.5e+16`, `nan`, `inf`.
fn format_float(x: Real) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = x.abs();
    if x != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{x:e}");
        let Some((mantissa, exponent)) = text.split_once('e') else {
            return text;
        };
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        format!("{mantissa}e{sign}{digits:0>2}")
    } else {
        let text = format!("{x}");
        if text.contains('.') { text } else { format!("{text}.0") }
    }
}

/// Computes a value for an argument at validation time, e.g. from the
/// configuration when the caller gave none.
pub type ArgCallback = Arc<dyn Fn(&Hooke, Value) -> CommandResult<Value> + Send + Sync>;

#[derive(Clone)]
pub struct Argument {
    pub name: String,
    pub aliases: Vec<String>,
    pub ty: ArgType,
    pub count: Count,
    pub optional: bool,
    pub default: Value,
    pub help: String,
    pub callback: Option<ArgCallback>,
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argument")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("count", &self.count)
            .field("optional", &self.optional)
            .field("default", &self.default)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl Argument {
    /// Optional, single-valued, defaulting to `None`.
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            ty,
            count: Count::One,
            optional: true,
            default: Value::Null,
            help: String::new(),
            callback: None,
        }
    }

    pub fn string(name: impl Into<String>, default: Option<&str>) -> Self {
        Self::new(name, ArgType::String).default(default)
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn count(mut self, count: Count) -> Self {
        self.count = count;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn callback(mut self, callback: ArgCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Resolve a supplied value (or its absence) into the validated value.
    pub fn validate(&self, supplied: Option<Value>, hooke: &Hooke) -> CommandResult<Value> {
        let value = match supplied {
            Some(v) => v,
            None if !self.optional && self.callback.is_none() => {
                return Err(Failure::invalid(&self.name, "required argument missing"));
            }
            None => self.default.clone(),
        };
        let value = match &self.callback {
            Some(callback) => callback(hooke, value)?,
            None => value,
        };
        if value.is_null() {
            if self.optional {
                return Ok(Value::Null);
            }
            return Err(Failure::invalid(&self.name, "required argument missing"));
        }
        self.coerce(value)
    }

    /// Convert `value` to the declared type and count.
    pub fn coerce(&self, value: Value) -> CommandResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self.count {
            Count::One => self.coerce_scalar(value),
            Count::Exactly(_) | Count::Variable => {
                let items = match value {
                    Value::List(items) => items,
                    Value::String(s) if !self.ty.is_textual() => s
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| Value::String(s.to_string()))
                        .collect(),
                    other => vec![other],
                };
                let items = items
                    .into_iter()
                    .map(|v| self.coerce_scalar(v))
                    .collect::<CommandResult<Vec<_>>>()?;
                if let Count::Exactly(n) = self.count {
                    if items.len() != n {
                        return Err(Failure::invalid(
                            &self.name,
                            format!("expected {n} values, got {}", items.len()),
                        ));
                    }
                }
                Ok(Value::List(items))
            }
        }
    }

    fn coerce_scalar(&self, value: Value) -> CommandResult<Value> {
        let mismatch = |v: &Value| {
            Failure::invalid(
                &self.name,
                format!("expected {}, got {} '{v}'", self.ty.name(), v.type_name()),
            )
        };
        if let (Value::String(s), false) = (&value, self.ty.is_textual()) {
            return from_string(s, &self.ty).map_err(|e| Failure::invalid(&self.name, e.to_string()));
        }
        match &self.ty {
            ArgType::String | ArgType::Path => match value {
                Value::String(_) => Ok(value),
                Value::List(_) | Value::Map(_) => Err(mismatch(&value)),
                other => Ok(Value::String(other.to_string())),
            },
            ArgType::Custom(_) => Ok(value),
            ArgType::Int => value.as_i64().map(Value::Int).ok_or_else(|| mismatch(&value)),
            ArgType::Point => match value.as_i64() {
                Some(i) if i >= 0 => Ok(Value::Int(i)),
                _ => Err(mismatch(&value)),
            },
            ArgType::Curve | ArgType::Playlist => match value {
                Value::Map(_) => Ok(value),
                other => other.as_i64().map(Value::Int).ok_or_else(|| mismatch(&other)),
            },
            ArgType::Float => value.as_f64().map(Value::Float).ok_or_else(|| mismatch(&value)),
            ArgType::Bool => value.as_bool().map(Value::Bool).ok_or_else(|| mismatch(&value)),
            ArgType::Dict => match value {
                Value::Map(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
        }
    }

    /// One line for help output: `name (type, default): help`.
    pub fn describe(&self) -> String {
        let mut kind = self.ty.name().to_string();
        match self.count {
            Count::One => {}
            Count::Exactly(n) => kind.push_str(&format!(" x{n}")),
            Count::Variable => kind.push_str(" ..."),
        }
        let requirement = if self.optional {
            format!("default {}", to_string(&self.default, &self.ty))
        } else {
            "required".to_string()
        };
        format!("{} ({kind}, {requirement}): {}", self.name, self.help)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_render_like_python_repr() {
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(2e-9), "2e-09");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1e-100), "1e-100");
        assert_eq!(format_float(1e15), "1000000000000000.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(Real::NAN), "nan");
        assert_eq!(format_float(Real::NEG_INFINITY), "-inf");
        assert_eq!(from_string("2e-9", &ArgType::Float).unwrap(), Value::Float(2e-9));
    }

    #[test]
    fn none_parses_to_null_for_typed_arguments() {
        assert_eq!(from_string("None", &ArgType::Int).unwrap(), Value::Null);
        assert_eq!(
            from_string("None", &ArgType::String).unwrap(),
            Value::String("None".into())
        );
    }

    #[test]
    fn counted_arguments_split_text() {
        let bounds = Argument::new("bounds", ArgType::Point).count(Count::Exactly(2));
        assert_eq!(
            bounds.coerce(Value::from("10, 20")).unwrap(),
            Value::List(vec![Value::Int(10), Value::Int(20)])
        );
        assert!(bounds.coerce(Value::from("10")).is_err());
        assert!(bounds.coerce(Value::from(vec![-1_i64, 3])).is_err());
    }

    #[test]
    fn scalars_widen_and_parse() {
        let f = Argument::new("blind window", ArgType::Float);
        assert_eq!(f.coerce(Value::Int(2)).unwrap(), Value::Float(2.0));
        let b = Argument::new("stack", ArgType::Bool);
        assert_eq!(b.coerce(Value::from("False")).unwrap(), Value::Bool(false));
        assert!(b.coerce(Value::Int(3)).is_err());
        let d = Argument::new("weights", ArgType::Dict);
        let parsed = d.coerce(Value::from("{-1: -0.5, 1: 0.5}")).unwrap();
        assert_eq!(parsed.as_map().map(|m| m.len()), Some(2));
    }
}
