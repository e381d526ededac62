//! Commands: named units of work with validated arguments.

use std::collections::BTreeMap;
use std::fmt;

use hk_core::{Real, Value};

use crate::argument::{ArgType, Argument, Count};
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;

pub type CommandBody = fn(&mut Hooke, &Params, &mut CommandIo<'_>) -> CommandResult<()>;

/// A named operation. Stateless: everything it touches lives in `Hooke`.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub aliases: Vec<String>,
    pub arguments: Vec<Argument>,
    pub help: String,
    pub plugin: String,
    body: CommandBody,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .field("arguments", &self.arguments.len())
            .finish()
    }
}

impl Command {
    pub fn new(name: impl Into<String>, plugin: impl Into<String>, body: CommandBody) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            arguments: vec![
                Argument::new("help", ArgType::Bool)
                    .default(false)
                    .help("Print a help message instead of running the command."),
            ],
            help: String::new(),
            plugin: plugin.into(),
            body,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn arg(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn args(mut self, arguments: impl IntoIterator<Item = Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Name or alias match. Underscores stand in for spaces.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.replace('_', " ");
        self.name == name || self.aliases.iter().any(|a| *a == name)
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        let name = name.replace('_', " ");
        self.arguments.iter().find(|a| a.matches(&name))
    }

    pub fn help_text(&self) -> String {
        let mut lines = vec![self.name.clone()];
        if !self.aliases.is_empty() {
            lines.push(format!("Aliases: {}", self.aliases.join(", ")));
        }
        if !self.help.is_empty() {
            lines.push(String::new());
            lines.push(self.help.clone());
        }
        lines.push(String::new());
        lines.push("Arguments:".to_string());
        lines.extend(self.arguments.iter().map(|a| format!("  {}", a.describe())));
        lines.join("\n")
    }

    /// Map supplied names (or aliases) onto declared arguments and validate
    /// each one.
    pub fn validate(&self, hooke: &Hooke, supplied: &BTreeMap<String, Value>) -> CommandResult<Params> {
        let mut by_name: BTreeMap<&str, Value> = BTreeMap::new();
        for (key, value) in supplied {
            let argument = self
                .argument(key)
                .ok_or_else(|| Failure::invalid(key, format!("not an argument of '{}'", self.name)))?;
            by_name.insert(argument.name.as_str(), value.clone());
        }
        let mut values = BTreeMap::new();
        for argument in &self.arguments {
            let value = argument.validate(by_name.remove(argument.name.as_str()), hooke)?;
            values.insert(argument.name.clone(), value);
        }
        Ok(Params { values })
    }

    /// Validate and execute. `help = true` prints help and never runs the
    /// body.
    pub fn run(
        &self,
        hooke: &mut Hooke,
        io: &mut CommandIo<'_>,
        supplied: &BTreeMap<String, Value>,
    ) -> CommandResult<()> {
        let wants_help = supplied
            .get("help")
            .and_then(|v| self.arguments[0].coerce(v.clone()).ok())
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if wants_help {
            io.emit(self.help_text());
            return Ok(());
        }
        let params = self.validate(hooke, supplied)?;
        (self.body)(hooke, &params, io)
    }
}

/// Validated argument values, keyed by canonical argument name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// `Null` for unknown names.
    pub fn get(&self, name: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.values.get(name).unwrap_or(NULL)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    fn missing(name: &str, expected: &str) -> Failure {
        Failure::invalid(name, format!("expected a {expected} value"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    pub fn str(&self, name: &str) -> CommandResult<&str> {
        self.opt_str(name).ok_or_else(|| Self::missing(name, "string"))
    }

    pub fn opt_f64(&self, name: &str) -> Option<Real> {
        self.get(name).as_f64()
    }

    pub fn f64(&self, name: &str) -> CommandResult<Real> {
        self.opt_f64(name).ok_or_else(|| Self::missing(name, "float"))
    }

    pub fn opt_i64(&self, name: &str) -> Option<i64> {
        self.get(name).as_i64()
    }

    pub fn i64(&self, name: &str) -> CommandResult<i64> {
        self.opt_i64(name).ok_or_else(|| Self::missing(name, "int"))
    }

    pub fn opt_usize(&self, name: &str) -> Option<usize> {
        self.opt_i64(name).and_then(|i| usize::try_from(i).ok())
    }

    pub fn usize(&self, name: &str) -> CommandResult<usize> {
        self.opt_usize(name)
            .ok_or_else(|| Self::missing(name, "non-negative int"))
    }

    pub fn bool(&self, name: &str) -> CommandResult<bool> {
        self.get(name).as_bool().ok_or_else(|| Self::missing(name, "bool"))
    }

    /// `None` when the argument is unset.
    pub fn opt_usize_list(&self, name: &str) -> CommandResult<Option<Vec<usize>>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::List(items) => items
                .iter()
                .map(|v| {
                    v.as_i64()
                        .and_then(|i| usize::try_from(i).ok())
                        .ok_or_else(|| Self::missing(name, "list of indices"))
                })
                .collect::<CommandResult<Vec<_>>>()
                .map(Some),
            _ => Err(Self::missing(name, "list of indices")),
        }
    }

    pub fn usize_list(&self, name: &str) -> CommandResult<Vec<usize>> {
        self.opt_usize_list(name)?
            .ok_or_else(|| Self::missing(name, "list of indices"))
    }
}

/// Standard `curve` argument: the current curve unless given.
pub fn curve_argument() -> Argument {
    Argument::new("curve", ArgType::Curve)
        .help("Curve to act on (index in the current playlist). Defaults to the current curve.")
}

/// Standard `playlist` argument: the current playlist unless given.
pub fn playlist_argument() -> Argument {
    Argument::new("playlist", ArgType::Playlist)
        .help("Playlist to act on (index). Defaults to the current playlist.")
}

/// Column-name argument with a default label.
pub fn column_argument(name: &str, default: Option<&str>, help: &str) -> Argument {
    Argument::string(name, default).help(help)
}

pub fn stack_argument() -> Argument {
    Argument::new("stack", ArgType::Bool)
        .default(true)
        .help("Store this command in the curve's command stack.")
}

pub fn bounds_argument() -> Argument {
    Argument::new("bounds", ArgType::Point)
        .count(Count::Exactly(2))
        .required()
        .help("Indices of points bounding the selected data.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_accessors() {
        let mut p = Params::default();
        p.set("bounds", vec![3_i64, 9]);
        p.set("window", 2e-8);
        p.set("name", "x");
        assert_eq!(p.usize_list("bounds").unwrap(), vec![3, 9]);
        assert_eq!(p.f64("window").unwrap(), 2e-8);
        assert_eq!(p.str("name").unwrap(), "x");
        assert!(p.get("missing").is_null());
        assert!(p.opt_usize_list("missing").unwrap().is_none());
        assert!(p.bool("name").is_err());
    }
}
