//! Replayable command logs.

use std::collections::BTreeMap;
use std::path::Path;

use hk_core::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CurveResult;

/// A command invocation as it crosses the UI/engine boundary or sits on a
/// stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub explicit_user_call: bool,
}

impl CommandMessage {
    pub fn new(command: impl Into<String>, arguments: BTreeMap<String, Value>) -> Self {
        Self {
            command: command.into(),
            arguments,
            explicit_user_call: true,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Same command and arguments, ignoring how it was issued.
    pub fn same_call(&self, other: &CommandMessage) -> bool {
        self.command == other.command && self.arguments == other.arguments
    }
}

/// Anything that can run a `CommandMessage` by name.
pub trait Dispatcher {
    type Error;

    fn dispatch(&mut self, message: &CommandMessage) -> Result<(), Self::Error>;
}

/// Ordered log of executed commands.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandStack {
    commands: Vec<CommandMessage>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandMessage> {
        self.commands.iter()
    }

    pub fn last(&self) -> Option<&CommandMessage> {
        self.commands.last()
    }

    pub fn push(&mut self, message: CommandMessage) {
        self.commands.push(message);
    }

    pub fn pop(&mut self) -> Option<CommandMessage> {
        self.commands.pop()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Replay in order, skipping entries `filter` rejects. Stops at the first
    /// failure. Returns the number of commands dispatched.
    pub fn execute<D: Dispatcher>(
        &self,
        dispatcher: &mut D,
        filter: Option<&dyn Fn(&CommandMessage) -> bool>,
    ) -> Result<usize, D::Error> {
        let mut count = 0;
        for message in &self.commands {
            if filter.is_some_and(|accept| !accept(message)) {
                continue;
            }
            debug!(command = %message.command, "replaying");
            dispatcher.dispatch(message)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn to_yaml(&self) -> CurveResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> CurveResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> CurveResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> CurveResult<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

impl FromIterator<CommandMessage> for CommandStack {
    fn from_iter<I: IntoIterator<Item = CommandMessage>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CommandStack {
    type Item = &'a CommandMessage;
    type IntoIter = std::slice::Iter<'a, CommandMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        seen: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Dispatcher for Recorder {
        type Error = String;

        fn dispatch(&mut self, message: &CommandMessage) -> Result<(), String> {
            if self.fail_on == Some(message.command.as_str()) {
                return Err(format!("{} failed", message.command));
            }
            self.seen.push(message.command.clone());
            Ok(())
        }
    }

    fn stack() -> CommandStack {
        ["a", "b", "c"]
            .into_iter()
            .map(|c| CommandMessage::new(c, BTreeMap::new()))
            .collect()
    }

    #[test]
    fn replay_stops_at_first_failure() {
        let mut r = Recorder {
            seen: Vec::new(),
            fail_on: Some("b"),
        };
        let err = stack().execute(&mut r, None).unwrap_err();
        assert_eq!(err, "b failed");
        assert_eq!(r.seen, vec!["a"]);
    }

    #[test]
    fn yaml_is_a_list_of_command_maps() {
        let mut s = CommandStack::new();
        let mut m = CommandMessage::new("polymer fit", BTreeMap::new()).with_arg("block", "retract");
        m.explicit_user_call = false;
        s.push(m);
        let text = s.to_yaml().unwrap();
        assert!(text.starts_with("- command: polymer fit"));
        assert!(!text.contains("explicit_user_call"));
        assert_eq!(CommandStack::from_yaml(&text).unwrap(), s);
        assert!(CommandStack::from_yaml("").unwrap().is_empty());
    }
}
