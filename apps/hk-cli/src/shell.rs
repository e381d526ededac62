//! Line-oriented front end: parses `name --arg value` lines into command
//! messages and drives an `EngineHandle`.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use hk_core::Value;
use hk_engine::{
    ArgType, Command, CommandMessage, EngineHandle, EngineMessage, Hooke, Request, RequestKind,
};
use tracing::{debug, warn};

use crate::error::{CliError, Result};

pub const PROMPT: &str = "hooke> ";

/// How a command ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Exit,
}

/// Split on whitespace, honouring single and double quotes.
pub fn tokenize(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Insert, turning repeated arguments into lists.
fn push_argument(arguments: &mut BTreeMap<String, Value>, name: String, value: Value) {
    match arguments.remove(&name) {
        None => {
            arguments.insert(name, value);
        }
        Some(Value::List(mut items)) => {
            items.push(value);
            arguments.insert(name, Value::List(items));
        }
        Some(previous) => {
            arguments.insert(name, Value::List(vec![previous, value]));
        }
    }
}

/// Parse one input line against the known commands.
///
/// The longest run of leading words naming a command picks it. Then
/// `--name value`, `--name=value` and bare `--flag` (booleans) set
/// arguments; leftover words fill required arguments in order. Underscores
/// in names stand in for spaces.
pub fn parse_line(line: &str, commands: &[Command]) -> Result<Option<CommandMessage>> {
    let fail = |what: String| CliError::Parse {
        line: line.to_string(),
        what,
    };
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let tokens = tokenize(trimmed).map_err(fail)?;
    let words = tokens.iter().take_while(|t| !t.starts_with("--")).count();
    let (command, used) = (1..=words)
        .rev()
        .find_map(|k| {
            let name = tokens[..k].join(" ");
            commands.iter().find(|c| c.matches(&name)).map(|c| (c, k))
        })
        .ok_or_else(|| fail("no such command".to_string()))?;

    let mut arguments = BTreeMap::new();
    let mut positional = Vec::new();
    let mut rest = tokens[used..].iter().peekable();
    while let Some(token) = rest.next() {
        let Some(flag) = token.strip_prefix("--") else {
            positional.push(token.clone());
            continue;
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (flag, None),
        };
        let argument = command
            .argument(name)
            .ok_or_else(|| fail(format!("'{}' has no argument '{name}'", command.name)))?;
        let value = match inline {
            Some(text) => Value::String(text),
            None => match rest.next_if(|next| !next.starts_with("--")) {
                Some(text) => Value::String(text.clone()),
                None if argument.ty == ArgType::Bool => Value::Bool(true),
                None => return Err(fail(format!("argument '{}' needs a value", argument.name))),
            },
        };
        push_argument(&mut arguments, argument.name.clone(), value);
    }

    let mut open = command
        .arguments
        .iter()
        .filter(|a| !a.optional && !arguments.contains_key(&a.name))
        .collect::<Vec<_>>()
        .into_iter();
    for word in positional {
        let argument = open
            .next()
            .ok_or_else(|| fail(format!("unexpected value '{word}'")))?;
        arguments.insert(argument.name.clone(), Value::String(word));
    }
    debug!(command = %command.name, ?arguments, "parsed");
    Ok(Some(CommandMessage::new(command.name.clone(), arguments)))
}

/// Human-readable rendering of command output.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn parse_answer(text: &str, request: &Request) -> std::result::Result<Value, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Null);
    }
    match &request.kind {
        RequestKind::Boolean => match text.to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" => Ok(Value::Bool(true)),
            "n" | "no" | "false" => Ok(Value::Bool(false)),
            _ => Err("answer yes or no".to_string()),
        },
        RequestKind::String => Ok(Value::String(text.to_string())),
        RequestKind::Float => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| "expected a number".to_string()),
        RequestKind::Point => text
            .parse::<i64>()
            .ok()
            .filter(|i| *i >= 0)
            .map(Value::Int)
            .ok_or_else(|| "expected a point index".to_string()),
        RequestKind::Selection(options) => {
            let chosen = match text.parse::<usize>() {
                Ok(i) => options.get(i).cloned(),
                Err(_) => options.iter().find(|o| *o == text).cloned(),
            };
            chosen
                .map(Value::String)
                .ok_or_else(|| format!("choose one of {options:?}"))
        }
    }
}

/// A command-line session attached to a running engine.
pub struct Shell<R, W> {
    handle: EngineHandle,
    commands: Vec<Command>,
    input: R,
    output: W,
    pub failures: usize,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub fn new(handle: EngineHandle, commands: Vec<Command>, input: R, output: W) -> Self {
        Self {
            handle,
            commands,
            input,
            output,
            failures: 0,
        }
    }

    /// Parse and run one line. Blank lines and comments succeed trivially.
    pub fn execute_line(&mut self, line: &str) -> Result<Outcome> {
        match parse_line(line, &self.commands) {
            Ok(Some(message)) => self.execute(message),
            Ok(None) => Ok(Outcome::Success),
            Err(e @ CliError::Parse { .. }) => {
                writeln!(self.output, "{e}")?;
                self.failures += 1;
                Ok(Outcome::Failure)
            }
            Err(e) => Err(e),
        }
    }

    pub fn execute(&mut self, message: CommandMessage) -> Result<Outcome> {
        if !self.handle.send(message) {
            return Err(CliError::EngineStopped);
        }
        loop {
            let reply = self.handle.rx.recv().map_err(|_| CliError::EngineStopped)?;
            match reply {
                EngineMessage::Output(value) => writeln!(self.output, "{}", render(&value))?,
                EngineMessage::Request(request) => {
                    let answer = self.answer(&request)?;
                    if !self.handle.respond(request.id, answer) {
                        return Err(CliError::EngineStopped);
                    }
                }
                EngineMessage::Success => return Ok(Outcome::Success),
                EngineMessage::Exit => return Ok(Outcome::Exit),
                EngineMessage::Failure(failure) => {
                    writeln!(self.output, "Failure: {failure}")?;
                    self.failures += 1;
                    return Ok(Outcome::Failure);
                }
            }
        }
    }

    /// Ask until the answer parses. End of input takes the default.
    fn answer(&mut self, request: &Request) -> Result<Value> {
        loop {
            match &request.kind {
                RequestKind::Selection(options) => {
                    writeln!(self.output, "{}", request.prompt)?;
                    for (i, option) in options.iter().enumerate() {
                        writeln!(self.output, "  {i}: {option}")?;
                    }
                    write!(self.output, "[{}] ", request.default)?;
                }
                _ => write!(self.output, "{} [{}] ", request.prompt, request.default)?,
            }
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Value::Null);
            }
            match parse_answer(&line, request) {
                Ok(value) => return Ok(value),
                Err(what) => writeln!(self.output, "{what}")?,
            }
        }
    }

    /// Read-eval-print until `exit` or end of input.
    pub fn interact(&mut self) -> Result<()> {
        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(());
            }
            if self.execute_line(&line)? == Outcome::Exit {
                return Ok(());
            }
        }
    }

    /// Stop the engine and take its state back.
    pub fn close(self) -> Result<Hooke> {
        self.handle.close().ok_or_else(|| {
            warn!("engine thread panicked");
            CliError::EngineStopped
        })
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hk_engine::{CommandEngine, Config};

    use super::*;

    fn commands() -> Vec<Command> {
        Hooke::new(Config::new()).unwrap().commands().to_vec()
    }

    #[test]
    fn tokens_respect_quotes() {
        assert_eq!(
            tokenize(r#"difference --column_A "a (m)" --column_B 'b (m)'"#).unwrap(),
            vec!["difference", "--column_A", "a (m)", "--column_B", "b (m)"]
        );
        assert_eq!(tokenize(r#"note "" "#).unwrap(), vec!["note", ""]);
        assert!(tokenize("set note 'open").is_err());
    }

    #[test]
    fn longest_command_name_wins() {
        let commands = commands();
        let m = parse_line("polymer fit peaks --peak_index 0 --peak_index 2", &commands)
            .unwrap()
            .unwrap();
        assert_eq!(m.command, "polymer fit peaks");
        assert_eq!(
            m.arguments.get("peak index"),
            Some(&Value::List(vec![Value::from("0"), Value::from("2")]))
        );
    }

    #[test]
    fn positional_words_fill_required_arguments() {
        let commands = commands();
        let m = parse_line("jump to curve 3", &commands).unwrap().unwrap();
        assert_eq!(m.arguments.get("index"), Some(&Value::from("3")));
        let m = parse_line("delta --point=4,7 --SI", &commands).unwrap().unwrap();
        assert_eq!(m.arguments.get("point"), Some(&Value::from("4,7")));
        assert_eq!(m.arguments.get("SI"), Some(&Value::Bool(true)));
        assert!(parse_line("# comment", &commands).unwrap().is_none());
        assert!(parse_line("jump to curve 3 4", &commands).is_err());
        assert!(parse_line("levitate", &commands).is_err());
    }

    #[test]
    fn answers_parse_by_kind() {
        let request = |kind| Request {
            id: uuid::Uuid::nil(),
            prompt: String::new(),
            kind,
            default: Value::Null,
        };
        assert_eq!(parse_answer("yes", &request(RequestKind::Boolean)), Ok(Value::Bool(true)));
        assert_eq!(parse_answer("", &request(RequestKind::Float)), Ok(Value::Null));
        assert!(parse_answer("-1", &request(RequestKind::Point)).is_err());
        let pick = request(RequestKind::Selection(vec!["wtk".into(), "fmms".into()]));
        assert_eq!(parse_answer("1", &pick), Ok(Value::from("fmms")));
        assert_eq!(parse_answer("wtk", &pick), Ok(Value::from("wtk")));
    }

    #[test]
    fn scripted_session_reports_failures() {
        let hooke = Hooke::new(Config::new()).unwrap();
        let commands = hooke.commands().to_vec();
        let handle = EngineHandle::spawn(CommandEngine::new(hooke));
        let mut shell = Shell::new(handle, commands, Cursor::new(Vec::new()), Vec::new());
        assert_eq!(shell.execute_line("version").unwrap(), Outcome::Success);
        assert_eq!(shell.execute_line("get curve").unwrap(), Outcome::Failure);
        assert_eq!(shell.execute_line("levitate").unwrap(), Outcome::Failure);
        assert_eq!(shell.execute_line("exit").unwrap(), Outcome::Exit);
        assert_eq!(shell.failures, 2);
        let text = String::from_utf8(shell.output().clone()).unwrap();
        assert!(text.starts_with("Hooke "));
        assert!(text.contains("Failure: no playlist loaded"));
        assert!(shell.close().is_ok());
    }
}
