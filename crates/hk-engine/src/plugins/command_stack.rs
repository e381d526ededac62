//! Engine-level command capture and replay.

use std::path::Path;

use hk_curve::{CommandMessage, CommandStack, Dispatcher};
use tracing::info;

use crate::argument::{ArgType, Argument};
use crate::command::{Command, Params};
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;
use crate::registry::{Plugin, PluginKind, no_settings};

pub const PLUGIN: Plugin = Plugin {
    name: "command_stack",
    kind: PluginKind::Builtin,
    dependencies: &[],
    commands,
    settings: no_settings,
};

fn commands() -> Vec<Command> {
    vec![
        Command::new("start command capture", "command_stack", start_capture)
            .help("Record every following command on the engine's command stack."),
        Command::new("stop command capture", "command_stack", stop_capture)
            .help("Stop recording commands."),
        Command::new("get command stack", "command_stack", get_stack)
            .help("Print the engine's command stack."),
        Command::new("pop command from stack", "command_stack", pop)
            .help("Remove and print the most recent stacked command."),
        Command::new("save command stack", "command_stack", save)
            .arg(
                Argument::new("output", ArgType::Path)
                    .required()
                    .help("YAML file to write."),
            )
            .help("Write the engine's command stack to disk."),
        Command::new("load command stack", "command_stack", load)
            .arg(
                Argument::new("input", ArgType::Path)
                    .required()
                    .help("YAML file to read."),
            )
            .help("Replace the engine's command stack with one read from disk."),
        Command::new("execute command stack", "command_stack", execute)
            .help("Run every command on the engine's command stack, in order."),
    ]
}

fn start_capture(hooke: &mut Hooke, _params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    hooke.capturing = true;
    Ok(())
}

fn stop_capture(hooke: &mut Hooke, _params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    hooke.capturing = false;
    Ok(())
}

fn get_stack(hooke: &mut Hooke, _params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    io.emit(hooke.command_stack.to_yaml()?);
    Ok(())
}

fn pop(hooke: &mut Hooke, _params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let message = hooke
        .command_stack
        .pop()
        .ok_or_else(|| Failure::message("command stack is empty"))?;
    io.emit(message.command);
    Ok(())
}

fn save(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    hooke.command_stack.save(Path::new(params.str("output")?))?;
    Ok(())
}

fn load(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    hooke.command_stack = CommandStack::load(Path::new(params.str("input")?))?;
    Ok(())
}

/// Runs messages through the same lookup as live dispatch.
struct Live<'h, 'io, 'a> {
    hooke: &'h mut Hooke,
    io: &'io mut CommandIo<'a>,
}

impl Dispatcher for Live<'_, '_, '_> {
    type Error = Failure;

    fn dispatch(&mut self, message: &CommandMessage) -> CommandResult<()> {
        self.hooke.run_command(&message.command, &message.arguments, self.io)
    }
}

fn execute(hooke: &mut Hooke, _params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let stack = hooke.command_stack.clone();
    let count = stack.execute(&mut Live { hooke, io }, None)?;
    info!(count, "executed command stack");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::Config;
    use crate::sink::CollectSink;

    #[test]
    fn capture_skips_stack_commands() {
        let mut hooke = Hooke::new(Config::new()).unwrap();
        let mut sink = CollectSink::default();
        let mut io = CommandIo::detached(&mut sink);
        for name in ["start command capture", "version", "get command stack", "stop command capture", "version"] {
            hooke
                .dispatch(&CommandMessage::new(name, BTreeMap::new()), &mut io)
                .unwrap();
        }
        let names: Vec<&str> = hooke.command_stack.iter().map(|m| m.command.as_str()).collect();
        assert_eq!(names, vec!["version"]);

        hooke
            .dispatch(&CommandMessage::new("execute command stack", BTreeMap::new()), &mut io)
            .unwrap();
        drop(io);
        let versions = sink.outputs().filter(|v| v.as_str().is_some_and(|s| s.starts_with("Hooke"))).count();
        assert_eq!(versions, 3);
    }
}
