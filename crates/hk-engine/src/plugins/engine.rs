//! `exit`, `version`, `help`.

use crate::argument::{ArgType, Argument};
use crate::command::{Command, Params};
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;
use crate::registry::{Plugin, PluginKind, no_settings};

pub const PLUGIN: Plugin = Plugin {
    name: "engine",
    kind: PluginKind::Builtin,
    dependencies: &[],
    commands,
    settings: no_settings,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn commands() -> Vec<Command> {
    vec![
        Command::new("exit", "engine", exit)
            .alias("quit")
            .alias("EOF")
            .help("Close the engine."),
        Command::new("version", "engine", version).help("Print the engine version."),
        Command::new("help", "engine", help)
            .arg(Argument::new("command", ArgType::String).help("Command to describe."))
            .help("List commands, or describe one."),
    ]
}

fn exit(_hooke: &mut Hooke, _params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    io.request_exit();
    Ok(())
}

fn version(_hooke: &mut Hooke, _params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    io.emit(format!("Hooke {VERSION}"));
    Ok(())
}

fn help(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    match params.opt_str("command") {
        Some(name) => {
            let command = hooke
                .command(name)
                .ok_or_else(|| Failure::UnknownCommand { name: name.to_string() })?;
            io.emit(command.help_text());
        }
        None => {
            let names: Vec<hk_core::Value> =
                hooke.commands().iter().map(|c| c.name.as_str().into()).collect();
            io.emit(names);
        }
    }
    Ok(())
}
