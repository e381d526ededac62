//! Reading and writing the live configuration.

use std::path::PathBuf;

use hk_core::Value;
use tracing::info;

use crate::argument::{ArgType, Argument};
use crate::command::{Command, Params};
use crate::config::Setting;
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;
use crate::registry::{Plugin, PluginKind};

pub const PLUGIN: Plugin = Plugin {
    name: "config",
    kind: PluginKind::Builtin,
    dependencies: &[],
    commands,
    settings,
};

pub const DEFAULT_CONFIG_FILE: &str = "hooke.yaml";

fn settings() -> Vec<Setting> {
    vec![Setting::new(
        "config",
        "prompt timeout",
        300.0,
        "Seconds a prompt waits for an answer.",
    )]
}

fn section_option() -> [Argument; 2] {
    [
        Argument::new("section", ArgType::String)
            .required()
            .help("Configuration section."),
        Argument::new("option", ArgType::String)
            .required()
            .help("Option within the section."),
    ]
}

fn commands() -> Vec<Command> {
    vec![
        Command::new("get config", "config", get_config)
            .args(section_option())
            .help("Print one configured value."),
        Command::new("set config", "config", set_config)
            .args(section_option())
            .arg(
                Argument::new("value", ArgType::String)
                    .required()
                    .help("New value, parsed as YAML."),
            )
            .help("Change one configured value."),
        Command::new("print config", "config", print_config)
            .help("Print the whole configuration."),
        Command::new("save config", "config", save_config)
            .arg(Argument::new("output", ArgType::Path).help(format!(
                "File to write; defaults to the loaded config file or {DEFAULT_CONFIG_FILE}."
            )))
            .help("Write the configuration to disk."),
    ]
}

fn get_config(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let (section, option) = (params.str("section")?, params.str("option")?);
    let value = hooke
        .config
        .get(section, option)
        .ok_or_else(|| Failure::message(format!("no config option '{section}.{option}'")))?;
    io.emit(value.clone());
    Ok(())
}

fn set_config(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    let (section, option) = (params.str("section")?, params.str("option")?);
    let text = params.str("value")?;
    let value = match text {
        "None" => Value::Null,
        "True" => Value::Bool(true),
        "False" => Value::Bool(false),
        _ => serde_yaml::from_str::<serde_yaml::Value>(text)
            .map(crate::argument::yaml_to_value)
            .unwrap_or_else(|_| Value::from(text)),
    };
    info!(section, option, %value, "config changed");
    hooke.config.set(section, option, value);
    Ok(())
}

fn print_config(hooke: &mut Hooke, _params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    io.emit(hooke.config.to_yaml(hooke.settings())?);
    Ok(())
}

fn save_config(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let path = params
        .opt_str("output")
        .map(PathBuf::from)
        .or_else(|| hooke.config_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    hooke.config.save(&path, hooke.settings())?;
    io.emit(path.display().to_string());
    Ok(())
}
