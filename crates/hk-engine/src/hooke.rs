//! Shared engine state: config, playlists, commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hk_core::{CurveRef, Id, Value};
use hk_curve::{CommandMessage, CommandStack, Curve, Data, Dispatcher, DriverRegistry, Playlist};
use tracing::{debug, info};

use crate::command::{Command, Params};
use crate::config::{Config, Setting};
use crate::error::{CommandResult, Failure};
use crate::io::CommandIo;
use crate::plugins;
use crate::registry::{Plugin, Registry, RegistryResult};

/// Arguments never stored on a curve's command stack.
const UNSTACKED: [&str; 3] = ["curve", "help", "stack"];

/// `arguments` without the ones that only make sense for a live call.
pub(crate) fn stackable(arguments: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    arguments
        .iter()
        .filter(|(k, _)| !UNSTACKED.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Everything commands act on. Owned by the engine thread while it runs and
/// handed back on close.
pub struct Hooke {
    pub config: Config,
    /// File `save config` writes to.
    pub config_path: Option<PathBuf>,
    pub drivers: DriverRegistry,
    pub playlists: Vec<Playlist>,
    current_playlist: Option<usize>,
    /// Engine-level capture buffer for `start command capture`.
    pub command_stack: CommandStack,
    pub capturing: bool,
    commands: Vec<Command>,
    settings: Vec<Setting>,
    plugin_names: Vec<&'static str>,
}

impl std::fmt::Debug for Hooke {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooke")
            .field("plugins", &self.plugin_names)
            .field("drivers", &self.drivers.names())
            .field("playlists", &self.playlists.len())
            .field("current_playlist", &self.current_playlist)
            .field("capturing", &self.capturing)
            .finish()
    }
}

impl Hooke {
    /// Load every known plugin; `user` overrides their default settings.
    pub fn new(user: Config) -> RegistryResult<Self> {
        Self::with_plugins(&plugins::all(), user)
    }

    pub fn with_plugins(plugins: &[Plugin], user: Config) -> RegistryResult<Self> {
        let registry = Registry::load(plugins, &user)?;
        let mut config = Config::from_settings(&registry.settings);
        config.merge(&user);
        Ok(Self {
            config,
            config_path: None,
            drivers: DriverRegistry::default(),
            playlists: Vec::new(),
            current_playlist: None,
            command_stack: CommandStack::new(),
            capturing: false,
            commands: registry.commands,
            settings: registry.settings,
            plugin_names: registry.plugins.iter().map(|p| p.name).collect(),
        })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.matches(name))
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    pub fn plugin_names(&self) -> &[&'static str] {
        &self.plugin_names
    }

    /// Configured value, or `Null` if the option is unknown.
    pub fn setting(&self, section: &str, option: &str) -> Value {
        self.config.get(section, option).cloned().unwrap_or_default()
    }

    /// Look up and run a command without recording it anywhere.
    pub fn run_command(
        &mut self,
        name: &str,
        arguments: &BTreeMap<String, Value>,
        io: &mut CommandIo<'_>,
    ) -> CommandResult<()> {
        let command = self
            .command(name)
            .cloned()
            .ok_or_else(|| Failure::UnknownCommand {
                name: name.to_string(),
            })?;
        debug!(command = %command.name, "running");
        command.run(self, io, arguments)
    }

    /// Entry point for messages from the UI: capture (when on), then run.
    pub fn dispatch(&mut self, message: &CommandMessage, io: &mut CommandIo<'_>) -> CommandResult<()> {
        if self.capturing {
            let plugin = self.command(&message.command).map(|c| c.plugin.as_str());
            if plugin != Some("command_stack") {
                self.command_stack.push(message.clone());
            }
        }
        info!(command = %message.command, "dispatch");
        self.run_command(&message.command, &message.arguments, io)
    }

    // ---- playlists ----

    pub fn current_playlist_index(&self) -> Option<usize> {
        self.current_playlist
    }

    pub fn set_current_playlist(&mut self, index: usize) -> CommandResult<()> {
        if index >= self.playlists.len() {
            return Err(Failure::message(format!(
                "no playlist {index} ({} loaded)",
                self.playlists.len()
            )));
        }
        self.current_playlist = Some(index);
        Ok(())
    }

    /// Append and make current.
    pub fn add_playlist(&mut self, playlist: Playlist) -> usize {
        info!(playlist = %playlist.name, curves = playlist.len(), "playlist added");
        self.playlists.push(playlist);
        let index = self.playlists.len() - 1;
        self.current_playlist = Some(index);
        index
    }

    pub fn playlist(&self, index: usize) -> CommandResult<&Playlist> {
        self.playlists
            .get(index)
            .ok_or_else(|| Failure::message(format!("no playlist {index}")))
    }

    pub fn playlist_mut(&mut self, index: usize) -> CommandResult<&mut Playlist> {
        self.playlists
            .get_mut(index)
            .ok_or_else(|| Failure::message(format!("no playlist {index}")))
    }

    /// The `playlist` argument, or the current playlist when unset.
    pub fn resolve_playlist(&self, params: &Params) -> CommandResult<usize> {
        let index = match params.get("playlist") {
            Value::Null => self
                .current_playlist
                .ok_or_else(|| Failure::message("no playlist loaded"))?,
            value => value
                .as_i64()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| Failure::invalid("playlist", format!("not a playlist index: {value}")))?,
        };
        self.playlist(index)?;
        Ok(index)
    }

    // ---- curves ----

    /// Argument value addressing `r` from any playlist.
    pub fn curve_value(r: CurveRef) -> Value {
        let mut map = BTreeMap::new();
        map.insert("playlist".to_string(), Value::from(r.playlist.index()));
        map.insert("curve".to_string(), Value::from(r.curve.index()));
        Value::Map(map)
    }

    fn parse_curve(&self, value: &Value) -> CommandResult<CurveRef> {
        let index = |v: Option<&Value>| {
            v.and_then(Value::as_i64)
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| Failure::invalid("curve", format!("not a curve address: {value}")))
        };
        let (playlist, curve) = match value {
            Value::Null => {
                let p = self
                    .current_playlist
                    .ok_or_else(|| Failure::message("no playlist loaded"))?;
                let c = self.playlist(p)?.index().ok_or_else(|| Failure::message("playlist is empty"))?;
                (p, c)
            }
            Value::Map(map) => (index(map.get("playlist"))?, index(map.get("curve"))?),
            other => {
                let p = self
                    .current_playlist
                    .ok_or_else(|| Failure::message("no playlist loaded"))?;
                (p, index(Some(other))?)
            }
        };
        self.playlist(playlist)?.curve(curve)?;
        Ok(CurveRef::new(Id::from_index(playlist), Id::from_index(curve)))
    }

    /// Address of the curve a command should act on, loading (and replaying)
    /// it when `load` is set.
    pub fn resolve_curve(&mut self, params: &Params, io: &mut CommandIo<'_>, load: bool) -> CommandResult<CurveRef> {
        let r = self.parse_curve(params.get("curve"))?;
        if load {
            self.load_curve(r, io)?;
        }
        Ok(r)
    }

    pub fn curve(&self, r: CurveRef) -> CommandResult<&Curve> {
        Ok(self.playlist(r.playlist.index())?.curve(r.curve.index())?)
    }

    pub fn curve_mut(&mut self, r: CurveRef) -> CommandResult<&mut Curve> {
        Ok(self.playlist_mut(r.playlist.index())?.curve_mut(r.curve.index())?)
    }

    /// Block `name` (or the first) of a loaded curve.
    pub fn block(&self, r: CurveRef, name: Option<&str>) -> CommandResult<&Data> {
        Ok(self.curve(r)?.block(name)?)
    }

    pub fn block_mut(&mut self, r: CurveRef, name: Option<&str>) -> CommandResult<&mut Data> {
        Ok(self.curve_mut(r)?.block_mut(name)?)
    }

    /// Make the curve resident. Freshly read data gets the curve's command
    /// stack replayed so derived columns come back.
    pub fn load_curve(&mut self, r: CurveRef, io: &mut CommandIo<'_>) -> CommandResult<()> {
        let (p, c) = (r.playlist.index(), r.curve.index());
        let drivers = &self.drivers;
        let playlist = self
            .playlists
            .get_mut(p)
            .ok_or_else(|| Failure::message(format!("no playlist {p}")))?;
        let fresh = playlist.load_curve(c, drivers)?;
        if !fresh {
            return Ok(());
        }
        let stack = self.curve(r)?.command_stack.clone();
        if stack.is_empty() {
            return Ok(());
        }
        debug!(curve = %self.curve(r)?.name, commands = stack.len(), "replaying command stack");
        let mut replay = Replay { hooke: self, io, curve: r };
        if let Err(failure) = stack.execute(&mut replay, None) {
            self.playlist_mut(p)?.unload_curve(c)?;
            return Err(failure);
        }
        Ok(())
    }

    /// Record a curve-modifying call on the curve's own stack unless
    /// `stack` is false or it repeats the top entry.
    pub fn add_to_command_stack(&mut self, r: CurveRef, command: &str, params: &Params) -> CommandResult<()> {
        if !params.get("stack").as_bool().unwrap_or(true) {
            return Ok(());
        }
        let message = CommandMessage::new(command, stackable(params.values()));
        let stack = &mut self.curve_mut(r)?.command_stack;
        if stack.last().is_some_and(|top| top.same_call(&message)) {
            return Ok(());
        }
        stack.push(message);
        Ok(())
    }

    /// Run `accept` on every curve of the current playlist and add a new
    /// playlist with the accepted ones. Poor fits count as rejections.
    pub fn filter_playlist(
        &mut self,
        name: &str,
        io: &mut CommandIo<'_>,
        accept: &mut dyn FnMut(&mut Hooke, CurveRef, &mut CommandIo<'_>) -> CommandResult<bool>,
    ) -> CommandResult<usize> {
        let p = self
            .current_playlist
            .ok_or_else(|| Failure::message("no playlist loaded"))?;
        let mut kept = Vec::new();
        for c in 0..self.playlist(p)?.len() {
            let r = CurveRef::new(Id::from_index(p), Id::from_index(c));
            match accept(self, r, io) {
                Ok(true) => kept.push(c),
                Ok(false) => {}
                Err(failure) if failure.is_poor_fit() => {
                    debug!(curve = c, %failure, "filtered out");
                }
                Err(failure) => return Err(failure),
            }
        }
        let subset = self.playlist(p)?.subset(name, &kept)?;
        Ok(self.add_playlist(subset))
    }
}

/// Re-dispatches stored messages against one curve, without stacking them
/// again.
struct Replay<'h, 'io, 'a> {
    hooke: &'h mut Hooke,
    io: &'io mut CommandIo<'a>,
    curve: CurveRef,
}

impl Dispatcher for Replay<'_, '_, '_> {
    type Error = Failure;

    fn dispatch(&mut self, message: &CommandMessage) -> CommandResult<()> {
        let mut arguments = message.arguments.clone();
        if let Some(command) = self.hooke.command(&message.command) {
            if command.argument("curve").is_some() {
                arguments.insert("curve".to_string(), Hooke::curve_value(self.curve));
            }
            if command.argument("stack").is_some() {
                arguments.insert("stack".to_string(), Value::Bool(false));
            }
        }
        self.hooke.run_command(&message.command, &arguments, self.io)
    }
}
