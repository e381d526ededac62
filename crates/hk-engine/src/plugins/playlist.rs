//! Playlist navigation, persistence and filters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hk_core::{CurveRef, Id, Info, Value};
use hk_curve::{Curve, Playlist};
use tracing::info;

use crate::argument::{ArgType, Argument};
use crate::command::{Command, Params, curve_argument, playlist_argument};
use crate::error::{CommandResult, Failure};
use crate::hooke::{Hooke, stackable};
use crate::io::CommandIo;
use crate::registry::{Plugin, PluginKind, no_settings};

pub const PLAYLIST: Plugin = Plugin {
    name: "playlist",
    kind: PluginKind::Builtin,
    dependencies: &[],
    commands: playlist_commands,
    settings: no_settings,
};

pub const PLAYLISTS: Plugin = Plugin {
    name: "playlists",
    kind: PluginKind::Builtin,
    dependencies: &[],
    commands: playlists_commands,
    settings: no_settings,
};

fn playlist_commands() -> Vec<Command> {
    let p = "playlist";
    vec![
        Command::new("new playlist", p, new_playlist)
            .arg(Argument::string("name", Some("playlist")).help("Name of the new playlist."))
            .help("Create an empty playlist and make it current."),
        Command::new("load playlist", p, load_playlist)
            .arg(Argument::new("input", ArgType::Path).required().help("Playlist file."))
            .help("Load a playlist file and make it current."),
        Command::new("save playlist", p, save_playlist)
            .arg(playlist_argument())
            .arg(
                Argument::new("output", ArgType::Path)
                    .help("File to write; defaults to where the playlist came from."),
            )
            .help("Write a playlist to disk."),
        Command::new("add curve", p, add_curve)
            .arg(playlist_argument())
            .arg(Argument::new("input", ArgType::Path).required().help("Curve file."))
            .arg(Argument::new("info", ArgType::Dict).help("Initial curve info."))
            .help("Append a curve file to a playlist."),
        Command::new("remove curve", p, remove_curve)
            .arg(curve_argument())
            .help("Drop a curve from its playlist."),
        Command::new("next curve", p, next_curve)
            .arg(playlist_argument())
            .help("Move to the next curve, wrapping at the end."),
        Command::new("previous curve", p, previous_curve)
            .arg(playlist_argument())
            .help("Move to the previous curve, wrapping at the start."),
        Command::new("jump to curve", p, jump_to_curve)
            .arg(playlist_argument())
            .arg(Argument::new("index", ArgType::Int).required().help("Curve index."))
            .help("Select a curve by index."),
        Command::new("get playlist", p, get_playlist)
            .arg(playlist_argument())
            .help("Print a playlist summary."),
        Command::new("name playlist", p, name_playlist)
            .arg(playlist_argument())
            .arg(Argument::new("name", ArgType::String).required().help("New name."))
            .help("Rename a playlist."),
        Command::new("playlist info", p, playlist_info)
            .arg(playlist_argument())
            .help("Print a playlist's state and curve names."),
        Command::new("set note", p, set_note)
            .arg(curve_argument())
            .arg(Argument::new("note", ArgType::String).required().help("Note text."))
            .help("Attach a note to a curve."),
        Command::new("note filter", p, note_filter)
            .arg(
                Argument::string("output playlist", Some("note filter"))
                    .help("Name of the filtered playlist."),
            )
            .help("New playlist with the curves of the current one that carry a note."),
        Command::new("apply command stack to playlist", p, apply_command_stack)
            .arg(playlist_argument())
            .arg(
                Argument::new("evaluate", ArgType::Bool)
                    .default(true)
                    .help("Run the commands now; otherwise only append them to each curve's stack."),
            )
            .help("Apply the engine's command stack to every curve of a playlist."),
    ]
}

fn playlists_commands() -> Vec<Command> {
    let p = "playlists";
    vec![
        Command::new("playlists", p, playlists).help("List loaded playlists."),
        Command::new("jump to playlist", p, jump_to_playlist)
            .arg(Argument::new("index", ArgType::Int).required().help("Playlist index."))
            .help("Select a playlist by index."),
        Command::new("next playlist", p, next_playlist)
            .help("Move to the next playlist, wrapping at the end."),
        Command::new("previous playlist", p, previous_playlist)
            .help("Move to the previous playlist, wrapping at the start."),
    ]
}

fn new_playlist(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    hooke.add_playlist(Playlist::new(params.str("name")?));
    Ok(())
}

fn load_playlist(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let playlist = Playlist::load(Path::new(params.str("input")?))?;
    io.emit(playlist.name.clone());
    hooke.add_playlist(playlist);
    Ok(())
}

fn save_playlist(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    let output = params.opt_str("output").map(PathBuf::from);
    let path = hooke.playlist_mut(index)?.save(output.as_deref())?;
    io.emit(path.display().to_string());
    Ok(())
}

fn add_curve(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    let path = PathBuf::from(params.str("input")?);
    hooke.drivers.find(&path)?;
    let mut curve = Curve::new(path.clone());
    if let Some(extra) = params.get("info").as_map() {
        curve.info.extend(extra.clone());
    }
    let playlist = hooke.playlist_mut(index)?;
    let position = playlist.append(curve);
    info!(playlist = %playlist.name, curve = position, path = %path.display(), "curve added");
    Ok(())
}

fn remove_curve(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, false)?;
    let curve = hooke.playlist_mut(r.playlist.index())?.remove(r.curve.index())?;
    io.emit(curve.name);
    Ok(())
}

fn next_curve(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    hooke.playlist_mut(index)?.next()?;
    Ok(())
}

fn previous_curve(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    hooke.playlist_mut(index)?.previous()?;
    Ok(())
}

fn jump_to_curve(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    let target = params
        .opt_usize("index")
        .ok_or_else(|| Failure::invalid("index", "must be non-negative"))?;
    hooke.playlist_mut(index)?.jump(target)?;
    Ok(())
}

fn summary(playlist: &Playlist) -> Info {
    let mut map = Info::new();
    map.insert("name".into(), Value::from(playlist.name.as_str()));
    map.insert(
        "path".into(),
        playlist
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .into(),
    );
    map.insert("curves".into(), Value::from(playlist.len()));
    map.insert("index".into(), playlist.index().into());
    map
}

fn get_playlist(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    io.emit(summary(hooke.playlist(index)?));
    Ok(())
}

fn name_playlist(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    hooke.playlist_mut(index)?.name = params.str("name")?.to_string();
    Ok(())
}

fn playlist_info(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    let playlist = hooke.playlist(index)?;
    let mut map = summary(playlist);
    map.insert(
        "base path".into(),
        playlist
            .base_path
            .as_ref()
            .map(|p| p.display().to_string())
            .into(),
    );
    map.insert("max loaded".into(), Value::from(playlist.max_loaded));
    map.insert("loaded".into(), Value::from(playlist.loaded_indices().count()));
    map.insert("saved".into(), Value::from(playlist.is_saved()));
    map.insert("info".into(), Value::Map(playlist.info.clone()));
    map.insert(
        "curve names".into(),
        Value::List(playlist.curves().iter().map(|c| c.name.as_str().into()).collect()),
    );
    io.emit(map);
    Ok(())
}

fn set_note(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, false)?;
    let note = params.str("note")?.to_string();
    hooke.curve_mut(r)?.set_note(note);
    Ok(())
}

fn note_filter(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let name = params.str("output playlist")?.to_string();
    let index = hooke.filter_playlist(&name, io, &mut |hooke: &mut Hooke, r: CurveRef, _io: &mut CommandIo<'_>| {
        Ok(!hooke.curve(r)?.note().is_empty())
    })?;
    io.emit(hooke.playlist(index)?.len());
    Ok(())
}

fn apply_command_stack(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = hooke.resolve_playlist(params)?;
    let evaluate = params.bool("evaluate")?;
    let stack = hooke.command_stack.clone();
    for c in 0..hooke.playlist(index)?.len() {
        let r = CurveRef::new(Id::from_index(index), Id::from_index(c));
        if !evaluate {
            let curve = hooke.curve_mut(r)?;
            for message in stack.iter() {
                let mut message = message.clone();
                message.arguments = stackable(&message.arguments);
                curve.command_stack.push(message);
            }
            continue;
        }
        for message in stack.iter() {
            let mut arguments: BTreeMap<String, Value> = message.arguments.clone();
            if hooke
                .command(&message.command)
                .is_some_and(|c| c.argument("curve").is_some())
            {
                arguments.insert("curve".to_string(), Hooke::curve_value(r));
            }
            hooke.run_command(&message.command, &arguments, io)?;
        }
    }
    Ok(())
}

fn playlists(hooke: &mut Hooke, _params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let names: Vec<Value> = hooke.playlists.iter().map(|p| p.name.as_str().into()).collect();
    io.emit(names);
    Ok(())
}

fn jump_to_playlist(hooke: &mut Hooke, params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    let index = params
        .opt_usize("index")
        .ok_or_else(|| Failure::invalid("index", "must be non-negative"))?;
    hooke.set_current_playlist(index)
}

fn step_playlist(hooke: &mut Hooke, forward: bool) -> CommandResult<()> {
    let n = hooke.playlists.len();
    let current = hooke
        .current_playlist_index()
        .ok_or_else(|| Failure::message("no playlist loaded"))?;
    let next = if forward { (current + 1) % n } else { (current + n - 1) % n };
    hooke.set_current_playlist(next)
}

fn next_playlist(hooke: &mut Hooke, _params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    step_playlist(hooke, true)
}

fn previous_playlist(hooke: &mut Hooke, _params: &Params, _io: &mut CommandIo<'_>) -> CommandResult<()> {
    step_playlist(hooke, false)
}
