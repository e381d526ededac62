//! Statically registered command plugins.

use std::sync::Arc;

use hk_core::{Real, Value};

use crate::argument::ArgCallback;
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::registry::Plugin;

pub mod command_stack;
pub mod config;
pub mod curve;
pub mod engine;
pub mod flatfilt;
pub mod playlist;
pub mod polymer_fit;
pub mod vclamp;

/// Every plugin this build knows, in declaration order.
pub fn all() -> Vec<Plugin> {
    vec![
        engine::PLUGIN,
        config::PLUGIN,
        command_stack::PLUGIN,
        playlist::PLAYLIST,
        playlist::PLAYLISTS,
        curve::PLUGIN,
        vclamp::PLUGIN,
        polymer_fit::PLUGIN,
        flatfilt::PLUGIN,
    ]
}

/// Argument callback substituting `section.option` from the config when
/// the caller left the argument unset.
pub fn from_config(section: &'static str, option: &'static str) -> ArgCallback {
    Arc::new(move |hooke: &Hooke, value: Value| {
        Ok(if value.is_null() {
            hooke.setting(section, option)
        } else {
            value
        })
    })
}

/// Optional float, treating `None`/null as unset.
pub(crate) fn opt_real(value: &Value, what: &str) -> CommandResult<Option<Real>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s == "None" => Ok(None),
        other => other
            .as_f64()
            .or_else(|| other.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Some)
            .ok_or_else(|| Failure::invalid(what, format!("expected a number, got '{other}'"))),
    }
}

/// Walk `a|b|c` style key paths through nested info maps.
pub(crate) fn lookup_nested<'v>(info: &'v hk_core::Info, path: &str, separator: char) -> Option<&'v Value> {
    let mut parts = path.split(separator);
    let mut value = info.get(parts.next()?)?;
    for part in parts {
        value = value.as_map()?.get(part)?;
    }
    Some(value)
}
