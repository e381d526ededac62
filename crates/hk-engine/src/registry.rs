//! Static plugin registry with dependency ordering.

use std::collections::{BTreeMap, VecDeque};

use thiserror::Error;
use tracing::{debug, info};

use crate::command::Command;
use crate::config::{Config, Setting};

/// Builtins are always loaded; plugins can be switched off in the
/// `plugins` config section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginKind {
    Builtin,
    Plugin,
}

#[derive(Clone, Copy)]
pub struct Plugin {
    pub name: &'static str,
    pub kind: PluginKind,
    pub dependencies: &'static [&'static str],
    pub commands: fn() -> Vec<Command>,
    pub settings: fn() -> Vec<Setting>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

pub fn no_settings() -> Vec<Setting> {
    Vec::new()
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("plugin '{plugin}' depends on '{dependency}', which is not loaded")]
    MissingDependency { plugin: String, dependency: String },

    #[error("plugin dependency cycle among: {plugins:?}")]
    Cycle { plugins: Vec<String> },

    #[error("command '{command}' is defined by both '{first}' and '{second}'")]
    DuplicateCommand {
        command: String,
        first: String,
        second: String,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Whether `config` leaves `plugin` switched on.
fn enabled(plugin: &Plugin, config: &Config) -> bool {
    plugin.kind == PluginKind::Builtin
        || config
            .get("plugins", plugin.name)
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
}

/// Order `plugins` so each follows its dependencies, dropping plugins the
/// config disables.
pub fn load_order(plugins: &[Plugin], config: &Config) -> RegistryResult<Vec<Plugin>> {
    let active: Vec<Plugin> = plugins.iter().copied().filter(|p| enabled(p, config)).collect();
    let position: BTreeMap<&str, usize> = active.iter().enumerate().map(|(i, p)| (p.name, i)).collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); active.len()];
    let mut in_degree = vec![0_usize; active.len()];
    for (i, plugin) in active.iter().enumerate() {
        for dep in plugin.dependencies {
            let Some(&d) = position.get(dep) else {
                return Err(RegistryError::MissingDependency {
                    plugin: plugin.name.to_string(),
                    dependency: dep.to_string(),
                });
            };
            dependents[d].push(i);
            in_degree[i] += 1;
        }
    }

    // Kahn's algorithm, keeping declaration order among ready plugins.
    let mut queue: VecDeque<usize> = (0..active.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(active.len());
    while let Some(i) = queue.pop_front() {
        order.push(active[i]);
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != active.len() {
        return Err(RegistryError::Cycle {
            plugins: (0..active.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| active[i].name.to_string())
                .collect(),
        });
    }
    debug!(order = ?order.iter().map(|p| p.name).collect::<Vec<_>>(), "plugin load order");
    Ok(order)
}

/// Commands and settings contributed by the loaded plugins.
#[derive(Debug, Default)]
pub struct Registry {
    pub plugins: Vec<Plugin>,
    pub commands: Vec<Command>,
    pub settings: Vec<Setting>,
}

impl Registry {
    pub fn load(plugins: &[Plugin], config: &Config) -> RegistryResult<Self> {
        let plugins = load_order(plugins, config)?;
        let mut commands: Vec<Command> = Vec::new();
        let mut settings = Vec::new();
        for plugin in &plugins {
            for mut command in (plugin.commands)() {
                command.plugin = plugin.name.to_string();
                if let Some(existing) = commands.iter().find(|c| c.name == command.name) {
                    return Err(RegistryError::DuplicateCommand {
                        command: command.name,
                        first: existing.plugin.clone(),
                        second: plugin.name.to_string(),
                    });
                }
                commands.push(command);
            }
            settings.extend((plugin.settings)());
        }
        info!(plugins = plugins.len(), commands = commands.len(), "plugins loaded");
        Ok(Self {
            plugins,
            commands,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> Vec<Command> {
        Vec::new()
    }

    fn plugin(name: &'static str, dependencies: &'static [&'static str]) -> Plugin {
        Plugin {
            name,
            kind: PluginKind::Plugin,
            dependencies,
            commands: none,
            settings: no_settings,
        }
    }

    fn names(plugins: &[Plugin]) -> Vec<&'static str> {
        plugins.iter().map(|p| p.name).collect()
    }

    #[test]
    fn dependencies_load_first() {
        let plugins = [plugin("flatfilt", &["vclamp"]), plugin("vclamp", &[]), plugin("curve", &[])];
        let order = load_order(&plugins, &Config::new()).unwrap();
        assert_eq!(names(&order), vec!["vclamp", "curve", "flatfilt"]);
    }

    #[test]
    fn cycles_and_missing_dependencies_fail() {
        let cyclic = [plugin("a", &["b"]), plugin("b", &["a"])];
        assert!(matches!(
            load_order(&cyclic, &Config::new()),
            Err(RegistryError::Cycle { .. })
        ));

        let mut config = Config::new();
        config.set("plugins", "vclamp", false.into());
        let plugins = [plugin("vclamp", &[]), plugin("flatfilt", &["vclamp"])];
        assert_eq!(
            load_order(&plugins, &config).unwrap_err(),
            RegistryError::MissingDependency {
                plugin: "flatfilt".into(),
                dependency: "vclamp".into()
            }
        );
    }
}
