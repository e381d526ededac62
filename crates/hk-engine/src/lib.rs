//! hk-engine: command model, plugins and the UI/engine dispatch loop.
//!
//! - argument, command: typed arguments and validated commands
//! - hooke: shared state (config, playlists, command registry)
//! - engine: the worker loop, `EngineHandle` for running it on a thread
//! - message, sink, io: UI/engine protocol, output sinks, prompts
//! - registry, plugins: statically registered, dependency-ordered plugins
//! - config: sectioned YAML settings

pub mod argument;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooke;
pub mod io;
pub mod message;
pub mod plugins;
pub mod registry;
pub mod sink;

pub use argument::{ArgType, Argument, Count};
pub use command::{Command, Params};
pub use config::{Config, Setting};
pub use engine::{CommandEngine, EngineHandle};
pub use error::{CommandResult, Failure};
pub use hooke::Hooke;
pub use io::{CancelToken, CommandIo};
pub use message::{EngineMessage, Request, RequestKind, UiMessage};
pub use registry::{Plugin, PluginKind, RegistryError};
pub use sink::{ChannelSink, CollectSink, LogSink, MessageSink, NullSink};

pub use hk_curve::CommandMessage;
