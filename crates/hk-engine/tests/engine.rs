use std::collections::BTreeMap;
use std::time::Duration;

use hk_core::Value;
use hk_engine::plugins::engine as engine_plugin;
use hk_engine::registry::no_settings;
use hk_engine::{
    CollectSink, Command, CommandEngine, CommandIo, CommandMessage, CommandResult, Config, EngineHandle,
    EngineMessage, Failure, Hooke, Params, Plugin, PluginKind, RequestKind,
};

fn ask(_: &mut Hooke, _: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let answer = io.request("spring constant?", RequestKind::Float, Value::Float(0.05))?;
    io.emit(answer);
    Ok(())
}

fn crash(_: &mut Hooke, _: &Params, _: &mut CommandIo<'_>) -> CommandResult<()> {
    panic!("detector offline");
}

fn gauge_commands() -> Vec<Command> {
    vec![
        Command::new("ask", "gauge", ask),
        Command::new("crash", "gauge", crash),
    ]
}

const GAUGE: Plugin = Plugin {
    name: "gauge",
    kind: PluginKind::Plugin,
    dependencies: &["engine"],
    commands: gauge_commands,
    settings: no_settings,
};

fn message(name: &str) -> CommandMessage {
    CommandMessage::new(name, BTreeMap::new())
}

fn next(handle: &EngineHandle) -> EngineMessage {
    handle.rx.recv_timeout(Duration::from_secs(10)).unwrap()
}

fn spawn_gauge() -> EngineHandle {
    let hooke = Hooke::with_plugins(&[engine_plugin::PLUGIN, GAUGE], Config::new()).unwrap();
    EngineHandle::spawn(CommandEngine::new(hooke).with_prompt_timeout(Duration::from_secs(10)))
}

#[test]
fn every_command_ends_with_one_terminal_message() {
    let handle = EngineHandle::spawn(CommandEngine::new(Hooke::new(Config::new()).unwrap()));

    assert!(handle.send(message("no such thing")));
    assert!(matches!(
        next(&handle),
        EngineMessage::Failure(Failure::UnknownCommand { ref name }) if name == "no such thing"
    ));

    handle.send(message("version"));
    match next(&handle) {
        EngineMessage::Output(Value::String(s)) => assert!(s.starts_with("Hooke ")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(next(&handle), EngineMessage::Success);

    handle.send(message("quit"));
    assert_eq!(next(&handle), EngineMessage::Exit);

    assert!(handle.close().is_some());
}

#[test]
fn prompts_are_answered_by_id() {
    let handle = spawn_gauge();
    handle.send(message("ask"));
    let request = match next(&handle) {
        EngineMessage::Request(request) => request,
        other => panic!("expected a request, got {other:?}"),
    };
    assert_eq!(request.kind, RequestKind::Float);
    assert_eq!(request.default, Value::Float(0.05));

    handle.respond(uuid::Uuid::new_v4(), Value::Float(9.0));
    handle.respond(request.id, Value::Float(0.2));
    assert_eq!(next(&handle), EngineMessage::Output(Value::Float(0.2)));
    assert_eq!(next(&handle), EngineMessage::Success);
    handle.close();
}

#[test]
fn cancelled_prompt_fails_the_command() {
    let handle = spawn_gauge();
    handle.send(message("ask"));
    assert!(matches!(next(&handle), EngineMessage::Request(_)));
    handle.cancel();
    assert_eq!(next(&handle), EngineMessage::Failure(Failure::Cancelled));

    // the token is cleared for the next command
    handle.send(message("ask"));
    let EngineMessage::Request(request) = next(&handle) else {
        panic!("expected a request");
    };
    handle.respond(request.id, Value::Null);
    assert_eq!(next(&handle), EngineMessage::Output(Value::Float(0.05)));
    assert_eq!(next(&handle), EngineMessage::Success);
    handle.close();
}

#[test]
fn panics_become_uncaught_exceptions_and_the_engine_survives() {
    let handle = spawn_gauge();
    handle.send(message("crash"));
    match next(&handle) {
        EngineMessage::Failure(Failure::UncaughtException { exception, .. }) => {
            assert!(exception.contains("detector offline"));
        }
        other => panic!("unexpected {other:?}"),
    }
    handle.send(message("version"));
    assert!(matches!(next(&handle), EngineMessage::Output(_)));
    assert_eq!(next(&handle), EngineMessage::Success);
    assert!(handle.close().is_some());
}

#[test]
fn detached_execution_uses_prompt_defaults() {
    let hooke = Hooke::with_plugins(&[engine_plugin::PLUGIN, GAUGE], Config::new()).unwrap();
    let mut engine = CommandEngine::new(hooke);
    let mut sink = CollectSink::default();
    assert_eq!(engine.execute(&message("ask"), &mut sink), EngineMessage::Success);
    assert_eq!(sink.outputs().cloned().collect::<Vec<_>>(), vec![Value::Float(0.05)]);
}

#[test]
fn disabled_plugins_are_not_loaded() {
    let mut config = Config::new();
    config.set("plugins", "gauge", Value::Bool(false));
    let hooke = Hooke::with_plugins(&[engine_plugin::PLUGIN, GAUGE], config).unwrap();
    assert!(hooke.command("ask").is_none());
    assert!(hooke.command("version").is_some());
    assert_eq!(hooke.plugin_names(), &["engine"]);
}
