use std::collections::BTreeMap;

use hk_core::Value;
use hk_engine::argument::{from_string, to_string};
use hk_engine::{
    ArgType, Argument, CollectSink, Command, CommandIo, CommandResult, Config, Count, Failure, Hooke, Params,
};
use proptest::prelude::*;

fn text_round_trip(value: &Value, ty: &ArgType) -> String {
    let text = to_string(value, ty);
    let parsed = from_string(&text, ty).unwrap();
    to_string(&parsed, ty)
}

proptest! {
    #[test]
    fn ints_survive_the_command_line(i in any::<i64>()) {
        let v = Value::Int(i);
        prop_assert_eq!(from_string(&to_string(&v, &ArgType::Int), &ArgType::Int).unwrap(), v.clone());
        prop_assert_eq!(text_round_trip(&v, &ArgType::Int), to_string(&v, &ArgType::Int));
    }

    #[test]
    fn finite_floats_survive_the_command_line(x in prop::num::f64::NORMAL | prop::num::f64::ZERO) {
        let v = Value::Float(x);
        prop_assert_eq!(from_string(&to_string(&v, &ArgType::Float), &ArgType::Float).unwrap(), v.clone());
        prop_assert_eq!(text_round_trip(&v, &ArgType::Float), to_string(&v, &ArgType::Float));
    }

    #[test]
    fn bools_survive_the_command_line(b in any::<bool>()) {
        let v = Value::Bool(b);
        prop_assert_eq!(from_string(&to_string(&v, &ArgType::Bool), &ArgType::Bool).unwrap(), v);
    }

    #[test]
    fn strings_pass_through(s in "[ -~]{0,40}") {
        let v = Value::String(s.clone());
        prop_assert_eq!(to_string(&v, &ArgType::String), s.clone());
        prop_assert_eq!(from_string(&s, &ArgType::String).unwrap(), v);
    }
}

#[test]
fn typed_text_reads_back_unchanged() {
    for text in ["3.0", "0.1", "1e-05", "123.5", "-2.0", "100.0", "2.5e-09", "1e+16", "0.0"] {
        let value = from_string(text, &ArgType::Float).unwrap();
        assert_eq!(to_string(&value, &ArgType::Float), text);
    }
    for text in ["True", "False"] {
        let value = from_string(text, &ArgType::Bool).unwrap();
        assert_eq!(to_string(&value, &ArgType::Bool), text);
    }
    for text in ["0", "-17", "4096"] {
        let value = from_string(text, &ArgType::Int).unwrap();
        assert_eq!(to_string(&value, &ArgType::Int), text);
    }
}

fn always_fails(_: &mut Hooke, _: &Params, _: &mut CommandIo<'_>) -> CommandResult<()> {
    Err(Failure::message("body ran"))
}

#[test]
fn help_flag_never_runs_the_body() {
    let mut hooke = Hooke::new(Config::new()).unwrap();
    let command = Command::new("explode", "test", always_fails)
        .help("Always fails.")
        .arg(Argument::new("level", ArgType::Int).required());

    let mut sink = CollectSink::default();
    let mut io = CommandIo::detached(&mut sink);
    let mut args = BTreeMap::new();
    args.insert("help".to_string(), Value::Bool(true));
    command.run(&mut hooke, &mut io, &args).unwrap();

    let text = sink.outputs().next().and_then(Value::as_str).unwrap().to_string();
    assert!(text.starts_with("explode"));
    assert!(text.contains("level (int, required)"));

    let mut io = CommandIo::detached(&mut sink);
    args.insert("help".to_string(), Value::Bool(false));
    args.insert("level".to_string(), Value::Int(1));
    assert_eq!(command.run(&mut hooke, &mut io, &args).unwrap_err(), Failure::message("body ran"));
}

#[test]
fn validation_rejects_unknown_and_missing_arguments() {
    let hooke = Hooke::new(Config::new()).unwrap();
    let command = Command::new("explode", "test", always_fails)
        .arg(Argument::new("bounds", ArgType::Point).count(Count::Exactly(2)).required());

    let err = command.validate(&hooke, &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, Failure::InvalidArgument { ref argument, .. } if argument == "bounds"));

    let mut args = BTreeMap::new();
    args.insert("colour".to_string(), Value::from("red"));
    assert!(command.validate(&hooke, &args).is_err());

    let mut args = BTreeMap::new();
    args.insert("bounds".to_string(), Value::from("4,9"));
    let params = command.validate(&hooke, &args).unwrap();
    assert_eq!(params.usize_list("bounds").unwrap(), vec![4, 9]);
    assert_eq!(params.get("help"), &Value::Bool(false));
}
