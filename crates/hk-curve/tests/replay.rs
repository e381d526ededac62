use std::collections::BTreeMap;

use hk_curve::{CommandMessage, CommandStack, Dispatcher};
use proptest::prelude::*;

#[derive(Default)]
struct Log {
    seen: Vec<String>,
}

impl Dispatcher for Log {
    type Error = ();

    fn dispatch(&mut self, message: &CommandMessage) -> Result<(), ()> {
        self.seen.push(message.command.clone());
        Ok(())
    }
}

fn stack_of(names: &[String]) -> CommandStack {
    names
        .iter()
        .map(|n| CommandMessage::new(n.clone(), BTreeMap::new()))
        .collect()
}

proptest! {
    #[test]
    fn replay_preserves_order_of_accepted_commands(
        names in prop::collection::vec("[a-d]{1,3}", 0..20),
    ) {
        let stack = stack_of(&names);
        let mut log = Log::default();
        let accept = |m: &CommandMessage| !m.command.starts_with('a');
        let count = stack.execute(&mut log, Some(&accept)).unwrap();

        let expected: Vec<String> = names.iter().filter(|n| !n.starts_with('a')).cloned().collect();
        prop_assert_eq!(count, expected.len());
        prop_assert_eq!(log.seen, expected);
    }

    #[test]
    fn unfiltered_replay_dispatches_everything(
        names in prop::collection::vec("[a-z]{1,8}", 0..20),
    ) {
        let stack = stack_of(&names);
        let mut log = Log::default();
        prop_assert_eq!(stack.execute(&mut log, None).unwrap(), names.len());
        prop_assert_eq!(log.seen, names);
    }
}

#[test]
fn yaml_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.yaml");
    let stack: CommandStack = [
        CommandMessage::new("zero surface contact point", BTreeMap::new()).with_arg("block", "retract"),
        CommandMessage::new("convert distance to force", BTreeMap::new()),
    ]
    .into_iter()
    .collect();
    stack.save(&path).unwrap();
    assert_eq!(CommandStack::load(&path).unwrap(), stack);
}
