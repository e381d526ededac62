use std::collections::BTreeMap;

use hk_core::{Info, Value};
use hk_curve::driver::write_curve;
use hk_curve::{CommandMessage, Curve, Data, DriverRegistry, PLAYLIST_HEADER, Playlist};

fn write_fixture(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let block = Data::from_columns(
        "retract",
        vec![
            ("z piezo (m)".into(), vec![0.0, 1e-9, 2e-9]),
            ("deflection (m)".into(), vec![0.0, 0.0, 1e-9]),
        ],
    )
    .unwrap();
    write_curve(&path, &[block], &Info::new()).unwrap();
    path
}

#[test]
fn save_and_load_preserve_curves_stacks_and_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut playlist = Playlist::new("session");
    for name in ["a.txt", "b.txt"] {
        playlist.append(Curve::new(write_fixture(dir.path(), name)));
    }
    let mut args = BTreeMap::new();
    args.insert("block".to_string(), Value::from("retract"));
    let mut message = CommandMessage::new("zero surface contact point", args);
    message.explicit_user_call = false;
    playlist.curve_mut(1).unwrap().command_stack.push(message.clone());
    playlist.curve_mut(1).unwrap().set_note("keep");
    playlist.jump(1).unwrap();
    assert!(!playlist.is_saved());

    let file = dir.path().join("session.hkp");
    playlist.save(Some(&file)).unwrap();
    assert!(playlist.is_saved());

    let text = std::fs::read_to_string(&file).unwrap();
    assert!(text.starts_with(PLAYLIST_HEADER));
    assert!(text.contains("path: a.txt"), "curve paths are stored relative:\n{text}");

    let loaded = Playlist::load(&file).unwrap();
    assert!(loaded.is_saved());
    assert_eq!(loaded.name, "session");
    assert_eq!(loaded.index(), Some(1));
    assert_eq!(loaded.curve(0).unwrap().path, dir.path().join("a.txt"));
    let b = loaded.current().unwrap();
    assert_eq!(b.note(), "keep");
    assert_eq!(b.command_stack.last(), Some(&message));
}

#[test]
fn edits_mark_playlist_unsaved() {
    let dir = tempfile::tempdir().unwrap();
    let mut playlist = Playlist::new("session");
    playlist.append(Curve::new(write_fixture(dir.path(), "a.txt")));
    playlist.save(Some(&dir.path().join("p.hkp"))).unwrap();
    assert!(playlist.is_saved());
    playlist.curve_mut(0).unwrap().set_note("changed");
    assert!(!playlist.is_saved());
}

#[test]
fn loaded_curves_read_through_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let mut playlist = Playlist::new("session");
    playlist.append(Curve::new(write_fixture(dir.path(), "a.txt")));
    let fresh = playlist.load_curve(0, &DriverRegistry::default()).unwrap();
    assert!(fresh);
    let curve = playlist.current().unwrap();
    assert_eq!(curve.driver.as_deref(), Some("text"));
    assert_eq!(
        curve.block(Some("retract")).unwrap().column("deflection (m)").unwrap(),
        vec![0.0, 0.0, 1e-9]
    );
}
