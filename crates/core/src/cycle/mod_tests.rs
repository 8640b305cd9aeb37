// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use std::io::{Read, Write};

use tempfile::TempDir;

#[test]
fn init_cycle_is_marked_and_empty() {
    let cycle = Cycle::init();
    assert!(cycle.is_init());
    assert!(cycle.listening.is_empty());
    assert!(cycle.error_log().is_none());
}

#[test]
fn open_file_opens_append_create() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs.txt");
    std::fs::write(&path, "first\n").unwrap();

    let mut f = OpenFile::new(path.clone());
    f.open().unwrap();
    writeln!(f.file.as_mut().unwrap(), "second").unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "first\nsecond\n", "append mode must preserve existing content");
}

#[test]
fn reopen_follows_the_path_after_external_rotation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");

    let mut f = OpenFile::new(path.clone());
    f.open().unwrap();
    writeln!(f.file.as_mut().unwrap(), "before rotate").unwrap();

    // External rotation: the open descriptor now points at the renamed file.
    let rotated = dir.path().join("app.log.1");
    std::fs::rename(&path, &rotated).unwrap();

    f.reopen().unwrap();
    writeln!(f.file.as_mut().unwrap(), "after rotate").unwrap();

    let mut fresh = String::new();
    std::fs::File::open(&path).unwrap().read_to_string(&mut fresh).unwrap();
    assert_eq!(fresh, "after rotate\n", "writes after reopen must land in the new file");

    let old = std::fs::read_to_string(&rotated).unwrap();
    assert_eq!(old, "before rotate\n");
}

#[test]
fn reopen_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");

    let mut cycle = Cycle::init();
    cycle.open_files.push(OpenFile::new(path.clone()));
    cycle.open_files[0].open().unwrap();

    cycle.reopen_files();
    cycle.reopen_files();

    writeln!(cycle.open_files[0].file.as_mut().unwrap(), "still here").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "still here\n");
}

#[test]
fn reopen_survives_a_missing_directory_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");

    let mut cycle = Cycle::init();
    cycle.open_files.push(OpenFile::new(path.clone()));
    cycle.open_files[0].open().unwrap();

    std::fs::remove_file(&path).unwrap();
    cycle.reopen_files();

    // create-or-open semantics recreate the file.
    assert!(path.exists());
}

#[test]
fn typed_conf_access_downcasts_by_index() {
    let mut cycle = Cycle::init();
    cycle.conf_ctx = vec![None, Some(Box::new(42u32))];

    assert_eq!(cycle.conf::<u32>(1), Some(&42));
    assert!(cycle.conf::<String>(1).is_none(), "wrong type must not downcast");
    assert!(cycle.conf::<u32>(0).is_none(), "unpopulated slot");
    assert!(cycle.conf::<u32>(9).is_none(), "out of range index");

    *cycle.conf_mut::<u32>(1).unwrap() = 7;
    assert_eq!(cycle.conf::<u32>(1), Some(&7));
}

#[test]
fn error_log_clones_the_first_open_file() {
    let dir = TempDir::new().unwrap();
    let mut cycle = Cycle::init();
    cycle.open_files.push(OpenFile::new(dir.path().join("error.log")));
    cycle.open_files[0].open().unwrap();

    let mut handle = cycle.error_log().unwrap();
    writeln!(handle, "via clone").unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("error.log")).unwrap(),
        "via clone\n"
    );
}

#[test]
fn close_listening_closes_every_socket() {
    let mut cycle = Cycle::init();
    let mut a = crate::listening::Listening::new(std::net::SocketAddr::from(([127, 0, 0, 1], 0)));
    a.open().unwrap();
    let mut b = crate::listening::Listening::new(std::net::SocketAddr::from(([127, 0, 0, 1], 0)));
    b.open().unwrap();
    cycle.listening.push(a);
    cycle.listening.push(b);

    cycle.close_listening();
    assert!(cycle.listening.iter().all(|ls| ls.fd.is_none()));
}
