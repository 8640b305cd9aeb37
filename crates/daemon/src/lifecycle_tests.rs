// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use tempfile::TempDir;

#[test]
fn pid_file_holds_the_process_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stokerd.pid");

    let pid = PidFile::create(&path).unwrap();
    assert_eq!(pid.path(), path);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
}

#[test]
fn second_instance_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stokerd.pid");

    let _held = PidFile::create(&path).unwrap();
    let err = PidFile::create(&path).unwrap_err();
    assert!(matches!(err, LifecycleError::LockFailed(_)));

    // The loser must not have wiped the holder's PID.
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
}

#[test]
fn remove_deletes_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stokerd.pid");

    let pid = PidFile::create(&path).unwrap();
    pid.remove();
    assert!(!path.exists());
}

#[test]
fn remove_of_an_already_deleted_file_is_non_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stokerd.pid");

    let pid = PidFile::create(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    pid.remove();
}

#[test]
fn create_builds_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run/nested/stokerd.pid");

    let _pid = PidFile::create(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn upgrade_rename_moves_the_file_and_frees_the_canonical_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stokerd.pid");

    let mut old = PidFile::create(&path).unwrap();
    old.rename_for_upgrade().unwrap();

    assert!(!path.exists());
    let oldbin = dir.path().join("stokerd.pid.oldbin");
    assert!(oldbin.exists());
    assert_eq!(old.path(), oldbin);

    // The new image can now take the canonical path.
    let _new = PidFile::create(&path).unwrap();

    // Shutdown of the old instance cleans up its renamed file.
    old.remove();
    assert!(!oldbin.exists());
    assert!(path.exists());
}

#[test]
fn failed_upgrade_restores_the_original_name() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stokerd.pid");

    let mut pid = PidFile::create(&path).unwrap();
    pid.rename_for_upgrade().unwrap();
    pid.restore_after_failed_upgrade().unwrap();

    assert!(path.exists());
    assert_eq!(pid.path(), path);
}

#[test]
fn lock_is_released_when_the_instance_goes_away() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stokerd.pid");

    let pid = PidFile::create(&path).unwrap();
    drop(pid);

    // A successor can take over the stale file.
    let _second = PidFile::create(&path).unwrap();
}
