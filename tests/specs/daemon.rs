// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs: startup, shutdown, and the informational CLI
//! surface.

use std::net::{TcpListener, TcpStream};
use std::process::Command;

use serial_test::serial;

use crate::prelude::*;

fn output_of(mut cmd: Command) -> std::process::Output {
    cmd.output().unwrap()
}

#[test]
fn version_flag_prints_and_exits_zero() {
    let mut cmd = Command::new(stokerd_bin());
    cmd.arg("--version");
    let out = output_of(cmd);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("stokerd "), "got: {stdout}");
}

#[test]
fn help_flag_documents_the_signal_surface() {
    let mut cmd = Command::new(stokerd_bin());
    cmd.arg("--help");
    let out = output_of(cmd);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("USAGE"));
    assert!(stdout.contains("reconfigure"));
}

#[test]
fn unexpected_argument_is_a_usage_error() {
    let mut cmd = Command::new(stokerd_bin());
    cmd.arg("--definitely-not-a-flag");
    let out = output_of(cmd);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unexpected argument"));
}

/// Cold start in single-process mode: the process builds its cycle, writes
/// the PID file, serves, and a graceful quit removes the PID file and
/// exits zero.
#[test]
#[serial]
fn single_process_cold_start_and_graceful_quit() {
    let server = Server::with_conf(
        "daemon = false\nsingle_process = true\n\n[server]\nlisten = \"127.0.0.1:0\"\n",
    );

    let mut child = server.start();
    let pid_content = std::fs::read_to_string(server.pid_path()).unwrap();
    assert_eq!(pid_content.trim().parse::<u32>().unwrap(), child.id());

    quit(&child);
    let status = wait_with_timeout(&mut child, SPEC_WAIT_MAX);
    assert!(status.success(), "graceful quit must exit zero, got {status}");
    assert!(!server.pid_path().exists(), "PID file must be removed on the way out");
}

/// Master mode with one worker: the listener accepts connections, and a
/// graceful quit takes the whole tree down.
#[test]
#[serial]
fn master_with_worker_serves_and_quits() {
    let port = free_port();
    let server = Server::with_conf(&format!(
        "daemon = false\nworker_processes = 1\n\n[server]\nlisten = \"127.0.0.1:{port}\"\n"
    ));

    let mut child = server.start();

    // The listening socket is bound before READY; the kernel completes the
    // handshake from the accept backlog.
    assert!(
        wait_for(|| TcpStream::connect(("127.0.0.1", port)).is_ok(), SPEC_WAIT_MAX),
        "listener must accept connections"
    );

    quit(&child);
    let status = wait_with_timeout(&mut child, SPEC_WAIT_MAX);
    assert!(status.success(), "graceful quit must exit zero, got {status}");
    assert!(!server.pid_path().exists());
}

/// A bind conflict at startup is a fatal initialization error: exit 1,
/// nothing left behind.
#[test]
#[serial]
fn startup_fails_cleanly_when_the_address_is_taken() {
    let blocker = TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let server = Server::with_conf(&format!(
        "daemon = false\nsingle_process = true\n\n[server]\nlisten = \"127.0.0.1:{taken}\"\n"
    ));

    let out = server.command().output().unwrap();
    assert!(!out.status.success());
    assert!(!server.pid_path().exists(), "no PID file after a failed startup");
}

/// Second instance against the same state directory is locked out while
/// the first is alive.
#[test]
#[serial]
fn second_instance_is_refused_while_the_first_runs() {
    let server = Server::with_conf("daemon = false\nsingle_process = true\n");

    let mut child = server.start();

    let out = server.command().output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("already running"), "got: {stderr}");

    quit(&child);
    let status = wait_with_timeout(&mut child, SPEC_WAIT_MAX);
    assert!(status.success());
}
