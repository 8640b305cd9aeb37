// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for the end-to-end specs: a throwaway state directory,
//! a configuration file, and a handle on a spawned `stokerd`.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Generous ceiling for anything the daemon does asynchronously.
pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(10);

pub struct Server {
    dir: TempDir,
}

impl Server {
    /// A state directory holding the given configuration.
    pub fn with_conf(conf: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stokerd.toml"), conf).unwrap();
        Self { dir }
    }

    pub fn state_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn pid_path(&self) -> PathBuf {
        self.dir.path().join("stokerd.pid")
    }

    /// A command for the built binary, pointed at this state directory.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(stokerd_bin());
        cmd.env("STOKERD_STATE_DIR", self.dir.path());
        cmd
    }

    /// Spawn the daemon and wait until its PID file exists.
    pub fn start(&self) -> Child {
        let child = self
            .command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        assert!(
            wait_for(|| self.pid_path().exists(), SPEC_WAIT_MAX),
            "daemon did not write its PID file"
        );
        child
    }
}

pub fn stokerd_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("stokerd")
}

/// Poll until `cond` holds or the timeout elapses.
pub fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    cond()
}

/// Wait for the child to exit, failing the test if it does not.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("stokerd did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

/// Grab a free port by binding an ephemeral listener, then releasing it.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn quit(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    kill(Pid::from_raw(child.id() as i32), Signal::SIGQUIT).unwrap();
}
