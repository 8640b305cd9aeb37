// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stokerd: supervised network server core.
//!
//! One binary, three roles decided at startup: the master that supervises
//! workers, a worker spawned by a master, or a single-process worker when
//! the configuration says so. Binary replacement and worker spawn share
//! one mechanism: listening sockets are inherited by descriptor and
//! identified through the `STOKERD` environment variable.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::ffi::OsString;
use std::process::ExitCode;

use stoker_core::{BuildCtx, Cycle, Registry};
use stoker_daemon::lifecycle::{LifecycleError, Paths, PidFile};
use stoker_daemon::log::LogWriter;
use stoker_daemon::{env, inherit, log, master, spawn, worker};
use tracing::{debug, error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Some(code) = handle_info_args(std::env::args().nth(1).as_deref()) {
        return ExitCode::from(code);
    }

    // argv[0] verbatim: reused to spawn workers and the replacement binary.
    let argv0: OsString =
        std::env::args_os().next().unwrap_or_else(|| OsString::from("stokerd"));

    let paths = match Paths::load() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("stokerd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let writer = LogWriter::stderr();
    if let Err(e) = log::init_tracing(writer.clone()) {
        eprintln!("stokerd: {e}");
        return ExitCode::FAILURE;
    }

    if env::daemonized() && !env::is_worker() {
        // Detached re-spawn: become session leader, drop the terminal.
        if let Err(e) = nix::unistd::setsid() {
            debug!(error = %e, "setsid() failed");
        }
    }

    let registry = Registry::bootstrap();

    // The init cycle exists to carry inherited sockets into the first
    // build; they arrive from a previous binary, a daemonizing parent, or
    // the master that spawned this worker.
    let mut init = Cycle::init();
    inherit::set_inherited(&mut init);

    let ctx = BuildCtx {
        registry: &registry,
        conf_path: &paths.conf_path,
        error_log: &paths.error_log,
    };
    let cycle = match stoker_core::init_cycle(&ctx, &mut init) {
        Ok(cycle) => cycle,
        Err(e) => {
            error!(error = %e, "initial cycle build failed");
            eprintln!("stokerd: {e}");
            return ExitCode::FAILURE;
        }
    };
    writer.repoint_from(&cycle);
    info!(version = env::VERSION, conf = %paths.conf_path.display(), "starting");

    if env::is_worker() {
        let code = worker::run(cycle, &registry, &writer, None).await;
        return exit_code(code);
    }

    let (daemon, single, pid_path) = match cycle.core_conf() {
        Some(conf) => (
            conf.daemon(),
            conf.single_process(),
            conf.pid.clone().unwrap_or_else(|| paths.default_pid.clone()),
        ),
        None => (true, false, paths.default_pid.clone()),
    };

    if daemon && !env::daemonized() {
        // Re-spawn detached; the child adopts the bound listeners through
        // the inheritance protocol and this parent is done.
        return match spawn::spawn_daemonized(&argv0, &cycle) {
            Ok(child) => {
                info!(pid = child.id(), "continuing in the background");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "daemonizing failed");
                eprintln!("stokerd: daemonizing failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let pid = match PidFile::create(&pid_path) {
        Ok(pid) => pid,
        Err(LifecycleError::LockFailed(_)) => {
            let running = std::fs::read_to_string(&pid_path).unwrap_or_default();
            eprintln!("stokerd is already running (pid {})", running.trim());
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "creating PID file failed");
            eprintln!("stokerd: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Parent process (or operator tooling) waits for this line.
    println!("READY");

    let code = if single {
        info!("starting in single-process mode");
        worker::run(cycle, &registry, &writer, Some(pid)).await
    } else {
        master::Master::new(registry, paths, argv0, writer.clone(), pid, cycle)
            .run()
            .await
    };
    exit_code(code)
}

fn exit_code(code: i32) -> ExitCode {
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(code.clamp(0, 255) as u8)
    }
}

/// Handle `--version`/`--help` before touching any state; anything else
/// passed as an argument is a usage error. Returns the exit status to
/// finish with, or `None` to start up normally.
fn handle_info_args(arg: Option<&str>) -> Option<u8> {
    match arg {
        None => None,
        Some("--version" | "-V" | "-v") => {
            println!("stokerd {}", env::VERSION);
            Some(0)
        }
        Some("--help" | "-h" | "help") => {
            println!("stokerd {}", env::VERSION);
            println!("Supervised network server core: master/worker process lifecycle");
            println!();
            println!("USAGE:");
            println!("    stokerd");
            println!();
            println!("Configuration is read from $STOKERD_CONF (default");
            println!("$STOKERD_STATE_DIR/stokerd.toml). Control the running daemon with");
            println!("signals: QUIT graceful shutdown, TERM/INT terminate, HUP");
            println!("reconfigure, USR1 reopen logs, USR2 replace binary.");
            println!();
            println!("OPTIONS:");
            println!("    -h, --help       Print help information");
            println!("    -v, --version    Print version information");
            Some(0)
        }
        Some(other) => {
            eprintln!("error: unexpected argument '{other}'");
            eprintln!("Usage: stokerd [--help | --version]");
            Some(1)
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
