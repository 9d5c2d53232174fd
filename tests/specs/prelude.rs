// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the binary specs: a scratch daemon with its own
//! confdir and socket.

use assert_cmd::cargo::CommandCargoExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Generous ceiling for condition polling.
pub const SPEC_WAIT_MAX_MS: u64 = 15_000;

/// Poll `condition` until it holds or `max_ms` elapses.
pub fn wait_for(max_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// A daemon running against a scratch configuration directory.
pub struct Daemon {
    // NOTE(lifetime): keeps the scratch directory alive for the daemon
    #[allow(dead_code)]
    dir: tempfile::TempDir,
    socket: PathBuf,
    child: Child,
}

impl Daemon {
    /// Write the given `(name, contents)` class files and start a daemon
    /// over them, waiting until it serves the control socket.
    pub fn start(classes: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("scratch dir");
        let confdir = dir.path().join("conf");
        std::fs::create_dir_all(&confdir).expect("confdir");
        for (name, contents) in classes {
            std::fs::write(confdir.join(format!("{name}.toml")), contents)
                .expect("class file");
        }

        let socket = dir.path().join("daemon.sock");
        let child = Command::cargo_bin("stokerd")
            .expect("stokerd binary")
            .args(["--no-startup-event", "--confdir"])
            .arg(&confdir)
            .env("STOKER_SOCKET", &socket)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn stokerd");

        let daemon = Self { dir, socket, child };
        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || daemon
                .stoker(&["version"])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)),
            "daemon did not come up"
        );
        daemon
    }

    /// A `stoker` command aimed at this daemon.
    pub fn stoker(&self, args: &[&str]) -> assert_cmd::Command {
        let mut command = assert_cmd::Command::cargo_bin("stoker").expect("stoker binary");
        command.args(args).env("STOKER_SOCKET", &self.socket);
        command
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self
            .stoker(&["shutdown"])
            .timeout(Duration::from_secs(2))
            .output();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
