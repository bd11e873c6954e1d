//! Spawning, output capture and exit tracking for the sidecar process

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

/// Tracing target for lines the sidecar writes to stdout/stderr
pub const OUTPUT_TARGET: &str = "docsight::sidecar::output";

/// Environment variables mirroring the `--host`/`--port` arguments
const HOST_VARS: &[&str] = &["DOCSIGHT_SIDECAR_HOST", "HOST"];
const PORT_VARS: &[&str] = &["DOCSIGHT_SIDECAR_PORT", "PORT"];

/// Spawn the sidecar bound to `host:port`.
///
/// The parent environment is inherited. The child is killed if its handle
/// is dropped.
pub fn spawn(path: &Path, host: &str, port: u16) -> Result<Child> {
    let port = port.to_string();
    let mut command = Command::new(path);
    command
        .arg("--port")
        .arg(&port)
        .arg("--host")
        .arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for var in HOST_VARS {
        command.env(var, host);
    }
    for var in PORT_VARS {
        command.env(var, &port);
    }

    command.spawn().map_err(|source| Error::SpawnFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Forward the child's output streams to the log, line by line
pub fn pump_output(child: &mut Child, pid: u32) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: OUTPUT_TARGET, pid, "{}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: OUTPUT_TARGET, pid, "{}", line);
            }
        });
    }
}

/// Exit notifications: `None` while running, then the exit description
pub type ExitReceiver = watch::Receiver<Option<String>>;

/// Own the child until it exits.
///
/// The watcher kills the child when `kill` fires or its sender is dropped.
/// Once the child has been reaped, `on_exit` runs before the description is
/// published on the returned receiver, so state cleared by `on_exit` is
/// already gone for anyone woken by the receiver.
pub fn watch_exit<F>(mut child: Child, kill: oneshot::Receiver<()>, on_exit: F) -> ExitReceiver
where
    F: FnOnce(&str) + Send + 'static,
{
    let (tx, rx) = watch::channel(None);
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill => {
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill sidecar: {}", e);
                }
                child.wait().await
            }
        };

        let description = match status {
            Ok(status) => status.to_string(),
            Err(e) => format!("wait failed: {}", e),
        };
        on_exit(&description);
        tx.send_replace(Some(description));
    });
    rx
}

/// Resolve once the watcher has published an exit
pub async fn wait_for_exit(mut exit: ExitReceiver) -> String {
    match exit.wait_for(Option::is_some).await {
        Ok(value) => value.clone().unwrap_or_default(),
        Err(_) => "exit watcher stopped".to_string(),
    }
}

/// Ask the process to terminate cooperatively
#[cfg(unix)]
pub fn request_termination(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| Error::Other(format!("pid {} out of range", pid)))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| Error::Io(errno.into()))
}

/// No cooperative signal on this platform; callers fall back to a kill
#[cfg(not(unix))]
pub fn request_termination(_pid: u32) -> Result<()> {
    Err(Error::Other(
        "graceful termination is not supported on this platform".to_string(),
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_spawn_passes_arguments_and_environment() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("args.txt");
        let path = script(
            &tmp,
            "echo-args.sh",
            &format!(
                "echo \"$@ $DOCSIGHT_SIDECAR_HOST $PORT\" > {}",
                out.display()
            ),
        );

        let child = spawn(&path, "127.0.0.1", 9321).unwrap();
        let (_kill_tx, kill_rx) = oneshot::channel();
        let exit = watch_exit(child, kill_rx, |_| {});
        let description = wait_for_exit(exit).await;
        assert!(description.contains('0'), "{}", description);

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written.trim(), "--port 9321 --host 127.0.0.1 127.0.0.1 9321");
    }

    #[tokio::test]
    async fn test_spawn_failure_for_missing_binary() {
        let tmp = TempDir::new().unwrap();
        let err = spawn(&tmp.path().join("absent"), "127.0.0.1", 1).unwrap_err();
        assert!(matches!(err, Error::SpawnFailure { .. }));
    }

    #[tokio::test]
    async fn test_dropped_kill_sender_kills_child() {
        let tmp = TempDir::new().unwrap();
        let path = script(&tmp, "sleep.sh", "exec sleep 30");

        let child = spawn(&path, "127.0.0.1", 1).unwrap();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let exit = watch_exit(child, kill_rx, |_| {});
        drop(kill_tx);

        let description = tokio::time::timeout(Duration::from_secs(5), wait_for_exit(exit))
            .await
            .unwrap();
        assert!(description.contains("signal"), "{}", description);
    }

    #[tokio::test]
    async fn test_sigterm_stops_cooperative_child() {
        let tmp = TempDir::new().unwrap();
        let path = script(&tmp, "sleep.sh", "exec sleep 30");

        let child = spawn(&path, "127.0.0.1", 1).unwrap();
        let pid = child.id().unwrap();
        let (_kill_tx, kill_rx) = oneshot::channel();
        let exit = watch_exit(child, kill_rx, |_| {});

        request_termination(pid).unwrap();
        let description = tokio::time::timeout(Duration::from_secs(5), wait_for_exit(exit))
            .await
            .unwrap();
        assert!(description.contains("15"), "{}", description);
    }
}
