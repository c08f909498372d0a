//! Reaching the editor socket
//!
//! The editor may not be running yet. The first failed attempt spawns the
//! configured launch command, after which connection is retried at a fixed
//! interval until the attempts run out.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use libmate::SessionError;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{0}")]
    Unreachable(SessionError),
    #[error("can't launch editor with '{command}': {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },
}

/// Connect to `path`, launching the editor once if nobody is listening
pub fn connect(path: &Path, config: &Config) -> Result<UnixStream, ConnectError> {
    let attempts = config.connect_attempts.max(1);
    let interval = Duration::from_millis(config.retry_interval_ms);
    let mut launched = false;
    let mut attempt = 1;

    loop {
        match libmate::client::connect(path) {
            Ok(stream) => {
                debug!(attempt, path = %path.display(), "Connected to editor");
                return Ok(stream);
            }
            Err(e) if attempt >= attempts => return Err(ConnectError::Unreachable(e)),
            Err(e) => {
                debug!(attempt, "Connect failed: {e}");
                if !launched {
                    if let Some(command) = config.launch.as_deref() {
                        launch(command)?;
                    }
                    launched = true;
                }
                thread::sleep(interval);
                attempt += 1;
            }
        }
    }
}

/// Start the editor in the background
fn launch(exec: &str) -> Result<(), ConnectError> {
    let err = |source: std::io::Error| ConnectError::Launch {
        command: exec.to_string(),
        source,
    };

    // Simple shell-like splitting
    let parts: Vec<&str> = exec.split_whitespace().collect();
    let Some((program, args)) = parts.split_first() else {
        return Err(err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty launch command",
        )));
    };

    info!(command = exec, "Launching editor");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .map_err(err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    fn quick(attempts: u32, launch: Option<&str>) -> Config {
        Config {
            launch: launch.map(String::from),
            connect_attempts: attempts,
            retry_interval_ms: 1,
            ..Config::default()
        }
    }

    #[test]
    fn connects_to_listening_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.sock");
        let _listener = UnixListener::bind(&path).unwrap();
        assert!(connect(&path, &quick(1, None)).is_ok());
    }

    #[test]
    fn gives_up_after_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.sock");
        let err = connect(&path, &quick(3, None)).unwrap_err();
        assert!(matches!(err, ConnectError::Unreachable(_)));
        assert!(err.to_string().contains("editor.sock"));
    }

    #[test]
    fn launch_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.sock");
        let err = connect(&path, &quick(2, Some("/nonexistent/editor --bg"))).unwrap_err();
        assert!(matches!(err, ConnectError::Launch { .. }));
    }

    #[test]
    fn empty_launch_command_is_rejected() {
        let err = launch("   ").unwrap_err();
        assert!(matches!(err, ConnectError::Launch { .. }));
    }
}
