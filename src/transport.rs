//! Child-process plumbing: spawning the engine and turning its stdio into
//! line events.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

/// How long a quit engine gets to exit on its own before being killed.
const QUIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn engine process {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine process has no {0} handle")]
    MissingPipe(&'static str),
}

/// One line of engine output, or the end of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    Stdout(String),
    Stderr(String),
    /// The engine's stdout reached EOF; the process is gone or going.
    Closed,
}

/// The outbound half of an engine connection. Object-safe so tests can
/// substitute a recording wire for the real subprocess.
pub trait EngineTransport {
    /// Write one command line (newline appended) and flush. May block on a
    /// full pipe buffer.
    fn send_line(&mut self, line: &str) -> std::io::Result<()>;

    /// Release the connection. For a real process this starts the grace
    /// timer and eventually kills it; `quit` should already have been sent.
    fn shutdown(self: Box<Self>);
}

/// A live engine subprocess with piped stdio.
///
/// Two named reader threads drain stdout and stderr line by line into a
/// single channel, preserving per-stream order. The threads exit when their
/// stream closes or the receiver is dropped.
pub struct ProcessTransport {
    child: Child,
    stdin: ChildStdin,
}

impl ProcessTransport {
    /// Spawn `exe` with `args`, working directory set to the executable's
    /// parent (engines load nets and books relative to themselves).
    pub fn launch(
        exe: &Path,
        args: &[String],
    ) -> Result<(Self, Receiver<LineEvent>), TransportError> {
        let exe = exe.canonicalize().unwrap_or_else(|_| exe.to_path_buf());

        let mut command = Command::new(&exe);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = exe.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            path: exe.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TransportError::MissingPipe("stderr"))?;

        let (events_tx, events_rx) = unbounded();

        let stdout_tx = events_tx.clone();
        spawn_reader("engine stdout", move || {
            for line in BufReader::new(stdout).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        log::warn!("error reading engine stdout: {}", err);
                        break;
                    }
                };
                if stdout_tx.send(LineEvent::Stdout(line)).is_err() {
                    return;
                }
            }
            let _ = stdout_tx.send(LineEvent::Closed);
        });

        spawn_reader("engine stderr", move || {
            pump_stderr(stderr, events_tx);
        });

        Ok((Self { child, stdin }, events_rx))
    }
}

fn pump_stderr(stderr: impl std::io::Read, tx: Sender<LineEvent>) {
    for line in BufReader::new(stderr).lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("error reading engine stderr: {}", err);
                break;
            }
        };
        if tx.send(LineEvent::Stderr(line)).is_err() {
            return;
        }
    }
}

fn spawn_reader(name: &str, f: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .expect("Failed to spawn engine reader thread");
}

impl EngineTransport for ProcessTransport {
    fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        write!(self.stdin, "{}\n", line)?;
        self.stdin.flush()
    }

    fn shutdown(self: Box<Self>) {
        let mut child = self.child;
        // Dropping stdin closes the engine's input; well-behaved engines
        // exit on `quit` or EOF well inside the grace period.
        drop(self.stdin);

        std::thread::Builder::new()
            .name("engine reaper".to_string())
            .spawn(move || {
                let deadline = Instant::now() + QUIT_GRACE;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            log::info!("engine exited with {}", status);
                            return;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            log::warn!("error polling engine process: {}", err);
                            return;
                        }
                    }
                    if Instant::now() >= deadline {
                        log::warn!("engine ignored quit for {:?}, killing it", QUIT_GRACE);
                        let _ = child.kill();
                        let _ = child.wait();
                        return;
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            })
            .expect("Failed to spawn engine reaper thread");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercised against /bin/sh rather than a chess engine; the transport
    // only cares about lines.
    #[cfg(unix)]
    #[test]
    fn test_launch_and_read_lines() {
        let (mut transport, events) = ProcessTransport::launch(
            Path::new("/bin/sh"),
            &["-c".to_string(), "read x; echo got $x; echo oops >&2".to_string()],
        )
        .unwrap();

        transport.send_line("hello").unwrap();

        // The two streams race each other; wait until both have delivered.
        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();
        while stdout_lines.is_empty() || stderr_lines.is_empty() {
            match events.recv_timeout(Duration::from_secs(10)).unwrap() {
                LineEvent::Stdout(l) => stdout_lines.push(l),
                LineEvent::Stderr(l) => stderr_lines.push(l),
                LineEvent::Closed => {}
            }
        }

        assert_eq!(stdout_lines, vec!["got hello".to_string()]);
        assert_eq!(stderr_lines, vec!["oops".to_string()]);
        Box::new(transport).shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_failure_is_reported() {
        let result = ProcessTransport::launch(Path::new("/no/such/engine"), &[]);
        match result {
            Err(TransportError::Spawn { path, .. }) => {
                assert_eq!(path, PathBuf::from("/no/such/engine"))
            }
            _ => panic!("expected a spawn error"),
        }
    }
}
