use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::render::RenderError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_CHARS: usize = 2000;
// How long to wait for the pipes to close after the process group is killed.
const PIPE_GRACE: Duration = Duration::from_millis(250);

/// A single renderer invocation: program, arguments and a hard timeout.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub timeout: Duration,
    pub current_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs to completion, killing the child once the timeout passes.
    pub fn run(&self) -> Result<CommandOutput, RenderError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        // Own process group, so a timeout also reaches whatever the renderer forks.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        tracing::debug!(
            program = %self.program.display(),
            args = %self.display_args(),
            timeout_ms = self.timeout.as_millis(),
            "spawning renderer"
        );

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                RenderError::Spawn {
                    program: self.program.display().to_string(),
                    reason: "executable not found".to_owned(),
                }
            } else {
                RenderError::Spawn {
                    program: self.program.display().to_string(),
                    reason: source.to_string(),
                }
            }
        })?;

        // Drain both pipes on their own threads so a chatty child never blocks on a full pipe.
        let stdout = spawn_reader("renderer-stdout", child.stdout.take());
        let stderr = spawn_reader("renderer-stderr", child.stderr.take());
        let started = Instant::now();
        let deadline = started + self.timeout;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }

            if Instant::now() >= deadline {
                kill_process_group(&mut child);
                let _ = child.wait();
                tracing::warn!(
                    program = %self.program.display(),
                    timeout_ms = self.timeout.as_millis(),
                    "renderer timed out"
                );
                return Err(RenderError::Timeout {
                    timeout: self.timeout,
                });
            }

            thread::sleep(POLL_INTERVAL);
        };

        let mut stdout_text = recv_until(stdout.as_ref(), deadline);
        let mut stderr_text = recv_until(stderr.as_ref(), deadline);
        if stdout_text.is_none() || stderr_text.is_none() {
            // The renderer is gone but something it started still holds its pipes.
            tracing::warn!(
                program = %self.program.display(),
                "renderer left processes behind; killing its process group"
            );
            kill_process_group(&mut child);
            let grace = Instant::now() + PIPE_GRACE;
            stdout_text = stdout_text.or_else(|| recv_until(stdout.as_ref(), grace));
            stderr_text = stderr_text.or_else(|| recv_until(stderr.as_ref(), grace));
        }

        Ok(CommandOutput {
            status,
            stdout: stdout_text.unwrap_or_default(),
            stderr: stderr_text.unwrap_or_default(),
            elapsed: started.elapsed(),
        })
    }

    /// Like [`Invocation::run`], but a non-zero exit becomes [`RenderError::Invocation`].
    pub fn run_checked(&self, label: &str) -> Result<CommandOutput, RenderError> {
        let output = self.run()?;
        if !output.status.success() {
            let stderr_tail = last_n_chars(&output.stderr, STDERR_TAIL_CHARS);
            tracing::error!(
                renderer = label,
                status = %output.status,
                stderr = %stderr_tail,
                "renderer exited with failure"
            );
            return Err(RenderError::Invocation {
                renderer: label.to_owned(),
                status: output.status.to_string(),
                stderr: stderr_tail,
            });
        }
        Ok(output)
    }
}

fn spawn_reader<R>(name: &str, pipe: Option<R>) -> Option<Receiver<String>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = sender.send(String::from_utf8_lossy(&buf).into_owned());
        })
        .ok()?;
    Some(receiver)
}

/// `None` when the deadline passes before the pipe closes.
fn recv_until(reader: Option<&Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(reader) = reader else {
        return Some(String::new());
    };
    match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    // The child leads its own group, so its pid doubles as the group id.
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        tracing::debug!(
            error = %std::io::Error::last_os_error(),
            "renderer process group already gone"
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    if let Err(error) = child.kill() {
        tracing::warn!(%error, "failed to kill timed-out renderer");
    }
}

pub fn last_n_chars(s: &str, max_chars: usize) -> String {
    let chars = s.chars().collect::<Vec<_>>();
    let start = chars.len().saturating_sub(max_chars);
    chars[start..].iter().collect::<String>().trim().to_owned()
}

/// Rejects paths that would be awkward or unsafe to hand to a child process.
pub fn check_path_argument(path: &Path) -> Result<(), RenderError> {
    let text = path.to_string_lossy();
    if text.len() > 1024 {
        return Err(RenderError::InvalidPath(format!(
            "path is suspiciously long ({} bytes)",
            text.len()
        )));
    }
    if text.chars().any(char::is_control) {
        return Err(RenderError::InvalidPath(
            "path contains control characters".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_chars_and_trims() {
        assert_eq!(last_n_chars("abcdef\n", 3), "ef");
        assert_eq!(last_n_chars("  short  ", 100), "short");
    }

    #[test]
    fn control_characters_in_paths_are_rejected() {
        assert!(check_path_argument(Path::new("media/ok.mp4")).is_ok());
        assert!(check_path_argument(Path::new("media/bad\n.mp4")).is_err());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = Invocation::new("/nonexistent/promptanim-renderer", Duration::from_secs(1)).run();
        assert!(matches!(result, Err(RenderError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_carries_stderr() {
        let result = Invocation::new("sh", Duration::from_secs(5))
            .arg("-c")
            .arg("echo boom >&2; exit 3")
            .run_checked("test");
        match result {
            Err(RenderError::Invocation { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected invocation error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn slow_child_is_killed_at_timeout() {
        let started = Instant::now();
        let result = Invocation::new("sleep", Duration::from_millis(200))
            .arg("5")
            .run();
        assert!(matches!(result, Err(RenderError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn background_helper_cannot_outlive_the_deadline() {
        let started = Instant::now();
        let output = Invocation::new("sh", Duration::from_millis(500))
            .arg("-c")
            .arg("echo done; sleep 4 & exit 0")
            .run()
            .expect("direct child exits cleanly");
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "done");
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "took {:?}",
            started.elapsed()
        );
    }

    // Zombies still answer signal 0, so /proc is consulted where it exists.
    #[cfg(unix)]
    fn is_running(pid: libc::pid_t) -> bool {
        // SAFETY: signal 0 only checks that the pid exists.
        if unsafe { libc::kill(pid, 0) } != 0 {
            return false;
        }
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => !stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_forked_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("helper.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let result = Invocation::new("sh", Duration::from_millis(300))
            .arg("-c")
            .arg(script)
            .run();
        match result {
            Err(error @ RenderError::Timeout { .. }) => {
                assert_eq!(error.to_string(), "render timed out after 300ms");
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let helper: libc::pid_t = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let gone = (0..40).any(|_| {
            let alive = is_running(helper);
            if alive {
                thread::sleep(Duration::from_millis(50));
            }
            !alive
        });
        assert!(gone, "helper {helper} survived the timeout");
    }
}
