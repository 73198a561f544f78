/**
 * External process runner
 *
 * Spawns a subprocess with stdout and stderr piped and drains both streams on
 * their own threads before waiting for exit. Reading one stream to the end
 * before the other deadlocks once the child fills the unread pipe.
 */

use log::{debug, warn};
use std::ffi::OsStr;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

/// Everything a finished subprocess wrote, plus its exit status
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl CapturedOutput {
    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

/// Run `program` with `args` and capture both output streams.
///
/// Fails only when the process cannot be started or waited on.
pub fn capture<P, I, S>(program: P, args: I) -> io::Result<CapturedOutput>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("Failed to capture stderr"))?;

    // Both drains must be running before wait()
    let stdout_drain = spawn_drain(stdout);
    let stderr_drain = spawn_drain(stderr);

    let status = child.wait()?;

    let stdout = join_drain(stdout_drain, "stdout", program);
    let stderr = join_drain(stderr_drain, "stderr", program);

    Ok(CapturedOutput {
        stdout,
        stderr,
        status,
    })
}

/// Run a command and return stdout + stderr as one string.
///
/// Any launch failure yields an empty string; callers treat empty output as
/// "no usable output".
pub fn run_combined<P, I, S>(program: P, args: I) -> String
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    match capture(program, args) {
        Ok(output) => output.combined(),
        Err(e) => {
            debug!("Failed to run '{}': {}", program.to_string_lossy(), e);
            String::new()
        }
    }
}

fn spawn_drain<R>(mut stream: R) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn join_drain(handle: JoinHandle<io::Result<Vec<u8>>>, name: &str, program: &OsStr) -> String {
    match handle.join() {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            warn!("Failed to read {} of '{}': {}", name, program.to_string_lossy(), e);
            String::new()
        }
        Err(_) => {
            warn!("{} reader for '{}' panicked", name, program.to_string_lossy());
            String::new()
        }
    }
}
