//! Channel to a spawned child process.
//!
//! The child runs with stdin piped and with stdout and stderr both pointed
//! at one OS pipe, so the two streams reach the driver as a single stream
//! in the order the peer wrote them.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};

use super::Channel;
use crate::config::{ProcessConfig, ShutdownStrategy};
use crate::encoding::Utf8Decoder;
use crate::error::{ConverseError, Result, SpawnError};

/// Read end of the peer's merged output.
#[cfg(unix)]
type PeerOutput = tokio::net::unix::pipe::Receiver;

/// Stdout only; stderr is inherited where one pipe cannot carry both.
#[cfg(not(unix))]
type PeerOutput = tokio::process::ChildStdout;

/// A [`Channel`] that owns a child process.
#[derive(Debug)]
pub struct ProcessChannel {
    config: ProcessConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: Option<PeerOutput>,
    decoder: Utf8Decoder,
    buf: Vec<u8>,
    pid: Option<u32>,
    exit_status: Option<ExitStatus>,
}

impl ProcessChannel {
    /// Create a channel that will launch the configured process on start.
    #[must_use]
    pub fn new(config: ProcessConfig) -> Self {
        let chunk = config.read_chunk.max(1);
        Self {
            config,
            child: None,
            stdin: None,
            output: None,
            decoder: Utf8Decoder::new(),
            buf: vec![0; chunk],
            pid: None,
            exit_status: None,
        }
    }

    /// The process configuration.
    #[must_use]
    pub const fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// OS process ID, once started.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status collected when the channel was stopped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        if !self.config.inherit_env {
            cmd.env_clear();
        }
        cmd.envs(self.config.effective_env());
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped()).kill_on_drop(true);
        cmd
    }

    async fn shutdown_child(&mut self, mut child: Child) -> Option<ExitStatus> {
        let shutdown = self.config.shutdown;
        let mut status = None;

        if matches!(
            shutdown.strategy,
            ShutdownStrategy::Graceful | ShutdownStrategy::Escalating
        ) {
            status = wait_for(&mut child, shutdown.exit_wait).await;
        }

        if status.is_none()
            && matches!(
                shutdown.strategy,
                ShutdownStrategy::Terminate | ShutdownStrategy::Escalating
            )
        {
            terminate(&mut child);
            status = wait_for(&mut child, shutdown.terminate_wait).await;
        }

        if status.is_none() {
            tracing::debug!(pid = ?self.pid, "killing peer process");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill peer process");
            }
            status = child.wait().await.ok();
        }
        status
    }
}

impl Channel for ProcessChannel {
    async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let mut cmd = self.command();
        let pending = attach_output(&mut cmd)?;
        let spawned = cmd.spawn();
        // The parent's copies of the output pipe's write end close here, so
        // EOF arrives once the child and its descendants are done with it.
        drop(cmd);
        let mut child =
            spawned.map_err(|e| SpawnError::from_spawn_io(&self.config.command, e))?;

        self.stdin = Some(
            child
                .stdin
                .take()
                .ok_or(SpawnError::StreamUnavailable { stream: "stdin" })?,
        );
        self.output = Some(collect_output(&mut child, pending)?);
        self.pid = child.id();
        self.child = Some(child);

        tracing::info!(
            command = %self.config.command,
            args = ?self.config.args,
            pid = ?self.pid,
            "peer process started"
        );
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<String>> {
        let Some(output) = self.output.as_mut() else {
            return Ok(None);
        };
        loop {
            let n = output
                .read(&mut self.buf)
                .await
                .map_err(|e| ConverseError::io_context("reading from peer", e))?;

            if n == 0 {
                tracing::trace!("peer output closed");
                self.output = None;
                let rest = self.decoder.finish();
                return Ok((!rest.is_empty()).then_some(rest));
            }
            let text = self.decoder.decode(&self.buf[..n]);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(ConverseError::ChannelClosed)?;
        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');

        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| ConverseError::io_context("writing to peer", e))?;
        stdin
            .flush()
            .await
            .map_err(|e| ConverseError::io_context("flushing peer input", e))
    }

    async fn stop(&mut self) {
        // Closing stdin is the first nudge towards a voluntary exit.
        self.stdin = None;
        self.output = None;

        let Some(child) = self.child.take() else {
            return;
        };
        let status = self.shutdown_child(child).await;
        tracing::info!(pid = ?self.pid, status = ?status, "peer process stopped");
        self.exit_status = status;
    }

    fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

/// Point the child's stdout and stderr at one new pipe.
///
/// Returns the read end; the write ends live in `cmd` until it is dropped.
#[cfg(unix)]
fn attach_output(cmd: &mut Command) -> Result<PeerOutput> {
    use std::os::fd::{FromRawFd, OwnedFd};

    let mut fds: [libc::c_int; 2] = [-1, -1];
    // SAFETY: `fds` is a writable array of exactly two descriptors.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc != 0 {
        return Err(ConverseError::io_context(
            "creating peer output pipe",
            io::Error::last_os_error(),
        ));
    }
    // SAFETY: pipe() succeeded, so both descriptors are open and nothing
    // else owns them.
    #[allow(unsafe_code)]
    let (reader, writer) = unsafe {
        (
            OwnedFd::from_raw_fd(fds[0]),
            OwnedFd::from_raw_fd(fds[1]),
        )
    };
    set_cloexec(&reader)?;
    set_cloexec(&writer)?;

    let stderr =
        ConverseError::with_io_context(writer.try_clone(), "duplicating peer output pipe")?;
    cmd.stdout(Stdio::from(writer)).stderr(Stdio::from(stderr));

    ConverseError::with_io_context(
        tokio::net::unix::pipe::Receiver::from_owned_fd(reader),
        "registering peer output pipe",
    )
}

/// Keep the pipe out of processes other than the child it is handed to.
#[cfg(unix)]
fn set_cloexec(fd: &std::os::fd::OwnedFd) -> Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is open for as long as `fd` is borrowed.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc == -1 {
        return Err(ConverseError::io_context(
            "configuring peer output pipe",
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(unix)]
#[allow(clippy::unnecessary_wraps)]
fn collect_output(_child: &mut Child, output: PeerOutput) -> Result<PeerOutput> {
    Ok(output)
}

#[cfg(not(unix))]
fn attach_output(cmd: &mut Command) -> Result<()> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
    Ok(())
}

#[cfg(not(unix))]
fn collect_output(child: &mut Child, (): ()) -> Result<PeerOutput> {
    child
        .stdout
        .take()
        .ok_or_else(|| SpawnError::StreamUnavailable { stream: "stdout" }.into())
}

async fn wait_for(child: &mut Child, wait: Duration) -> Option<ExitStatus> {
    match tokio::time::timeout(wait, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "waiting for peer process failed");
            None
        }
        Err(_) => None,
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    let Some(pid) = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: pid refers to our own child, which has not been reaped yet
    // because `child.id()` still returned it.
    #[allow(unsafe_code)]
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        tracing::debug!(
            pid,
            error = %io::Error::last_os_error(),
            "failed to send SIGTERM"
        );
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "failed to terminate peer process");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ShutdownConfig;

    fn sh(script: &str) -> ProcessConfig {
        ProcessConfig::new("/bin/sh").arg("-c").arg(script)
    }

    async fn read_all(channel: &mut ProcessChannel) -> String {
        let mut out = String::new();
        while let Some(chunk) = channel.read_chunk().await.unwrap() {
            out.push_str(&chunk);
        }
        out
    }

    #[tokio::test]
    async fn merges_stdout_and_stderr_in_order() {
        let mut channel = ProcessChannel::new(sh("echo out; echo err 1>&2; echo out again"));
        channel.start().await.unwrap();
        assert!(channel.pid().is_some());

        assert_eq!(read_all(&mut channel).await, "out\nerr\nout again\n");

        channel.stop().await;
        assert!(channel.exit_status().is_some_and(|s| s.success()));
    }

    #[tokio::test]
    async fn echoes_written_line() {
        let mut channel = ProcessChannel::new(sh("read line; echo \"got $line\""));
        channel.start().await.unwrap();
        channel.write_line("hello").await.unwrap();

        assert_eq!(read_all(&mut channel).await, "got hello\n");
        channel.stop().await;
    }

    #[tokio::test]
    async fn unbuffered_hints_reach_child() {
        let mut channel = ProcessChannel::new(sh("echo \"$PYTHONUNBUFFERED$PYTHONUTF8\""));
        channel.start().await.unwrap();
        assert_eq!(read_all(&mut channel).await, "11\n");
        channel.stop().await;
    }

    #[tokio::test]
    async fn missing_command_is_spawn_error() {
        let mut channel = ProcessChannel::new(ProcessConfig::new("/nonexistent/peer-binary"));
        let err = channel.start().await.unwrap_err();
        assert!(err.is_spawn());
        assert!(!channel.is_running());
    }

    #[tokio::test]
    async fn stop_terminates_stubborn_child() {
        let config = sh("while :; do sleep 1; done").shutdown(
            ShutdownConfig::default()
                .with_exit_wait(Duration::from_millis(50))
                .with_terminate_wait(Duration::from_millis(500)),
        );
        let mut channel = ProcessChannel::new(config);
        channel.start().await.unwrap();

        channel.stop().await;
        assert!(!channel.is_running());
        assert!(channel.exit_status().is_some_and(|s| !s.success()));

        // Second stop is a no-op.
        channel.stop().await;
    }

    #[tokio::test]
    async fn write_after_stop_fails() {
        let mut channel =
            ProcessChannel::new(sh("cat").shutdown(ShutdownConfig::kill()));
        channel.start().await.unwrap();
        channel.stop().await;
        assert!(matches!(
            channel.write_line("late").await,
            Err(ConverseError::ChannelClosed)
        ));
        assert_eq!(channel.read_chunk().await.unwrap(), None);
    }
}
