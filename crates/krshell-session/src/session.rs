use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use krshell_types::ShellError;

use super::framer::{CommandEnvelope, OutputFramer};
use super::logger::{SessionLogger, Transcript};
use super::process::{ProcessControl, ShellProcess};

/// Message from the stdout reader thread
#[derive(Debug)]
pub(crate) enum ReaderMsg {
    Line(String),
    /// stdout reached end of stream
    Eof,
    /// The session was torn down while a command was waiting
    Cancelled,
}

/// The parts only the lock holder may touch
pub(crate) struct SessionIo {
    stdin: Box<dyn Write + Send>,
    lines: Receiver<ReaderMsg>,
}

/// One live shell process
pub(crate) struct ShellSession {
    id: u64,
    pub(crate) io: Mutex<SessionIo>,
    control: Mutex<Box<dyn ProcessControl>>,
    /// Lets `destroy` wake a caller blocked on the line channel
    cancel: Mutex<Option<Sender<ReaderMsg>>>,
    lock_acquired_at: Mutex<Option<Instant>>,
    idle: AtomicBool,
    alive: AtomicBool,
    transcript: Option<Transcript>,
}

impl ShellSession {
    /// Wire up a spawned process and start its reader threads
    pub(crate) fn open(
        id: u64,
        process: ShellProcess,
        transcript: Option<Transcript>,
    ) -> Result<Arc<Self>, ShellError> {
        let ShellProcess {
            stdin,
            stdout,
            stderr,
            mut control,
        } = process;

        let (tx, rx) = mpsc::channel();
        let reader_tx = tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("keep-shell-{}-stdout", id))
            .spawn(move || read_lines(stdout, reader_tx));
        if let Err(e) = spawned {
            control.terminate();
            return Err(ShellError::Transport(e));
        }

        if let Some(stderr) = stderr {
            let stderr_transcript = transcript.clone();
            let spawned = thread::Builder::new()
                .name(format!("keep-shell-{}-stderr", id))
                .spawn(move || drain_stderr(id, stderr, stderr_transcript));
            if let Err(e) = spawned {
                // stdout reader exits on EOF once the process is gone
                control.terminate();
                return Err(ShellError::Transport(e));
            }
        }

        write_transcript(transcript.as_ref(), |t| t.log_lifecycle("start", None));

        Ok(Arc::new(Self {
            id,
            io: Mutex::new(SessionIo { stdin, lines: rx }),
            control: Mutex::new(control),
            cancel: Mutex::new(Some(tx)),
            lock_acquired_at: Mutex::new(None),
            idle: AtomicBool::new(true),
            alive: AtomicBool::new(true),
            transcript,
        }))
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    /// Whether the shell process already terminated on its own
    pub(crate) fn has_exited(&self) -> bool {
        match self.control.lock().exit_status() {
            Ok(status) => status.is_some(),
            Err(e) => {
                log::debug!(target: "keep_shell", "Session {} status unknown: {}", self.id, e);
                true
            }
        }
    }

    /// How long the current command has held the session, if one is running
    pub(crate) fn lock_age(&self) -> Option<Duration> {
        self.lock_acquired_at.lock().map(|at| at.elapsed())
    }

    /// Mark the session busy; call right after taking the I/O lock
    pub(crate) fn enter(&self) {
        *self.lock_acquired_at.lock() = Some(Instant::now());
        self.idle.store(false, Ordering::SeqCst);
    }

    /// Mark the session idle; returns whether it is still usable
    pub(crate) fn leave(&self) -> bool {
        *self.lock_acquired_at.lock() = None;
        self.idle.store(true, Ordering::SeqCst);
        self.is_alive()
    }

    /// Write one framed command and collect its output
    pub(crate) fn exec_framed(
        &self,
        io: &mut SessionIo,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<String, ShellError> {
        let envelope = CommandEnvelope::new(command);
        io.stdin.write_all(&envelope.to_bytes())?;
        io.stdin.flush()?;
        self.log_transcript(|t| t.log_input(command));

        let deadline = timeout.map(|limit| (limit, Instant::now() + limit));
        let mut framer = OutputFramer::new();

        loop {
            let msg = match deadline {
                Some((limit, deadline)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match io.lines.recv_timeout(remaining) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => return Err(ShellError::Timeout(limit)),
                        Err(RecvTimeoutError::Disconnected) => ReaderMsg::Eof,
                    }
                }
                None => io.lines.recv().unwrap_or(ReaderMsg::Eof),
            };

            match msg {
                ReaderMsg::Line(line) => {
                    if let Some(output) = framer.push_line(&line) {
                        self.log_transcript(|t| t.log_output(&output));
                        return Ok(output);
                    }
                }
                ReaderMsg::Eof | ReaderMsg::Cancelled => {
                    return Err(ShellError::Closed {
                        partial: framer.into_partial(),
                    });
                }
            }
        }
    }

    /// Tear the session down; only the first call has any effect
    pub(crate) fn destroy(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }

        // Wake a holder blocked on the channel even if the process lingers
        if let Some(cancel) = self.cancel.lock().take() {
            let _ = cancel.send(ReaderMsg::Cancelled);
        }

        // Close stdin when nobody is mid-command so the shell can exit on EOF
        if let Some(mut io) = self.io.try_lock() {
            io.stdin = Box::new(io::sink());
        }

        self.control.lock().terminate();
        *self.lock_acquired_at.lock() = None;
        self.idle.store(true, Ordering::SeqCst);

        log::debug!(target: "keep_shell", "Session {} destroyed", self.id);
        self.log_transcript(|t| t.log_lifecycle("destroy", None));
    }

    fn log_transcript<F>(&self, write: F)
    where
        F: FnOnce(&mut SessionLogger) -> anyhow::Result<()>,
    {
        write_transcript(self.transcript.as_ref(), write);
    }
}

fn write_transcript<F>(transcript: Option<&Transcript>, write: F)
where
    F: FnOnce(&mut SessionLogger) -> anyhow::Result<()>,
{
    if let Some(transcript) = transcript {
        if let Err(e) = write(&mut *transcript.lock()) {
            log::warn!(target: "keep_shell", "Transcript write failed: {:#}", e);
        }
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Forward stdout lines until EOF or until the session stops listening
fn read_lines(stdout: Box<dyn Read + Send>, tx: Sender<ReaderMsg>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(ReaderMsg::Line(decode_line(&buf))).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    let _ = tx.send(ReaderMsg::Eof);
}

fn drain_stderr(id: u64, stderr: Box<dyn Read + Send>, transcript: Option<Transcript>) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                log::warn!(target: "keep_shell", "[session {}] {}", id, line);
                write_transcript(transcript.as_ref(), |t| t.log_error(&line));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

/// Lossy UTF-8 without the trailing line terminator
fn decode_line(buf: &[u8]) -> String {
    let mut end = buf.len();
    while end > 0 && (buf[end - 1] == b'\n' || buf[end - 1] == b'\r') {
        end -= 1;
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
