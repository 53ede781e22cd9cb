use crate::errors::DashError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl ProcessRequest {
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait ProcessRunner: Send + Sync {
    /// Runs to completion, killing the child if `request.timeout` elapses first.
    fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, DashError>;

    /// Delivers stdout and stderr lines to `on_line` as they arrive and returns the exit code.
    fn stream(
        &self,
        request: ProcessRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32, DashError>;
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, DashError>;
    fn exists(&self, path: &Path) -> bool;
}

pub trait Terminal: Send + Sync {
    fn stdout_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), DashError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, DashError> {
        std::fs::read_to_string(path).map_err(|e| DashError::Io(format!("{}: {e}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub struct ProductionProcessRunner;

impl ProductionProcessRunner {
    fn spawn(request: &ProcessRequest) -> Result<Child, DashError> {
        Command::new(&request.program)
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DashError::ProgramNotFound(request.program.clone()),
                _ => DashError::Process(format!("{}: {e}", request.program)),
            })
    }
}

impl ProcessRunner for ProductionProcessRunner {
    fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, DashError> {
        let deadline = request.timeout.map(|timeout| Instant::now() + timeout);
        let mut child = Self::spawn(&request)?;
        let stdout_reader = child.stdout.take().map(drain_pipe);
        let stderr_reader = child.stderr.take().map(drain_pipe);

        // Readers still running at the deadline are left detached: a grandchild may hold the pipes open.
        let status = wait_with_deadline(&mut child, &request, deadline)?;

        let stdout = join_pipe(stdout_reader, &request, deadline)?;
        let stderr = join_pipe(stderr_reader, &request, deadline)?;
        let stdout = String::from_utf8(stdout)
            .map_err(|e| DashError::Unreadable(format!("{}: {e}", request.program)))?;

        Ok(ProcessOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    fn stream(
        &self,
        request: ProcessRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32, DashError> {
        let mut child = Self::spawn(&request)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        while let Some(line) = rx.blocking_recv() {
            on_line(&line);
        }
        for reader in readers {
            let _ = reader.join();
        }

        let deadline = request.timeout.map(|timeout| Instant::now() + timeout);
        let status = wait_with_deadline(&mut child, &request, deadline)?;
        Ok(status.code().unwrap_or(-1))
    }
}

fn timeout_error(request: &ProcessRequest) -> DashError {
    DashError::Timeout(format!(
        "{} exceeded {}ms",
        request.display(),
        request.timeout.unwrap_or_default().as_millis()
    ))
}

fn wait_with_deadline(
    child: &mut Child,
    request: &ProcessRequest,
    deadline: Option<Instant>,
) -> Result<ExitStatus, DashError> {
    let Some(deadline) = deadline else {
        return child
            .wait()
            .map_err(|e| DashError::Process(format!("{}: {e}", request.program)));
    };

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => return Err(DashError::Process(format!("{}: {e}", request.program))),
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(timeout_error(request));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

type PipeReader = thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> PipeReader {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn join_pipe(
    reader: Option<PipeReader>,
    request: &ProcessRequest,
    deadline: Option<Instant>,
) -> Result<Vec<u8>, DashError> {
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };
    if let Some(deadline) = deadline {
        while !reader.is_finished() {
            if Instant::now() >= deadline {
                return Err(timeout_error(request));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
    reader
        .join()
        .map_err(|_| DashError::Io("pipe reader panicked".to_string()))?
        .map_err(|e| DashError::Unreadable(e.to_string()))
}

fn forward_lines<R: Read + Send + 'static>(
    pipe: R,
    tx: mpsc::UnboundedSender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    let line = line.trim_end_matches(['\n', '\r']);
                    if tx.send(line.to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdout_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdout())
    }

    fn write_line(&self, line: &str) -> Result<(), DashError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| DashError::Io(e.to_string()))
    }
}

pub struct ProductionRuntime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub terminal: Arc<dyn Terminal>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            process_runner: Arc::new(ProductionProcessRunner),
            terminal: Arc::new(ProductionTerminal),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::default())
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        lock(&fs.files).insert(path.into(), contents.into());
        fs
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, DashError> {
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| DashError::Io(format!("missing file {}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    writes: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    pub fn written_lines(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdout_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), DashError> {
        lock(&self.writes).push(line.to_string());
        Ok(())
    }
}

/// Scripted stream result: the lines to emit followed by the exit code.
pub type StreamScript = Result<(Vec<String>, i32), DashError>;

/// Responses are keyed by program name and consumed in order; unscripted programs report not found.
#[derive(Default, Clone)]
pub struct FakeProcessRunner {
    responses: Arc<Mutex<HashMap<String, Vec<Result<ProcessOutput, DashError>>>>>,
    streams: Arc<Mutex<Vec<StreamScript>>>,
    requests: Arc<Mutex<Vec<ProcessRequest>>>,
}

impl FakeProcessRunner {
    pub fn push_response(&self, argv_key: &str, output: Result<ProcessOutput, DashError>) {
        lock(&self.responses)
            .entry(argv_key.to_string())
            .or_default()
            .push(output);
    }

    pub fn push_stdout(&self, argv_key: &str, stdout: &str) {
        self.push_response(
            argv_key,
            Ok(ProcessOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        );
    }

    pub fn push_stream(&self, script: StreamScript) {
        lock(&self.streams).push(script);
    }

    pub fn requests(&self) -> Vec<ProcessRequest> {
        lock(&self.requests).clone()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, DashError> {
        let key = request.display();
        lock(&self.requests).push(request);
        let mut responses = lock(&self.responses);
        match responses.get_mut(&key) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => Err(DashError::ProgramNotFound(key)),
        }
    }

    fn stream(
        &self,
        request: ProcessRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32, DashError> {
        let program = request.program.clone();
        lock(&self.requests).push(request);
        let script = {
            let mut streams = lock(&self.streams);
            if streams.is_empty() {
                return Err(DashError::ProgramNotFound(program));
            }
            streams.remove(0)
        };
        let (lines, code) = script?;
        for line in &lines {
            on_line(line);
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FakeClock, FakeProcessRunner, ProcessRequest, ProcessRunner, ProductionProcessRunner,
    };
    use crate::errors::DashError;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn request(program: &str, args: &[&str], timeout_ms: Option<u64>) -> ProcessRequest {
        ProcessRequest {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            timeout: timeout_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn missing_program_is_reported_as_not_found() {
        let err = ProductionProcessRunner
            .run(request("clawd-dash-definitely-missing", &[], Some(1000)))
            .expect_err("must fail");
        assert!(matches!(err, DashError::ProgramNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn slow_program_is_killed_at_deadline() {
        let started = std::time::Instant::now();
        let err = ProductionProcessRunner
            .run(request("sleep", &["5"], Some(100)))
            .expect_err("must time out");
        assert!(matches!(err, DashError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn background_grandchild_holding_stdout_does_not_outlive_the_deadline() {
        let started = std::time::Instant::now();
        let err = ProductionProcessRunner
            .run(request("sh", &["-c", "sleep 5 & echo started"], Some(300)))
            .expect_err("pipe stays open past the deadline");
        assert!(matches!(err, DashError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_stdout_and_exit_code() {
        let output = ProductionProcessRunner
            .run(request("sh", &["-c", "echo hello; exit 3"], Some(5000)))
            .expect("runs");
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn stream_merges_stderr_into_line_stream() {
        let mut lines = Vec::new();
        let code = ProductionProcessRunner
            .stream(
                request("sh", &["-c", "echo out; echo err 1>&2; exit 2"], None),
                &mut |line| lines.push(line.to_string()),
            )
            .expect("streams");
        assert_eq!(code, 2);
        lines.sort();
        assert_eq!(lines, vec!["err".to_string(), "out".to_string()]);
    }

    #[test]
    fn fake_runner_replays_scripted_responses_per_argv() {
        let runner = FakeProcessRunner::default();
        runner.push_stdout("moltbot status --json", "{}");
        let output = runner
            .run(request("moltbot", &["status", "--json"], Some(8000)))
            .expect("scripted");
        assert_eq!(output.stdout, "{}");
        let err = runner
            .run(request("moltbot", &["status", "--json"], Some(8000)))
            .expect_err("queue drained");
        assert!(matches!(err, DashError::ProgramNotFound(_)));
        assert_eq!(runner.requests().len(), 2);
    }

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::default();
        clock.advance(ChronoDuration::seconds(90));
        assert_eq!(super::Clock::now(&clock).timestamp(), 90);
    }
}
