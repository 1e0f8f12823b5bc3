//! In-memory transport doubles shared by the unit tests.
//!
//! [`FakeShell`] simulates just enough of a POSIX login shell to exercise the
//! framing protocol: it echoes input lines, understands the sentinel setup
//! line, tracks a working directory for `cd`/`pwd` and replays scripted
//! [`Behavior`]s for everything else. Unknown commands fail with exit 127.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::Credentials;
use crate::config::{AuthMethod, ConnectionConfig};
use crate::error::SessionError;
use crate::session::Session;
use crate::session::transport::{Connector, ExecOutput, InteractiveChannel, Transport};

pub(crate) const HOME: &str = "/home/tester";

/// What a scripted command does.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Output {
        stdout: String,
        stderr: String,
        exit: i32,
    },
    /// Print `partial` and never finish
    Hang { partial: String },
    /// Print `partial`, then finish with `tail` only once the next line is
    /// written
    Late {
        partial: String,
        tail: String,
        exit: i32,
    },
    /// Drop the channel or connection
    Disconnect,
}

impl Behavior {
    pub(crate) fn ok(stdout: &str) -> Self {
        Behavior::Output {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit: 0,
        }
    }

    pub(crate) fn fail(stderr: &str, exit: i32) -> Self {
        Behavior::Output {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit,
        }
    }
}

/// Static description of the simulated host.
#[derive(Debug, Clone)]
pub(crate) struct ShellScript {
    pub banner: String,
    pub commands: HashMap<String, Behavior>,
    /// Wrap output lines in SGR color codes
    pub colorize: bool,
    /// Deliver replies in chunks of this many bytes
    pub chunk_size: Option<usize>,
    /// Never print a prompt after the setup line
    pub mute_prompt: bool,
    /// Echo input lines wrapped at this many columns
    pub echo_width: Option<usize>,
}

impl Default for ShellScript {
    fn default() -> Self {
        Self {
            banner: "Welcome to fakehost\r\nLast login: never\r\n$ ".to_string(),
            commands: HashMap::new(),
            colorize: false,
            chunk_size: None,
            mute_prompt: false,
            echo_width: None,
        }
    }
}

impl ShellScript {
    pub(crate) fn with(mut self, command: &str, behavior: Behavior) -> Self {
        self.commands.insert(command.to_string(), behavior);
        self
    }
}

/// Mutable state of one simulated shell.
pub(crate) struct FakeShell {
    script: ShellScript,
    cwd: String,
    prompt: String,
    /// Output of a [`Behavior::Late`] command still to be printed
    deferred: Option<String>,
}

fn unquote(word: &str) -> String {
    word.replace('\'', "")
}

impl FakeShell {
    pub(crate) fn new(script: ShellScript) -> Self {
        Self {
            script,
            cwd: HOME.to_string(),
            prompt: "$ ".to_string(),
            deferred: None,
        }
    }

    fn resolve(&self, target: &str) -> String {
        let target = unquote(target.trim());
        let base = if target.is_empty() || target == "~" {
            return HOME.to_string();
        } else if let Some(rest) = target.strip_prefix("~/") {
            format!("{}/{}", HOME, rest)
        } else if target.starts_with('/') {
            target
        } else {
            format!("{}/{}", self.cwd, target)
        };

        let mut parts: Vec<&str> = Vec::new();
        for part in base.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        format!("/{}", parts.join("/"))
    }

    /// Run one command in the simulated shell.
    pub(crate) fn run(&mut self, command: &str) -> Behavior {
        let command = command.trim();
        if command == "pwd" {
            return Behavior::ok(&self.cwd);
        }
        if command == "cd" || command.starts_with("cd ") {
            let target = self.resolve(command.strip_prefix("cd").unwrap_or_default());
            if target.contains("missing") {
                return Behavior::fail(
                    &format!("bash: cd: {}: No such file or directory", target),
                    1,
                );
            }
            self.cwd = target;
            return Behavior::ok("");
        }
        if let Some(behavior) = self.script.commands.get(command) {
            return behavior.clone();
        }
        let name = command.split_whitespace().next().unwrap_or_default();
        Behavior::fail(&format!("bash: {}: command not found", name), 127)
    }

    fn paint(&self, line: &str) -> String {
        if self.script.colorize && !line.is_empty() {
            format!("\x1b[01;32m{}\x1b[0m", line)
        } else {
            line.to_string()
        }
    }

    fn prompt_bytes(&self) -> String {
        if self.script.colorize {
            format!("\x1b]0;tester@fakehost\x07{}", self.prompt)
        } else {
            self.prompt.clone()
        }
    }

    fn echo(&self, line: &str) -> String {
        match self.script.echo_width {
            Some(width) => {
                let chars: Vec<char> = line.chars().collect();
                chars
                    .chunks(width.max(1))
                    .map(|c| c.iter().collect::<String>())
                    .collect::<Vec<_>>()
                    .join("\r\n")
            }
            None => line.to_string(),
        }
    }

    /// Terminal output for one input line, and whether the channel closes.
    fn respond(&mut self, line: &str) -> (String, bool) {
        let line = line.trim_end_matches('\n');
        let mut out = self.deferred.take().unwrap_or_default();
        out.push_str(&format!("{}\r\n", self.echo(line)));

        if let Some(ps1) = line.split("PS1=").nth(1) {
            self.prompt = unquote(ps1.split(';').next().unwrap_or_default());
            if !self.script.mute_prompt {
                out.push_str(&self.prompt_bytes());
            }
            return (out, false);
        }

        let Some((start, rest)) = line.split_once("; ") else {
            out.push_str(&self.prompt_bytes());
            return (out, false);
        };
        let Some((command, end)) = rest.rsplit_once("; echo ") else {
            out.push_str(&self.prompt_bytes());
            return (out, false);
        };
        let start = unquote(start.trim_start_matches("echo "));
        let end = unquote(end.trim_end_matches(" $?"));

        out.push_str(&format!("{}\r\n", start));
        match self.run(command) {
            Behavior::Output {
                stdout,
                stderr,
                exit,
            } => {
                for text in [stdout, stderr] {
                    for payload in text.lines() {
                        out.push_str(&self.paint(payload));
                        out.push_str("\r\n");
                    }
                }
                out.push_str(&format!("{} {}\r\n", end, exit));
                out.push_str(&self.prompt_bytes());
                (out, false)
            }
            Behavior::Hang { partial } => {
                for payload in partial.lines() {
                    out.push_str(&format!("{}\r\n", payload));
                }
                (out, false)
            }
            Behavior::Late {
                partial,
                tail,
                exit,
            } => {
                for payload in partial.lines() {
                    out.push_str(&format!("{}\r\n", payload));
                }
                let mut later = String::new();
                for payload in tail.lines() {
                    later.push_str(&format!("{}\r\n", payload));
                }
                later.push_str(&format!("{} {}\r\n", end, exit));
                later.push_str(&self.prompt_bytes());
                self.deferred = Some(later);
                (out, false)
            }
            Behavior::Disconnect => (out, true),
        }
    }
}

/// PTY double driven by a [`FakeShell`].
pub(crate) struct ScriptedChannel {
    shell: FakeShell,
    pending: VecDeque<Vec<u8>>,
    closed: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedChannel {
    pub(crate) fn new(script: ShellScript, log: Arc<Mutex<Vec<String>>>) -> Self {
        let mut channel = Self {
            pending: VecDeque::new(),
            closed: false,
            log,
            shell: FakeShell::new(script),
        };
        let banner = channel.shell.script.banner.clone();
        channel.push(&banner);
        channel
    }

    fn push(&mut self, text: &str) {
        let bytes = text.as_bytes();
        match self.shell.script.chunk_size {
            Some(size) => self
                .pending
                .extend(bytes.chunks(size.max(1)).map(<[u8]>::to_vec)),
            None if !bytes.is_empty() => self.pending.push_back(bytes.to_vec()),
            None => {}
        }
    }
}

#[async_trait]
impl InteractiveChannel for ScriptedChannel {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Channel("write on closed channel".to_string()));
        }
        let line = String::from_utf8_lossy(data).into_owned();
        self.log
            .lock()
            .expect("log lock")
            .push(format!("shell: {}", line.trim_end()));
        let (reply, close) = self.shell.respond(&line);
        self.push(&reply);
        self.closed = close;
        Ok(())
    }

    async fn read(&mut self) -> Option<Vec<u8>> {
        if let Some(chunk) = self.pending.pop_front() {
            return Some(chunk);
        }
        if self.closed {
            return None;
        }
        std::future::pending::<()>().await;
        None
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closed = true;
        Ok(())
    }
}

/// Transport double: one-shot commands and PTY channels share a script.
pub(crate) struct FakeTransport {
    script: ShellScript,
    log: Arc<Mutex<Vec<String>>>,
    opened: Arc<AtomicUsize>,
    disconnected: Arc<AtomicBool>,
}

impl FakeTransport {
    fn run_composed(&self, composed: &str) -> Result<ExecOutput, SessionError> {
        let mut shell = FakeShell::new(self.script.clone());
        let (dir, rest) = composed
            .strip_prefix("cd ")
            .and_then(|s| s.split_once(" && "))
            .unwrap_or(("~", composed));
        shell.cwd = shell.resolve(dir);

        let (command, then_pwd) = match rest.strip_suffix(" && pwd") {
            Some(cd) => (cd, true),
            None => (rest, false),
        };

        match shell.run(command) {
            Behavior::Output {
                mut stdout,
                stderr,
                exit,
            } => {
                if then_pwd && exit == 0 {
                    stdout = format!("{}\n", shell.cwd);
                }
                Ok(ExecOutput {
                    stdout,
                    stderr,
                    exit_code: exit,
                    timed_out: false,
                })
            }
            Behavior::Hang { partial } | Behavior::Late { partial, .. } => Ok(ExecOutput {
                stdout: partial,
                stderr: String::new(),
                exit_code: -1,
                timed_out: true,
            }),
            Behavior::Disconnect => Err(SessionError::Transport("connection reset by peer".to_string())),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn run_once(&self, command: &str, timeout: Duration) -> Result<ExecOutput, SessionError> {
        self.log
            .lock()
            .expect("log lock")
            .push(format!("exec: {}", command));
        let output = self.run_composed(command)?;
        if output.timed_out {
            tokio::time::sleep(timeout).await;
        }
        Ok(output)
    }

    async fn open_interactive(
        &self,
        term: &str,
        cols: u32,
        rows: u32,
    ) -> Result<Box<dyn InteractiveChannel>, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .expect("log lock")
            .push(format!("pty: {} {}x{}", term, cols, rows));
        Ok(Box::new(ScriptedChannel::new(
            self.script.clone(),
            self.log.clone(),
        )))
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector double handing out [`FakeTransport`]s.
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    pub script: ShellScript,
    pub log: Arc<Mutex<Vec<String>>>,
    pub opened: Arc<AtomicUsize>,
    pub disconnected: Arc<AtomicBool>,
    pub credentials_seen: Arc<Mutex<Vec<Credentials>>>,
    pub refuse: bool,
}

impl FakeConnector {
    pub(crate) fn new(script: ShellScript) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }

    pub(crate) fn shell_writes(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("shell: ").map(str::to_string))
            .collect()
    }

    pub(crate) fn execs(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("exec: ").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credentials: Credentials,
    ) -> Result<Box<dyn Transport>, SessionError> {
        if self.refuse {
            return Err(SessionError::Connection(format!(
                "connection refused by {}",
                config.address()
            )));
        }
        self.credentials_seen
            .lock()
            .expect("credentials lock")
            .push(credentials);
        Ok(Box::new(FakeTransport {
            script: self.script.clone(),
            log: self.log.clone(),
            opened: self.opened.clone(),
            disconnected: self.disconnected.clone(),
        }))
    }
}

pub(crate) fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("fakehost", 22, "tester", AuthMethod::Agent)
}

/// A connected session on `connector`.
pub(crate) async fn connected(connector: &FakeConnector) -> Session {
    let credentials = crate::auth::StaticCredentials(Credentials::default());
    Session::connect(connector, test_config(), &credentials)
        .await
        .expect("fake connect")
}

/// A session with an initialized interactive channel.
pub(crate) async fn interactive(connector: &FakeConnector) -> Session {
    let mut session = connected(connector).await;
    session
        .initialize_interactive(Duration::from_secs(5))
        .await
        .expect("fake shell init");
    session
}
