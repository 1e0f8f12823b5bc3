//! Diagnostic oracles: given a failed command and its output, propose a fix.
//!
//! The recovery loop only sees the [`DiagnosticOracle`] trait. An oracle
//! never returns an error; when its own backend fails it answers with
//! [`DiagnosticAnalysis::oracle_failed`].

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::types::DiagnosticAnalysis;

/// Proposes corrected commands for failures.
#[async_trait]
pub trait DiagnosticOracle: Send + Sync {
    async fn analyze(&self, command: &str, stderr: &str, stdout: &str) -> DiagnosticAnalysis;
}

/// Common misspellings of the first word of a command.
const DEFAULT_TYPOS: &[(&str, &str)] = &[
    ("gti", "git"),
    ("got", "git"),
    ("gi", "git"),
    ("sl", "ls"),
    ("cta", "cat"),
    ("grpe", "grep"),
    ("mkdri", "mkdir"),
    ("pyhton", "python"),
    ("pyhton3", "python3"),
    ("pytohn3", "python3"),
    ("dokcer", "docker"),
    ("sudp", "sudo"),
    ("suod", "sudo"),
    ("nmp", "npm"),
    ("carg", "cargo"),
    ("vmi", "vim"),
    ("claer", "clear"),
];

/// Rule-based oracle for the failures that have an obvious answer.
///
/// - "command not found" with a known misspelling of the first word proposes
///   the corrected command
/// - "command not found" otherwise asks for the tool to be installed
/// - "permission denied" and "no such file or directory" are unfixable
/// - timeouts are unfixable
/// - anything else is unfixable with the first line of output as the cause
#[derive(Debug, Clone)]
pub struct HeuristicOracle {
    typos: HashMap<String, String>,
}

impl Default for HeuristicOracle {
    fn default() -> Self {
        Self {
            typos: DEFAULT_TYPOS
                .iter()
                .map(|(wrong, right)| (wrong.to_string(), right.to_string()))
                .collect(),
        }
    }
}

impl HeuristicOracle {
    pub fn with_typo(mut self, wrong: impl Into<String>, right: impl Into<String>) -> Self {
        self.typos.insert(wrong.into(), right.into());
        self
    }

    fn diagnose_not_found(&self, command: &str) -> DiagnosticAnalysis {
        let trimmed = command.trim();
        let program = trimmed.split_whitespace().next().unwrap_or_default();

        match self.typos.get(program) {
            Some(correct) => DiagnosticAnalysis::fix(
                format!("{}{}", correct, &trimmed[program.len()..]),
                format!("`{}` is not a command", program),
                format!("`{}` looks like a misspelling of `{}`", program, correct),
            ),
            None => DiagnosticAnalysis::unfixable(
                format!("`{}` is not installed on the remote host", program),
                Some(format!("install `{}` or add it to PATH", program)),
            ),
        }
    }
}

#[async_trait]
impl DiagnosticOracle for HeuristicOracle {
    async fn analyze(&self, command: &str, stderr: &str, stdout: &str) -> DiagnosticAnalysis {
        let output = format!("{}\n{}", stderr, stdout).to_lowercase();
        debug!("Diagnosing failed command: {}", command);

        if output.contains("command not found") || output.contains("not recognized as") {
            return self.diagnose_not_found(command);
        }
        if output.contains("permission denied") || output.contains("operation not permitted") {
            return DiagnosticAnalysis::unfixable(
                "permission denied",
                Some("run with sufficient privileges or fix the file permissions".to_string()),
            );
        }
        if output.contains("no such file or directory") {
            return DiagnosticAnalysis::unfixable("no such file or directory", None);
        }
        if output.contains("timed out") || output.contains("read cancelled") {
            return DiagnosticAnalysis::unfixable(
                "command did not finish in time",
                Some("increase the timeout or run the command in the background".to_string()),
            );
        }

        let first_line = stderr
            .lines()
            .chain(stdout.lines())
            .map(str::trim)
            .find(|line| !line.is_empty());
        match first_line {
            Some(line) => DiagnosticAnalysis::unfixable(line, None),
            None => DiagnosticAnalysis::unfixable("command failed without output", None),
        }
    }
}
