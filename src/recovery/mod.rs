//! Bounded diagnose-and-retry loop.
//!
//! [`RecoveryController::execute_with_recovery`] runs a command through a
//! [`CommandExecutor`] and, on failure, asks a [`DiagnosticOracle`] for a
//! replacement command:
//!
//! 1. Run the current command.
//! 2. Success ends the loop with `success = true`.
//! 3. A failure on the last permitted attempt ends it without diagnosis.
//! 4. Otherwise the oracle is consulted. An oracle failure, an unfixable
//!    verdict or a fixable verdict without a command ends the loop.
//! 5. Otherwise the proposed command becomes the next attempt.
//!
//! Every attempt is awaited fully before the next one starts. Oracle verdicts
//! end the loop with a failed [`RetryResult`]; only session failures are
//! returned as `Err`.
//!
//! Risk classification ([`risk`]) is advisory metadata for the caller. The
//! loop runs whatever command the oracle proposes without consulting it.

pub mod executor;
pub mod oracle;
pub mod risk;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::types::{CommandResult, DiagnosticAnalysis, RetryAttempt, RetryOutcome, RetryResult};

pub use executor::{CommandExecutor, InteractiveExecutor, OneShotExecutor};
pub use oracle::{DiagnosticOracle, HeuristicOracle};
pub use risk::{
    RiskClassifier, RiskLevel, RiskTier, classify_risk, explain_risk, is_dangerous,
    requires_confirmation,
};

/// Progress notifications, sent in the order the steps complete.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecoveryEvent {
    AttemptStarted {
        attempt: u32,
        command: String,
    },
    AttemptFinished {
        attempt: u32,
        result: CommandResult,
    },
    Diagnosed {
        attempt: u32,
        analysis: DiagnosticAnalysis,
    },
    Finished {
        success: bool,
        outcome: RetryOutcome,
        attempts: usize,
    },
}

/// Drives the recovery loop against one oracle.
#[derive(Clone)]
pub struct RecoveryController {
    oracle: Arc<dyn DiagnosticOracle>,
    events: Option<mpsc::UnboundedSender<RecoveryEvent>>,
}

impl RecoveryController {
    pub fn new(oracle: impl DiagnosticOracle + 'static) -> Self {
        Self::from_shared(Arc::new(oracle))
    }

    pub fn from_shared(oracle: Arc<dyn DiagnosticOracle>) -> Self {
        Self {
            oracle,
            events: None,
        }
    }

    /// Publish [`RecoveryEvent`]s on `events`. A dropped receiver is ignored.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<RecoveryEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: RecoveryEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn finish(
        &self,
        final_result: CommandResult,
        attempts: Vec<RetryAttempt>,
        outcome: RetryOutcome,
    ) -> RetryResult {
        let success = outcome == RetryOutcome::Succeeded;
        info!(
            "Recovery finished after {} attempt(s): {}",
            attempts.len(),
            outcome
        );
        self.emit(RecoveryEvent::Finished {
            success,
            outcome: outcome.clone(),
            attempts: attempts.len(),
        });
        RetryResult {
            success,
            final_result,
            attempts,
            outcome,
        }
    }

    /// Run `command` with at most `max_attempts` attempts (0 counts as 1).
    pub async fn execute_with_recovery<E>(
        &self,
        executor: &mut E,
        command: &str,
        max_attempts: u32,
    ) -> Result<RetryResult, SessionError>
    where
        E: CommandExecutor + ?Sized,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut current = command.to_string();
        let mut attempt: u32 = 1;

        loop {
            info!("Attempt {}/{}: {}", attempt, max_attempts, current);
            self.emit(RecoveryEvent::AttemptStarted {
                attempt,
                command: current.clone(),
            });

            let result = executor.run(&current).await.inspect_err(|e| {
                warn!("Attempt {} aborted by session failure: {}", attempt, e);
            })?;
            self.emit(RecoveryEvent::AttemptFinished {
                attempt,
                result: result.clone(),
            });

            if result.success {
                attempts.push(RetryAttempt {
                    attempt,
                    command: current,
                    result: result.clone(),
                    analysis: None,
                });
                return Ok(self.finish(result, attempts, RetryOutcome::Succeeded));
            }

            if attempt == max_attempts {
                attempts.push(RetryAttempt {
                    attempt,
                    command: current,
                    result: result.clone(),
                    analysis: None,
                });
                return Ok(self.finish(result, attempts, RetryOutcome::Exhausted));
            }

            let analysis = self
                .oracle
                .analyze(&current, &result.stderr, &result.stdout)
                .await;
            self.emit(RecoveryEvent::Diagnosed {
                attempt,
                analysis: analysis.clone(),
            });

            let next = if !analysis.oracle_success {
                Err(RetryOutcome::OracleFailed {
                    error: analysis.cause.clone(),
                })
            } else if !analysis.fixable {
                Err(RetryOutcome::NotFixable {
                    cause: analysis.cause.clone(),
                    requires_action: analysis.requires_action.clone(),
                })
            } else {
                analysis
                    .fixed_command
                    .as_deref()
                    .map(str::trim)
                    .filter(|fixed| !fixed.is_empty())
                    .map(str::to_string)
                    .ok_or(RetryOutcome::NoFixProvided)
            };

            attempts.push(RetryAttempt {
                attempt,
                command: current,
                result: result.clone(),
                analysis: Some(analysis),
            });

            match next {
                Ok(fixed) => {
                    info!("Applying proposed fix: {}", fixed);
                    current = fixed;
                    attempt += 1;
                }
                Err(outcome) => return Ok(self.finish(result, attempts, outcome)),
            }
        }
    }
}
