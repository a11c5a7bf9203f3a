// agent/src/watcher.rs
//
// First-run bootstrap: answer the server's admin-password prompts through the
// control socket and notice when loading has finished.

use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::WatchBudget;
use crate::sys::secrets::AdminSecret;
use crate::sys::traits::{ControlChannel, LogSource};

pub const PASSWORD_PROMPT: &str = "enter new administrator password";
pub const CONFIRM_PROMPT: &str = "confirm the password";
/// Printed once the server is in the final steps of loading.
pub const STARTUP_BANNER: &str = "##########";
pub const TAIL_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    WaitingForPasswordPrompt,
    PasswordSubmitted,
    ConfirmPrompt,
    ConfirmSubmitted,
    Running,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Running { polls: u32, submissions: u32 },
    TimedOut { polls: u32, submissions: u32 },
}

impl BootstrapOutcome {
    pub fn is_running(&self) -> bool {
        matches!(self, BootstrapOutcome::Running { .. })
    }
}

/// Ephemeral state for one bootstrap attempt.
#[derive(Debug)]
pub struct BootstrapSession {
    pub polls: u32,
    pub submissions: u32,
    pub state: BootstrapState,
    pub last_tail: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl BootstrapSession {
    fn new() -> Self {
        Self {
            polls: 0,
            submissions: 0,
            state: BootstrapState::WaitingForPasswordPrompt,
            last_tail: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn outcome(&self) -> BootstrapOutcome {
        match self.state {
            BootstrapState::Running => BootstrapOutcome::Running { polls: self.polls, submissions: self.submissions },
            _ => BootstrapOutcome::TimedOut { polls: self.polls, submissions: self.submissions },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt { NewPassword, Confirm }

pub fn shows_startup_banner(tail: &[String]) -> bool {
    tail.iter().any(|l| l.contains(STARTUP_BANNER))
}

fn prompt_in(line: &str) -> Option<Prompt> {
    let line = line.to_ascii_lowercase();
    if line.contains(PASSWORD_PROMPT) {
        Some(Prompt::NewPassword)
    } else if line.contains(CONFIRM_PROMPT) {
        Some(Prompt::Confirm)
    } else {
        None
    }
}

pub struct StartupWatcher<'a> {
    logs: &'a dyn LogSource,
    control: &'a dyn ControlChannel,
    budget: WatchBudget,
}

impl<'a> StartupWatcher<'a> {
    pub fn new(logs: &'a dyn LogSource, control: &'a dyn ControlChannel, budget: WatchBudget) -> Self {
        Self { logs, control, budget }
    }

    /// Polls the journal until the startup banner shows up or the budget runs
    /// out. Running out is a normal outcome, not an error.
    pub async fn run(&self, secret: &AdminSecret) -> BootstrapOutcome {
        let mut session = BootstrapSession::new();

        while session.polls < self.budget.max_polls {
            session.polls += 1;

            // Fresh read every poll; one snapshot serves both checks.
            session.last_tail = self.logs.recent_lines(TAIL_WINDOW).await;

            if let Some(prompt) = session.last_tail.last().and_then(|l| prompt_in(l)) {
                session.state = match prompt {
                    Prompt::NewPassword => BootstrapState::WaitingForPasswordPrompt,
                    Prompt::Confirm => BootstrapState::ConfirmPrompt,
                };
                self.submit(&mut session, prompt, secret).await;
            }

            if shows_startup_banner(&session.last_tail) {
                session.state = BootstrapState::Running;
                break;
            }

            if session.polls < self.budget.max_polls {
                tokio::time::sleep(self.budget.interval).await;
            }
        }

        if session.state != BootstrapState::Running {
            session.state = BootstrapState::TimedOut;
        }

        let elapsed = Utc::now() - session.started_at;
        let outcome = session.outcome();
        match outcome {
            BootstrapOutcome::Running { polls, submissions } => {
                info!(polls, submissions, elapsed_ms = elapsed.num_milliseconds(), "✅ server finished loading")
            }
            BootstrapOutcome::TimedOut { polls, submissions } => {
                warn!(polls, submissions, tail = ?session.last_tail, "startup banner not seen within credential budget")
            }
        }
        outcome
    }

    async fn submit(&self, session: &mut BootstrapSession, prompt: Prompt, secret: &AdminSecret) {
        let line = Zeroizing::new(secret.use_secret(|s| format!("{}\n", s)));

        // Best-effort: re-submitting on the next prompt is harmless.
        if let Err(e) = self.control.send_line(&line).await {
            warn!(error = %e, "could not write credential to control socket");
            return;
        }

        session.submissions += 1;
        session.state = match prompt {
            Prompt::NewPassword => BootstrapState::PasswordSubmitted,
            Prompt::Confirm => BootstrapState::ConfirmSubmitted,
        };
        debug!(state = ?session.state, poll = session.polls, "answered admin password prompt");
    }
}

/// Generic bounded sleep-poll: `Some(polls)` once `probe` holds, `None` when
/// the budget is exhausted.
pub async fn wait_until<F, Fut>(budget: WatchBudget, mut probe: F) -> Option<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for poll in 1..=budget.max_polls {
        if probe().await {
            return Some(poll);
        }
        if poll < budget.max_polls {
            tokio::time::sleep(budget.interval).await;
        }
    }
    None
}
