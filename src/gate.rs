//! Single-flight authentication gate.
//!
//! The gate decides what a challenge needs next (biometric evaluation or the
//! password flow) and when it is resolved; the agent carries out the commands
//! and reports back. Only one challenge is in flight at a time; later requests
//! wait in FIFO order. `P` is whatever the caller wants back on resolution.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::domain::auth::{AuthenticationReason, AuthenticationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Queued,
    Biometric,
    Password,
}

#[derive(Debug)]
struct Challenge<P> {
    id: ChallengeId,
    on_start: bool,
    reason: AuthenticationReason,
    stage: Stage,
    purpose: P,
}

/// Work the agent must carry out for the current challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCommand {
    Evaluate {
        id: ChallengeId,
        reason: AuthenticationReason,
    },
    PromptPassword {
        id: ChallengeId,
        reason: AuthenticationReason,
    },
}

#[derive(Debug)]
pub struct Resolution<P> {
    pub id: ChallengeId,
    pub on_start: bool,
    pub success: bool,
    pub purpose: P,
}

#[derive(Debug)]
pub enum GateStep<P> {
    Command(GateCommand),
    Resolved(Resolution<P>),
}

#[derive(Debug)]
pub struct AuthGate<P> {
    current: Option<Challenge<P>>,
    queue: VecDeque<Challenge<P>>,
    next_id: u64,
}

impl<P> Default for AuthGate<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> AuthGate<P> {
    pub fn new() -> Self {
        Self {
            current: None,
            queue: VecDeque::new(),
            next_id: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    /// A startup challenge is running or waiting to run.
    pub fn startup_pending(&self) -> bool {
        self.current
            .iter()
            .chain(self.queue.iter())
            .any(|challenge| challenge.on_start)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Ask for a challenge. It starts right away when the gate is idle,
    /// otherwise it waits for [`AuthGate::start_next`].
    pub fn request(
        &mut self,
        state: &mut AuthenticationState,
        on_start: bool,
        reason: AuthenticationReason,
        purpose: P,
        biometrics: bool,
    ) -> (ChallengeId, Option<GateCommand>) {
        self.next_id += 1;
        let id = ChallengeId(self.next_id);
        self.queue.push_back(Challenge {
            id,
            on_start,
            reason,
            stage: Stage::Queued,
            purpose,
        });
        if self.current.is_some() {
            debug!("Challenge {:?} queued behind the current one", id);
        }
        (id, self.start_next(state, biometrics))
    }

    /// Start the oldest queued challenge if none is in flight.
    pub fn start_next(
        &mut self,
        state: &mut AuthenticationState,
        biometrics: bool,
    ) -> Option<GateCommand> {
        if self.current.is_some() {
            return None;
        }
        let mut challenge = self.queue.pop_front()?;
        state.challenge_in_flight = true;
        let command = if biometrics {
            challenge.stage = Stage::Biometric;
            GateCommand::Evaluate {
                id: challenge.id,
                reason: challenge.reason,
            }
        } else {
            challenge.stage = Stage::Password;
            GateCommand::PromptPassword {
                id: challenge.id,
                reason: challenge.reason,
            }
        };
        self.current = Some(challenge);
        Some(command)
    }

    /// Biometric evaluation for `id` finished. A failed startup check falls
    /// back to the password flow unless the user already got in this session.
    pub fn biometric_finished(
        &mut self,
        state: &mut AuthenticationState,
        id: ChallengeId,
        success: bool,
    ) -> Option<GateStep<P>> {
        let Some(challenge) = self
            .current
            .as_mut()
            .filter(|c| c.id == id && c.stage == Stage::Biometric)
        else {
            warn!("Ignoring biometric result for stale challenge {:?}", id);
            return None;
        };
        state.challenge_completed_once = true;

        if !success && challenge.on_start && !state.authenticated_on_start {
            challenge.stage = Stage::Password;
            return Some(GateStep::Command(GateCommand::PromptPassword {
                id,
                reason: challenge.reason,
            }));
        }
        self.resolve(state, success).map(GateStep::Resolved)
    }

    pub fn password_finished(
        &mut self,
        state: &mut AuthenticationState,
        id: ChallengeId,
        success: bool,
    ) -> Option<Resolution<P>> {
        if !self
            .current
            .as_ref()
            .is_some_and(|c| c.id == id && c.stage == Stage::Password)
        {
            warn!("Ignoring password result for stale challenge {:?}", id);
            return None;
        }
        self.resolve(state, success)
    }

    fn resolve(&mut self, state: &mut AuthenticationState, success: bool) -> Option<Resolution<P>> {
        let challenge = self.current.take()?;
        state.challenge_in_flight = false;
        state.challenge_completed_once = true;
        debug!(
            "Challenge {:?} ({}) resolved: {}",
            challenge.id, challenge.reason, success
        );
        Some(Resolution {
            id: challenge.id,
            on_start: challenge.on_start,
            success,
            purpose: challenge.purpose,
        })
    }
}
